pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Commands};
pub use config::TomlConfig;

pub use core::command::{CommandOutcome, Redirect, ShellCommand};
pub use core::environment::{add_executables_to_environment, get_executable_in_path, Environment};
pub use core::genomics::{fastq_writer, parse_attribute_from_gff};
pub use core::io::{gzip_file, read_list, write_json, Compression};
pub use core::archive::archive_subdirectories;
pub use domain::model::{FastqRecord, GffRecord};
pub use utils::error::{ExeggutorError, Result};
