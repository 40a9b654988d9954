pub mod archive;
pub mod command;
pub mod environment;
pub mod fetch;
pub mod filesystem;
pub mod genomics;
pub mod io;
pub mod parallel;

pub use crate::domain::model::{FastqRecord, GffRecord};
pub use crate::domain::ports::Task;
pub use crate::utils::error::Result;
