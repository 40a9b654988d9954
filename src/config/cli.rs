use crate::utils::error::Result;
use crate::utils::logger::LOG_LEVELS;
use crate::utils::validation::{check_argument_choice, validate_range, Validate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "exeggutor")]
#[command(about = "Utilities for bioinformatics file handling and command execution")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file (overwritten if it exists)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Gzip a file to <file>.gz
    Gzip {
        file: PathBuf,
        /// Keep the uncompressed original
        #[arg(short, long)]
        keep: bool,
        #[arg(long, default_value = "6")]
        level: u32,
    },
    /// Zip each subdirectory of a directory into <name>.zip
    Archive {
        parent: PathBuf,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Only archive these subdirectories
        #[arg(short, long = "subdirectory")]
        subdirectories: Vec<String>,
        /// Delete each subdirectory after it has been archived
        #[arg(long)]
        remove_original: bool,
    },
    /// Locate executables on PATH
    Which {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// MD5 of a file, or of every file below a directory
    Md5 { path: PathBuf },
    /// Total size of a directory
    Du {
        directory: PathBuf,
        /// auto, b, kb, mb, gb or tb
        #[arg(long, default_value = "auto")]
        unit: String,
    },
    /// Print a directory tree
    Tree { directory: PathBuf },
    /// Run a shell command and report its resource usage
    Run {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(long)]
        stdout: Option<PathBuf>,
        #[arg(long)]
        stderr: Option<PathBuf>,
        /// Write <name>.o, <name>.e and <name>.returncode here
        #[arg(long)]
        dump: Option<PathBuf>,
        /// Input files that must exist and be non-empty
        #[arg(long = "input")]
        inputs: Vec<PathBuf>,
        /// Output files that must exist and be non-empty afterwards
        #[arg(long = "output")]
        outputs: Vec<PathBuf>,
    },
    /// Run each line of a file as a shell command, in parallel
    Parallel {
        commands: PathBuf,
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Pipe a file through pv into a command
    Pv {
        input: PathBuf,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Download a file over http, https or ftp
    Download {
        url: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print one attribute of every feature in a GFF file
    GffAttribute {
        gff: PathBuf,
        #[arg(short, long)]
        attribute: String,
    },
    /// Print the values of a list file
    ReadList { path: PathBuf },
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Some(level) = &self.log_level {
            check_argument_choice(&level.to_ascii_lowercase(), &LOG_LEVELS)?;
        }
        match &self.command {
            Commands::Gzip { level, .. } => validate_range("level", *level, 0, 9),
            Commands::Du { unit, .. } => unit.parse::<crate::utils::format::ByteUnit>().map(|_| ()),
            Commands::Parallel { jobs: Some(jobs), .. } => validate_range("jobs", *jobs, 1, 1024),
            _ => Ok(()),
        }
    }
}
