use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExeggutorError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Tabular parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Directory traversal error: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("File is too small: {} ({size} bytes, minimum {minimum})", path.display())]
    EmptyFile {
        path: PathBuf,
        size: u64,
        minimum: u64,
    },

    #[error("File is already gzip-compressed: {}", path.display())]
    AlreadyCompressed { path: PathBuf },

    #[error("Unsupported compression type: {name}")]
    UnsupportedCompression { name: String },

    #[error("Executable not found in PATH: {name}")]
    ExecutableNotFound { name: String },

    #[error("Command failed: {command}\nreturn code: {returncode}\nstderr:\n{stderr}")]
    CommandFailed {
        command: String,
        returncode: i32,
        stderr: String,
    },

    #[error("Task '{label}' did not complete: {message}")]
    TaskFailed { label: String, message: String },

    #[error("Malformed record at {location}: {reason}")]
    MalformedRecord { location: String, reason: String },

    #[error("Invalid option '{query}'. Allowed choices are: {}", choices.join(", "))]
    InvalidChoice { query: String, choices: Vec<String> },

    #[error("Download of {url} failed with status {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Input,
    Execution,
    Network,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ExeggutorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::IoError(_) | Self::WalkError(_) | Self::ZipError(_) => ErrorCategory::Io,
            Self::FileNotFound { .. }
            | Self::EmptyFile { .. }
            | Self::AlreadyCompressed { .. }
            | Self::UnsupportedCompression { .. }
            | Self::MalformedRecord { .. }
            | Self::CsvError(_)
            | Self::SerializationError(_) => ErrorCategory::Input,
            Self::ExecutableNotFound { .. }
            | Self::CommandFailed { .. }
            | Self::TaskFailed { .. } => ErrorCategory::Execution,
            Self::HttpError(_) | Self::DownloadFailed { .. } => ErrorCategory::Network,
            Self::InvalidChoice { .. }
            | Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::AlreadyCompressed { .. } => ErrorSeverity::Low,
            Self::HttpError(_) | Self::DownloadFailed { .. } | Self::TaskFailed { .. } => {
                ErrorSeverity::Medium
            }
            Self::IoError(_) | Self::WalkError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } => "Check that the path exists and is spelled correctly",
            Self::EmptyFile { .. } => "The file exists but is empty; re-run the step that produces it",
            Self::AlreadyCompressed { .. } => "Nothing to do; the file is already compressed",
            Self::UnsupportedCompression { .. } => "Use 'auto', 'none' or 'gzip'",
            Self::ExecutableNotFound { .. } => {
                "Install the program or add its directory to PATH (see [environment] in the config)"
            }
            Self::CommandFailed { .. } => "Inspect the command's stderr above for the cause",
            Self::TaskFailed { .. } => "Re-run with --verbose to see which task failed",
            Self::MalformedRecord { .. } => "Check the input file format at the reported location",
            Self::InvalidChoice { .. } => "Pick one of the listed choices",
            Self::HttpError(_) | Self::DownloadFailed { .. } => {
                "Check the URL and your network connection, then retry"
            }
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. } => "Fix the configuration file and try again",
            Self::IoError(_) | Self::WalkError(_) => "Check file permissions and free disk space",
            Self::ZipError(_) => "Check that the archive destination is writable",
            Self::CsvError(_) | Self::SerializationError(_) => {
                "Check that the input file is well-formed"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Io => format!("File system problem: {}", self),
            ErrorCategory::Input => format!("Problem with input data: {}", self),
            ErrorCategory::Execution => format!("Execution problem: {}", self),
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExeggutorError>;
