use crate::utils::error::{ExeggutorError, Result};
use crate::utils::validation::check_argument_choice;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn init_cli_logger(verbose: bool) {
    init_cli_logger_with_targets(verbose, &[]);
}

/// Like [`init_cli_logger`], also enabling events from `targets` (for
/// example a binary's own crate name).
pub fn init_cli_logger_with_targets(verbose: bool, targets: &[&str]) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli_filter_directive(verbose, targets)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

fn cli_filter_directive(verbose: bool, targets: &[&str]) -> String {
    let level = if verbose { "debug" } else { "info" };
    std::iter::once("exeggutor")
        .chain(targets.iter().copied())
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Clone)]
pub struct LoggerOptions {
    pub level: String,
    /// Log file; an existing file with the same name is overwritten.
    pub file: Option<PathBuf>,
    pub json: bool,
    pub console: bool,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json: false,
            console: true,
        }
    }
}

impl LoggerOptions {
    pub fn filter_directive(&self) -> Result<String> {
        let level = self.level.to_ascii_lowercase();
        check_argument_choice(&level, &LOG_LEVELS)?;
        Ok(format!("exeggutor={}", level))
    }

    fn open_log_file(&self) -> Result<Option<File>> {
        let Some(path) = &self.file else {
            return Ok(None);
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Some(File::create(path)?))
    }
}

/// Installs the global subscriber described by `options`.
///
/// `RUST_LOG` takes precedence over `options.level` when set.
pub fn build_logger(options: &LoggerOptions) -> Result<()> {
    let directive = options.filter_directive()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    build_subscriber(options, filter)?
        .try_init()
        .map_err(|e| ExeggutorError::ConfigError {
            message: format!("Logger already initialised: {}", e),
        })
}

fn build_subscriber(
    options: &LoggerOptions,
    filter: EnvFilter,
) -> Result<impl tracing::Subscriber + Send + Sync + 'static> {
    let console_layer = options.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });

    let file_layer = match options.open_log_file()? {
        Some(file) if options.json => Some(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .json()
                .boxed(),
        ),
        Some(file) => Some(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .boxed(),
        ),
        None => None,
    };

    Ok(tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level_is_info() {
        let options = LoggerOptions::default();
        assert_eq!(options.filter_directive().unwrap(), "exeggutor=info");
    }

    #[test]
    fn test_invalid_level_rejected() {
        let options = LoggerOptions {
            level: "loud".to_string(),
            ..LoggerOptions::default()
        };
        assert!(matches!(
            options.filter_directive(),
            Err(ExeggutorError::InvalidChoice { .. })
        ));
    }

    #[test]
    fn test_cli_filter_directive() {
        assert_eq!(cli_filter_directive(false, &[]), "exeggutor=info");
        assert_eq!(cli_filter_directive(true, &[]), "exeggutor=debug");
        assert_eq!(
            cli_filter_directive(false, &["archive_subdirectories"]),
            "exeggutor=info,archive_subdirectories=info"
        );
    }

    fn file_options(path: &std::path::Path, json: bool) -> LoggerOptions {
        LoggerOptions {
            file: Some(path.to_path_buf()),
            json,
            console: false,
            ..LoggerOptions::default()
        }
    }

    #[test]
    fn test_file_logger_overwrites_and_filters_below_info() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "stale contents from a previous run\n").unwrap();

        let options = file_options(&path, false);
        let filter = EnvFilter::new(options.filter_directive().unwrap());
        let subscriber = build_subscriber(&options, filter).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("trimming sample S1");
            tracing::debug!("adapter table loaded");
        });

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("stale contents"));
        assert!(text.contains("INFO"));
        assert!(text.contains("trimming sample S1"));
        assert!(!text.contains("adapter table loaded"));
    }

    #[test]
    fn test_json_file_logger_writes_one_object_per_event() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("run.jsonl");

        let options = file_options(&path, true);
        let filter = EnvFilter::new(options.filter_directive().unwrap());
        let subscriber = build_subscriber(&options, filter).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("disk almost full");
        });

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        let event: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(event["level"], "WARN");
        assert_eq!(event["fields"]["message"], "disk almost full");
    }

    #[test]
    fn test_log_file_is_truncated() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("run.log");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "stale contents from a previous run\n").unwrap();

        let options = LoggerOptions {
            file: Some(path.clone()),
            ..LoggerOptions::default()
        };
        let file = options.open_log_file().unwrap();
        assert!(file.is_some());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }
}
