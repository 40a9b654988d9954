use crate::core::command::DEFAULT_SHELL;
use crate::core::environment::{add_executables_to_environment, Environment};
use crate::utils::error::{ExeggutorError, Result};
use crate::utils::logger::{LoggerOptions, LOG_LEVELS};
use crate::utils::validation::{check_argument_choice, validate_path, validate_positive_number, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub logging: Option<LoggingConfig>,
    pub environment: Option<EnvironmentConfig>,
    pub command: Option<CommandConfig>,
    pub download: Option<DownloadConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
    pub json: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Executables (names or paths) registered before any command runs.
    pub executables: Option<Vec<String>>,
    pub path_prepend: Option<Vec<PathBuf>>,
    pub variables: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandConfig {
    pub shell: Option<PathBuf>,
    pub sample_interval_ms: Option<u64>,
    pub jobs: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadConfig {
    pub output_dir: Option<PathBuf>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ExeggutorError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => ExeggutorError::IoError(e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ExeggutorError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unknown variables are
    /// left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ExeggutorError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(logging) = &self.logging {
            if let Some(level) = &logging.level {
                check_argument_choice(&level.to_ascii_lowercase(), &LOG_LEVELS)?;
            }
            if let Some(file) = &logging.file {
                validate_path("logging.file", &file.to_string_lossy())?;
            }
        }

        if let Some(command) = &self.command {
            if let Some(shell) = &command.shell {
                validate_path("command.shell", &shell.to_string_lossy())?;
            }
            if let Some(jobs) = command.jobs {
                validate_positive_number("command.jobs", jobs, 1)?;
            }
            if let Some(interval) = command.sample_interval_ms {
                validate_positive_number("command.sample_interval_ms", interval as usize, 1)?;
            }
        }

        if let Some(environment) = &self.environment {
            for executable in environment.executables.iter().flatten() {
                if executable.trim().is_empty() {
                    return Err(ExeggutorError::InvalidConfigValueError {
                        field: "environment.executables".to_string(),
                        value: executable.clone(),
                        reason: "Executable name cannot be empty".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn logger_options(&self) -> LoggerOptions {
        let defaults = LoggerOptions::default();
        let Some(logging) = &self.logging else {
            return defaults;
        };
        LoggerOptions {
            level: logging.level.clone().unwrap_or(defaults.level),
            file: logging.file.clone(),
            json: logging.json.unwrap_or(false),
            console: true,
        }
    }

    pub fn shell(&self) -> PathBuf {
        self.command
            .as_ref()
            .and_then(|c| c.shell.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SHELL))
    }

    pub fn jobs(&self) -> usize {
        self.command.as_ref().and_then(|c| c.jobs).unwrap_or(1)
    }

    pub fn sample_interval(&self) -> Duration {
        let millis = self
            .command
            .as_ref()
            .and_then(|c| c.sample_interval_ms)
            .unwrap_or(100);
        Duration::from_millis(millis)
    }

    pub fn download_dir(&self) -> Option<&Path> {
        self.download.as_ref().and_then(|d| d.output_dir.as_deref())
    }

    /// The current process environment with the `[environment]` section
    /// applied: extra `PATH` entries, variables, then executables.
    pub fn build_environment(&self) -> Result<Environment> {
        let mut environment = Environment::from_current();
        let Some(section) = &self.environment else {
            return Ok(environment);
        };

        for dir in section.path_prepend.iter().flatten().rev() {
            environment.prepend_path(dir)?;
        }
        for (key, value) in section.variables.iter().flatten() {
            environment.set(key, value);
        }
        if let Some(executables) = &section.executables {
            let registered = add_executables_to_environment(executables, &mut environment)?;
            tracing::info!("Registered {} executables", registered.len());
        }
        Ok(environment)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[logging]
level = "debug"
file = "logs/run.log"
json = true

[environment]
executables = ["sh"]
path_prepend = ["/opt/tools/bin"]

[environment.variables]
THREADS = "8"

[command]
shell = "/bin/sh"
sample_interval_ms = 250
jobs = 4

[download]
output_dir = "downloads"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.jobs(), 4);
        assert_eq!(config.shell(), PathBuf::from("/bin/sh"));
        assert_eq!(config.sample_interval(), Duration::from_millis(250));
        assert_eq!(config.download_dir(), Some(Path::new("downloads")));

        let logger = config.logger_options();
        assert_eq!(logger.level, "debug");
        assert!(logger.json);
        assert_eq!(logger.file, Some(PathBuf::from("logs/run.log")));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.jobs(), 1);
        assert_eq!(config.shell(), PathBuf::from(DEFAULT_SHELL));
        assert_eq!(config.logger_options().level, "info");
        assert!(config.download_dir().is_none());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("EXEGGUTOR_TEST_LOG_DIR", "/var/log/exeggutor");

        let toml_content = r#"
[logging]
file = "${EXEGGUTOR_TEST_LOG_DIR}/run.log"

[download]
output_dir = "${EXEGGUTOR_TEST_UNSET_VARIABLE}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.logger_options().file,
            Some(PathBuf::from("/var/log/exeggutor/run.log"))
        );
        assert_eq!(
            config.download_dir(),
            Some(Path::new("${EXEGGUTOR_TEST_UNSET_VARIABLE}"))
        );

        std::env::remove_var("EXEGGUTOR_TEST_LOG_DIR");
    }

    #[test]
    fn test_config_validation() {
        let config = TomlConfig::from_toml_str("[command]\njobs = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config = TomlConfig::from_toml_str("[logging]\nlevel = \"chatty\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ExeggutorError::InvalidChoice { .. })
        ));
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        assert!(matches!(
            TomlConfig::from_toml_str("[command\njobs = 2"),
            Err(ExeggutorError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[command]\njobs = 3\n").unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.jobs(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_build_environment_applies_section() {
        let config = TomlConfig::from_toml_str(
            r#"
[environment]
path_prepend = ["/opt/a", "/opt/b"]

[environment.variables]
EXEGGUTOR_THREADS = "8"
"#,
        )
        .unwrap();

        let environment = config.build_environment().unwrap();
        let search = environment.search_path();
        assert_eq!(search[0], PathBuf::from("/opt/a"));
        assert_eq!(search[1], PathBuf::from("/opt/b"));
        assert_eq!(
            environment.get("EXEGGUTOR_THREADS"),
            Some(std::ffi::OsStr::new("8"))
        );
    }
}
