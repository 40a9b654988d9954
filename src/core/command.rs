//! Shell command execution with resource accounting.
//!
//! A [`ShellCommand`] runs through `<shell> -c`. While it runs, the resident
//! memory of the shell and every process it spawns is sampled, so pipelines
//! and backgrounded jobs are included in the peak.

use crate::core::environment::{get_executable_in_path, Environment};
use crate::core::filesystem::{check_file, get_file_size_formatted};
use crate::domain::ports::Task;
use crate::utils::error::{ExeggutorError, Result};
use crate::utils::format::{format_bytes, format_duration, format_header, ByteUnit};
use crate::utils::monitor::{MemoryMonitor, DEFAULT_SAMPLE_INTERVAL};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Where a child's output stream goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    Capture,
    File(PathBuf),
    Inherit,
    Null,
}

impl Redirect {
    fn to_stdio(&self) -> Result<Stdio> {
        Ok(match self {
            Redirect::Capture => Stdio::piped(),
            Redirect::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Stdio::from(std::fs::File::create(path)?)
            }
            Redirect::Inherit => Stdio::inherit(),
            Redirect::Null => Stdio::null(),
        })
    }

    fn path(&self) -> Option<PathBuf> {
        match self {
            Redirect::File(path) => Some(path.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShellCommand {
    command: String,
    name: Option<String>,
    shell: PathBuf,
    validate_inputs: Vec<PathBuf>,
    validate_outputs: Vec<PathBuf>,
    environment: Option<Environment>,
    working_dir: Option<PathBuf>,
    sample_interval: Duration,
}

impl ShellCommand {
    /// Joins the non-empty `parts` with single spaces.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let command = parts
            .into_iter()
            .filter(|p| !p.as_ref().is_empty())
            .map(|p| p.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            command,
            name: None,
            shell: PathBuf::from(DEFAULT_SHELL),
            validate_inputs: Vec::new(),
            validate_outputs: Vec::new(),
            environment: None,
            working_dir: None,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }

    /// Streams `input` through `pv` into `command`, so a progress bar is
    /// drawn on stderr. The pipeline fails if either side fails.
    pub fn with_progress(input: impl AsRef<Path>, command: &str) -> Result<Self> {
        let pv = get_executable_in_path("pv")?;
        Ok(Self::wrap_with_progress(&pv, input.as_ref(), command))
    }

    /// [`ShellCommand::with_progress`] with `pv` looked up on the `PATH` of
    /// `environment`, which the command also runs with.
    pub fn with_progress_in(
        environment: &Environment,
        input: impl AsRef<Path>,
        command: &str,
    ) -> Result<Self> {
        let pv = environment
            .find_executable("pv")
            .ok_or_else(|| ExeggutorError::ExecutableNotFound {
                name: "pv".to_string(),
            })?;
        Ok(Self::wrap_with_progress(&pv, input.as_ref(), command).with_environment(environment.clone()))
    }

    pub fn wrap_with_progress(pv: &Path, input: &Path, command: &str) -> Self {
        Self::new([
            "set -o pipefail;".to_string(),
            shell_quote(&pv.to_string_lossy()),
            shell_quote(&input.to_string_lossy()),
            "|".to_string(),
            command.to_string(),
        ])
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_inputs<I: IntoIterator<Item = P>, P: Into<PathBuf>>(mut self, paths: I) -> Self {
        self.validate_inputs.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_outputs<I: IntoIterator<Item = P>, P: Into<PathBuf>>(mut self, paths: I) -> Self {
        self.validate_outputs.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn shell(&self) -> &Path {
        &self.shell
    }

    pub async fn run(&self, stdout: Redirect, stderr: Redirect) -> Result<CommandOutcome> {
        for path in &self.validate_inputs {
            check_file(path, false, 1)?;
        }

        let started = Instant::now();
        let mut command = tokio::process::Command::new(&self.shell);
        command
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(stdout.to_stdio()?)
            .stderr(stderr.to_stdio()?)
            .kill_on_drop(true);
        if let Some(environment) = &self.environment {
            command.env_clear().envs(environment.vars());
        }
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        tracing::debug!("({})$ {}", self.shell.display(), self.command);
        let mut child = command.spawn()?;

        let stdout_task = child.stdout.take().map(|pipe| tokio::spawn(read_pipe(pipe)));
        let stderr_task = child.stderr.take().map(|pipe| tokio::spawn(read_pipe(pipe)));

        let mut monitor = child.id().map(MemoryMonitor::new);
        let mut ticker = tokio::time::interval(self.sample_interval);
        let status = {
            let wait = child.wait();
            tokio::pin!(wait);
            loop {
                tokio::select! {
                    status = &mut wait => break status,
                    _ = ticker.tick() => {
                        if let Some(monitor) = monitor.as_mut() {
                            monitor.sample();
                        }
                    }
                }
            }
        }?;

        let label = self.label();
        let captured_stdout = collect_pipe(stdout_task, &label).await?;
        let captured_stderr = collect_pipe(stderr_task, &label).await?;
        let duration = started.elapsed();

        let outcome = CommandOutcome {
            name: self.name.clone(),
            command: self.command.clone(),
            shell: self.shell.clone(),
            stdout: captured_stdout,
            stderr: captured_stderr,
            stdout_path: stdout.path(),
            stderr_path: stderr.path(),
            returncode: exit_code(&status),
            peak_memory: monitor.map(|m| m.peak_bytes()).unwrap_or(0),
            duration,
            validate_outputs: self.validate_outputs.clone(),
        };
        tracing::debug!(
            "{} exited with {} after {}",
            label,
            outcome.returncode,
            format_duration(outcome.duration)
        );
        Ok(outcome)
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", report_header(self.name.as_deref(), &self.shell, &self.command))
    }
}

#[async_trait]
impl Task for ShellCommand {
    type Output = CommandOutcome;

    fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.command.clone())
    }

    async fn execute(&self) -> Result<CommandOutcome> {
        self.run(Redirect::Capture, Redirect::Capture).await
    }
}

/// Single-quotes `value` for a POSIX shell unless it is plainly safe.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+=:,@%".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(mut pipe: R) -> std::io::Result<String> {
    let mut buffer = Vec::new();
    pipe.read_to_end(&mut buffer).await?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

async fn collect_pipe(
    task: Option<JoinHandle<std::io::Result<String>>>,
    label: &str,
) -> Result<Option<String>> {
    let Some(task) = task else {
        return Ok(None);
    };
    let text = task.await.map_err(|e| ExeggutorError::TaskFailed {
        label: label.to_string(),
        message: format!("output reader failed: {}", e),
    })??;
    Ok(Some(text))
}

#[cfg(unix)]
fn exit_code(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn report_header(name: Option<&str>, shell: &Path, command: &str) -> String {
    let name_text = format!("ShellCommand(name:{})", name.unwrap_or("unnamed"));
    let command_text = format!("({})$ {}", shell.display(), command);
    let n = name_text.chars().count().max(command_text.chars().count());
    let command_block = format_header(&command_text, '_', Some(n));
    let command_lines: Vec<&str> = command_block.lines().skip(1).collect();
    format!(
        "{}\n{}",
        format_header(&name_text, '=', Some(n)),
        command_lines.join("\n")
    )
}

/// The result of one [`ShellCommand::run`].
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub name: Option<String>,
    pub command: String,
    pub shell: PathBuf,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub stdout_path: Option<PathBuf>,
    pub stderr_path: Option<PathBuf>,
    pub returncode: i32,
    /// Peak resident memory of the process tree, in bytes.
    pub peak_memory: u64,
    pub duration: Duration,
    pub validate_outputs: Vec<PathBuf>,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.returncode == 0
    }

    fn stderr_text(&self) -> String {
        match (&self.stderr, &self.stderr_path) {
            (Some(text), _) => text.clone(),
            (None, Some(path)) => std::fs::read(path)
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default(),
            (None, None) => String::new(),
        }
    }

    /// Fails with `CommandFailed` on a non-zero exit; otherwise checks that
    /// every declared output file exists and is non-empty.
    pub fn check_status(&self) -> Result<()> {
        if !self.success() {
            return Err(ExeggutorError::CommandFailed {
                command: self.command.clone(),
                returncode: self.returncode,
                stderr: self.stderr_text(),
            });
        }
        for path in &self.validate_outputs {
            check_file(path, false, 1)?;
        }
        tracing::info!("Command Successful: {}", self.command);
        Ok(())
    }

    /// Writes `<name>.o`, `<name>.e` and `<name>.returncode` into `directory`.
    pub fn dump<P: AsRef<Path>>(&self, directory: P) -> Result<Vec<PathBuf>> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory)?;
        let name = self.name.as_deref().unwrap_or("command");

        let files = [
            (format!("{}.o", name), self.stdout.clone().unwrap_or_default()),
            (format!("{}.e", name), self.stderr.clone().unwrap_or_default()),
            (format!("{}.returncode", name), self.returncode.to_string()),
        ];
        let mut written = Vec::with_capacity(files.len());
        for (file_name, content) in files {
            let path = directory.join(file_name);
            std::fs::write(&path, format!("{}\n", content))?;
            written.push(path);
        }
        Ok(written)
    }

    fn stream_line(label: &str, captured: &Option<String>, path: &Option<PathBuf>) -> String {
        match (path, captured) {
            (Some(path), _) => format!(
                "- {}({}): {}",
                label,
                path.display(),
                get_file_size_formatted(path).unwrap_or_else(|_| "unavailable".to_string())
            ),
            (None, Some(text)) => format!(
                "- {}: {}",
                label,
                format_bytes(text.len() as u64, ByteUnit::Auto)
            ),
            (None, None) => format!("- {}: not captured", label),
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pad = "    ";
        writeln!(
            f,
            "{}",
            report_header(self.name.as_deref(), &self.shell, &self.command)
        )?;
        writeln!(f, "Properties:")?;
        writeln!(f, "{}{}", pad, Self::stream_line("stdout", &self.stdout, &self.stdout_path))?;
        writeln!(f, "{}{}", pad, Self::stream_line("stderr", &self.stderr, &self.stderr_path))?;
        writeln!(f, "{}- returncode: {}", pad, self.returncode)?;
        writeln!(
            f,
            "{}- peak memory: {}",
            pad,
            format_bytes(self.peak_memory, ByteUnit::Auto)
        )?;
        write!(f, "{}- duration: {}", pad, format_duration(self.duration))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(parts: &[&str]) -> ShellCommand {
        ShellCommand::new(parts.iter().copied()).with_shell("/bin/sh")
    }

    #[test]
    fn test_new_joins_non_empty_parts() {
        let cmd = ShellCommand::new(["echo", "", "hello", "world"]);
        assert_eq!(cmd.command(), "echo hello world");
        assert_eq!(cmd.shell(), Path::new(DEFAULT_SHELL));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/data/reads.fq.gz"), "/data/reads.fq.gz");
        assert_eq!(shell_quote("my reads.fq"), "'my reads.fq'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_wrap_with_progress() {
        let cmd = ShellCommand::wrap_with_progress(
            Path::new("/usr/bin/pv"),
            Path::new("/data/in put.fa"),
            "gzip -c > out.gz",
        );
        assert_eq!(
            cmd.command(),
            "set -o pipefail; /usr/bin/pv '/data/in put.fa' | gzip -c > out.gz"
        );
    }

    #[tokio::test]
    async fn test_run_captures_streams_and_code() {
        let outcome = sh(&["echo out; echo err >&2; exit 3"])
            .with_name("demo")
            .run(Redirect::Capture, Redirect::Capture)
            .await
            .unwrap();

        assert_eq!(outcome.stdout.as_deref(), Some("out\n"));
        assert_eq!(outcome.stderr.as_deref(), Some("err\n"));
        assert_eq!(outcome.returncode, 3);
        assert!(!outcome.success());

        match outcome.check_status() {
            Err(ExeggutorError::CommandFailed { returncode, stderr, .. }) => {
                assert_eq!(returncode, 3);
                assert_eq!(stderr, "err\n");
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_input_fails_before_running() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("ran");
        let result = sh(&["touch", marker.to_str().unwrap()])
            .with_inputs([dir.path().join("missing.fq")])
            .run(Redirect::Null, Redirect::Null)
            .await;
        assert!(matches!(result, Err(ExeggutorError::FileNotFound { .. })));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_check_status_validates_outputs_not_inputs() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        std::fs::write(&input, "data").unwrap();

        let outcome = sh(&["true"])
            .with_inputs([&input])
            .with_outputs([&output])
            .run(Redirect::Null, Redirect::Null)
            .await
            .unwrap();
        assert!(matches!(
            outcome.check_status(),
            Err(ExeggutorError::FileNotFound { .. })
        ));

        let outcome = sh(&["cp", input.to_str().unwrap(), output.to_str().unwrap()])
            .with_inputs([&input])
            .with_outputs([&output])
            .run(Redirect::Null, Redirect::Null)
            .await
            .unwrap();
        assert!(outcome.check_status().is_ok());
    }

    #[tokio::test]
    async fn test_redirect_to_file_and_report() {
        let dir = TempDir::new().unwrap();
        let stdout_path = dir.path().join("logs").join("job.o");

        let outcome = sh(&["printf", "abc"])
            .with_name("job")
            .run(Redirect::File(stdout_path.clone()), Redirect::Capture)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&stdout_path).unwrap(), "abc");
        assert!(outcome.stdout.is_none());

        let report = outcome.to_string();
        assert!(report.starts_with("="));
        assert!(report.contains("ShellCommand(name:job)"));
        assert!(report.contains("(/bin/sh)$ printf abc"));
        assert!(report.contains(&format!("- stdout({}): 3.00 B", stdout_path.display())));
        assert!(report.contains("- returncode: 0"));
        assert!(report.contains("- duration: 00:00:00"));
    }

    #[tokio::test]
    async fn test_environment_is_passed_to_child() {
        let mut environment = Environment::from_current();
        environment.set("EXEGGUTOR_SAMPLE", "S42");
        let outcome = sh(&["printf", "$EXEGGUTOR_SAMPLE"])
            .with_environment(environment)
            .run(Redirect::Capture, Redirect::Null)
            .await
            .unwrap();
        assert_eq!(outcome.stdout.as_deref(), Some("S42"));
    }

    #[tokio::test]
    async fn test_dump_writes_three_files() {
        let dir = TempDir::new().unwrap();
        let outcome = sh(&["echo hi"])
            .with_name("greet")
            .run(Redirect::Capture, Redirect::Capture)
            .await
            .unwrap();

        let files = outcome.dump(dir.path()).unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("greet.o")).unwrap(),
            "hi\n\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("greet.returncode")).unwrap(),
            "0\n"
        );
    }

    #[cfg(feature = "cli")]
    #[tokio::test]
    async fn test_peak_memory_is_sampled() {
        let outcome = sh(&["sleep 0.3"])
            .with_sample_interval(Duration::from_millis(20))
            .run(Redirect::Null, Redirect::Null)
            .await
            .unwrap();
        assert!(outcome.peak_memory > 0);
        assert!(outcome.duration >= Duration::from_millis(300));
    }
}
