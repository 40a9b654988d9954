use crate::utils::error::{ExeggutorError, Result};
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

const PATH_VAR: &str = "PATH";

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Searches `search_path` (a `PATH`-style list) for `name`. Names that
/// contain a path separator are checked as given.
pub fn find_executable_in(name: &str, search_path: &OsStr) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    std::env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|path| is_executable(path))
}

pub fn get_executable_in_path(name: &str) -> Result<PathBuf> {
    let search_path = std::env::var_os(PATH_VAR).unwrap_or_default();
    find_executable_in(name, &search_path).ok_or_else(|| ExeggutorError::ExecutableNotFound {
        name: name.to_string(),
    })
}

/// `samtools` -> `SAMTOOLS`, `bbduk.sh` -> `BBDUK_SH`.
pub fn executable_variable_name(executable: &str) -> String {
    executable
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// An owned snapshot of environment variables handed to child processes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<OsString, OsString>,
}

impl Environment {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_current() -> Self {
        Self {
            vars: std::env::vars_os().collect(),
        }
    }

    pub fn set(&mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> &mut Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.vars.get(key.as_ref()).map(OsString::as_os_str)
    }

    pub fn vars(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    pub fn search_path(&self) -> Vec<PathBuf> {
        self.get(PATH_VAR)
            .map(|p| std::env::split_paths(p).collect())
            .unwrap_or_default()
    }

    /// Puts `dir` at the front of `PATH`, dropping any later copy of it.
    pub fn prepend_path(&mut self, dir: impl AsRef<Path>) -> Result<&mut Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut entries: Vec<PathBuf> = self
            .search_path()
            .into_iter()
            .filter(|entry| *entry != dir)
            .collect();
        entries.insert(0, dir);

        let joined = std::env::join_paths(entries).map_err(|e| ExeggutorError::InvalidConfigValueError {
            field: PATH_VAR.to_string(),
            value: dir_display(&self.search_path()),
            reason: e.to_string(),
        })?;
        self.vars.insert(PATH_VAR.into(), joined);
        Ok(self)
    }

    pub fn find_executable(&self, name: &str) -> Option<PathBuf> {
        let search_path = self.get(PATH_VAR).map(OsStr::to_os_string).unwrap_or_default();
        find_executable_in(name, &search_path)
    }
}

fn dir_display(entries: &[PathBuf]) -> String {
    entries
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(":")
}

/// Registers each executable (a bare name or a path) in `environment`: its
/// directory goes to the front of `PATH` and `<NAME>` is set to its absolute
/// path. Returns the variable -> path mapping.
pub fn add_executables_to_environment<S: AsRef<str>>(
    executables: &[S],
    environment: &mut Environment,
) -> Result<BTreeMap<String, PathBuf>> {
    let mut registered = BTreeMap::new();
    for executable in executables {
        let executable = executable.as_ref();
        let found = environment
            .find_executable(executable)
            .ok_or_else(|| ExeggutorError::ExecutableNotFound {
                name: executable.to_string(),
            })?;
        let absolute = if found.is_absolute() {
            found
        } else {
            std::env::current_dir()?.join(found)
        };

        let file_name = absolute
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| executable.to_string());
        let variable = executable_variable_name(&file_name);

        if let Some(dir) = absolute.parent() {
            environment.prepend_path(dir)?;
        }
        environment.set(variable.clone(), absolute.as_os_str());
        tracing::debug!("Registered {} as ${}", absolute.display(), variable);
        registered.insert(variable, absolute);
    }
    Ok(registered)
}
