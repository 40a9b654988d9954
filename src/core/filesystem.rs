use crate::utils::error::{ExeggutorError, Result};
use crate::utils::format::{format_bytes, ByteUnit};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const MD5_BLOCK_SIZE: usize = 64 * 1024;

pub fn get_file_size<P: AsRef<Path>>(path: P) -> Result<u64> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ExeggutorError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => ExeggutorError::IoError(e),
    })?;
    Ok(metadata.len())
}

pub fn get_file_size_formatted<P: AsRef<Path>>(path: P) -> Result<String> {
    Ok(format_bytes(get_file_size(path)?, ByteUnit::Auto))
}

/// Ensures `path` exists and, unless `empty_ok`, holds at least
/// `minimum_filesize` bytes. Gzipped files are measured compressed.
pub fn check_file<P: AsRef<Path>>(path: P, empty_ok: bool, minimum_filesize: u64) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ExeggutorError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    if !empty_ok {
        let size = get_file_size(path)?;
        if size < minimum_filesize {
            return Err(ExeggutorError::EmptyFile {
                path: path.to_path_buf(),
                size,
                minimum: minimum_filesize,
            });
        }
    }
    Ok(())
}

pub fn md5_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ExeggutorError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => ExeggutorError::IoError(e),
    })?;

    let mut context = md5::Context::new();
    let mut block = vec![0u8; MD5_BLOCK_SIZE];
    loop {
        let n = file.read(&mut block)?;
        if n == 0 {
            break;
        }
        context.consume(&block[..n]);
    }
    Ok(format!("{:x}", context.compute()))
}

/// MD5 of every regular file below `directory`, keyed by path.
pub fn md5_directory<P: AsRef<Path>>(directory: P) -> Result<BTreeMap<PathBuf, String>> {
    let mut hashes = BTreeMap::new();
    for entry in WalkDir::new(directory.as_ref()).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            let hash = md5_file(entry.path())?;
            hashes.insert(entry.into_path(), hash);
        }
    }
    Ok(hashes)
}

/// Total size of the files below `directory`. Hard-linked files count once;
/// entries that cannot be read are skipped.
pub fn directory_size<P: AsRef<Path>>(directory: P) -> u64 {
    let mut seen: HashSet<(u64, u64)> = HashSet::new();
    let mut total = 0;

    for entry in WalkDir::new(directory.as_ref())
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            tracing::debug!("Skipping unreadable entry {}", entry.path().display());
            continue;
        };
        if let Some(key) = inode_key(&metadata) {
            if !seen.insert(key) {
                continue;
            }
        }
        total += metadata.len();
    }
    total
}

#[cfg(unix)]
fn inode_key(metadata: &std::fs::Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn inode_key(_metadata: &std::fs::Metadata) -> Option<(u64, u64)> {
    None
}

const FILENAME_PREFIX: &str = "|__";
const PARENT_PREFIX_LAST: &str = "    ";
const PARENT_PREFIX_MIDDLE: &str = "|   ";

fn display_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    if path.is_dir() {
        format!("{}/", name)
    } else {
        name
    }
}

/// Renders the directory below `root` as an ASCII tree, one entry per line.
pub fn directory_tree<P: AsRef<Path>>(root: P) -> Result<String> {
    let root = root.as_ref();
    if !root.exists() {
        return Err(ExeggutorError::FileNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut lines = vec![display_name(root)];
    if root.is_dir() {
        let mut ancestors_last = Vec::new();
        render_children(root, &mut ancestors_last, &mut lines)?;
    }
    Ok(lines.join("\n"))
}

fn render_children(dir: &Path, ancestors_last: &mut Vec<bool>, lines: &mut Vec<String>) -> Result<()> {
    let mut children: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    children.sort_by_key(|p| p.to_string_lossy().to_lowercase());

    let count = children.len();
    for (i, child) in children.iter().enumerate() {
        let is_last = i + 1 == count;

        let mut line: String = ancestors_last
            .iter()
            .map(|&last| if last { PARENT_PREFIX_LAST } else { PARENT_PREFIX_MIDDLE })
            .collect();
        line.push_str(FILENAME_PREFIX);
        line.push(' ');
        line.push_str(&display_name(child));
        lines.push(line);

        if child.is_dir() {
            ancestors_last.push(is_last);
            render_children(child, ancestors_last, lines)?;
            ancestors_last.pop();
        }
    }
    Ok(())
}
