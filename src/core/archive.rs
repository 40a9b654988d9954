use crate::utils::error::{ExeggutorError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

#[derive(Debug, Clone, Default)]
pub struct ArchiveOptions {
    /// Where `<name>.zip` files are written. Defaults to the parent directory.
    pub output_dir: Option<PathBuf>,
    /// Only these subdirectories; all immediate subdirectories when `None`.
    pub subdirectories: Option<Vec<String>>,
    pub remove_original: bool,
}

/// Writes one zip archive per subdirectory of `parent` and returns the
/// archive paths in subdirectory-name order.
pub fn archive_subdirectories<P: AsRef<Path>>(parent: P, options: &ArchiveOptions) -> Result<Vec<PathBuf>> {
    let parent = parent.as_ref();
    if !parent.is_dir() {
        return Err(ExeggutorError::FileNotFound {
            path: parent.to_path_buf(),
        });
    }

    let output_dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| parent.to_path_buf());

    let mut names = match &options.subdirectories {
        Some(names) => {
            for name in names {
                if !parent.join(name).is_dir() {
                    return Err(ExeggutorError::FileNotFound {
                        path: parent.join(name),
                    });
                }
            }
            names.clone()
        }
        None => list_subdirectories(parent)?,
    };
    names.sort();
    names.dedup();
    std::fs::create_dir_all(&output_dir)?;

    let mut archives = Vec::with_capacity(names.len());
    for name in names {
        let source = parent.join(&name);
        let destination = output_dir.join(format!("{}.zip", name));
        let entries = zip_directory(&source, &name, &destination)?;
        tracing::info!(
            "Archived {} ({} entries) to {}",
            source.display(),
            entries,
            destination.display()
        );

        if options.remove_original {
            std::fs::remove_dir_all(&source)?;
            tracing::debug!("Removed {}", source.display());
        }
        archives.push(destination);
    }
    Ok(archives)
}

fn list_subdirectories(parent: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(parent)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

/// Zips `source` with every entry prefixed by `prefix/`; returns the entry count.
fn zip_directory(source: &Path, prefix: &str, destination: &Path) -> Result<usize> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(destination)?));
    let options = || SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut count = 0;
    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let mut name = prefix.to_string();
        for component in relative.components() {
            name.push('/');
            name.push_str(&component.as_os_str().to_string_lossy());
        }

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{}/", name), options())?;
        } else if entry.file_type().is_file() {
            let size = entry.metadata()?.len();
            zip.start_file(name, options().large_file(size >= u32::MAX as u64))?;
            let mut reader = BufReader::new(File::open(entry.path())?);
            std::io::copy(&mut reader, &mut zip)?;
        } else {
            tracing::warn!("Skipping non-regular file {}", entry.path().display());
            continue;
        }
        count += 1;
    }

    zip.finish()?;
    Ok(count)
}
