//! Compressed file I/O, JSON, list files and gzip.
//!
//! Gzip is chosen from the `.gz` extension unless a [`Compression`] is given
//! explicitly. Readers use a multi-member decoder so concatenated gzip files
//! (as produced by `cat a.gz b.gz`) read back completely.

use crate::utils::error::{ExeggutorError, Result};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_JSON_INDENT: usize = 4;
pub const DEFAULT_GZIP_LEVEL: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    Auto,
    Uncompressed,
    Gzip,
}

impl Compression {
    /// Resolves `Auto` against the file extension. A `.bz2` file is
    /// refused rather than read as plain bytes.
    pub fn resolve(self, path: &Path) -> Result<Self> {
        match self {
            Self::Auto if has_gzip_extension(path) => Ok(Self::Gzip),
            Self::Auto if has_extension(path, "bz2") => Err(ExeggutorError::UnsupportedCompression {
                name: "bz2".to_string(),
            }),
            Self::Auto => Ok(Self::Uncompressed),
            explicit => Ok(explicit),
        }
    }
}

impl FromStr for Compression {
    type Err = ExeggutorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "none" | "uncompressed" => Ok(Self::Uncompressed),
            "gzip" | "gz" => Ok(Self::Gzip),
            other => Err(ExeggutorError::UnsupportedCompression {
                name: other.to_string(),
            }),
        }
    }
}

pub fn has_gzip_extension(path: &Path) -> bool {
    has_extension(path, "gz")
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

pub fn open_file_reader<P: AsRef<Path>>(path: P, compression: Compression) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let compression = compression.resolve(path)?;
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ExeggutorError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => ExeggutorError::IoError(e),
    })?;

    let reader: Box<dyn BufRead> = match compression {
        Compression::Gzip => Box::new(BufReader::with_capacity(
            256 * 1024,
            MultiGzDecoder::new(file),
        )),
        _ => Box::new(BufReader::with_capacity(256 * 1024, file)),
    };
    Ok(reader)
}

/// A file sink that may gzip its contents. Call [`FileWriter::finish`] to
/// flush buffers and write the gzip trailer; dropping it silently discards
/// any trailer error.
pub enum FileWriter {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl FileWriter {
    pub fn finish(self) -> Result<()> {
        match self {
            FileWriter::Plain(mut writer) => writer.flush()?,
            FileWriter::Gzip(encoder) => {
                let mut inner = encoder.finish()?;
                inner.flush()?;
            }
        }
        Ok(())
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            FileWriter::Plain(writer) => writer.write(buf),
            FileWriter::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            FileWriter::Plain(writer) => writer.flush(),
            FileWriter::Gzip(encoder) => encoder.flush(),
        }
    }
}

pub fn open_file_writer<P: AsRef<Path>>(path: P, compression: Compression) -> Result<FileWriter> {
    let path = path.as_ref();
    let compression = compression.resolve(path)?;
    let file = BufWriter::new(File::create(path)?);
    Ok(match compression {
        Compression::Gzip => FileWriter::Gzip(GzEncoder::new(
            file,
            flate2::Compression::new(DEFAULT_GZIP_LEVEL),
        )),
        _ => FileWriter::Plain(file),
    })
}

pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let reader = open_file_reader(path, Compression::Auto)?;
    Ok(serde_json::from_reader(reader)?)
}

/// Writes `value` as JSON, pretty-printed with `indent` spaces, or compact
/// when `indent` is `None`.
pub fn write_json<T: Serialize + ?Sized, P: AsRef<Path>>(
    value: &T,
    path: P,
    indent: Option<usize>,
) -> Result<()> {
    let mut writer = open_file_writer(path, Compression::Auto)?;
    match indent {
        Some(width) => {
            let spaces = vec![b' '; width];
            let formatter = serde_json::ser::PrettyFormatter::with_indent(&spaces);
            let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
            value.serialize(&mut serializer)?;
        }
        None => serde_json::to_writer(&mut writer, value)?,
    }
    writer.write_all(b"\n")?;
    writer.finish()
}

/// Reads one value per line, skipping blank lines and `#` comments.
pub fn read_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let reader = open_file_reader(path, Compression::Auto)?;
    let mut values = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let value = line.trim_end();
        if value.trim_start().is_empty() || value.starts_with('#') {
            continue;
        }
        values.push(value.to_string());
    }
    Ok(values)
}

#[derive(Debug, Clone, Copy)]
pub struct GzipOptions {
    pub keep_original: bool,
    pub level: u32,
}

impl Default for GzipOptions {
    fn default() -> Self {
        Self {
            keep_original: false,
            level: DEFAULT_GZIP_LEVEL,
        }
    }
}

/// Compresses `path` to `<path>.gz` and returns the new path.
pub fn gzip_file<P: AsRef<Path>>(path: P, options: GzipOptions) -> Result<PathBuf> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ExeggutorError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    if has_gzip_extension(path) {
        return Err(ExeggutorError::AlreadyCompressed {
            path: path.to_path_buf(),
        });
    }

    let mut output = path.as_os_str().to_owned();
    output.push(".gz");
    let output = PathBuf::from(output);

    let mut input = BufReader::new(File::open(path)?);
    let mut encoder = GzEncoder::new(
        BufWriter::new(File::create(&output)?),
        flate2::Compression::new(options.level.min(9)),
    );
    let copied = std::io::copy(&mut input, &mut encoder)?;
    encoder.finish()?.flush()?;

    tracing::debug!(
        "Compressed {} ({} bytes) to {}",
        path.display(),
        copied,
        output.display()
    );

    if !options.keep_original {
        std::fs::remove_file(path)?;
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_compression_resolution() {
        assert_eq!(
            Compression::Auto.resolve(Path::new("reads.fastq.GZ")).unwrap(),
            Compression::Gzip
        );
        assert_eq!(
            Compression::Auto.resolve(Path::new("reads.fastq")).unwrap(),
            Compression::Uncompressed
        );
        assert_eq!(
            Compression::Uncompressed.resolve(Path::new("reads.fastq.gz")).unwrap(),
            Compression::Uncompressed
        );
        assert!(matches!(
            Compression::Auto.resolve(Path::new("ids.txt.BZ2")),
            Err(ExeggutorError::UnsupportedCompression { .. })
        ));
    }

    #[test]
    fn test_bz2_is_rejected() {
        assert!(matches!(
            "bz2".parse::<Compression>(),
            Err(ExeggutorError::UnsupportedCompression { .. })
        ));
        assert_eq!("gzip".parse::<Compression>().unwrap(), Compression::Gzip);
    }

    #[test]
    fn test_gzip_writer_produces_readable_gzip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.tsv.gz");

        let mut writer = open_file_writer(&path, Compression::Auto).unwrap();
        writeln!(writer, "gene\tcount").unwrap();
        writeln!(writer, "dnaA\t12").unwrap();
        writer.finish().unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);

        let mut text = String::new();
        open_file_reader(&path, Compression::Auto)
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "gene\tcount\ndnaA\t12\n");
    }

    #[test]
    fn test_bz2_file_is_refused_by_readers_and_writers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ids.txt.bz2");
        // bzip2 magic followed by junk
        std::fs::write(&path, b"BZh91AY&SY\x00\xff\x10").unwrap();

        assert!(matches!(
            read_list(&path),
            Err(ExeggutorError::UnsupportedCompression { .. })
        ));
        assert!(matches!(
            open_file_writer(dir.path().join("out.tsv.bz2"), Compression::Auto),
            Err(ExeggutorError::UnsupportedCompression { .. })
        ));
        assert!(!dir.path().join("out.tsv.bz2").exists());
    }

    #[test]
    fn test_missing_file_is_file_not_found() {
        let result = open_file_reader("/definitely/not/here.txt", Compression::Auto);
        assert!(matches!(result, Err(ExeggutorError::FileNotFound { .. })));
    }

    #[test]
    fn test_write_json_uses_indent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.json");
        let value = serde_json::json!({"sample": "S1"});

        write_json(&value, &path, Some(DEFAULT_JSON_INDENT)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n    \"sample\": \"S1\"\n}\n");

        write_json(&value, &path, None).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\"sample\":\"S1\"}\n");
    }

    #[test]
    fn test_read_list_skips_blank_and_comment_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ids.txt");
        std::fs::write(&path, "# sample ids\nS1\n\nS2  \n   \nS3\n").unwrap();

        assert_eq!(read_list(&path).unwrap(), vec!["S1", "S2", "S3"]);
    }

    #[test]
    fn test_gzip_file_replaces_original() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reads.fastq");
        std::fs::write(&path, "@r1\nACGT\n+\nIIII\n").unwrap();

        let output = gzip_file(&path, GzipOptions::default()).unwrap();
        assert_eq!(output, dir.path().join("reads.fastq.gz"));
        assert!(!path.exists());

        let mut decoded = String::new();
        MultiGzDecoder::new(File::open(&output).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "@r1\nACGT\n+\nIIII\n");
    }

    #[test]
    fn test_gzip_file_keep_original_and_refuse_gz() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let options = GzipOptions {
            keep_original: true,
            ..GzipOptions::default()
        };
        let output = gzip_file(&path, options).unwrap();
        assert!(path.exists());
        assert!(matches!(
            gzip_file(&output, options),
            Err(ExeggutorError::AlreadyCompressed { .. })
        ));
    }
}
