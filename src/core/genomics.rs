//! FASTQ/FASTA writers and GFF parsing.

use crate::core::io::{open_file_reader, Compression};
use crate::domain::model::{FastqRecord, GffRecord};
use crate::utils::error::{ExeggutorError, Result};
use std::io::Write;
use std::path::Path;

pub const DEFAULT_FASTA_WRAP: usize = 1000;

pub fn fastq_writer<W: Write + ?Sized>(record: &FastqRecord, writer: &mut W) -> Result<()> {
    if record.id.is_empty() {
        return Err(ExeggutorError::MalformedRecord {
            location: "FASTQ record".to_string(),
            reason: "empty identifier".to_string(),
        });
    }
    if record.sequence.len() != record.quality.len() {
        return Err(ExeggutorError::MalformedRecord {
            location: format!("FASTQ record @{}", record.id),
            reason: format!(
                "sequence length {} does not match quality length {}",
                record.sequence.len(),
                record.quality.len()
            ),
        });
    }
    write!(
        writer,
        "@{}\n{}\n+\n{}\n",
        record.id, record.sequence, record.quality
    )?;
    Ok(())
}

/// Writes a FASTA entry, wrapping the sequence every `wrap` characters.
/// `None` or `Some(0)` keeps the sequence on one line.
pub fn fasta_writer<W: Write + ?Sized>(
    header: &str,
    sequence: &str,
    writer: &mut W,
    wrap: Option<usize>,
) -> Result<()> {
    writeln!(writer, ">{}", header)?;
    match wrap {
        Some(width) if width > 0 => {
            for chunk in sequence.as_bytes().chunks(width) {
                writer.write_all(chunk)?;
                writer.write_all(b"\n")?;
            }
        }
        _ => writeln!(writer, "{}", sequence)?,
    }
    Ok(())
}

/// Splits a GFF3 (`key=value;...`) or GTF (`key "value"; ...`) attribute
/// column into ordered pairs.
pub fn parse_gff_attributes(field: &str) -> Vec<(String, String)> {
    field
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            // whichever separator comes first decides between GFF3 and GTF
            let equals = entry.find('=');
            let space = entry.find(char::is_whitespace);
            let split_at = match (equals, space) {
                (Some(e), Some(s)) => Some(e.min(s)),
                (e, s) => e.or(s),
            };
            let (key, value) = match split_at {
                Some(i) => {
                    let separator_len = entry[i..].chars().next().map_or(1, char::len_utf8);
                    (&entry[..i], &entry[i + separator_len..])
                }
                None => (entry, ""),
            };
            let value = value.trim();
            let value = value.strip_prefix('=').map_or(value, str::trim_start);
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// Looks up `key` in a GFF line (column 9 is used) or in a bare attribute
/// column. Returns the first matching value.
pub fn parse_attribute_from_gff(line_or_field: &str, key: &str) -> Result<Option<String>> {
    let input = line_or_field.trim_end_matches(['\n', '\r']);
    let field = if input.contains('\t') {
        let columns: Vec<&str> = input.split('\t').collect();
        if columns.len() < 9 {
            return Err(ExeggutorError::MalformedRecord {
                location: "GFF line".to_string(),
                reason: format!("expected 9 tab-separated columns, found {}", columns.len()),
            });
        }
        columns[8]
    } else {
        input
    };

    Ok(parse_gff_attributes(field)
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v))
}

/// Reads the feature lines of a GFF3/GTF file, stopping at an embedded
/// FASTA section.
pub fn read_gff<P: AsRef<Path>>(path: P) -> Result<Vec<GffRecord>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .quoting(false)
        .from_reader(open_file_reader(path, Compression::Auto)?);

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        let location = format!("{}:{}", path.display(), line);

        if row.get(0).is_some_and(|first| first.starts_with('>')) {
            break;
        }
        if row.len() < 9 {
            return Err(ExeggutorError::MalformedRecord {
                location,
                reason: format!("expected 9 tab-separated columns, found {}", row.len()),
            });
        }

        let malformed = |reason: String| ExeggutorError::MalformedRecord {
            location: location.clone(),
            reason,
        };
        let coordinate = |value: &str, name: &str| {
            value
                .parse::<u64>()
                .map_err(|_| malformed(format!("invalid {} '{}'", name, value)))
        };

        let score = match &row[5] {
            "." => None,
            value => Some(
                value
                    .parse::<f64>()
                    .map_err(|_| malformed(format!("invalid score '{}'", value)))?,
            ),
        };
        let strand = match &row[6] {
            "." | "?" => None,
            "+" => Some('+'),
            "-" => Some('-'),
            value => return Err(malformed(format!("invalid strand '{}'", value))),
        };
        let phase = match &row[7] {
            "." => None,
            value => match value.parse::<u8>() {
                Ok(phase) if phase <= 2 => Some(phase),
                _ => return Err(malformed(format!("invalid phase '{}'", value))),
            },
        };

        records.push(GffRecord {
            seqid: row[0].to_string(),
            source: row[1].to_string(),
            feature_type: row[2].to_string(),
            start: coordinate(&row[3], "start")?,
            end: coordinate(&row[4], "end")?,
            score,
            strand,
            phase,
            attributes: row[8].to_string(),
        });
    }

    tracing::debug!("Read {} GFF records from {}", records.len(), path.display());
    Ok(records)
}
