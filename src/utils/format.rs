use crate::utils::error::{ExeggutorError, Result};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;
const TB: f64 = GB * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteUnit {
    #[default]
    Auto,
    B,
    KB,
    MB,
    GB,
    TB,
}

impl FromStr for ByteUnit {
    type Err = ExeggutorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "b" => Ok(Self::B),
            "kb" => Ok(Self::KB),
            "mb" => Ok(Self::MB),
            "gb" => Ok(Self::GB),
            "tb" => Ok(Self::TB),
            other => Err(ExeggutorError::InvalidChoice {
                query: other.to_string(),
                choices: ["auto", "b", "gb", "kb", "mb", "tb"]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
            }),
        }
    }
}

/// `HH:MM:SS`, truncating fractional seconds.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Text framed above and below by a rule of `line_character`.
pub fn format_header(text: &str, line_character: char, width: Option<usize>) -> String {
    let n = width.unwrap_or_else(|| text.chars().count());
    let line: String = std::iter::repeat(line_character).take(n).collect();
    format!("{}\n{}\n{}", line, text, line)
}

/// Scales `bytes` into `unit`, returning the value and the unit label.
pub fn scale_bytes(bytes: u64, unit: ByteUnit) -> (f64, &'static str) {
    let b = bytes as f64;
    let unit = match unit {
        ByteUnit::Auto if b < KB => ByteUnit::B,
        ByteUnit::Auto if b < MB => ByteUnit::KB,
        ByteUnit::Auto if b < GB => ByteUnit::MB,
        ByteUnit::Auto if b < TB => ByteUnit::GB,
        ByteUnit::Auto => ByteUnit::TB,
        explicit => explicit,
    };
    match unit {
        ByteUnit::B | ByteUnit::Auto => (b, "B"),
        ByteUnit::KB => (b / KB, "KB"),
        ByteUnit::MB => (b / MB, "MB"),
        ByteUnit::GB => (b / GB, "GB"),
        ByteUnit::TB => (b / TB, "TB"),
    }
}

pub fn format_bytes(bytes: u64, unit: ByteUnit) -> String {
    let (value, label) = scale_bytes(bytes, unit);
    format!("{:.2} {}", value, label)
}

pub fn get_timestamp(format: &str) -> String {
    chrono::Local::now().format(format).to_string()
}
