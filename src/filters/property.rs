//! Built-in file property filters.
//!
//! Sizes, timestamps, names and content digests. Content digests are
//! streamed in [`CHUNK_SIZE`] blocks so memory use is independent of the
//! file size.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use std::time::SystemTime;

use base64::Engine as _;
use chrono::{DateTime, Datelike, Local, Timelike};
use regex::Regex;
use sha2::Digest;

use super::{Filter, FilterError, FilterSpecError};

/// Read buffer size for content filters (64 KiB).
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Number of chunks read by `partial_md5`.
pub const PARTIAL_CHUNKS: usize = 200;

/// A built-in file property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Size,
    Modified,
    Accessed,
    Filename,
    Md5,
    PartialMd5,
    Sha,
    Blake3,
    File,
}

impl Property {
    /// Every built-in property, in help order.
    pub const ALL: [Property; 9] = [
        Property::Size,
        Property::Modified,
        Property::Accessed,
        Property::Filename,
        Property::Md5,
        Property::PartialMd5,
        Property::Sha,
        Property::Blake3,
        Property::File,
    ];

    /// Name as written on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Modified => "modified",
            Self::Accessed => "accessed",
            Self::Filename => "filename",
            Self::Md5 => "md5",
            Self::PartialMd5 => "partial_md5",
            Self::Sha => "sha",
            Self::Blake3 => "blake3",
            Self::File => "file",
        }
    }

    /// Look up a property by name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Closest property name to `name`, if any is reasonably close.
    #[must_use]
    pub fn suggest(name: &str) -> Option<&'static str> {
        let name = name.to_ascii_lowercase();
        Self::ALL
            .iter()
            .map(|p| (strsim::levenshtein(&name, p.name()), p.name()))
            .filter(|(distance, _)| *distance <= 2)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, n)| n)
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unit for the `size` filter. Each step is a power of 1024.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
    Bytes,
    Kilo,
    Mega,
    Giga,
    Tera,
    Peta,
}

impl SizeUnit {
    const VALID: &'static str = "B, KB, MB, GB, TB, PB";

    fn parse(text: &str) -> Option<Self> {
        let unit = match text.to_ascii_uppercase().as_str() {
            "B" | "BYTE" | "BYTES" => Self::Bytes,
            "KB" | "KILO" | "KILOBYTE" | "KILOBYTES" => Self::Kilo,
            "MB" | "MEGA" | "MEGABYTE" | "MEGABYTES" => Self::Mega,
            "GB" | "GIGA" | "GIGABYTE" | "GIGABYTES" => Self::Giga,
            "TB" | "TERA" | "TERABYTE" | "TERABYTES" => Self::Tera,
            "PB" | "PETA" | "PETABYTE" | "PETABYTES" => Self::Peta,
            _ => return None,
        };
        Some(unit)
    }

    fn exponent(self) -> i32 {
        match self {
            Self::Bytes => 0,
            Self::Kilo => 1,
            Self::Mega => 2,
            Self::Giga => 3,
            Self::Tera => 4,
            Self::Peta => 5,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::Bytes => "B",
            Self::Kilo => "KB",
            Self::Mega => "MB",
            Self::Giga => "GB",
            Self::Tera => "TB",
            Self::Peta => "PB",
        }
    }

    /// Size rounded to the nearest whole unit, e.g. `"3MB"`.
    #[must_use]
    pub fn format(self, bytes: u64) -> String {
        let scaled = bytes as f64 / 1024f64.powi(self.exponent());
        format!("{}{}", scaled.round() as u64, self.suffix())
    }
}

/// Rounding applied by the `modified` and `accessed` filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRounding {
    Micro,
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
    Weekday,
}

impl TimeRounding {
    const VALID: &'static str = "MICRO, SECOND, MINUTE, HOUR, DAY, MONTH, YEAR, WEEKDAY";

    fn parse(text: &str) -> Option<Self> {
        let rounding = match text.to_ascii_uppercase().as_str() {
            "MICRO" | "MICROSECOND" | "NANO" => Self::Micro,
            "S" | "SEC" | "SECOND" => Self::Second,
            "M" | "MIN" | "MINUTE" => Self::Minute,
            "H" | "HOUR" => Self::Hour,
            "D" | "DAY" => Self::Day,
            "MON" | "MONTH" => Self::Month,
            "Y" | "YR" | "YEAR" => Self::Year,
            "WD" | "WEEKDAY" => Self::Weekday,
            _ => return None,
        };
        Some(rounding)
    }

    /// Format `time` at this precision.
    #[must_use]
    pub fn format(self, time: &DateTime<Local>) -> String {
        match self {
            Self::Micro => time.format("%Y-%m-%d_%H:%M:%S%.6f").to_string(),
            Self::Second => time.format("%Y-%m-%d_%H:%M:%S").to_string(),
            Self::Minute => time.format("%Y-%m-%d_%H:%M:00").to_string(),
            Self::Hour => time.format("%Y-%m-%d_%H:00:00").to_string(),
            Self::Day => time.format("%Y-%m-%d_00:00:00").to_string(),
            Self::Month => time.format("%Y-%m-01_00:00:00").to_string(),
            Self::Year => time.format("%Y-01-01_00:00:00").to_string(),
            Self::Weekday => time.weekday().num_days_from_monday().to_string(),
        }
    }
}

/// Unrounded timestamp: seconds, plus microseconds when non-zero.
#[must_use]
pub fn format_timestamp(time: &DateTime<Local>) -> String {
    if time.nanosecond() / 1_000 == 0 {
        TimeRounding::Second.format(time)
    } else {
        TimeRounding::Micro.format(time)
    }
}

/// Digest used by the `sha` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShaVariant {
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl ShaVariant {
    const VALID: &'static str = "224, 256, 384, 512";

    fn parse(text: &str) -> Option<Self> {
        let upper = text.to_ascii_uppercase();
        let bits = upper.strip_prefix("SHA").unwrap_or(&upper);
        match bits {
            "224" => Some(Self::Sha224),
            "256" => Some(Self::Sha256),
            "384" => Some(Self::Sha384),
            "512" => Some(Self::Sha512),
            _ => None,
        }
    }

    fn digest_file(self, path: &Path) -> Result<String, FilterError> {
        match self {
            Self::Sha224 => digest_file::<sha2::Sha224>(path),
            Self::Sha256 => digest_file::<sha2::Sha256>(path),
            Self::Sha384 => digest_file::<sha2::Sha384>(path),
            Self::Sha512 => digest_file::<sha2::Sha512>(path),
        }
    }
}

/// Build the filter for `property` with an optional modifier.
pub(crate) fn resolve(
    property: Property,
    modifier: Option<&str>,
) -> Result<Filter, FilterSpecError> {
    let modifier = modifier.filter(|m| !m.is_empty());
    let name = match modifier {
        Some(m) => format!("{property}:{m}"),
        None => property.to_string(),
    };

    let invalid = |valid: &str| FilterSpecError::InvalidModifier {
        filter: property.name(),
        modifier: modifier.unwrap_or_default().to_string(),
        valid: valid.to_string(),
    };

    let filter = match property {
        Property::Size => match modifier {
            None => Filter::new(name, |path| Ok(metadata(path)?.len().to_string())),
            Some(m) => {
                let unit = SizeUnit::parse(m).ok_or_else(|| invalid(SizeUnit::VALID))?;
                Filter::new(name, move |path| Ok(unit.format(metadata(path)?.len())))
            }
        },
        Property::Modified | Property::Accessed => {
            let rounding = modifier
                .map(|m| TimeRounding::parse(m).ok_or_else(|| invalid(TimeRounding::VALID)))
                .transpose()?;
            let accessed = property == Property::Accessed;
            Filter::new(name, move |path| {
                let meta = metadata(path)?;
                let time = if accessed {
                    meta.accessed()
                } else {
                    meta.modified()
                }
                .map_err(|e| FilterError::from_io(path, e))?;
                Ok(format_time(time, rounding))
            })
        }
        Property::Filename => match modifier {
            None => Filter::new(name, |path| Ok(basename(path))),
            Some(pattern) => {
                let regex = Regex::new(pattern).map_err(|source| FilterSpecError::InvalidRegex {
                    pattern: pattern.to_string(),
                    source,
                })?;
                Filter::new(name, move |path| Ok(regex_signature(&regex, &basename(path))))
            }
        },
        Property::Sha => {
            let variant = modifier
                .map(|m| ShaVariant::parse(m).ok_or_else(|| invalid(ShaVariant::VALID)))
                .transpose()?
                .unwrap_or_default();
            Filter::new(name, move |path| variant.digest_file(path))
        }
        Property::Md5 | Property::PartialMd5 | Property::Blake3 | Property::File => {
            if modifier.is_some() {
                return Err(FilterSpecError::UnexpectedModifier(property.name()));
            }
            match property {
                Property::Md5 => Filter::new(name, |path| md5_file(path, None)),
                Property::PartialMd5 => {
                    Filter::new(name, |path| md5_file(path, Some(PARTIAL_CHUNKS)))
                }
                Property::Blake3 => Filter::new(name, blake3_file),
                _ => Filter::new(name, file_contents),
            }
        }
    };

    Ok(filter)
}

/// Signature of `text` under `regex`.
///
/// The capture groups of the first match are concatenated; without groups
/// the whole match is used; no match yields `""`.
#[must_use]
pub fn regex_signature(regex: &Regex, text: &str) -> String {
    let Some(captures) = regex.captures(text) else {
        return String::new();
    };
    if captures.len() > 1 {
        captures
            .iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str())
            .collect()
    } else {
        captures
            .get(0)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }
}

fn metadata(path: &Path) -> Result<fs::Metadata, FilterError> {
    fs::metadata(path).map_err(|e| FilterError::from_io(path, e))
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn format_time(time: SystemTime, rounding: Option<TimeRounding>) -> String {
    let local: DateTime<Local> = time.into();
    match rounding {
        Some(r) => r.format(&local),
        None => format_timestamp(&local),
    }
}

/// Feed the file to `update` in [`CHUNK_SIZE`] blocks, stopping after
/// `max_chunks` blocks when given.
fn stream_file(
    path: &Path,
    max_chunks: Option<usize>,
    mut update: impl FnMut(&[u8]),
) -> Result<(), FilterError> {
    let mut file = File::open(path).map_err(|e| FilterError::from_io(path, e))?;
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut chunks = 0usize;

    loop {
        if max_chunks.is_some_and(|max| chunks >= max) {
            break;
        }
        let filled = fill(&mut file, &mut buffer).map_err(|e| FilterError::from_io(path, e))?;
        if filled == 0 {
            break;
        }
        update(&buffer[..filled]);
        chunks += 1;
        if filled < buffer.len() {
            break;
        }
    }
    Ok(())
}

/// Read until `buffer` is full or EOF; returns the number of bytes read.
fn fill(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn md5_file(path: &Path, max_chunks: Option<usize>) -> Result<String, FilterError> {
    let mut context = md5::Context::new();
    stream_file(path, max_chunks, |chunk| context.consume(chunk))?;
    Ok(format!("{:x}", context.compute()))
}

fn digest_file<D: Digest>(path: &Path) -> Result<String, FilterError>
where
    sha2::digest::Output<D>: fmt::LowerHex,
{
    let mut hasher = D::new();
    stream_file(path, None, |chunk| hasher.update(chunk))?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn blake3_file(path: &Path) -> Result<String, FilterError> {
    let mut hasher = blake3::Hasher::new();
    stream_file(path, None, |chunk| {
        hasher.update(chunk);
    })?;
    Ok(hasher.finalize().to_hex().to_string())
}

fn file_contents(path: &Path) -> Result<String, FilterError> {
    let bytes = fs::read(path).map_err(|e| FilterError::from_io(path, e))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}
