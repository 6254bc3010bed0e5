//! # Metadata Module
//!
//! Resolves capture timestamps from EXIF metadata in image files.
//!
//! ## Consumed Tags
//! - Capture time (DateTimeOriginal)
//! - Capture UTC offset (OffsetTimeOriginal), falling back to OffsetTime
//!
//! ## Accepted Layouts
//! - `YYYY:MM:DD HH:MM:SS` (EXIF)
//! - `YYYY-MM-DD HH:MM:SS`
//! - `YYYY-MM-DDTHH:MM:SS`
//!
//! Each may carry `.ffffff` fractional seconds and a trailing `±HHMM` offset.
//! Discovery is best effort: unreadable files, missing EXIF blocks and
//! malformed values all mean "no timestamp here".

use chrono::{DateTime, FixedOffset, NaiveDateTime, Timelike};
use exif::{Field, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// A parsed capture time, with or without a UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTime {
    /// Wall-clock time with no known offset
    Local(NaiveDateTime),
    /// Time with an explicit UTC offset
    Zoned(DateTime<FixedOffset>),
}

impl CaptureTime {
    /// Parse one of the accepted layouts
    pub fn parse(timestamp: &str) -> Option<Self> {
        let timestamp = timestamp.trim();
        if timestamp.is_empty() {
            return None;
        }

        // The date separator tells the layouts apart; the offset sign can't
        // be used for that since it may be a '-'
        let mut format = match (timestamp.chars().nth(4)?, timestamp.contains('T')) {
            (':', _) => String::from("%Y:%m:%d %H:%M:%S"),
            ('-', true) => String::from("%Y-%m-%dT%H:%M:%S"),
            ('-', false) => String::from("%Y-%m-%d %H:%M:%S"),
            _ => return None,
        };
        if timestamp.contains('.') {
            format.push_str("%.f");
        }

        let parsed = if has_offset(timestamp) {
            format.push_str("%z");
            DateTime::parse_from_str(timestamp, &format).map(CaptureTime::Zoned)
        } else {
            NaiveDateTime::parse_from_str(timestamp, &format).map(CaptureTime::Local)
        };

        match parsed {
            Ok(time) => Some(time),
            Err(e) => {
                debug!(timestamp, format = %format, error = %e, "Timestamp did not parse");
                None
            }
        }
    }

    /// ISO-8601 rendering; fractional seconds only when present
    pub fn to_iso8601(&self) -> String {
        match self {
            CaptureTime::Local(naive) => format_naive(naive),
            CaptureTime::Zoned(zoned) => {
                format!("{}{}", format_naive(&zoned.naive_local()), zoned.format("%:z"))
            }
        }
    }

    /// Position on the timeline, with offset-less times read as UTC
    fn instant(&self) -> NaiveDateTime {
        match self {
            CaptureTime::Local(naive) => *naive,
            CaptureTime::Zoned(zoned) => zoned.naive_utc(),
        }
    }

    /// Whether this time comes strictly before `other`
    pub fn is_before(&self, other: &CaptureTime) -> bool {
        self.instant() < other.instant()
    }
}

fn format_naive(naive: &NaiveDateTime) -> String {
    if naive.nanosecond() == 0 {
        naive.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        naive.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// An offset is a sign somewhere after the date portion
fn has_offset(timestamp: &str) -> bool {
    timestamp
        .get(10..)
        .map(|time| time.contains('+') || time.contains('-'))
        .unwrap_or(false)
}

/// Raw timestamp tag values found in a file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimestampTags {
    pub original: Option<String>,
    pub original_offset: Option<String>,
    pub offset: Option<String>,
}

impl TimestampTags {
    /// Read the timestamp tags from a file's EXIF block
    ///
    /// Returns `None` when the file can't be opened or has no EXIF data.
    pub fn read(path: &Path) -> Option<Self> {
        let file = File::open(path).ok()?;
        let mut bufreader = BufReader::new(&file);
        let exif_reader = match Reader::new().read_from_container(&mut bufreader) {
            Ok(r) => r,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No EXIF data");
                return None;
            }
        };

        let text = |tag: Tag| exif_reader.get_field(tag, In::PRIMARY).and_then(ascii_value);

        Some(Self {
            original: text(Tag::DateTimeOriginal),
            original_offset: text(Tag::OffsetTimeOriginal),
            offset: text(Tag::OffsetTime),
        })
    }

    /// Combine the tags into a capture time
    pub fn capture_time(&self) -> Option<CaptureTime> {
        let stamp = self.original.as_deref().and_then(clean_tag)?;
        let offset = self
            .original_offset
            .as_deref()
            .and_then(clean_tag)
            .or_else(|| self.offset.as_deref().and_then(clean_tag));

        match offset {
            Some(offset) => {
                debug!(stamp, offset, "Converting EXIF timestamp and offset");
                CaptureTime::parse(&format!("{}{}", stamp, offset.replace(':', "")))
            }
            None => {
                debug!(stamp, "Converting EXIF timestamp without offset");
                CaptureTime::parse(stamp)
            }
        }
    }
}

/// Helper to extract the text of an EXIF ASCII field
fn ascii_value(field: &Field) -> Option<String> {
    if let Value::Ascii(ref vec) = field.value {
        if let Some(bytes) = vec.first() {
            if let Ok(s) = std::str::from_utf8(bytes) {
                return Some(s.to_string());
            }
        }
    }
    None
}

/// Trim a tag value, treating separator-only values as unset
///
/// Cameras that don't know the time write blanks such as `"    :  :     :  :  "`.
fn clean_tag(value: &str) -> Option<&str> {
    let value = value.trim_end_matches('\0').trim();
    let has_content = value
        .chars()
        .any(|c| !matches!(c, ':' | '+' | '-') && !c.is_whitespace());
    if has_content {
        Some(value)
    } else {
        None
    }
}

/// Capture time embedded in a file, if any
pub fn capture_time(path: &Path) -> Option<CaptureTime> {
    TimestampTags::read(path)?.capture_time()
}

/// Return the earlier of `existing` and the capture time found in `path`
///
/// When the file yields nothing usable `existing` comes back unchanged.
pub fn resolve(existing: Option<&str>, path: &Path) -> Option<String> {
    debug!(existing, path = %path.display(), "Getting first timestamp");
    let current = existing.and_then(CaptureTime::parse);

    let earliest = match (current, capture_time(path)) {
        (Some(current), Some(found)) if found.is_before(&current) => Some(found),
        (Some(current), _) => Some(current),
        (None, found) => found,
    };

    match earliest {
        Some(time) => Some(time.to_iso8601()),
        None => existing.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exif::experimental::Writer;
    use std::io::Cursor;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_exif_tiff(dir: &TempDir, name: &str, tags: &[(Tag, &str)]) -> PathBuf {
        let fields: Vec<Field> = tags
            .iter()
            .map(|(tag, text)| Field {
                tag: *tag,
                ifd_num: In::PRIMARY,
                value: Value::Ascii(vec![text.as_bytes().to_vec()]),
            })
            .collect();

        let mut writer = Writer::new();
        for field in &fields {
            writer.push_field(field);
        }
        let mut buf = Cursor::new(Vec::new());
        writer.write(&mut buf, false).unwrap();

        let path = dir.path().join(name);
        std::fs::write(&path, buf.into_inner()).unwrap();
        path
    }

    #[test]
    fn parses_exif_layout() {
        let time = CaptureTime::parse("2020:01:15 10:00:00").unwrap();
        assert_eq!(time.to_iso8601(), "2020-01-15T10:00:00");
    }

    #[test]
    fn parses_space_and_t_layouts() {
        assert_eq!(
            CaptureTime::parse("2020-01-15 10:00:00").unwrap().to_iso8601(),
            "2020-01-15T10:00:00"
        );
        assert_eq!(
            CaptureTime::parse("2020-01-15T10:00:00").unwrap().to_iso8601(),
            "2020-01-15T10:00:00"
        );
    }

    #[test]
    fn parses_fraction_and_offset() {
        let time = CaptureTime::parse("2020-01-15T10:00:00.250000+0130").unwrap();
        assert_eq!(time.to_iso8601(), "2020-01-15T10:00:00.250000+01:30");
    }

    #[test]
    fn negative_offset_on_exif_layout() {
        let time = CaptureTime::parse("2020:01:15 10:00:00-0700").unwrap();
        assert_eq!(time.to_iso8601(), "2020-01-15T10:00:00-07:00");
    }

    #[test]
    fn garbage_does_not_parse() {
        assert!(CaptureTime::parse("").is_none());
        assert!(CaptureTime::parse("yesterday").is_none());
        assert!(CaptureTime::parse("2020/01/15 10:00:00").is_none());
        assert!(CaptureTime::parse("2020:13:45 10:00:00").is_none());
    }

    #[test]
    fn ordering_uses_utc_instant() {
        let east = CaptureTime::parse("2020-01-15T10:00:00+0200").unwrap();
        let west = CaptureTime::parse("2020-01-15T09:00:00+0000").unwrap();
        assert!(east.is_before(&west));
        assert!(!west.is_before(&east));
    }

    #[test]
    fn blank_tags_are_unset() {
        assert_eq!(clean_tag("    :  :     :  :  "), None);
        assert_eq!(clean_tag("+00:00\0"), None);
        assert_eq!(clean_tag(" 2020:01:15 10:00:00\0"), Some("2020:01:15 10:00:00"));
    }

    #[test]
    fn tags_prefer_original_offset() {
        let tags = TimestampTags {
            original: Some("2020:01:15 10:00:00".to_string()),
            original_offset: Some("+02:00".to_string()),
            offset: Some("-05:00".to_string()),
        };
        assert_eq!(
            tags.capture_time().unwrap().to_iso8601(),
            "2020-01-15T10:00:00+02:00"
        );
    }

    #[test]
    fn tags_fall_back_to_generic_offset() {
        let tags = TimestampTags {
            original: Some("2020:01:15 10:00:00".to_string()),
            original_offset: Some("   :  ".to_string()),
            offset: Some("-05:00".to_string()),
        };
        assert_eq!(
            tags.capture_time().unwrap().to_iso8601(),
            "2020-01-15T10:00:00-05:00"
        );
    }

    #[test]
    fn tags_without_capture_time_yield_nothing() {
        let tags = TimestampTags {
            original: None,
            original_offset: Some("+02:00".to_string()),
            offset: None,
        };
        assert!(tags.capture_time().is_none());
    }

    #[test]
    fn nonexistent_file_keeps_existing() {
        let path = Path::new("/nonexistent/file.jpg");
        assert_eq!(resolve(None, path), None);
        assert_eq!(
            resolve(Some("not a timestamp"), path),
            Some("not a timestamp".to_string())
        );
    }

    #[test]
    fn file_without_exif_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
        assert_eq!(resolve(None, &path), None);
    }

    #[test]
    fn reads_capture_time_from_file() {
        let dir = TempDir::new().unwrap();
        let path = write_exif_tiff(
            &dir,
            "flight.tif",
            &[
                (Tag::DateTimeOriginal, "2020:01:15 10:00:00"),
                (Tag::OffsetTimeOriginal, "-07:00"),
            ],
        );
        assert_eq!(
            resolve(None, &path),
            Some("2020-01-15T10:00:00-07:00".to_string())
        );
    }

    #[test]
    fn keeps_earliest_across_files() {
        let dir = TempDir::new().unwrap();
        let later = write_exif_tiff(&dir, "a.tif", &[(Tag::DateTimeOriginal, "2020:01:15 10:00:00")]);
        let earlier = write_exif_tiff(&dir, "b.tif", &[(Tag::DateTimeOriginal, "2020:01:10 09:00:00")]);

        let first = resolve(None, &later);
        let second = resolve(first.as_deref(), &earlier);
        assert_eq!(second, Some("2020-01-10T09:00:00".to_string()));

        // Order of discovery doesn't matter
        let first = resolve(None, &earlier);
        let second = resolve(first.as_deref(), &later);
        assert_eq!(second, Some("2020-01-10T09:00:00".to_string()));
    }

    #[test]
    fn malformed_file_timestamp_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = write_exif_tiff(&dir, "bad.tif", &[(Tag::DateTimeOriginal, "2020:99:99 99:99:99")]);
        assert_eq!(
            resolve(Some("2021-06-01T12:00:00"), &path),
            Some("2021-06-01T12:00:00".to_string())
        );
    }
}
