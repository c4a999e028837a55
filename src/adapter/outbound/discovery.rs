//! Raw file discovery in a source's input directory.

use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, trace};

use crate::domain::fingerprint::{FileCandidate, FileFingerprint};
use crate::error::Result;
use crate::port::outbound::parser::FileSource;

/// Lists the files of one directory (non-recursive) with matching extensions.
#[derive(Debug, Clone)]
pub struct DirectoryFileSource {
    dir: PathBuf,
    extensions: Vec<String>,
}

impl DirectoryFileSource {
    /// Extensions are matched case-insensitively, with or without a dot.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            dir: dir.into(),
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    fn accepts(&self, name: &str) -> bool {
        // Office lock files and our own temp files.
        if name.starts_with("~$") || name.starts_with('.') || name.ends_with(".tmp") {
            return false;
        }
        let Some((_, ext)) = name.rsplit_once('.') else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        self.extensions.iter().any(|e| *e == ext)
    }
}

impl FileSource for DirectoryFileSource {
    fn list(&self) -> Result<Vec<FileCandidate>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("input directory {}: {e}", self.dir.display()),
            )
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !self.accepts(&name) {
                trace!(file = %name, "Ignoring file");
                continue;
            }

            let modified_time: DateTime<Utc> = metadata.modified()?.into();
            files.push(FileCandidate {
                file_date: date_from_file_name(&name),
                path: entry.path(),
                fingerprint: FileFingerprint {
                    modified_time,
                    size: metadata.len(),
                },
                name,
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(dir = %self.dir.display(), files = files.len(), "Discovered files");
        Ok(files)
    }
}

fn number(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(bytes.iter().fold(0, |acc, b| acc * 10 + u32::from(b - b'0')))
}

fn digit_at(bytes: &[u8], i: usize) -> bool {
    bytes.get(i).is_some_and(u8::is_ascii_digit)
}

/// First calendar date encoded in a file name.
///
/// Recognizes `YYYY-MM-DD` (also with `_`), `YYYYMMDD` and `MM.DD.YY`, the
/// latter always in the 2000s.
#[must_use]
pub fn date_from_file_name(name: &str) -> Option<NaiveDate> {
    let bytes = name.as_bytes();
    for start in 0..bytes.len() {
        // A date never starts in the middle of a longer number.
        if start > 0 && digit_at(bytes, start - 1) {
            continue;
        }
        let rest = &bytes[start..];

        if rest.len() >= 10 && (rest[4] == b'-' || rest[4] == b'_') && rest[7] == rest[4] {
            if let (Some(y), Some(m), Some(d)) =
                (number(&rest[0..4]), number(&rest[5..7]), number(&rest[8..10]))
            {
                if !digit_at(rest, 10) {
                    if let Some(date) = NaiveDate::from_ymd_opt(y as i32, m, d) {
                        return Some(date);
                    }
                }
            }
        }

        if rest.len() >= 8 && !digit_at(rest, 8) {
            if let (Some(y), Some(m), Some(d)) =
                (number(&rest[0..4]), number(&rest[4..6]), number(&rest[6..8]))
            {
                if let Some(date) = NaiveDate::from_ymd_opt(y as i32, m, d) {
                    return Some(date);
                }
            }
            if rest[2] == b'.' && rest[5] == b'.' {
                if let (Some(m), Some(d), Some(y)) =
                    (number(&rest[0..2]), number(&rest[3..5]), number(&rest[6..8]))
                {
                    if let Some(date) = NaiveDate::from_ymd_opt(2000 + y as i32, m, d) {
                        return Some(date);
                    }
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn dates_from_names() {
        assert_eq!(date_from_file_name("universe_2024-01-02.csv"), ymd(2024, 1, 2));
        assert_eq!(date_from_file_name("portfolio_2024_03_31.csv"), ymd(2024, 3, 31));
        assert_eq!(date_from_file_name("Aggies 20240105.csv"), ymd(2024, 1, 5));
        assert_eq!(date_from_file_name("RUNS 12.29.23.csv"), ymd(2023, 12, 29));
        assert_eq!(date_from_file_name("runs.csv"), None);
        assert_eq!(date_from_file_name("export_123456789.csv"), None);
        assert_eq!(date_from_file_name("bad_2024-13-40.csv"), None);
    }

    #[test]
    fn lists_matching_files_sorted() {
        let dir = TempDir::new().unwrap();
        for name in ["b_2024-01-03.csv", "a_2024-01-02.CSV", "notes.txt", "~$lock.csv"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.csv")).unwrap();

        let source = DirectoryFileSource::new(dir.path(), &[".csv".to_string()]);
        let files = source.list().unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a_2024-01-02.CSV", "b_2024-01-03.csv"]);
        assert_eq!(files[0].file_date, ymd(2024, 1, 2));
        assert_eq!(files[0].fingerprint.size, 1);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let source = DirectoryFileSource::new(dir.path().join("absent"), &["csv".to_string()]);
        assert!(source.list().is_err());
    }
}
