//! File fingerprints and per-source processing state.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Current processing-state schema version.
pub const STATE_VERSION: u32 = 1;

/// Modification time and size of a file when it was last processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub modified_time: DateTime<Utc>,
    pub size: u64,
}

impl FileFingerprint {
    /// Whether a file with this fingerprint differs from the stored one.
    ///
    /// A file counts as changed when it was modified strictly later or its
    /// size differs. An older modification time with the same size is treated
    /// as unchanged.
    #[must_use]
    pub fn is_newer_than(&self, stored: &FileFingerprint) -> bool {
        self.modified_time > stored.modified_time || self.size != stored.size
    }
}

/// A raw file found in a source's input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub name: String,
    pub path: PathBuf,
    pub fingerprint: FileFingerprint,
    /// Calendar date encoded in the file name, if any.
    pub file_date: Option<NaiveDate>,
}

/// What a source has already ingested.
///
/// Loaded at the start of a source run and written back only once that run's
/// load has succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub processed_files: BTreeMap<String, FileFingerprint>,
    #[serde(default)]
    pub last_processed: Option<DateTime<Utc>>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            processed_files: BTreeMap::new(),
            last_processed: None,
        }
    }
}

impl ProcessingState {
    #[must_use]
    pub fn fingerprint(&self, name: &str) -> Option<&FileFingerprint> {
        self.processed_files.get(name)
    }

    pub fn record(&mut self, name: impl Into<String>, fingerprint: FileFingerprint) {
        self.processed_files.insert(name.into(), fingerprint);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.processed_files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processed_files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fp(secs: i64, size: u64) -> FileFingerprint {
        FileFingerprint {
            modified_time: Utc.timestamp_opt(secs, 0).unwrap(),
            size,
        }
    }

    #[test]
    fn later_mtime_with_same_size_is_newer() {
        assert!(fp(200, 10).is_newer_than(&fp(100, 10)));
    }

    #[test]
    fn size_change_is_newer_even_with_same_mtime() {
        assert!(fp(100, 11).is_newer_than(&fp(100, 10)));
    }

    #[test]
    fn identical_fingerprint_is_not_newer() {
        assert!(!fp(100, 10).is_newer_than(&fp(100, 10)));
        assert!(!fp(50, 10).is_newer_than(&fp(100, 10)));
    }

    #[test]
    fn state_json_is_stable() {
        let mut state = ProcessingState::default();
        state.record("universe_2024-01-02.csv", fp(1_704_200_000, 512));
        let json = serde_json::to_string(&state).unwrap();
        let back: ProcessingState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert_eq!(back.version, STATE_VERSION);
    }

    #[test]
    fn legacy_state_without_version_loads() {
        let back: ProcessingState = serde_json::from_str(r#"{"processed_files":{}}"#).unwrap();
        assert_eq!(back.version, STATE_VERSION);
        assert!(back.is_empty());
    }
}
