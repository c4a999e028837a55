//! Per-stage reports and the run summary shown to operators.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::load::{LoadOutcome, LoadStrategy};

/// Outcome of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Success,
    /// Completed, but some files failed to parse or the state was not saved.
    Partial,
    Failed,
    /// Not started because a dependency failed or the run was cancelled.
    Skipped,
}

impl StageStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Dependents may run after this status.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Success | Self::Partial)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw file that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub file: String,
    pub reason: String,
}

/// What one stage did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub status: StageStatus,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub rows_parsed: usize,
    pub duplicates: usize,
    pub strategy: Option<LoadStrategy>,
    pub rows_inserted: usize,
    pub rows_updated: usize,
    /// Rows removed from the table because their partition was reprocessed.
    pub rows_deleted: usize,
    pub failed_files: Vec<FailedFile>,
    pub state_saved: bool,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl StageReport {
    #[must_use]
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            status: StageStatus::Success,
            files_processed: 0,
            files_skipped: 0,
            rows_parsed: 0,
            duplicates: 0,
            strategy: None,
            rows_inserted: 0,
            rows_updated: 0,
            rows_deleted: 0,
            failed_files: Vec::new(),
            state_saved: false,
            error: None,
            elapsed_ms: 0,
        }
    }

    #[must_use]
    pub fn failed(stage: impl Into<String>, error: impl fmt::Display) -> Self {
        let mut report = Self::new(stage);
        report.fail(error);
        report
    }

    #[must_use]
    pub fn skipped(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut report = Self::new(stage);
        report.status = StageStatus::Skipped;
        report.error = Some(reason.into());
        report
    }

    pub fn fail(&mut self, error: impl fmt::Display) {
        self.status = StageStatus::Failed;
        self.error = Some(error.to_string());
    }

    /// Downgrade a successful stage to partial. Failures stay failures.
    pub fn degrade(&mut self) {
        if self.status == StageStatus::Success {
            self.status = StageStatus::Partial;
        }
    }

    pub fn record_load(&mut self, outcome: &LoadOutcome) {
        self.strategy = Some(outcome.strategy);
        self.rows_inserted += outcome.inserted;
        self.rows_updated += outcome.updated;
    }
}

/// Everything a `run` did, in stage order.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub stages: Vec<StageReport>,
}

impl RunSummary {
    /// Any stage failed. Skipped stages count, since their work did not
    /// happen.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.stages
            .iter()
            .any(|s| matches!(s.status, StageStatus::Failed | StageStatus::Skipped))
    }

    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == name)
    }

    #[must_use]
    pub fn total_duplicates(&self) -> usize {
        self.stages.iter().map(|s| s.duplicates).sum()
    }

    #[must_use]
    pub fn total_rows_written(&self) -> usize {
        self.stages
            .iter()
            .map(|s| s.rows_inserted + s.rows_updated)
            .sum()
    }
}
