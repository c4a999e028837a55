//! Partitioning of discovered files into new-or-modified and unchanged.

use crate::domain::fingerprint::{FileCandidate, ProcessingState};

/// Files split by whether they need processing in this run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Ordered by modification time, then name, so later files are parsed later.
    pub to_process: Vec<FileCandidate>,
    pub unchanged: Vec<FileCandidate>,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_process.is_empty()
    }
}

/// Decide which candidates need processing.
///
/// With `force_full_refresh` every candidate is returned for processing.
/// Otherwise a file is processed when it is absent from the stored state,
/// its modification time is strictly later, or its size differs.
#[must_use]
pub fn resolve(
    candidates: Vec<FileCandidate>,
    state: &ProcessingState,
    force_full_refresh: bool,
) -> ChangeSet {
    let (mut to_process, mut unchanged): (Vec<_>, Vec<_>) =
        candidates.into_iter().partition(|file| {
            force_full_refresh
                || state
                    .fingerprint(&file.name)
                    .map_or(true, |stored| file.fingerprint.is_newer_than(stored))
        });

    to_process.sort_by(|a, b| {
        a.fingerprint
            .modified_time
            .cmp(&b.fingerprint.modified_time)
            .then_with(|| a.name.cmp(&b.name))
    });
    unchanged.sort_by(|a, b| a.name.cmp(&b.name));

    ChangeSet {
        to_process,
        unchanged,
    }
}
