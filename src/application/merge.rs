//! Incremental merge of freshly parsed rows into the persisted dataset.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::fingerprint::FileCandidate;
use crate::domain::record::SourceRecord;
use crate::domain::source::PartitionPolicy;
use crate::error::MergeInconsistencyError;

/// Result of merging one run's rows into the persisted dataset.
#[derive(Debug, Clone)]
pub struct MergeOutcome<R> {
    /// Surviving persisted rows followed by the new rows, in input order.
    pub rows: Vec<R>,
    /// Partitions (dates) fully replaced by this run.
    pub replaced_partitions: BTreeSet<NaiveDate>,
    /// Persisted rows dropped because their partition is being replaced.
    pub removed: usize,
}

/// Compute the partitions a set of reprocessed files replaces.
///
/// # Errors
/// Under [`PartitionPolicy::FileDate`] every reprocessed file must carry a
/// date in its name; otherwise its partition is unknown and history could be
/// silently duplicated.
pub fn replaced_partitions<R: SourceRecord>(
    new_rows: &[R],
    reprocessed: &[FileCandidate],
    policy: PartitionPolicy,
) -> Result<BTreeSet<NaiveDate>, MergeInconsistencyError> {
    match policy {
        PartitionPolicy::FileDate => reprocessed
            .iter()
            .map(|file| {
                file.file_date.ok_or_else(|| MergeInconsistencyError {
                    source_name: R::SOURCE.to_string(),
                    reason: format!("file '{}' has no date in its name", file.name),
                })
            })
            .collect(),
        PartitionPolicy::RowDate => Ok(new_rows.iter().map(|row| row.date()).collect()),
        PartitionPolicy::None => Ok(BTreeSet::new()),
    }
}

/// Merge new rows into the existing dataset.
///
/// Existing rows whose partition is being replaced are removed before the new
/// rows are appended, so a reprocessed file never adds a second copy of
/// history. With no existing dataset the result is just the new rows.
///
/// # Errors
/// See [`replaced_partitions`].
pub fn merge<R: SourceRecord>(
    existing: Option<Vec<R>>,
    new_rows: Vec<R>,
    reprocessed: &[FileCandidate],
    policy: PartitionPolicy,
) -> Result<MergeOutcome<R>, MergeInconsistencyError> {
    let partitions = replaced_partitions(&new_rows, reprocessed, policy)?;

    let Some(existing) = existing else {
        return Ok(MergeOutcome {
            rows: new_rows,
            replaced_partitions: partitions,
            removed: 0,
        });
    };

    let before = existing.len();
    let mut rows: Vec<R> = existing
        .into_iter()
        .filter(|row| !partitions.contains(&row.date()))
        .collect();
    let removed = before - rows.len();
    rows.extend(new_rows);

    debug!(
        source = %R::SOURCE,
        removed,
        partitions = partitions.len(),
        total = rows.len(),
        "Merged dataset"
    );

    Ok(MergeOutcome {
        rows,
        replaced_partitions: partitions,
        removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fingerprint::FileFingerprint;
    use crate::domain::record::{RunsRecord, UniverseRecord};
    use chrono::{NaiveTime, TimeZone, Utc};
    use std::path::PathBuf;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn bond(date: NaiveDate, cusip: &str) -> UniverseRecord {
        UniverseRecord {
            date,
            cusip: cusip.to_string(),
            security: None,
            ticker: None,
            sector: None,
            currency: None,
            rating: None,
            maturity: None,
            coupon: None,
            amount_outstanding: None,
            g_spread: None,
            oas: None,
        }
    }

    fn file(name: &str, date: Option<NaiveDate>) -> FileCandidate {
        FileCandidate {
            name: name.to_string(),
            path: PathBuf::from(name),
            fingerprint: FileFingerprint {
                modified_time: Utc.timestamp_opt(0, 0).unwrap(),
                size: 0,
            },
            file_date: date,
        }
    }

    #[test]
    fn first_run_returns_new_rows() {
        let rows = vec![bond(day(2), "A"), bond(day(2), "B")];
        let outcome = merge(
            None,
            rows.clone(),
            &[file("u_2024-01-02.csv", Some(day(2)))],
            PartitionPolicy::FileDate,
        )
        .unwrap();
        assert_eq!(outcome.rows, rows);
        assert_eq!(outcome.removed, 0);
    }

    #[test]
    fn reprocessed_partition_is_replaced_not_appended() {
        let existing: Vec<_> = (0..100)
            .map(|i| bond(day(2), &format!("OLD{i:03}")))
            .chain((0..10).map(|i| bond(day(1), &format!("KEEP{i}"))))
            .collect();
        let new_rows: Vec<_> = (0..80).map(|i| bond(day(2), &format!("NEW{i:03}"))).collect();

        let outcome = merge(
            Some(existing),
            new_rows,
            &[file("u_2024-01-02.csv", Some(day(2)))],
            PartitionPolicy::FileDate,
        )
        .unwrap();

        let on_day_2 = outcome.rows.iter().filter(|r| r.date == day(2)).count();
        assert_eq!(on_day_2, 80);
        assert_eq!(outcome.rows.len(), 90);
        assert_eq!(outcome.removed, 100);
        assert!(outcome.rows.iter().all(|r| r.date != day(2) || r.cusip.starts_with("NEW")));
    }

    #[test]
    fn empty_reprocessed_file_still_clears_its_partition() {
        let outcome = merge(
            Some(vec![bond(day(2), "A")]),
            Vec::new(),
            &[file("u_2024-01-02.csv", Some(day(2)))],
            PartitionPolicy::FileDate,
        )
        .unwrap();
        assert!(outcome.rows.is_empty());
    }

    #[test]
    fn file_without_date_is_inconsistent() {
        let err = merge(
            Some(vec![bond(day(2), "A")]),
            vec![bond(day(3), "B")],
            &[file("universe.csv", None)],
            PartitionPolicy::FileDate,
        )
        .unwrap_err();
        assert_eq!(err.source_name, "universe");
    }

    #[test]
    fn row_date_policy_replaces_dates_seen_in_new_rows() {
        let outcome = merge(
            Some(vec![bond(day(1), "A"), bond(day(2), "A")]),
            vec![bond(day(2), "A")],
            &[file("history.csv", None)],
            PartitionPolicy::RowDate,
        )
        .unwrap();
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.replaced_partitions.len(), 1);
    }

    #[test]
    fn no_partition_policy_keeps_everything() {
        let quote = |h| RunsRecord {
            date: day(2),
            time: NaiveTime::from_hms_opt(h, 0, 0).unwrap(),
            cusip: "ABC123".into(),
            dealer: "DealerX".into(),
            security: None,
            benchmark: None,
            bid_spread: None,
            ask_spread: None,
            bid_size: None,
            ask_size: None,
            bid_price: None,
            ask_price: None,
        };
        let outcome = merge(
            Some(vec![quote(9)]),
            vec![quote(14)],
            &[file("runs.csv", None)],
            PartitionPolicy::None,
        )
        .unwrap();
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.removed, 0);
    }
}
