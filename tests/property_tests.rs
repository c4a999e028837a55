mod harness;

use std::collections::BTreeSet;
use std::path::PathBuf;

use bondlake::application::change_set;
use bondlake::application::merge;
use bondlake::domain::fingerprint::{FileCandidate, FileFingerprint, ProcessingState};
use bondlake::domain::record::UniverseRecord;
use bondlake::domain::source::{PartitionPolicy, SourceKind};
use bondlake::testkit::fixture::{csv, runs_line, RUNS_HEADER};
use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

use harness::workspace::Workspace;

fn candidate(name: &str, secs: i64, size: u64) -> FileCandidate {
    FileCandidate {
        name: name.to_string(),
        path: PathBuf::from(name),
        fingerprint: FileFingerprint {
            modified_time: Utc.timestamp_opt(secs, 0).unwrap(),
            size,
        },
        file_date: bondlake::adapter::outbound::discovery::date_from_file_name(name),
    }
}

fn bond(date: NaiveDate, cusip: String) -> UniverseRecord {
    UniverseRecord {
        date,
        cusip,
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

proptest! {
    #[test]
    fn touched_files_are_changed_and_untouched_files_are_not(
        files in proptest::collection::btree_map("[a-z]{1,8}", (0i64..1_000_000, 0u64..10_000, 0u8..3), 1..12),
    ) {
        let mut state = ProcessingState::default();
        let mut candidates = Vec::new();
        let mut expected_changed = BTreeSet::new();
        for (name, (secs, size, action)) in &files {
            let stored = candidate(name, *secs, *size);
            state.record(name.clone(), stored.fingerprint);
            let current = match action {
                // Same size, later modification time.
                0 => {
                    expected_changed.insert(name.clone());
                    candidate(name, secs + 1, *size)
                }
                1 => candidate(name, *secs, *size),
                // Same modification time, different size.
                _ => {
                    expected_changed.insert(name.clone());
                    candidate(name, *secs, size + 1)
                }
            };
            candidates.push(current);
        }

        let changes = change_set::resolve(candidates.clone(), &state, false);
        let changed: BTreeSet<String> = changes.to_process.iter().map(|f| f.name.clone()).collect();
        prop_assert_eq!(changed, expected_changed);
        prop_assert_eq!(changes.to_process.len() + changes.unchanged.len(), files.len());

        let forced = change_set::resolve(candidates, &state, true);
        prop_assert_eq!(forced.to_process.len(), files.len());
        prop_assert!(forced.unchanged.is_empty());
    }

    #[test]
    fn reprocessed_date_is_replaced_not_appended(old in 1usize..150, new in 0usize..150, other in 0usize..20) {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let next = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let mut existing: Vec<UniverseRecord> =
            (0..old).map(|i| bond(day, format!("OLD{i}"))).collect();
        existing.extend((0..other).map(|i| bond(next, format!("KEEP{i}"))));
        let fresh: Vec<UniverseRecord> = (0..new).map(|i| bond(day, format!("NEW{i}"))).collect();
        let file = candidate("universe_2024-01-02.csv", 10, 10);

        let merged = merge::merge(Some(existing), fresh, &[file], PartitionPolicy::FileDate).unwrap();
        let on_day = merged.rows.iter().filter(|r| r.date == day).count();
        prop_assert_eq!(on_day, new);
        prop_assert_eq!(merged.removed, old);
        prop_assert_eq!(merged.rows.len(), new + other);
        prop_assert!(merged.rows.iter().filter(|r| r.date == day).all(|r| r.cusip.starts_with("NEW")));
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 8, ..ProptestConfig::default() })]

    /// Whatever sequence of loads and refreshes runs, the table holds at most
    /// one row per natural key.
    #[test]
    fn table_never_holds_duplicate_keys(
        batches in proptest::collection::vec(
            (proptest::collection::vec((0u32..3, 0u32..4, 0u32..2, 0u32..24), 1..10), any::<bool>()),
            1..4,
        ),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let ws = Workspace::only(&[SourceKind::Runs]);

        for (index, (quotes, force)) in batches.iter().enumerate() {
            let lines: Vec<String> = quotes
                .iter()
                .map(|(day, bond, dealer, hour)| {
                    runs_line(
                        &format!("2024-01-0{}", day + 2),
                        &format!("{hour:02}:00"),
                        &format!("CUSIP{bond}"),
                        &format!("Dealer{dealer}"),
                        f64::from(*hour) + 50.0,
                        1e6,
                    )
                })
                .collect();
            let rows: Vec<&str> = lines.iter().map(String::as_str).collect();
            ws.write(SourceKind::Runs, &format!("runs_batch_{index}.csv"), &csv(RUNS_HEADER, &rows));

            let summary = runtime.block_on(ws.run_options(*force, false));
            prop_assert!(!summary.has_failures(), "{:?}", summary);
        }

        let db = ws.db();
        let distinct = db.texts(
            "SELECT DISTINCT date || '|' || cusip || '|' || dealer AS value FROM runs",
        );
        prop_assert_eq!(db.count("runs") as usize, distinct.len());
    }
}
