//! Collapse rows sharing a natural key down to the most recent observation.
//!
//! Conflicting observations are never blended. For each natural key exactly
//! one input row survives unchanged:
//!
//! 1. the row with the greatest recency value wins;
//! 2. on equal recency (or no recency column) the row appearing later in the
//!    input wins. Inputs are ordered persisted rows first, then new files in
//!    modification order, so the newest file wins.
//!
//! Output is sorted by natural key, so repeated calls on the same input give
//! identical output.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{debug, warn};

use crate::domain::key::{KeySpec, NaturalKey};
use crate::domain::record::Record;
use crate::domain::value::Value;

/// Deduplicated rows and how many were discarded.
#[derive(Debug, Clone)]
pub struct Deduplicated<R> {
    pub rows: Vec<R>,
    pub duplicates: usize,
}

struct Winner {
    index: usize,
    recency: Value,
}

/// Keep one row per natural key: the most recent.
#[must_use]
pub fn resolve<R: Record>(rows: Vec<R>, spec: &KeySpec) -> Deduplicated<R> {
    let total = rows.len();
    let mut winners: HashMap<NaturalKey, Winner> = HashMap::with_capacity(total);

    for (index, row) in rows.iter().enumerate() {
        let values = row.values();
        let recency = spec.recency_of(&values).clone();
        let key = spec.key_of(&values);

        match winners.get_mut(&key) {
            Some(current) => {
                // Later rows win ties, so `>=` rather than `>`.
                if recency.total_cmp(&current.recency) != Ordering::Less {
                    current.index = index;
                    current.recency = recency;
                }
            }
            None => {
                winners.insert(key, Winner { index, recency });
            }
        }
    }

    let mut keep: Vec<(NaturalKey, usize)> = winners
        .into_iter()
        .map(|(key, winner)| (key, winner.index))
        .collect();
    keep.sort_by(|(a, _), (b, _)| KeySpec::compare_keys(a, b));

    let mut slots: Vec<Option<R>> = rows.into_iter().map(Some).collect();
    let deduped: Vec<R> = keep
        .into_iter()
        .filter_map(|(_, index)| slots[index].take())
        .collect();

    let duplicates = total - deduped.len();
    if duplicates > 0 {
        warn!(
            duplicates,
            total,
            key = ?spec.columns(),
            recency = spec.recency_column().unwrap_or("input order"),
            "Discarded duplicate natural keys"
        );
    } else {
        debug!(total, "No duplicate natural keys");
    }

    Deduplicated {
        rows: deduped,
        duplicates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{RunsRecord, UniverseRecord};
    use chrono::{NaiveDate, NaiveTime};
    use proptest::prelude::*;

    fn quote(cusip: &str, dealer: &str, h: u32, m: u32, spread: f64) -> RunsRecord {
        RunsRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            time: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
            cusip: cusip.to_string(),
            dealer: dealer.to_string(),
            security: None,
            benchmark: None,
            bid_spread: Some(spread),
            ask_spread: None,
            bid_size: None,
            ask_size: None,
            bid_price: None,
            ask_price: None,
        }
    }

    fn runs_spec() -> KeySpec {
        KeySpec::from_static::<RunsRecord>(&["date", "cusip", "dealer"], Some("time")).unwrap()
    }

    #[test]
    fn latest_timestamp_wins() {
        let rows = vec![
            quote("ABC123", "DealerX", 9, 0, 100.0),
            quote("ABC123", "DealerX", 14, 30, 95.0),
        ];
        let out = resolve(rows, &runs_spec());
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].bid_spread, Some(95.0));
        assert_eq!(out.duplicates, 1);
    }

    #[test]
    fn latest_timestamp_wins_in_reverse_order() {
        let rows = vec![
            quote("ABC123", "DealerX", 14, 30, 95.0),
            quote("ABC123", "DealerX", 9, 0, 100.0),
        ];
        let out = resolve(rows, &runs_spec());
        assert_eq!(out.rows[0].bid_spread, Some(95.0));
    }

    #[test]
    fn values_are_never_blended() {
        let rows = vec![
            quote("ABC123", "DealerX", 9, 0, 100.0),
            quote("ABC123", "DealerX", 10, 0, 50.0),
            quote("ABC123", "DealerX", 11, 0, 80.0),
        ];
        let out = resolve(rows, &runs_spec());
        assert_eq!(out.rows[0].bid_spread, Some(80.0));
        assert_eq!(out.duplicates, 2);
    }

    #[test]
    fn distinct_dealers_are_not_duplicates() {
        let rows = vec![
            quote("ABC123", "DealerX", 9, 0, 100.0),
            quote("ABC123", "DealerY", 9, 0, 101.0),
        ];
        let out = resolve(rows, &runs_spec());
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.duplicates, 0);
    }

    #[test]
    fn equal_recency_keeps_later_row() {
        let rows = vec![
            quote("ABC123", "DealerX", 9, 0, 100.0),
            quote("ABC123", "DealerX", 9, 0, 99.0),
        ];
        let out = resolve(rows, &runs_spec());
        assert_eq!(out.rows[0].bid_spread, Some(99.0));
    }

    #[test]
    fn without_recency_column_later_row_wins() {
        let spec = KeySpec::from_static::<UniverseRecord>(&["date", "cusip"], None).unwrap();
        let mut first = UniverseRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            cusip: "A".into(),
            security: Some("old".into()),
            ticker: None,
            sector: None,
            currency: None,
            rating: None,
            maturity: None,
            coupon: None,
            amount_outstanding: None,
            g_spread: None,
            oas: None,
        };
        let mut second = first.clone();
        second.security = Some("new".into());
        first.coupon = Some(1.0);
        let out = resolve(vec![first, second], &spec);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].security.as_deref(), Some("new"));
    }

    #[test]
    fn output_is_sorted_by_key() {
        let rows = vec![
            quote("ZZZ", "D", 9, 0, 1.0),
            quote("AAA", "D", 9, 0, 2.0),
            quote("MMM", "D", 9, 0, 3.0),
        ];
        let out = resolve(rows, &runs_spec());
        let cusips: Vec<_> = out.rows.iter().map(|r| r.cusip.as_str()).collect();
        assert_eq!(cusips, ["AAA", "MMM", "ZZZ"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            .. ProptestConfig::default()
        })]

        #[test]
        fn recency_wins_regardless_of_order(
            minutes in proptest::collection::hash_set(0u32..600, 2..12),
            seed in any::<u64>(),
        ) {
            let minutes: Vec<u32> = minutes.into_iter().collect();
            let latest = *minutes.iter().max().unwrap();
            let mut rows: Vec<_> = minutes
                .iter()
                .map(|m| quote("ABC123", "DealerX", 8 + m / 60, m % 60, f64::from(*m)))
                .collect();
            let len = rows.len();
            rows.rotate_left((seed as usize) % len);

            let out = resolve(rows, &runs_spec());
            prop_assert_eq!(out.rows.len(), 1);
            prop_assert_eq!(out.duplicates, len - 1);
            prop_assert_eq!(out.rows[0].bid_spread, Some(f64::from(latest)));
        }

        #[test]
        fn repeated_calls_are_identical(
            entries in proptest::collection::vec((0usize..4, 0usize..3, 0u32..120), 0..40),
        ) {
            let cusips = ["A", "B", "C", "D"];
            let dealers = ["X", "Y", "Z"];
            let rows: Vec<_> = entries
                .iter()
                .map(|(c, d, m)| quote(cusips[*c], dealers[*d], 9 + m / 60, m % 60, f64::from(*m)))
                .collect();
            let first = resolve(rows.clone(), &runs_spec());
            let second = resolve(rows, &runs_spec());
            prop_assert_eq!(first.rows, second.rows);
            prop_assert_eq!(first.duplicates, second.duplicates);
        }
    }
}
