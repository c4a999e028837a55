//! Period-over-period changes and best quoted levels from dealer runs.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Days, Months, NaiveDate, NaiveTime};
use serde::Deserialize;
use tracing::debug;

use crate::domain::analytics::{BestLevel, MonitorRecord};
use crate::domain::record::RunsRecord;

/// Which quoted figure is tracked over time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorMetric {
    #[default]
    BidSpread,
    AskSpread,
    MidSpread,
}

impl MonitorMetric {
    fn of(self, row: &RunsRecord) -> Option<f64> {
        match self {
            Self::BidSpread => row.bid_spread,
            Self::AskSpread => row.ask_spread,
            Self::MidSpread => row.mid_spread(),
        }
    }
}

/// Parameters of a monitor run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorParams {
    /// Defaults to the latest date present in the data.
    pub as_of_date: Option<NaiveDate>,
    /// Quotes below this size are ignored for best levels.
    pub min_size_threshold: f64,
    pub metric: MonitorMetric,
}

/// Reference dates the as-of level is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceDates {
    pub day: NaiveDate,
    pub week: NaiveDate,
    pub month: NaiveDate,
    pub quarter: NaiveDate,
    pub year: NaiveDate,
    pub one_year: NaiveDate,
}

impl ReferenceDates {
    /// Month, quarter and year references are the day before the period
    /// starts, so changes read as month-, quarter- and year-to-date.
    #[must_use]
    pub fn for_date(as_of: NaiveDate) -> Self {
        let before = |d: NaiveDate| d.pred_opt().unwrap_or(d);
        let month_start = as_of.with_day(1).unwrap_or(as_of);
        let quarter_month = (as_of.month() - 1) / 3 * 3 + 1;
        let quarter_start = NaiveDate::from_ymd_opt(as_of.year(), quarter_month, 1).unwrap_or(as_of);
        let year_start = NaiveDate::from_ymd_opt(as_of.year(), 1, 1).unwrap_or(as_of);

        Self {
            day: before(as_of),
            week: as_of.checked_sub_days(Days::new(7)).unwrap_or(as_of),
            month: before(month_start),
            quarter: before(quarter_start),
            year: before(year_start),
            one_year: as_of.checked_sub_months(Months::new(12)).unwrap_or(as_of),
        }
    }
}

/// Daily level of one instrument: the latest observation of each date.
struct LevelHistory {
    by_date: BTreeMap<NaiveDate, (NaiveTime, f64)>,
}

impl LevelHistory {
    fn build(rows: &[&RunsRecord], metric: MonitorMetric) -> Self {
        let mut by_date: BTreeMap<NaiveDate, (NaiveTime, f64)> = BTreeMap::new();
        for row in rows {
            let Some(value) = metric.of(row) else {
                continue;
            };
            by_date
                .entry(row.date)
                .and_modify(|current| {
                    if row.time >= current.0 {
                        *current = (row.time, value);
                    }
                })
                .or_insert((row.time, value));
        }
        Self { by_date }
    }

    fn on_or_before(&self, date: NaiveDate) -> Option<f64> {
        self.by_date
            .range(..=date)
            .next_back()
            .map(|(_, (_, value))| *value)
    }
}

fn change(level: Option<f64>, reference: Option<f64>) -> Option<f64> {
    Some(level? - reference?)
}

/// Best bid: lowest bid spread (highest price). Best ask: highest ask spread
/// (lowest price). Ties go to the larger size, then the dealer name.
fn best_level<F>(rows: &[&RunsRecord], min_size: f64, side: F, lower_is_better: bool) -> Option<BestLevel>
where
    F: Fn(&RunsRecord) -> (Option<f64>, Option<f64>),
{
    rows.iter()
        .filter_map(|row| {
            let (spread, size) = side(row);
            let spread = spread?;
            let size = size.filter(|s| *s >= min_size)?;
            Some(BestLevel {
                spread,
                size: Some(size),
                dealer: row.dealer.clone(),
            })
        })
        .min_by(|a, b| {
            let by_spread = if lower_is_better {
                a.spread.total_cmp(&b.spread)
            } else {
                b.spread.total_cmp(&a.spread)
            };
            by_spread
                .then_with(|| {
                    b.size
                        .unwrap_or(0.0)
                        .total_cmp(&a.size.unwrap_or(0.0))
                })
                .then_with(|| a.dealer.cmp(&b.dealer))
        })
}

/// Compute monitor records for every instrument with a level on or before
/// the as-of date.
#[must_use]
pub fn monitor(rows: &[RunsRecord], params: &MonitorParams) -> Vec<MonitorRecord> {
    let Some(as_of) = params
        .as_of_date
        .or_else(|| rows.iter().map(|r| r.date).max())
    else {
        return Vec::new();
    };
    let refs = ReferenceDates::for_date(as_of);

    let mut by_cusip: BTreeMap<&str, Vec<&RunsRecord>> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.date <= as_of) {
        by_cusip.entry(row.cusip.as_str()).or_default().push(row);
    }

    let mut records = Vec::with_capacity(by_cusip.len());
    for (cusip, quotes) in by_cusip {
        let history = LevelHistory::build(&quotes, params.metric);
        let level = history.on_or_before(as_of);
        if level.is_none() {
            continue;
        }

        let today: Vec<&RunsRecord> = quotes.iter().copied().filter(|r| r.date == as_of).collect();
        let dealers: BTreeSet<&str> = today.iter().map(|r| r.dealer.as_str()).collect();
        let security = quotes
            .iter()
            .filter(|r| r.security.is_some())
            .max_by_key(|r| (r.date, r.time))
            .and_then(|r| r.security.clone());

        records.push(MonitorRecord {
            cusip: cusip.to_string(),
            security,
            as_of_date: as_of,
            level,
            day_change: change(level, history.on_or_before(refs.day)),
            week_change: change(level, history.on_or_before(refs.week)),
            month_change: change(level, history.on_or_before(refs.month)),
            quarter_change: change(level, history.on_or_before(refs.quarter)),
            year_change: change(level, history.on_or_before(refs.year)),
            one_year_change: change(level, history.on_or_before(refs.one_year)),
            best_bid: best_level(
                &today,
                params.min_size_threshold,
                |r| (r.bid_spread, r.bid_size),
                true,
            ),
            best_ask: best_level(
                &today,
                params.min_size_threshold,
                |r| (r.ask_spread, r.ask_size),
                false,
            ),
            dealer_count: dealers.len() as i64,
        });
    }

    debug!(%as_of, instruments = records.len(), "Computed runs monitor");
    records
}
