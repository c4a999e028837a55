//! Derived analytics records. Regenerated wholesale on every run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::record::Record;
use super::value::Value;

/// One observation of a long-format time series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub instrument: String,
    pub value: f64,
}

/// Relative-value statistics for one unordered instrument pair.
///
/// The spread is `instrument_1 - instrument_2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairAnalysisRecord {
    pub instrument_1: String,
    pub instrument_2: String,
    pub observations: i64,
    pub last_spread: f64,
    pub z_score: Option<f64>,
    pub percentile: f64,
    pub max: f64,
    pub min: f64,
    pub last_vs_max: f64,
    pub last_vs_min: f64,
}

impl Record for PairAnalysisRecord {
    const COLUMNS: &'static [&'static str] = &[
        "instrument_1",
        "instrument_2",
        "observations",
        "last_spread",
        "z_score",
        "percentile",
        "max",
        "min",
        "last_vs_max",
        "last_vs_min",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            self.instrument_1.as_str().into(),
            self.instrument_2.as_str().into(),
            self.observations.into(),
            self.last_spread.into(),
            self.z_score.into(),
            self.percentile.into(),
            self.max.into(),
            self.min.into(),
            self.last_vs_max.into(),
            self.last_vs_min.into(),
        ]
    }
}

/// Best quote seen for one side of the market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestLevel {
    pub spread: f64,
    pub size: Option<f64>,
    pub dealer: String,
}

/// Period-over-period changes and best levels for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorRecord {
    pub cusip: String,
    pub security: Option<String>,
    pub as_of_date: NaiveDate,
    pub level: Option<f64>,
    pub day_change: Option<f64>,
    pub week_change: Option<f64>,
    pub month_change: Option<f64>,
    pub quarter_change: Option<f64>,
    pub year_change: Option<f64>,
    pub one_year_change: Option<f64>,
    pub best_bid: Option<BestLevel>,
    pub best_ask: Option<BestLevel>,
    pub dealer_count: i64,
}

impl Record for MonitorRecord {
    const COLUMNS: &'static [&'static str] = &[
        "cusip",
        "security",
        "as_of_date",
        "level",
        "day_change",
        "week_change",
        "month_change",
        "quarter_change",
        "year_change",
        "one_year_change",
        "best_bid_spread",
        "best_bid_size",
        "best_bid_dealer",
        "best_ask_spread",
        "best_ask_size",
        "best_ask_dealer",
        "dealer_count",
    ];

    fn values(&self) -> Vec<Value> {
        let bid = self.best_bid.as_ref();
        let ask = self.best_ask.as_ref();
        vec![
            self.cusip.as_str().into(),
            self.security.clone().into(),
            self.as_of_date.into(),
            self.level.into(),
            self.day_change.into(),
            self.week_change.into(),
            self.month_change.into(),
            self.quarter_change.into(),
            self.year_change.into(),
            self.one_year_change.into(),
            bid.map(|b| b.spread).into(),
            bid.and_then(|b| b.size).into(),
            bid.map(|b| b.dealer.clone()).into(),
            ask.map(|a| a.spread).into(),
            ask.and_then(|a| a.size).into(),
            ask.map(|a| a.dealer.clone()).into(),
            self.dealer_count.into(),
        ]
    }
}
