//! Normalized, fixed-shape records for each source.
//!
//! Spreadsheet exports vary in which columns they carry. Parsers map every
//! vintage onto these structs; optional fields stay `None` when a vintage
//! lacks the column.

use chrono::{NaiveDate, NaiveTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::source::SourceKind;
use super::value::Value;

/// A row that can be written column-by-column to a relational table.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Column names in storage order. `values()` yields cells in the same order.
    const COLUMNS: &'static [&'static str];

    fn values(&self) -> Vec<Value>;
}

/// A record produced by ingesting one of the raw sources.
pub trait SourceRecord: Record {
    const SOURCE: SourceKind;

    /// Calendar date of the observation. Doubles as the partition key.
    fn date(&self) -> NaiveDate;

    fn cusip(&self) -> &str;

    fn set_cusip(&mut self, cusip: String);
}

/// Instrument reference data, one row per bond per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseRecord {
    pub date: NaiveDate,
    pub cusip: String,
    pub security: Option<String>,
    pub ticker: Option<String>,
    pub sector: Option<String>,
    pub currency: Option<String>,
    pub rating: Option<String>,
    pub maturity: Option<NaiveDate>,
    pub coupon: Option<f64>,
    pub amount_outstanding: Option<f64>,
    pub g_spread: Option<f64>,
    pub oas: Option<f64>,
}

impl Record for UniverseRecord {
    const COLUMNS: &'static [&'static str] = &[
        "date",
        "cusip",
        "security",
        "ticker",
        "sector",
        "currency",
        "rating",
        "maturity",
        "coupon",
        "amount_outstanding",
        "g_spread",
        "oas",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            self.date.into(),
            self.cusip.as_str().into(),
            self.security.clone().into(),
            self.ticker.clone().into(),
            self.sector.clone().into(),
            self.currency.clone().into(),
            self.rating.clone().into(),
            self.maturity.into(),
            self.coupon.into(),
            self.amount_outstanding.into(),
            self.g_spread.into(),
            self.oas.into(),
        ]
    }
}

impl SourceRecord for UniverseRecord {
    const SOURCE: SourceKind = SourceKind::Universe;

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn cusip(&self) -> &str {
        &self.cusip
    }

    fn set_cusip(&mut self, cusip: String) {
        self.cusip = cusip;
    }
}

/// A holding of one bond in one account/portfolio on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRecord {
    pub date: NaiveDate,
    pub cusip: String,
    pub account: String,
    pub portfolio: String,
    pub security: Option<String>,
    pub quantity: Option<f64>,
    pub market_value: Option<f64>,
    pub oas: Option<f64>,
    pub duration: Option<f64>,
}

impl Record for PortfolioRecord {
    const COLUMNS: &'static [&'static str] = &[
        "date",
        "cusip",
        "account",
        "portfolio",
        "security",
        "quantity",
        "market_value",
        "oas",
        "duration",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            self.date.into(),
            self.cusip.as_str().into(),
            self.account.as_str().into(),
            self.portfolio.as_str().into(),
            self.security.clone().into(),
            self.quantity.into(),
            self.market_value.into(),
            self.oas.into(),
            self.duration.into(),
        ]
    }
}

impl SourceRecord for PortfolioRecord {
    const SOURCE: SourceKind = SourceKind::Portfolio;

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn cusip(&self) -> &str {
        &self.cusip
    }

    fn set_cusip(&mut self, cusip: String) {
        self.cusip = cusip;
    }
}

/// A dealer quote observed at a point in the trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunsRecord {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub cusip: String,
    pub dealer: String,
    pub security: Option<String>,
    pub benchmark: Option<String>,
    pub bid_spread: Option<f64>,
    pub ask_spread: Option<f64>,
    pub bid_size: Option<f64>,
    pub ask_size: Option<f64>,
    pub bid_price: Option<f64>,
    pub ask_price: Option<f64>,
}

impl RunsRecord {
    #[must_use]
    pub fn mid_spread(&self) -> Option<f64> {
        match (self.bid_spread, self.ask_spread) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        }
    }
}

impl Record for RunsRecord {
    const COLUMNS: &'static [&'static str] = &[
        "date",
        "time",
        "cusip",
        "dealer",
        "security",
        "benchmark",
        "bid_spread",
        "ask_spread",
        "bid_size",
        "ask_size",
        "bid_price",
        "ask_price",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            self.date.into(),
            self.time.into(),
            self.cusip.as_str().into(),
            self.dealer.as_str().into(),
            self.security.clone().into(),
            self.benchmark.clone().into(),
            self.bid_spread.into(),
            self.ask_spread.into(),
            self.bid_size.into(),
            self.ask_size.into(),
            self.bid_price.into(),
            self.ask_price.into(),
        ]
    }
}

impl SourceRecord for RunsRecord {
    const SOURCE: SourceKind = SourceKind::Runs;

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn cusip(&self) -> &str {
        &self.cusip
    }

    fn set_cusip(&mut self, cusip: String) {
        self.cusip = cusip;
    }
}

/// One point of a bond's G-spread history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GSpreadRecord {
    pub date: NaiveDate,
    pub cusip: String,
    pub security: String,
    pub g_spread: Option<f64>,
}

impl Record for GSpreadRecord {
    const COLUMNS: &'static [&'static str] = &["date", "cusip", "security", "g_spread"];

    fn values(&self) -> Vec<Value> {
        vec![
            self.date.into(),
            self.cusip.as_str().into(),
            self.security.as_str().into(),
            self.g_spread.into(),
        ]
    }
}

impl SourceRecord for GSpreadRecord {
    const SOURCE: SourceKind = SourceKind::GSpread;

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn cusip(&self) -> &str {
        &self.cusip
    }

    fn set_cusip(&mut self, cusip: String) {
        self.cusip = cusip;
    }
}
