//! Database model types for Diesel ORM.

use chrono::{NaiveDate, NaiveTime};
use diesel::prelude::*;

use super::schema::{g_spread, runs};
use crate::domain::record::RunsRecord;
use crate::domain::value::{DATE_FORMAT, TIME_FORMAT};
use crate::error::{Error, Result};

/// Database row for a dealer quote.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = runs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RunsRow {
    pub date: String,
    pub time: String,
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

/// Database row for one G-spread observation.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = g_spread)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GSpreadRow {
    pub date: String,
    pub security: String,
    #[diesel(column_name = spread_value)]
    pub g_spread: Option<f64>,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| Error::Database(format!("bad stored date '{raw}': {e}")))
}

fn parse_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .map_err(|e| Error::Database(format!("bad stored time '{raw}': {e}")))
}

impl TryFrom<RunsRow> for RunsRecord {
    type Error = Error;

    fn try_from(row: RunsRow) -> Result<Self> {
        Ok(Self {
            date: parse_date(&row.date)?,
            time: parse_time(&row.time)?,
            cusip: row.cusip,
            dealer: row.dealer,
            security: row.security,
            benchmark: row.benchmark,
            bid_spread: row.bid_spread,
            ask_spread: row.ask_spread,
            bid_size: row.bid_size,
            ask_size: row.ask_size,
            bid_price: row.bid_price,
            ask_price: row.ask_price,
        })
    }
}
