//! Dealer runs: intraday quotes, several per bond and dealer per day.

use super::{Columns, DateColumn, Row, RowLayout, CUSIP, SECURITY};
use crate::domain::record::RunsRecord;
use crate::error::ParseError;

#[derive(Debug, Clone)]
pub struct RunsLayout {
    date: DateColumn,
    time: usize,
    cusip: usize,
    dealer: usize,
    security: Option<usize>,
    benchmark: Option<usize>,
    bid_spread: Option<usize>,
    ask_spread: Option<usize>,
    bid_size: Option<usize>,
    ask_size: Option<usize>,
    bid_price: Option<usize>,
    ask_price: Option<usize>,
}

impl RowLayout for RunsLayout {
    type Record = RunsRecord;

    fn bind(columns: &Columns<'_>) -> Result<Self, ParseError> {
        Ok(Self {
            date: columns.date()?,
            // Quotes of the same bond and dealer are ordered by time.
            time: columns.require("time", &["time", "quote_time", "timestamp", "time_stamp"])?,
            cusip: columns.require("cusip", CUSIP)?,
            dealer: columns.require("dealer", &["dealer", "dealer_name", "broker", "source"])?,
            security: columns.find(SECURITY),
            benchmark: columns.find(&["benchmark", "bench", "benchmark_name"]),
            bid_spread: columns.find(&["bid_spread", "bid_spd", "bid_sprd"]),
            ask_spread: columns.find(&["ask_spread", "ask_spd", "ask_sprd", "offer_spread"]),
            bid_size: columns.find(&["bid_size", "bid_sz"]),
            ask_size: columns.find(&["ask_size", "ask_sz", "offer_size"]),
            bid_price: columns.find(&["bid_price", "bid_px"]),
            ask_price: columns.find(&["ask_price", "ask_px", "offer_price"]),
        })
    }

    fn build(&self, row: &Row<'_>) -> Option<RunsRecord> {
        Some(RunsRecord {
            date: row.date_of(self.date)?,
            time: row.time(self.time)?,
            cusip: row.key_text(self.cusip),
            dealer: row.key_text(self.dealer),
            security: row.text(self.security),
            benchmark: row.text(self.benchmark),
            bid_spread: row.number(self.bid_spread),
            ask_spread: row.number(self.ask_spread),
            bid_size: row.number(self.bid_size),
            ask_size: row.number(self.ask_size),
            bid_price: row.number(self.bid_price),
            ask_price: row.number(self.ask_price),
        })
    }
}
