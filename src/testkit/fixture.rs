//! Raw export fixtures.
//!
//! Headers follow the common desk vintages so the files exercise the alias
//! matching rather than the canonical column names.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::source::SourceKind;

use super::config::raw_dir;

pub const UNIVERSE_HEADER: &str = "Date,CUSIP,Security,Ticker,Sector,Currency,Rating,Maturity,Coupon,Amt Outstanding,G Spread,OAS";
pub const PORTFOLIO_HEADER: &str = "Date,CUSIP,Security,Account,Portfolio,Quantity,Market Value,OAS,Duration";
pub const RUNS_HEADER: &str = "Date,Time,CUSIP,Dealer,Security,Benchmark,Bid Spread,Ask Spread,Bid Size,Ask Size,Bid Price,Ask Price";
pub const G_SPREAD_HEADER: &str = "Date,CUSIP,Security,G Spread";

/// Join a header and data lines into CSV text.
#[must_use]
pub fn csv(header: &str, rows: &[&str]) -> String {
    let mut out = String::from(header);
    out.push('\n');
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
    out
}

/// Write a raw export for `kind` under `root`, creating the directory.
///
/// # Panics
/// Panics if the file cannot be written.
pub fn write_raw(root: &Path, kind: SourceKind, name: &str, content: &str) -> PathBuf {
    let dir = raw_dir(root, kind);
    fs::create_dir_all(&dir).expect("create raw dir");
    let path = dir.join(name);
    fs::write(&path, content).expect("write raw file");
    path
}

/// One dealer quote line in [`RUNS_HEADER`] order.
#[must_use]
pub fn runs_line(date: &str, time: &str, cusip: &str, dealer: &str, bid_spread: f64, bid_size: f64) -> String {
    format!("{date},{time},{cusip},{dealer},,,{bid_spread},,{bid_size},,,")
}

/// One G-spread observation line in [`G_SPREAD_HEADER`] order.
#[must_use]
pub fn g_spread_line(date: &str, cusip: &str, security: &str, g_spread: f64) -> String {
    format!("{date},{cusip},{security},{g_spread}")
}

/// A G-spread export with `days` consecutive daily observations for each
/// `(cusip, security, base, slope)` instrument.
#[must_use]
pub fn g_spread_history(days: u32, instruments: &[(&str, &str, f64, f64)]) -> String {
    let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
    let mut lines = Vec::new();
    for day in 0..days {
        let date = start + chrono::Duration::days(i64::from(day));
        for (cusip, security, base, slope) in instruments {
            // A little curvature so the series are not perfectly collinear.
            let wobble = f64::from(day % 3) * 0.5;
            let value = base + slope * f64::from(day) + wobble;
            lines.push(g_spread_line(&date.format("%Y-%m-%d").to_string(), cusip, security, value));
        }
    }
    let rows: Vec<&str> = lines.iter().map(String::as_str).collect();
    csv(G_SPREAD_HEADER, &rows)
}
