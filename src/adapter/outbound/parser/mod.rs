//! CSV parsers for the raw source exports.
//!
//! Export vintages disagree on column names, so headers are cleaned and matched
//! against per-field alias lists. Each source supplies a [`RowLayout`] that
//! binds its fields to header positions once per file and then builds records
//! row by row; [`CsvParser`] drives the file reading for all of them.

mod g_spread;
mod portfolio;
mod runs;
mod universe;

use std::collections::HashMap;
use std::marker::PhantomData;

use chrono::{NaiveDate, NaiveTime};
use csv::StringRecord;
use tracing::{debug, warn};

pub use g_spread::GSpreadLayout;
pub use portfolio::PortfolioLayout;
pub use runs::RunsLayout;
pub use universe::UniverseLayout;

use crate::domain::fingerprint::FileCandidate;
use crate::domain::record::SourceRecord;
use crate::error::{ParseError, Result};
use crate::port::outbound::parser::SourceParser;

pub type UniverseParser = CsvParser<UniverseLayout>;
pub type PortfolioParser = CsvParser<PortfolioLayout>;
pub type RunsParser = CsvParser<RunsLayout>;
pub type GSpreadParser = CsvParser<GSpreadLayout>;

pub(crate) const DATE: &[&str] = &["date", "as_of_date", "asof_date", "trade_date", "pricing_date"];
pub(crate) const CUSIP: &[&str] = &["cusip", "cusip_id", "id_cusip", "security_id"];
pub(crate) const SECURITY: &[&str] = &[
    "security",
    "security_name",
    "security_description",
    "description",
    "bond",
    "name",
];

/// Normalize a header: trimmed, lower-cased, runs of non-alphanumerics
/// collapsed to a single `_`, no leading or trailing `_`.
#[must_use]
pub fn clean_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Where a file's rows get their calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateColumn {
    Column(usize),
    FileName(NaiveDate),
}

/// Cleaned header names of one file and their positions.
pub struct Columns<'a> {
    file: &'a FileCandidate,
    by_name: HashMap<String, usize>,
}

impl<'a> Columns<'a> {
    #[must_use]
    pub fn new(file: &'a FileCandidate, headers: &StringRecord) -> Self {
        let mut by_name = HashMap::with_capacity(headers.len());
        for (index, header) in headers.iter().enumerate() {
            // First occurrence wins when a cleaned name repeats.
            by_name.entry(clean_header(header)).or_insert(index);
        }
        Self { file, by_name }
    }

    /// Position of the first alias present in the header.
    #[must_use]
    pub fn find(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|a| self.by_name.get(*a).copied())
    }

    /// Like [`Columns::find`], but a missing column rejects the file.
    ///
    /// # Errors
    /// Returns a [`ParseError`] naming the field and the aliases tried.
    pub fn require(&self, field: &str, aliases: &[&str]) -> Result<usize, ParseError> {
        self.find(aliases).ok_or_else(|| {
            ParseError::new(
                &self.file.path,
                format!(
                    "missing required column '{field}' (looked for {})",
                    aliases.join(", ")
                ),
            )
        })
    }

    /// The date column, falling back to the date in the file name.
    ///
    /// # Errors
    /// Returns a [`ParseError`] when neither is available.
    pub fn date(&self) -> Result<DateColumn, ParseError> {
        if let Some(index) = self.find(DATE) {
            return Ok(DateColumn::Column(index));
        }
        self.file.file_date.map(DateColumn::FileName).ok_or_else(|| {
            ParseError::new(
                &self.file.path,
                "no date column and no date in the file name",
            )
        })
    }
}

/// Typed access to the cells of one CSV row.
pub struct Row<'r> {
    record: &'r StringRecord,
}

const PLACEHOLDERS: &[&str] = &["n/a", "#n/a", "na", "nan", "null", "-", "--"];

impl<'r> Row<'r> {
    fn cell(&self, index: Option<usize>) -> Option<&'r str> {
        let raw = self.record.get(index?)?.trim();
        let empty = raw.is_empty() || PLACEHOLDERS.iter().any(|p| raw.eq_ignore_ascii_case(p));
        (!empty).then_some(raw)
    }

    /// Non-empty text.
    #[must_use]
    pub fn text(&self, index: Option<usize>) -> Option<String> {
        self.cell(index).map(ToString::to_string)
    }

    /// Text of a column that is part of the key. Empty when blank.
    #[must_use]
    pub fn key_text(&self, index: usize) -> String {
        self.cell(Some(index)).unwrap_or_default().to_string()
    }

    /// A number, tolerating thousands separators, currency and percent
    /// signs, and accounting-style negatives.
    #[must_use]
    pub fn number(&self, index: Option<usize>) -> Option<f64> {
        let raw = self.cell(index)?;
        let (negative, body) = match raw.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
            Some(inner) => (true, inner),
            None => (false, raw),
        };
        let cleaned: String = body
            .chars()
            .filter(|c| !matches!(c, ',' | '$' | '%' | ' '))
            .collect();
        let value: f64 = cleaned.parse().ok()?;
        value.is_finite().then_some(if negative { -value } else { value })
    }

    #[must_use]
    pub fn date(&self, index: Option<usize>) -> Option<NaiveDate> {
        parse_date(self.cell(index)?)
    }

    #[must_use]
    pub fn date_of(&self, column: DateColumn) -> Option<NaiveDate> {
        match column {
            DateColumn::Column(index) => self.date(Some(index)),
            DateColumn::FileName(date) => Some(date),
        }
    }

    #[must_use]
    pub fn time(&self, index: usize) -> Option<NaiveTime> {
        parse_time(self.cell(Some(index))?)
    }
}

// Two-digit years are tried before four-digit ones, which would also accept them.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%Y%m%d", "%d-%b-%Y", "%Y/%m/%d"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M:%S %p", "%I:%M %p", "%H:%M:%S%.f"];

/// Parse a date cell. A trailing time part is ignored.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = match (raw.get(..10), raw.get(10..11)) {
        (Some(head), Some("T" | " ")) => head,
        _ => raw.split(' ').next().unwrap_or(raw),
    };
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(day, f).ok())
}

/// Parse a time cell. A leading date part is ignored.
#[must_use]
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    let clock = match raw.split_once(['T', ' ']) {
        // "2024-01-02 14:30:00" but not "2:30 PM".
        Some((head, tail)) if parse_date(head).is_some() => tail.trim(),
        _ => raw,
    };
    TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(clock, f).ok())
}

/// Field positions of one source, resolved from a file's header.
pub trait RowLayout: Sized {
    type Record: SourceRecord;

    /// Bind fields to header positions.
    ///
    /// # Errors
    /// Returns a [`ParseError`] when a required column is missing.
    fn bind(columns: &Columns<'_>) -> Result<Self, ParseError>;

    /// Build one record, or `None` when the row lacks a usable date or time.
    fn build(&self, row: &Row<'_>) -> Option<Self::Record>;
}

/// CSV parser for the source described by `L`.
pub struct CsvParser<L> {
    _layout: PhantomData<fn() -> L>,
}

impl<L> CsvParser<L> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _layout: PhantomData,
        }
    }
}

impl<L> Default for CsvParser<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: RowLayout> SourceParser<L::Record> for CsvParser<L> {
    fn parse(&self, file: &FileCandidate) -> Result<Vec<L::Record>, ParseError> {
        let fail = |e: csv::Error| ParseError::new(&file.path, e.to_string());
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&file.path)
            .map_err(fail)?;

        let headers = reader.headers().map_err(fail)?.clone();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ParseError::new(&file.path, "file has no header row"));
        }
        let layout = L::bind(&Columns::new(file, &headers))?;

        let mut rows = Vec::new();
        let mut rejected = 0usize;
        for record in reader.records() {
            let record = record.map_err(fail)?;
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            match layout.build(&Row { record: &record }) {
                Some(row) => rows.push(row),
                None => rejected += 1,
            }
        }

        if rejected > 0 {
            warn!(file = %file.name, rejected, "Dropped rows without a usable date or time");
        }
        debug!(file = %file.name, rows = rows.len(), "Parsed rows");
        Ok(rows)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::fingerprint::FileFingerprint;
    use chrono::Utc;
    use std::path::Path;

    /// Write `content` to `dir/name` and describe it as a candidate.
    pub(crate) fn candidate(dir: &Path, name: &str, content: &str) -> FileCandidate {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        FileCandidate {
            name: name.to_string(),
            path,
            fingerprint: FileFingerprint {
                modified_time: Utc::now(),
                size: content.len() as u64,
            },
            file_date: crate::adapter::outbound::discovery::date_from_file_name(name),
        }
    }

    #[test]
    fn headers_are_cleaned() {
        assert_eq!(clean_header("  Bid Spread "), "bid_spread");
        assert_eq!(clean_header("G-Sprd (bp)"), "g_sprd_bp");
        assert_eq!(clean_header("\u{feff}Date"), "date");
        assert_eq!(clean_header("# Bid Sz"), "bid_sz");
        assert_eq!(clean_header("CUSIP"), "cusip");
    }

    #[test]
    fn cells_parse_loosely() {
        let record = StringRecord::from(vec!["1,000,000", "(12.5)", "#N/A", " 95 ", "12/29/2023", "2:30 PM"]);
        let row = Row { record: &record };
        assert_eq!(row.number(Some(0)), Some(1_000_000.0));
        assert_eq!(row.number(Some(1)), Some(-12.5));
        assert_eq!(row.number(Some(2)), None);
        assert_eq!(row.number(Some(3)), Some(95.0));
        assert_eq!(row.number(Some(9)), None);
        assert_eq!(row.date(Some(4)), NaiveDate::from_ymd_opt(2023, 12, 29));
        assert_eq!(row.time(5), NaiveTime::from_hms_opt(14, 30, 0));
    }

    #[test]
    fn dates_and_times_accept_timestamps() {
        assert_eq!(parse_date("2024-01-02 00:00:00"), NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(parse_time("2024-01-02 14:05:09"), NaiveTime::from_hms_opt(14, 5, 9));
        assert_eq!(parse_time("09:15"), NaiveTime::from_hms_opt(9, 15, 0));
        assert_eq!(parse_date("soon"), None);
    }
}
