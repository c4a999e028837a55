//! G-spread history in long format: one row per bond per date.

use super::{Columns, DateColumn, Row, RowLayout, CUSIP, SECURITY};
use crate::domain::record::GSpreadRecord;
use crate::error::ParseError;

#[derive(Debug, Clone)]
pub struct GSpreadLayout {
    date: DateColumn,
    cusip: usize,
    security: usize,
    g_spread: usize,
}

impl RowLayout for GSpreadLayout {
    type Record = GSpreadRecord;

    fn bind(columns: &Columns<'_>) -> Result<Self, ParseError> {
        Ok(Self {
            date: columns.date()?,
            cusip: columns.require("cusip", CUSIP)?,
            security: columns.require("security", SECURITY)?,
            g_spread: columns.require("g_spread", &["g_spread", "g_sprd", "gspread", "g_spd"])?,
        })
    }

    fn build(&self, row: &Row<'_>) -> Option<GSpreadRecord> {
        Some(GSpreadRecord {
            date: row.date_of(self.date)?,
            cusip: row.key_text(self.cusip),
            security: row.key_text(self.security),
            g_spread: row.number(Some(self.g_spread)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::candidate;
    use super::super::GSpreadParser;
    use crate::port::outbound::parser::SourceParser;
    use tempfile::TempDir;

    #[test]
    fn one_file_spans_many_dates() {
        let dir = TempDir::new().unwrap();
        let file = candidate(
            dir.path(),
            "g_spread_history.csv",
            "Date,CUSIP,Security Name,G Spread\n\
             2024-01-02,A,ACME 5 2030,101.5\n\
             2024-01-03,A,ACME 5 2030,#N/A\n",
        );
        let rows = GSpreadParser::new().parse(&file).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].g_spread, Some(101.5));
        assert_eq!(rows[1].g_spread, None);
        assert_ne!(rows[0].date, rows[1].date);
    }
}
