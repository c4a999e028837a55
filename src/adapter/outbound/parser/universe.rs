//! Universe exports: one row per bond with reference data and spreads.

use super::{Columns, DateColumn, Row, RowLayout, CUSIP, SECURITY};
use crate::domain::record::UniverseRecord;
use crate::error::ParseError;

/// Header positions of a universe export.
#[derive(Debug, Clone)]
pub struct UniverseLayout {
    date: DateColumn,
    cusip: usize,
    security: Option<usize>,
    ticker: Option<usize>,
    sector: Option<usize>,
    currency: Option<usize>,
    rating: Option<usize>,
    maturity: Option<usize>,
    coupon: Option<usize>,
    amount_outstanding: Option<usize>,
    g_spread: Option<usize>,
    oas: Option<usize>,
}

impl RowLayout for UniverseLayout {
    type Record = UniverseRecord;

    fn bind(columns: &Columns<'_>) -> Result<Self, ParseError> {
        Ok(Self {
            date: columns.date()?,
            cusip: columns.require("cusip", CUSIP)?,
            security: columns.find(SECURITY),
            ticker: columns.find(&["ticker", "issuer_ticker", "ticker_symbol"]),
            sector: columns.find(&["sector", "industry_sector", "custom_sector", "industry"]),
            currency: columns.find(&["currency", "ccy", "crncy"]),
            rating: columns.find(&["rating", "composite_rating", "bbg_composite_rating", "rtg"]),
            maturity: columns.find(&["maturity", "maturity_date", "mty"]),
            coupon: columns.find(&["coupon", "cpn"]),
            amount_outstanding: columns.find(&[
                "amount_outstanding",
                "amt_outstanding",
                "amt_out",
                "face_outstanding",
            ]),
            g_spread: columns.find(&["g_spread", "g_sprd", "gspread", "g_spd"]),
            oas: columns.find(&["oas", "oas_spread", "oas_bp"]),
        })
    }

    fn build(&self, row: &Row<'_>) -> Option<UniverseRecord> {
        Some(UniverseRecord {
            date: row.date_of(self.date)?,
            cusip: row.key_text(self.cusip),
            security: row.text(self.security),
            ticker: row.text(self.ticker),
            sector: row.text(self.sector),
            currency: row.text(self.currency),
            rating: row.text(self.rating),
            maturity: row.date(self.maturity),
            coupon: row.number(self.coupon),
            amount_outstanding: row.number(self.amount_outstanding),
            g_spread: row.number(self.g_spread),
            oas: row.number(self.oas),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::candidate;
    use super::super::UniverseParser;
    use crate::port::outbound::parser::SourceParser;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn parses_with_date_from_file_name() {
        let dir = TempDir::new().unwrap();
        let file = candidate(
            dir.path(),
            "universe_2024-01-02.csv",
            "CUSIP,Security,Ticker,Maturity Date,Cpn,G Sprd,Amt Out\n\
             037833ak6,AAPL 3.45 2045,AAPL,05/06/2045,3.45,95.5,\"2,000,000,000\"\n\
             ,Blank id,XX,,,,\n",
        );

        let rows = UniverseParser::new().parse(&file).unwrap();
        assert_eq!(rows.len(), 2);
        let first = &rows[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(first.cusip, "037833ak6");
        assert_eq!(first.maturity, NaiveDate::from_ymd_opt(2045, 5, 6));
        assert_eq!(first.g_spread, Some(95.5));
        assert_eq!(first.amount_outstanding, Some(2e9));
        assert_eq!(first.oas, None);
        // Identifier standardization and dropping happen in the pipeline.
        assert_eq!(rows[1].cusip, "");
    }

    #[test]
    fn missing_cusip_column_rejects_file() {
        let dir = TempDir::new().unwrap();
        let file = candidate(dir.path(), "universe_2024-01-02.csv", "Security,Ticker\nA,B\n");
        let err = UniverseParser::new().parse(&file).unwrap_err();
        assert!(err.reason.contains("cusip"));
    }

    #[test]
    fn no_date_anywhere_rejects_file() {
        let dir = TempDir::new().unwrap();
        let file = candidate(dir.path(), "universe.csv", "CUSIP\nA\n");
        assert!(UniverseParser::new().parse(&file).is_err());
    }
}
