//! Portfolio holdings exports.

use super::{Columns, DateColumn, Row, RowLayout, CUSIP, SECURITY};
use crate::domain::record::PortfolioRecord;
use crate::error::ParseError;

#[derive(Debug, Clone)]
pub struct PortfolioLayout {
    date: DateColumn,
    cusip: usize,
    account: usize,
    portfolio: usize,
    security: Option<usize>,
    quantity: Option<usize>,
    market_value: Option<usize>,
    oas: Option<usize>,
    duration: Option<usize>,
}

impl RowLayout for PortfolioLayout {
    type Record = PortfolioRecord;

    fn bind(columns: &Columns<'_>) -> Result<Self, ParseError> {
        Ok(Self {
            date: columns.date()?,
            cusip: columns.require("cusip", CUSIP)?,
            account: columns.require("account", &["account", "account_number", "acct"])?,
            portfolio: columns.require("portfolio", &["portfolio", "portfolio_name", "fund"])?,
            security: columns.find(SECURITY),
            quantity: columns.find(&["quantity", "qty", "position", "par", "face"]),
            market_value: columns.find(&["market_value", "mkt_value", "base_market_value", "mv"]),
            oas: columns.find(&["oas", "oas_spread", "oas_bp"]),
            duration: columns.find(&["duration", "modified_duration", "mod_dur", "oad"]),
        })
    }

    fn build(&self, row: &Row<'_>) -> Option<PortfolioRecord> {
        Some(PortfolioRecord {
            date: row.date_of(self.date)?,
            cusip: row.key_text(self.cusip),
            account: row.key_text(self.account),
            portfolio: row.key_text(self.portfolio),
            security: row.text(self.security),
            quantity: row.number(self.quantity),
            market_value: row.number(self.market_value),
            oas: row.number(self.oas),
            duration: row.number(self.duration),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::candidate;
    use super::super::PortfolioParser;
    use crate::port::outbound::parser::SourceParser;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn date_column_wins_over_file_name() {
        let dir = TempDir::new().unwrap();
        let file = candidate(
            dir.path(),
            "portfolio_2024-01-05.csv",
            "Date,CUSIP,Acct,Portfolio Name,Qty,Mkt Value\n\
             2024-01-04,912828YK0,A1,Core,100,(5.5)\n\
             bad-date,912828YK0,A1,Core,1,1\n",
        );
        let rows = PortfolioParser::new().parse(&file).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert_eq!(rows[0].account, "A1");
        assert_eq!(rows[0].portfolio, "Core");
        assert_eq!(rows[0].market_value, Some(-5.5));
    }

    #[test]
    fn account_is_required() {
        let dir = TempDir::new().unwrap();
        let file = candidate(dir.path(), "portfolio_2024-01-05.csv", "CUSIP,Portfolio\nA,B\n");
        let err = PortfolioParser::new().parse(&file).unwrap_err();
        assert!(err.reason.contains("account"));
    }
}
