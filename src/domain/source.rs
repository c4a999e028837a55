//! Data sources handled by the pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How previously persisted rows are retired when files are reprocessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionPolicy {
    /// Each file covers exactly one calendar date, encoded in its name.
    /// Reprocessing a file replaces that whole date.
    FileDate,
    /// A file may cover many dates; every date present in the freshly parsed
    /// rows is replaced.
    RowDate,
    /// Files overlap arbitrarily. Nothing is removed up front and overlaps are
    /// reconciled by recency during deduplication.
    None,
}

/// One of the independent ingested sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Universe,
    Portfolio,
    Runs,
    GSpread,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Universe,
        SourceKind::Portfolio,
        SourceKind::Runs,
        SourceKind::GSpread,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Universe => "universe",
            Self::Portfolio => "portfolio",
            Self::Runs => "runs",
            Self::GSpread => "g_spread",
        }
    }

    /// Destination table name.
    #[must_use]
    pub const fn table(self) -> &'static str {
        self.as_str()
    }

    #[must_use]
    pub const fn partition_policy(self) -> PartitionPolicy {
        match self {
            Self::Universe | Self::Portfolio => PartitionPolicy::FileDate,
            Self::GSpread => PartitionPolicy::RowDate,
            Self::Runs => PartitionPolicy::None,
        }
    }

    /// Natural key used when the configuration does not override it.
    #[must_use]
    pub const fn default_natural_key(self) -> &'static [&'static str] {
        match self {
            Self::Universe => &["date", "cusip"],
            Self::Portfolio => &["date", "cusip", "account", "portfolio"],
            Self::Runs => &["date", "cusip", "dealer"],
            Self::GSpread => &["date", "cusip", "security"],
        }
    }

    #[must_use]
    pub const fn default_recency_column(self) -> Option<&'static str> {
        match self {
            Self::Runs => Some("time"),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "universe" => Ok(Self::Universe),
            "portfolio" => Ok(Self::Portfolio),
            "runs" => Ok(Self::Runs),
            "g_spread" | "gspread" => Ok(Self::GSpread),
            other => Err(format!("unknown source '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("Runs".parse::<SourceKind>(), Ok(SourceKind::Runs));
        assert_eq!("g-spread".parse::<SourceKind>(), Ok(SourceKind::GSpread));
        assert_eq!("gspread".parse::<SourceKind>(), Ok(SourceKind::GSpread));
        assert!("trades".parse::<SourceKind>().is_err());
    }

    #[test]
    fn runs_rely_on_recency_not_partitions() {
        assert_eq!(SourceKind::Runs.partition_policy(), PartitionPolicy::None);
        assert_eq!(SourceKind::Runs.default_recency_column(), Some("time"));
        assert_eq!(
            SourceKind::Universe.partition_policy(),
            PartitionPolicy::FileDate
        );
    }
}
