//! Raw input ports: file discovery and parsing.

use crate::domain::fingerprint::FileCandidate;
use crate::domain::record::SourceRecord;
use crate::error::{ParseError, Result};

/// Lists the raw files currently available for a source.
pub trait FileSource: Send + Sync {
    fn list(&self) -> Result<Vec<FileCandidate>>;
}

/// Turns one raw file into normalized records.
///
/// Implementations must reject files that cannot satisfy the record's
/// required columns instead of returning partially filled rows.
pub trait SourceParser<R: SourceRecord>: Send + Sync {
    /// Parse a single file.
    ///
    /// # Errors
    /// Returns a [`ParseError`] naming the file when it is unreadable or
    /// malformed.
    fn parse(&self, file: &FileCandidate) -> Result<Vec<R>, ParseError>;
}
