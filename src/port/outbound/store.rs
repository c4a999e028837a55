//! Persistence ports for processing state and destination tables.

use std::collections::HashSet;

use crate::domain::fingerprint::ProcessingState;
use crate::domain::key::{KeySpec, NaturalKey};
use crate::domain::record::{Record, SourceRecord};
use crate::domain::source::SourceKind;
use crate::domain::value::Value;
use crate::error::{Result, StatePersistenceError};

/// Storage for per-source processing state.
pub trait StateStore: Send + Sync {
    /// Load the state for a source. A source that never ran yields the
    /// default (empty) state.
    fn load(&self, source: SourceKind) -> Result<ProcessingState>;

    /// Persist the state for a source, replacing the previous one atomically.
    fn save(
        &self,
        source: SourceKind,
        state: &ProcessingState,
    ) -> std::result::Result<(), StatePersistenceError>;
}

/// Normalized dataset snapshots, one per source.
///
/// The snapshot is the authoritative history the merge step works against.
pub trait DatasetStore: Send + Sync {
    /// The stored snapshot, or `None` when the source was never persisted.
    ///
    /// # Errors
    /// A snapshot lacking the partition column is a
    /// [`MergeInconsistencyError`](crate::error::MergeInconsistencyError).
    fn load<R: SourceRecord>(&self) -> Result<Option<Vec<R>>>;

    /// Replace the snapshot atomically.
    fn save<R: SourceRecord>(&self, rows: &[R]) -> Result<()>;

    /// Drop the snapshot.
    fn discard(&self, source: SourceKind) -> Result<()>;
}

/// Shape of a destination table as seen by the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<String>,
    pub key_columns: Vec<String>,
}

impl TableSpec {
    /// Describe the table holding records of type `R`.
    #[must_use]
    pub fn for_record<R: Record>(name: &str, key: &KeySpec) -> Self {
        Self {
            name: name.to_string(),
            columns: R::COLUMNS.iter().map(ToString::to_string).collect(),
            key_columns: key.columns().to_vec(),
        }
    }

    /// Describe a table whose key is given by column names.
    #[must_use]
    pub fn with_key<R: Record>(name: &str, key_columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: R::COLUMNS.iter().map(ToString::to_string).collect(),
            key_columns: key_columns.iter().map(ToString::to_string).collect(),
        }
    }

    /// Positions of the key columns within `columns`.
    #[must_use]
    pub fn key_indices(&self) -> Vec<usize> {
        self.key_columns
            .iter()
            .filter_map(|k| self.columns.iter().position(|c| c == k))
            .collect()
    }
}

/// Result of probing a destination table before loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableState {
    pub row_count: u64,
    /// A unique index exists whose columns are exactly the natural key.
    pub has_unique_key: bool,
}

/// Rows written by an upsert batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub updated: usize,
}

/// Write access to destination tables.
///
/// Every batch method runs in a single transaction: it either applies all of
/// its rows or none of them.
pub trait TableStore: Send + Sync {
    fn probe(&self, table: &TableSpec) -> Result<TableState>;

    /// Insert rows without existence checks.
    fn insert_batch(&self, table: &TableSpec, rows: &[Vec<Value>]) -> Result<usize>;

    /// Insert rows, overwriting non-key columns when the natural key exists.
    fn upsert_batch(&self, table: &TableSpec, rows: &[Vec<Value>]) -> Result<UpsertCounts>;

    /// Natural keys currently stored in the table.
    fn existing_keys(&self, table: &TableSpec) -> Result<HashSet<NaturalKey>>;

    /// Delete every row whose `column` equals one of `values`.
    fn delete_where_in(&self, table: &TableSpec, column: &str, values: &[Value])
        -> Result<usize>;

    /// Delete every row.
    fn truncate(&self, table: &TableSpec) -> Result<usize>;

    /// Replace the whole table content in one transaction.
    fn replace_all(&self, table: &TableSpec, rows: &[Vec<Value>]) -> Result<usize>;
}
