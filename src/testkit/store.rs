//! In-memory port implementations.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::domain::fingerprint::ProcessingState;
use crate::domain::key::NaturalKey;
use crate::domain::source::SourceKind;
use crate::domain::value::Value;
use crate::error::{Error, Result, StatePersistenceError};
use crate::port::outbound::store::{StateStore, TableSpec, TableState, TableStore, UpsertCounts};

/// Processing state kept in memory. Saves can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: Mutex<HashMap<SourceKind, ProcessingState>>,
    fail_saves: Mutex<bool>,
    saves: Mutex<usize>,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `save` fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock() = fail;
    }

    /// Successful saves so far.
    #[must_use]
    pub fn saves(&self) -> usize {
        *self.saves.lock()
    }

    #[must_use]
    pub fn get(&self, source: SourceKind) -> ProcessingState {
        self.states.lock().get(&source).cloned().unwrap_or_default()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, source: SourceKind) -> Result<ProcessingState> {
        Ok(self.get(source))
    }

    fn save(
        &self,
        source: SourceKind,
        state: &ProcessingState,
    ) -> std::result::Result<(), StatePersistenceError> {
        if *self.fail_saves.lock() {
            return Err(StatePersistenceError {
                path: format!("memory://{source}").into(),
                reason: "saves disabled".to_string(),
            });
        }
        self.states.lock().insert(source, state.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}

/// Wraps a table store; batch writes can be made to fail.
pub struct FailingWrites<T> {
    inner: T,
    fail: Mutex<bool>,
}

impl<T: TableStore> FailingWrites<T> {
    #[must_use]
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            fail: Mutex::new(false),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    fn check(&self) -> Result<()> {
        if *self.fail.lock() {
            return Err(Error::Database("writes disabled".to_string()));
        }
        Ok(())
    }
}

impl<T: TableStore> TableStore for FailingWrites<T> {
    fn probe(&self, table: &TableSpec) -> Result<TableState> {
        self.inner.probe(table)
    }

    fn insert_batch(&self, table: &TableSpec, rows: &[Vec<Value>]) -> Result<usize> {
        self.check()?;
        self.inner.insert_batch(table, rows)
    }

    fn upsert_batch(&self, table: &TableSpec, rows: &[Vec<Value>]) -> Result<UpsertCounts> {
        self.check()?;
        self.inner.upsert_batch(table, rows)
    }

    fn existing_keys(&self, table: &TableSpec) -> Result<HashSet<NaturalKey>> {
        self.inner.existing_keys(table)
    }

    fn delete_where_in(&self, table: &TableSpec, column: &str, values: &[Value]) -> Result<usize> {
        self.inner.delete_where_in(table, column, values)
    }

    fn truncate(&self, table: &TableSpec) -> Result<usize> {
        self.inner.truncate(table)
    }

    fn replace_all(&self, table: &TableSpec, rows: &[Vec<Value>]) -> Result<usize> {
        self.check()?;
        self.inner.replace_all(table, rows)
    }
}
