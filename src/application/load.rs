//! Load strategy selection and batched, transactional loading.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::value::Value;
use crate::error::{LoadBatchError, Result};
use crate::port::outbound::store::{TableSpec, TableState, TableStore};

/// How rows reach the destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStrategy {
    /// Empty table: insert everything without existence checks.
    BulkInsert,
    /// Populated table with a unique index on the natural key: insert or
    /// overwrite on conflict.
    ConstraintUpsert,
    /// Populated table without that index: insert only keys not yet present.
    /// Existing rows are never modified.
    DedupThenInsert,
}

impl LoadStrategy {
    /// Pick the strategy for a probed table.
    #[must_use]
    pub fn select(state: &TableState) -> Self {
        if state.row_count == 0 {
            Self::BulkInsert
        } else if state.has_unique_key {
            Self::ConstraintUpsert
        } else {
            Self::DedupThenInsert
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BulkInsert => "bulk_insert",
            Self::ConstraintUpsert => "constraint_upsert",
            Self::DedupThenInsert => "dedup_then_insert",
        }
    }
}

/// Batch sizing and retry behaviour.
#[derive(Debug, Clone)]
pub struct BatchPolicy {
    pub batch_size: usize,
    /// Retries after the first attempt of a batch.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl BatchPolicy {
    /// Backoff before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .powi(i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX));
        let millis = (self.initial_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

/// Cooperative cancellation, checked at batch boundaries.
///
/// A child flag observes its parent, so tripping the run-wide flag stops
/// every stage while tripping a stage flag leaves siblings running.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    own: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
}

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            own: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::clone(&self.own)),
        }
    }

    pub fn cancel(&self) {
        self.own.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.own.load(Ordering::SeqCst)
            || self
                .parent
                .as_ref()
                .is_some_and(|p| p.load(Ordering::SeqCst))
    }
}

/// Counts from one load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    pub strategy: LoadStrategy,
    pub inserted: usize,
    pub updated: usize,
    /// Rows dropped by `DedupThenInsert` because their key already existed.
    pub skipped_existing: usize,
    pub batches: usize,
    /// Cancellation stopped the load at a batch boundary.
    pub cancelled: bool,
}

impl LoadOutcome {
    fn empty(strategy: LoadStrategy) -> Self {
        Self {
            strategy,
            inserted: 0,
            updated: 0,
            skipped_existing: 0,
            batches: 0,
            cancelled: false,
        }
    }

    #[must_use]
    pub fn rows_committed(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Executes a load strategy against a [`TableStore`].
pub struct RelationalLoader<'a> {
    store: &'a dyn TableStore,
    policy: &'a BatchPolicy,
    cancel: &'a CancelFlag,
}

impl<'a> RelationalLoader<'a> {
    #[must_use]
    pub fn new(store: &'a dyn TableStore, policy: &'a BatchPolicy, cancel: &'a CancelFlag) -> Self {
        Self {
            store,
            policy,
            cancel,
        }
    }

    /// Probe the table and choose a strategy.
    pub fn select_strategy(&self, table: &TableSpec) -> Result<LoadStrategy> {
        let state = self.store.probe(table)?;
        let strategy = LoadStrategy::select(&state);
        debug!(
            table = %table.name,
            rows = state.row_count,
            unique_key = state.has_unique_key,
            strategy = strategy.as_str(),
            "Selected load strategy"
        );
        Ok(strategy)
    }

    /// Load rows using `strategy`.
    ///
    /// Batches commit independently. A batch that still fails after its
    /// retries aborts the load; earlier batches stay committed.
    ///
    /// # Errors
    /// Returns [`LoadBatchError`] when a batch exhausts its retries, or a
    /// database error when existing keys cannot be read.
    pub fn load(
        &self,
        table: &TableSpec,
        rows: Vec<Vec<Value>>,
        strategy: LoadStrategy,
    ) -> Result<LoadOutcome> {
        let mut outcome = LoadOutcome::empty(strategy);

        let rows = if strategy == LoadStrategy::DedupThenInsert {
            let existing = self.store.existing_keys(table)?;
            let indices = table.key_indices();
            let before = rows.len();
            let fresh: Vec<Vec<Value>> = rows
                .into_iter()
                .filter(|row| {
                    let key: Vec<Value> = indices.iter().map(|&i| row[i].clone()).collect();
                    !existing.contains(&key)
                })
                .collect();
            outcome.skipped_existing = before - fresh.len();
            fresh
        } else {
            rows
        };

        let batch_size = self.policy.batch_size.max(1);
        for (n, chunk) in rows.chunks(batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                info!(
                    table = %table.name,
                    committed = outcome.rows_committed(),
                    "Load cancelled at batch boundary"
                );
                outcome.cancelled = true;
                break;
            }

            let start = n * batch_size;
            let end = start + chunk.len();
            let (inserted, updated) =
                self.run_batch(table, chunk, strategy, start, end, outcome.rows_committed())?;
            outcome.inserted += inserted;
            outcome.updated += updated;
            outcome.batches += 1;
        }

        info!(
            table = %table.name,
            strategy = strategy.as_str(),
            inserted = outcome.inserted,
            updated = outcome.updated,
            skipped_existing = outcome.skipped_existing,
            batches = outcome.batches,
            "Load finished"
        );
        Ok(outcome)
    }

    fn run_batch(
        &self,
        table: &TableSpec,
        chunk: &[Vec<Value>],
        strategy: LoadStrategy,
        start: usize,
        end: usize,
        rows_committed: usize,
    ) -> Result<(usize, usize)> {
        let attempts = self.policy.max_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match strategy {
                LoadStrategy::BulkInsert | LoadStrategy::DedupThenInsert => self
                    .store
                    .insert_batch(table, chunk)
                    .map(|inserted| (inserted, 0)),
                LoadStrategy::ConstraintUpsert => self
                    .store
                    .upsert_batch(table, chunk)
                    .map(|counts| (counts.inserted, counts.updated)),
            };

            match result {
                Ok(counts) => return Ok(counts),
                Err(e) if attempt < attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        table = %table.name,
                        start,
                        end,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Batch failed, retrying"
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => {
                    warn!(
                        table = %table.name,
                        start,
                        end,
                        attempt,
                        error = %e,
                        "Batch failed, giving up"
                    );
                    return Err(LoadBatchError {
                        table: table.name.clone(),
                        start,
                        end,
                        attempts: attempt,
                        rows_committed,
                        reason: e.to_string(),
                    }
                    .into());
                }
            }
        }
    }
}
