//! Bounded worker pool for file parsing and identifier standardization.
//!
//! Tasks are pure functions over a file or a chunk of rows, so the pool's
//! own queue is the only synchronization. Output order always matches input
//! order.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Upper bound on workers relative to available cores.
pub const MAX_WORKERS_PER_CORE: usize = 2;

/// Clamp a requested worker count to `1..=2 × cores`.
#[must_use]
pub fn cap_workers(requested: usize) -> usize {
    requested.clamp(1, num_cpus::get().max(1) * MAX_WORKERS_PER_CORE)
}

/// Either a dedicated rayon pool or sequential execution.
pub struct WorkerPool {
    pool: Option<ThreadPool>,
    row_threshold: usize,
}

impl WorkerPool {
    /// Sequential execution on the calling thread.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            pool: None,
            row_threshold: usize::MAX,
        }
    }

    /// Build a pool of `max_workers` threads (capped).
    ///
    /// # Errors
    /// Returns a configuration error when the thread pool cannot be built.
    pub fn new(max_workers: usize, row_threshold: usize) -> Result<Self> {
        let workers = cap_workers(max_workers);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("bondlake-worker-{i}"))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "max_workers",
                reason: e.to_string(),
            })?;
        debug!(workers, row_threshold, "Worker pool started");
        Ok(Self {
            pool: Some(pool),
            row_threshold,
        })
    }

    #[must_use]
    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.pool.as_ref().map_or(1, ThreadPool::current_num_threads)
    }

    /// Map over independent units of work such as files. Runs on the pool
    /// whenever it exists and there is more than one item.
    pub fn map<T, U, F>(&self, items: Vec<T>, f: F) -> Vec<U>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> U + Sync + Send,
    {
        match &self.pool {
            Some(pool) if items.len() > 1 => pool.install(|| items.into_par_iter().map(f).collect()),
            _ => items.into_iter().map(f).collect(),
        }
    }

    /// Map over rows. Runs on the pool only when the row count reaches the
    /// configured threshold.
    pub fn map_rows<T, U, F>(&self, rows: Vec<T>, f: F) -> Vec<U>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> U + Sync + Send,
    {
        match &self.pool {
            Some(pool) if rows.len() >= self.row_threshold => {
                debug!(rows = rows.len(), "Processing rows in parallel");
                pool.install(|| rows.into_par_iter().map(f).collect())
            }
            _ => rows.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workers_are_capped() {
        assert_eq!(cap_workers(0), 1);
        assert!(cap_workers(10_000) <= num_cpus::get() * MAX_WORKERS_PER_CORE);
    }

    #[test]
    fn parallel_map_preserves_order() {
        let pool = WorkerPool::new(4, 10).unwrap();
        let out = pool.map((0..100).collect(), |x: i32| x * 2);
        assert_eq!(out, (0..100).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn rows_below_threshold_run_sequentially() {
        let pool = WorkerPool::new(2, 1_000).unwrap();
        let caller = std::thread::current().id();
        let threads = pool.map_rows(vec![1, 2, 3], |_| std::thread::current().id());
        assert!(threads.iter().all(|t| *t == caller));
    }

    #[test]
    fn sequential_pool_has_one_worker() {
        let pool = WorkerPool::sequential();
        assert!(!pool.is_parallel());
        assert_eq!(pool.workers(), 1);
        assert_eq!(pool.map_rows(vec![1, 2], |x| x + 1), vec![2, 3]);
    }
}
