//! Batch loading, retry and parallelism settings.

use std::time::Duration;

use serde::Deserialize;

use crate::application::load::BatchPolicy;
use crate::application::parallel::WorkerPool;
use crate::error::Result;

/// `[pipeline]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Rows per load transaction.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Retries of a failed batch after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Wall-clock budget of a single stage.
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
    #[serde(default)]
    pub parallel: ParallelConfig,
}

fn default_batch_size() -> usize {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_initial_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    5000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_stage_timeout_secs() -> u64 {
    1800 // 30 minutes
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            stage_timeout_secs: default_stage_timeout_secs(),
            parallel: ParallelConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Batch policy, with an optional per-source batch size.
    #[must_use]
    pub fn batch_policy(&self, batch_size: Option<usize>) -> BatchPolicy {
        BatchPolicy {
            batch_size: batch_size.unwrap_or(self.batch_size),
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }

    #[must_use]
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

/// `[pipeline.parallel]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ParallelConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Row count from which identifier standardization is spread over workers.
    #[serde(default = "default_row_threshold")]
    pub row_threshold: usize,
    /// Defaults to the number of cores; capped at twice that.
    #[serde(default)]
    pub max_workers: Option<usize>,
}

fn default_row_threshold() -> usize {
    10_000
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            row_threshold: default_row_threshold(),
            max_workers: None,
        }
    }
}

impl ParallelConfig {
    /// The pool this configuration asks for.
    ///
    /// # Errors
    /// Returns a configuration error when the thread pool cannot be built.
    pub fn worker_pool(&self) -> Result<WorkerPool> {
        if !self.enabled {
            return Ok(WorkerPool::sequential());
        }
        let workers = self.max_workers.unwrap_or_else(num_cpus::get);
        WorkerPool::new(workers, self.row_threshold)
    }
}
