//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings of a
//! pipeline run. Configuration is loaded from a TOML file; `RUST_LOG`
//! overrides the configured log level.
//!
//! # Example
//!
//! ```no_run
//! use bondlake::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::analytics::AnalyticsConfig;
use super::logging::LoggingConfig;
use super::pipeline::PipelineConfig;
use super::source::SourcesConfig;
use crate::domain::key::KeySpec;
use crate::domain::record::{GSpreadRecord, PortfolioRecord, RunsRecord, UniverseRecord};
use crate::domain::source::SourceKind;
use crate::error::{ConfigError, Result};

/// Main application configuration.
///
/// Load from a TOML file using [`Config::load`] or parse directly with
/// [`Config::parse_toml`].
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Path to SQLite database file.
    ///
    /// Defaults to "bondlake.db" in the current directory.
    #[serde(default = "default_database_path")]
    pub database: String,

    /// Directory of the per-source processing-state files.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Directory of the normalized dataset snapshots.
    #[serde(default = "default_dataset_dir")]
    pub dataset_dir: PathBuf,

    /// Batching, retries, timeouts and parallelism.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Raw sources. Sources without a section are not run.
    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

fn default_database_path() -> String {
    "bondlake.db".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

fn default_dataset_dir() -> PathBuf {
    PathBuf::from("datasets")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            database: default_database_path(),
            state_dir: default_state_dir(),
            dataset_dir: default_dataset_dir(),
            pipeline: PipelineConfig::default(),
            sources: SourcesConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The TOML content is malformed
    /// - Validation fails (e.g., an unknown natural-key column)
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<()> {
        if !self.logging.is_known_format() {
            return Err(invalid("logging.format", "must be 'pretty' or 'json'").into());
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "database" }.into());
        }

        let pipeline = &self.pipeline;
        if pipeline.batch_size == 0 {
            return Err(invalid("batch_size", "must be greater than 0").into());
        }
        if pipeline.retry_initial_delay_ms == 0 {
            return Err(invalid("retry_initial_delay_ms", "must be greater than 0").into());
        }
        if pipeline.retry_max_delay_ms < pipeline.retry_initial_delay_ms {
            return Err(invalid("retry_max_delay_ms", "must be >= retry_initial_delay_ms").into());
        }
        if pipeline.backoff_multiplier.is_nan() || pipeline.backoff_multiplier < 1.0 {
            return Err(invalid("backoff_multiplier", "must be >= 1.0").into());
        }
        if pipeline.stage_timeout_secs == 0 {
            return Err(invalid("stage_timeout_secs", "must be greater than 0").into());
        }
        if pipeline.parallel.max_workers == Some(0) {
            return Err(invalid("max_workers", "must be greater than 0").into());
        }

        for kind in SourceKind::ALL {
            let Some(source) = self.sources.get(kind) else {
                continue;
            };
            if source.input_dir.as_os_str().is_empty() {
                return Err(ConfigError::MissingField { field: "input_dir" }.into());
            }
            if source.extensions.is_empty() {
                return Err(invalid("extensions", format!("{kind}: must list at least one")).into());
            }
            if source.batch_size == Some(0) {
                return Err(invalid("batch_size", format!("{kind}: must be greater than 0")).into());
            }
            self.key_spec(kind)?;
        }

        let pairwise = &self.analytics.pairwise;
        if pairwise.min_overlap_periods < 2 {
            return Err(invalid("min_overlap_periods", "must be at least 2").into());
        }
        if pairwise.lookback_window == 0 {
            return Err(invalid("lookback_window", "must be greater than 0").into());
        }
        if pairwise.top_n == Some(0) {
            return Err(invalid("top_n", "must be greater than 0").into());
        }

        let threshold = self.analytics.monitor.min_size_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(invalid("min_size_threshold", "must be 0 or greater").into());
        }
        Ok(())
    }

    /// Natural key of a source, from its section or the built-in default.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] when a configured column does not
    /// exist on the source's records.
    pub fn key_spec(&self, kind: SourceKind) -> Result<KeySpec> {
        let Some(source) = self.sources.get(kind) else {
            let key = kind.default_natural_key();
            let recency = kind.default_recency_column();
            return Ok(match kind {
                SourceKind::Universe => KeySpec::from_static::<UniverseRecord>(key, recency),
                SourceKind::Portfolio => KeySpec::from_static::<PortfolioRecord>(key, recency),
                SourceKind::Runs => KeySpec::from_static::<RunsRecord>(key, recency),
                SourceKind::GSpread => KeySpec::from_static::<GSpreadRecord>(key, recency),
            }?);
        };
        let spec = match kind {
            SourceKind::Universe => source.key_spec::<UniverseRecord>(),
            SourceKind::Portfolio => source.key_spec::<PortfolioRecord>(),
            SourceKind::Runs => source.key_spec::<RunsRecord>(),
            SourceKind::GSpread => source.key_spec::<GSpreadRecord>(),
        };
        Ok(spec?)
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
