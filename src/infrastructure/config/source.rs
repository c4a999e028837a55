//! Per-source input and key settings.

use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::key::KeySpec;
use crate::domain::record::SourceRecord;
use crate::domain::source::SourceKind;
use crate::error::ConfigError;

/// `[sources.<kind>]` section. A source without a section is disabled.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Directory holding the raw exports.
    pub input_dir: PathBuf,
    /// File extensions to pick up.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Overrides the source's default natural key.
    #[serde(default)]
    pub natural_key: Option<Vec<String>>,
    /// Overrides the source's default recency column.
    #[serde(default)]
    pub recency_column: Option<String>,
    /// Overrides `pipeline.batch_size` for this source.
    #[serde(default)]
    pub batch_size: Option<usize>,
}

fn default_enabled() -> bool {
    true
}

fn default_extensions() -> Vec<String> {
    vec!["csv".to_string()]
}

impl SourceConfig {
    #[must_use]
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            input_dir: input_dir.into(),
            extensions: default_extensions(),
            natural_key: None,
            recency_column: None,
            batch_size: None,
        }
    }

    /// Resolve the natural key and recency columns against `R`.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for unknown or repeated columns.
    pub fn key_spec<R: SourceRecord>(&self) -> Result<KeySpec, ConfigError> {
        let recency = self
            .recency_column
            .as_deref()
            .or_else(|| R::SOURCE.default_recency_column());
        match &self.natural_key {
            Some(columns) => KeySpec::resolve::<R>(columns, recency),
            None => KeySpec::from_static::<R>(R::SOURCE.default_natural_key(), recency),
        }
    }
}

/// `[sources]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub universe: Option<SourceConfig>,
    #[serde(default)]
    pub portfolio: Option<SourceConfig>,
    #[serde(default)]
    pub runs: Option<SourceConfig>,
    #[serde(default)]
    pub g_spread: Option<SourceConfig>,
}

impl SourcesConfig {
    #[must_use]
    pub fn get(&self, kind: SourceKind) -> Option<&SourceConfig> {
        match kind {
            SourceKind::Universe => self.universe.as_ref(),
            SourceKind::Portfolio => self.portfolio.as_ref(),
            SourceKind::Runs => self.runs.as_ref(),
            SourceKind::GSpread => self.g_spread.as_ref(),
        }
    }

    /// Mutable slot for a source, used to build configurations in code.
    pub fn slot_mut(&mut self, kind: SourceKind) -> &mut Option<SourceConfig> {
        match kind {
            SourceKind::Universe => &mut self.universe,
            SourceKind::Portfolio => &mut self.portfolio,
            SourceKind::Runs => &mut self.runs,
            SourceKind::GSpread => &mut self.g_spread,
        }
    }

    /// Sources with a section and `enabled = true`, in canonical order.
    #[must_use]
    pub fn enabled(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind).is_some_and(|s| s.enabled))
            .collect()
    }
}
