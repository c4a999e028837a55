//! Settings of the two analytics stages.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::application::monitor::{MonitorMetric, MonitorParams};
use crate::application::pairwise::PairwiseParams;

/// `[analytics]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub pairwise: PairwiseConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// `[analytics.pairwise]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PairwiseConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_min_overlap_periods")]
    pub min_overlap_periods: usize,
    /// Most recent dates used, roughly one trading year by default.
    #[serde(default = "default_lookback_window")]
    pub lookback_window: usize,
    /// Keep only this many of the most observed instruments.
    #[serde(default)]
    pub top_n: Option<usize>,
}

fn default_enabled() -> bool {
    true
}

fn default_min_overlap_periods() -> usize {
    20
}

fn default_lookback_window() -> usize {
    252
}

impl Default for PairwiseConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            min_overlap_periods: default_min_overlap_periods(),
            lookback_window: default_lookback_window(),
            top_n: None,
        }
    }
}

impl PairwiseConfig {
    #[must_use]
    pub fn params(&self) -> PairwiseParams {
        PairwiseParams {
            min_overlap_periods: self.min_overlap_periods,
            lookback_window: self.lookback_window,
            top_n: self.top_n,
        }
    }
}

/// `[analytics.monitor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_min_size_threshold")]
    pub min_size_threshold: f64,
    #[serde(default)]
    pub metric: MonitorMetric,
    /// Defaults to the latest date in the runs table.
    #[serde(default)]
    pub as_of_date: Option<NaiveDate>,
}

fn default_min_size_threshold() -> f64 {
    1_000_000.0
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            min_size_threshold: default_min_size_threshold(),
            metric: MonitorMetric::default(),
            as_of_date: None,
        }
    }
}

impl MonitorConfig {
    #[must_use]
    pub fn params(&self) -> MonitorParams {
        MonitorParams {
            as_of_date: self.as_of_date,
            min_size_threshold: self.min_size_threshold,
            metric: self.metric,
        }
    }
}
