//! Read port for the analytics stages.

use crate::domain::analytics::SeriesPoint;
use crate::domain::record::RunsRecord;
use crate::error::Result;

/// Reads loaded source tables back for derived analytics.
pub trait AnalyticsSource: Send + Sync {
    /// The G-spread history in long format, keyed by security name.
    fn g_spread_series(&self) -> Result<Vec<SeriesPoint>>;

    /// Every stored dealer-runs observation.
    fn runs_observations(&self) -> Result<Vec<RunsRecord>>;
}
