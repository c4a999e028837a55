//! Stage dependency graph and its executor.
//!
//! Stages are grouped into topological waves. Every stage of a wave runs on
//! the blocking pool under a shared deadline; the next wave starts once the
//! current one has reported. A stage whose dependency did not complete is
//! skipped, never run against half-loaded data.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

use super::load::CancelFlag;
use super::summary::StageReport;
use crate::domain::source::SourceKind;
use crate::error::{ConfigError, Error, Result};

/// Identifies a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageId {
    Source(SourceKind),
    PairAnalytics,
    RunsMonitor,
}

impl StageId {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Source(kind) => kind.as_str(),
            Self::PairAnalytics => "pair_analytics",
            Self::RunsMonitor => "runs_monitor",
        }
    }

    /// Built-in dependencies: each analytics stage reads a source table.
    #[must_use]
    pub fn default_dependencies(self) -> Vec<StageId> {
        match self {
            Self::Source(_) => Vec::new(),
            Self::PairAnalytics => vec![Self::Source(SourceKind::GSpread)],
            Self::RunsMonitor => vec![Self::Source(SourceKind::Runs)],
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Work performed by a stage. Receives the stage's own cancel flag.
pub type StageJob = Box<dyn FnOnce(CancelFlag) -> StageReport + Send + 'static>;

struct Stage {
    id: StageId,
    depends_on: Vec<StageId>,
    job: StageJob,
}

/// Declared stages and their dependencies.
#[derive(Default)]
pub struct StageGraph {
    stages: Vec<Stage>,
}

impl StageGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stage with its built-in dependencies.
    pub fn add(&mut self, id: StageId, job: StageJob) {
        let depends_on = id.default_dependencies();
        self.add_with_dependencies(id, depends_on, job);
    }

    /// Register a stage with explicit dependencies. Dependencies on stages
    /// that are not registered are ignored: the stage then reads whatever an
    /// earlier run left in the table.
    pub fn add_with_dependencies(&mut self, id: StageId, depends_on: Vec<StageId>, job: StageJob) {
        self.stages.retain(|s| s.id != id);
        self.stages.push(Stage {
            id,
            depends_on,
            job,
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Group stages into waves whose members depend only on earlier waves.
    ///
    /// # Errors
    /// Returns a configuration error when the dependencies form a cycle.
    pub fn waves(&self) -> Result<Vec<Vec<StageId>>> {
        let registered: BTreeSet<StageId> = self.stages.iter().map(|s| s.id).collect();
        let mut pending: BTreeMap<StageId, BTreeSet<StageId>> = self
            .stages
            .iter()
            .map(|s| {
                let deps = s
                    .depends_on
                    .iter()
                    .copied()
                    .filter(|d| registered.contains(d) && *d != s.id)
                    .collect();
                (s.id, deps)
            })
            .collect();

        let mut waves = Vec::new();
        while !pending.is_empty() {
            let ready: Vec<StageId> = pending
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(id, _)| *id)
                .collect();
            if ready.is_empty() {
                let stuck: Vec<&str> = pending.keys().map(|id| id.name()).collect();
                return Err(ConfigError::InvalidValue {
                    field: "stages",
                    reason: format!("dependency cycle among {stuck:?}"),
                }
                .into());
            }
            for id in &ready {
                pending.remove(id);
            }
            for deps in pending.values_mut() {
                for id in &ready {
                    deps.remove(id);
                }
            }
            waves.push(ready);
        }
        Ok(waves)
    }

    /// Execute every stage. Reports come back in wave order.
    ///
    /// # Errors
    /// Fails only when the graph has a cycle; stage failures are reported.
    pub async fn run(mut self, stage_timeout: Duration, cancel: &CancelFlag) -> Result<Vec<StageReport>> {
        let waves = self.waves()?;
        let mut jobs: BTreeMap<StageId, Stage> =
            self.stages.drain(..).map(|s| (s.id, s)).collect();
        let mut reports: Vec<StageReport> = Vec::with_capacity(jobs.len());
        let mut usable: BTreeMap<StageId, bool> = BTreeMap::new();

        for (n, wave) in waves.into_iter().enumerate() {
            info!(wave = n + 1, stages = ?wave.iter().map(|s| s.name()).collect::<Vec<_>>(), "Starting wave");
            let deadline = Instant::now() + stage_timeout;
            let mut running: Vec<(StageId, CancelFlag, JoinHandle<StageReport>)> = Vec::new();

            for id in wave {
                let Some(stage) = jobs.remove(&id) else {
                    continue;
                };
                let failed_dep = stage
                    .depends_on
                    .iter()
                    .find(|d| usable.get(d).is_some_and(|ok| !ok));
                if let Some(dep) = failed_dep {
                    warn!(stage = %id, dependency = %dep, "Skipping stage, dependency did not complete");
                    reports.push(StageReport::skipped(
                        id.name(),
                        format!("dependency {dep} did not complete"),
                    ));
                    usable.insert(id, false);
                    continue;
                }
                if cancel.is_cancelled() {
                    reports.push(StageReport::skipped(id.name(), Error::Cancelled.to_string()));
                    usable.insert(id, false);
                    continue;
                }

                let flag = cancel.child();
                let job_flag = flag.clone();
                let job = stage.job;
                let handle = tokio::task::spawn_blocking(move || job(job_flag));
                running.push((id, flag, handle));
            }

            for (id, flag, handle) in running {
                let report = match timeout_at(deadline, handle).await {
                    Ok(Ok(report)) => report,
                    Ok(Err(join_error)) => {
                        error!(stage = %id, error = %join_error, "Stage panicked");
                        StageReport::failed(id.name(), format!("stage panicked: {join_error}"))
                    }
                    Err(_) => {
                        // The blocking task stops at its next batch boundary.
                        flag.cancel();
                        let err = Error::StageTimeout {
                            stage: id.name().to_string(),
                            secs: stage_timeout.as_secs(),
                        };
                        error!(stage = %id, error = %err, "Stage timed out");
                        StageReport::failed(id.name(), err)
                    }
                };
                usable.insert(id, report.status.is_usable());
                reports.push(report);
            }
        }

        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::summary::StageStatus;

    fn ok_job(name: &'static str) -> StageJob {
        Box::new(move |_| StageReport::new(name))
    }

    fn failing_job(name: &'static str) -> StageJob {
        Box::new(move |_| StageReport::failed(name, "boom"))
    }

    const RUNS: StageId = StageId::Source(SourceKind::Runs);
    const GSPREAD: StageId = StageId::Source(SourceKind::GSpread);

    #[test]
    fn analytics_run_after_their_source() {
        let mut graph = StageGraph::new();
        graph.add(StageId::RunsMonitor, ok_job("runs_monitor"));
        graph.add(RUNS, ok_job("runs"));
        graph.add(GSPREAD, ok_job("g_spread"));
        graph.add(StageId::PairAnalytics, ok_job("pair_analytics"));

        let waves = graph.waves().unwrap();
        assert_eq!(waves.len(), 2);
        assert!(waves[0].contains(&RUNS) && waves[0].contains(&GSPREAD));
        assert!(waves[1].contains(&StageId::RunsMonitor));
    }

    #[test]
    fn missing_dependency_is_ignored() {
        let mut graph = StageGraph::new();
        graph.add(StageId::RunsMonitor, ok_job("runs_monitor"));
        assert_eq!(graph.waves().unwrap(), vec![vec![StageId::RunsMonitor]]);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut graph = StageGraph::new();
        graph.add_with_dependencies(RUNS, vec![GSPREAD], ok_job("runs"));
        graph.add_with_dependencies(GSPREAD, vec![RUNS], ok_job("g_spread"));
        assert!(matches!(graph.waves(), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn failed_dependency_skips_dependent_only() {
        let mut graph = StageGraph::new();
        graph.add(RUNS, failing_job("runs"));
        graph.add(GSPREAD, ok_job("g_spread"));
        graph.add(StageId::RunsMonitor, ok_job("runs_monitor"));
        graph.add(StageId::PairAnalytics, ok_job("pair_analytics"));

        let reports = graph
            .run(Duration::from_secs(5), &CancelFlag::new())
            .await
            .unwrap();
        let status = |name: &str| reports.iter().find(|r| r.stage == name).unwrap().status;
        assert_eq!(status("runs"), StageStatus::Failed);
        assert_eq!(status("runs_monitor"), StageStatus::Skipped);
        assert_eq!(status("g_spread"), StageStatus::Success);
        assert_eq!(status("pair_analytics"), StageStatus::Success);
    }

    #[tokio::test]
    async fn slow_stage_times_out_and_is_cancelled() {
        let mut graph = StageGraph::new();
        graph.add(
            RUNS,
            Box::new(|flag: CancelFlag| {
                while !flag.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(5));
                }
                StageReport::new("runs")
            }),
        );
        graph.add(GSPREAD, ok_job("g_spread"));

        let reports = graph
            .run(Duration::from_millis(100), &CancelFlag::new())
            .await
            .unwrap();
        let runs = reports.iter().find(|r| r.stage == "runs").unwrap();
        assert_eq!(runs.status, StageStatus::Failed);
        assert!(runs.error.as_deref().unwrap().contains("timed out"));
        let gspread = reports.iter().find(|r| r.stage == "g_spread").unwrap();
        assert_eq!(gspread.status, StageStatus::Success);
    }

    #[tokio::test]
    async fn cancelled_run_skips_pending_stages() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut graph = StageGraph::new();
        graph.add(RUNS, ok_job("runs"));
        let reports = graph.run(Duration::from_secs(1), &cancel).await.unwrap();
        assert_eq!(reports[0].status, StageStatus::Skipped);
    }
}
