//! Composition root: builds the adapters and the stage graph of a run.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, info_span, Instrument};

use crate::adapter::outbound::dataset::CsvDatasetStore;
use crate::adapter::outbound::discovery::DirectoryFileSource;
use crate::adapter::outbound::parser::{GSpreadParser, PortfolioParser, RunsParser, UniverseParser};
use crate::adapter::outbound::sqlite::database::connection::{create_pool, run_migrations};
use crate::adapter::outbound::sqlite::table::SqliteTableStore;
use crate::adapter::outbound::state_file::JsonStateStore;
use crate::application::load::{BatchPolicy, CancelFlag};
use crate::application::parallel::WorkerPool;
use crate::application::pipeline::{run_monitor, run_pairwise, RunOptions, SourcePipeline};
use crate::application::stage::{StageGraph, StageId, StageJob};
use crate::application::summary::RunSummary;
use crate::domain::key::KeySpec;
use crate::domain::record::SourceRecord;
use crate::domain::source::SourceKind;
use crate::error::{ConfigError, Error, Result};
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::config::source::SourceConfig;
use crate::port::outbound::parser::SourceParser;

/// What the operator asked for on top of the configuration.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Restrict the run to these sources. Analytics stages run only when
    /// their source is selected.
    pub sources: Option<Vec<SourceKind>>,
    pub options: RunOptions,
    /// Force the worker pool on regardless of `pipeline.parallel.enabled`.
    pub parallel: bool,
    /// Overrides every batch size.
    pub batch_size: Option<usize>,
}

/// Adapters shared by every stage of a run.
pub struct Stores {
    pub tables: SqliteTableStore,
    pub state: JsonStateStore,
    pub datasets: CsvDatasetStore,
    pub workers: WorkerPool,
}

impl Stores {
    /// Open the database (running migrations) and the file-backed stores.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated, or the
    /// worker pool cannot be built.
    pub fn open(config: &Config, force_parallel: bool) -> Result<Self> {
        let tables = open_table_store(&config.database)?;
        let mut parallel = config.pipeline.parallel.clone();
        parallel.enabled |= force_parallel;
        Ok(Self {
            tables,
            state: JsonStateStore::new(&config.state_dir),
            datasets: CsvDatasetStore::new(&config.dataset_dir),
            workers: parallel.worker_pool()?,
        })
    }
}

/// Initialize SQLite and return the table store.
///
/// # Errors
/// Returns an error if the database cannot be opened or migrated.
pub fn open_table_store(database: &str) -> Result<SqliteTableStore> {
    if let Some(parent) = Path::new(database).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db_url = format!("sqlite://{database}");
    let pool = create_pool(&db_url)?;
    run_migrations(&pool)?;
    Ok(SqliteTableStore::new(pool))
}

fn source_job<R, P>(
    source: &SourceConfig,
    parser: P,
    key: KeySpec,
    policy: BatchPolicy,
    stores: &Arc<Stores>,
    options: RunOptions,
) -> StageJob
where
    R: SourceRecord,
    P: SourceParser<R> + 'static,
{
    let files = DirectoryFileSource::new(&source.input_dir, &source.extensions);
    let stores = Arc::clone(stores);
    Box::new(move |cancel: CancelFlag| {
        let pipeline = SourcePipeline {
            files: &files,
            parser: &parser,
            state: &stores.state,
            datasets: &stores.datasets,
            tables: &stores.tables,
            workers: &stores.workers,
        };
        pipeline.run(&key, &policy, &options, &cancel)
    })
}

/// Sources this run covers, in canonical order.
fn selected_sources(config: &Config, request: &RunRequest) -> Result<Vec<SourceKind>> {
    let enabled = config.sources.enabled();
    let Some(wanted) = &request.sources else {
        return Ok(enabled);
    };
    let wanted: BTreeSet<SourceKind> = wanted.iter().copied().collect();
    if let Some(missing) = wanted.iter().find(|kind| !enabled.contains(kind)) {
        return Err(ConfigError::InvalidValue {
            field: "sources",
            reason: format!("{missing} is not configured or not enabled"),
        }
        .into());
    }
    Ok(enabled.into_iter().filter(|k| wanted.contains(k)).collect())
}

/// Register one stage per selected source plus the enabled analytics.
///
/// # Errors
/// Returns a configuration error for unknown sources or key columns.
pub fn build_stage_graph(
    config: &Config,
    request: &RunRequest,
    stores: &Arc<Stores>,
) -> Result<StageGraph> {
    let sources = selected_sources(config, request)?;
    let options = request.options;
    let mut graph = StageGraph::new();

    for kind in &sources {
        let Some(source) = config.sources.get(*kind) else {
            continue;
        };
        let key = config.key_spec(*kind)?;
        let policy = config
            .pipeline
            .batch_policy(request.batch_size.or(source.batch_size));
        let job = match kind {
            SourceKind::Universe => {
                source_job(source, UniverseParser::new(), key, policy, stores, options)
            }
            SourceKind::Portfolio => {
                source_job(source, PortfolioParser::new(), key, policy, stores, options)
            }
            SourceKind::Runs => source_job(source, RunsParser::new(), key, policy, stores, options),
            SourceKind::GSpread => {
                source_job(source, GSpreadParser::new(), key, policy, stores, options)
            }
        };
        graph.add(StageId::Source(*kind), job);
    }

    // An explicit source selection narrows analytics to the selected sources.
    let wants = |kind: SourceKind| request.sources.is_none() || sources.contains(&kind);

    if config.analytics.pairwise.enabled && wants(SourceKind::GSpread) {
        let params = config.analytics.pairwise.params();
        let stores = Arc::clone(stores);
        graph.add(
            StageId::PairAnalytics,
            Box::new(move |_cancel: CancelFlag| {
                run_pairwise(&stores.tables, &stores.tables, &params, &options)
            }),
        );
    }
    if config.analytics.monitor.enabled && wants(SourceKind::Runs) {
        let params = config.analytics.monitor.params();
        let stores = Arc::clone(stores);
        graph.add(
            StageId::RunsMonitor,
            Box::new(move |_cancel: CancelFlag| {
                run_monitor(&stores.tables, &stores.tables, &params, &options)
            }),
        );
    }

    Ok(graph)
}

/// Execute a full run and collect its summary.
///
/// # Errors
/// Fails only when the run cannot start: bad configuration, unreachable
/// database or a cyclic stage graph. Stage failures are in the summary.
pub async fn run(config: &Config, request: &RunRequest, cancel: &CancelFlag) -> Result<RunSummary> {
    let run_id = request.options.run_id;
    let span = info_span!("run", run_id = %run_id);

    async {
        let started_at = Utc::now();
        let stores = Arc::new(Stores::open(config, request.parallel)?);
        let graph = build_stage_graph(config, request, &stores)?;
        info!(
            stages = graph.len(),
            dry_run = request.options.dry_run,
            force_full_refresh = request.options.force_full_refresh,
            workers = stores.workers.workers(),
            "Starting run"
        );

        let stages = graph
            .run(config.pipeline.stage_timeout(), cancel)
            .await?;

        let summary = RunSummary {
            run_id: run_id.to_string(),
            started_at,
            finished_at: Utc::now(),
            dry_run: request.options.dry_run,
            stages,
        };
        info!(
            failed = summary.has_failures(),
            rows_written = summary.total_rows_written(),
            duplicates = summary.total_duplicates(),
            "Run finished"
        );
        Ok::<_, Error>(summary)
    }
    .instrument(span)
    .await
}
