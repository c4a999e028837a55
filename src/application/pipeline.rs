//! Per-source ingestion and the two analytics stages.
//!
//! A source run always moves through the same steps:
//! discover, resolve changes, parse, standardize identifiers, merge with the
//! stored snapshot, deduplicate, load, then persist snapshot and state. The
//! processing state is written last so a failure anywhere earlier leaves the
//! previous state untouched and the files are simply picked up again.

use std::collections::HashSet;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use super::change_set;
use super::dedup;
use super::load::{BatchPolicy, CancelFlag, LoadStrategy, RelationalLoader};
use super::merge;
use super::monitor::{self, MonitorParams};
use super::pairwise::{self, PairwiseParams};
use super::parallel::WorkerPool;
use super::summary::{FailedFile, StageReport};
use crate::domain::analytics::{MonitorRecord, PairAnalysisRecord};
use crate::domain::fingerprint::{FileCandidate, ProcessingState};
use crate::domain::key::{KeySpec, NaturalKey};
use crate::domain::record::{Record, SourceRecord};
use crate::domain::value::Value;
use crate::error::{Error, Result};
use crate::port::outbound::analytics::AnalyticsSource;
use crate::port::outbound::parser::{FileSource, SourceParser};
use crate::port::outbound::store::{DatasetStore, StateStore, TableSpec, TableStore};

/// Destination table of the pairwise analytics.
pub const PAIRS_TABLE: &str = "g_spread_pairs";
/// Destination table of the runs monitor.
pub const MONITOR_TABLE: &str = "runs_monitor";

/// Column holding the partition key in every source table.
const PARTITION_COLUMN: &str = "date";

/// Flags that apply to a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub run_id: Uuid,
    pub force_full_refresh: bool,
    /// Parse, merge and deduplicate, then stop before writing anything.
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            force_full_refresh: false,
            dry_run: false,
        }
    }
}

/// Standardize a raw CUSIP: trim, upper-case and drop inner whitespace.
#[must_use]
pub fn standardize_cusip(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Collaborators of one source run.
pub struct SourcePipeline<'a, R: SourceRecord, D: DatasetStore> {
    pub files: &'a dyn FileSource,
    pub parser: &'a dyn SourceParser<R>,
    pub state: &'a dyn StateStore,
    pub datasets: &'a D,
    pub tables: &'a dyn TableStore,
    pub workers: &'a WorkerPool,
}

/// Parsed rows and the files they came from.
struct Parsed<R> {
    rows: Vec<R>,
    files: Vec<FileCandidate>,
    failed: Vec<FailedFile>,
}

impl<'a, R: SourceRecord, D: DatasetStore> SourcePipeline<'a, R, D> {
    /// Run the source end to end. Never returns an error: failures end up in
    /// the report so sibling sources keep going.
    pub fn run(
        &self,
        key: &KeySpec,
        policy: &BatchPolicy,
        options: &RunOptions,
        cancel: &CancelFlag,
    ) -> StageReport {
        let span = info_span!("source", source = %R::SOURCE, run_id = %options.run_id);
        let _guard = span.enter();
        let started = Instant::now();

        let mut report = StageReport::new(R::SOURCE.as_str());
        if let Err(e) = self.execute(key, policy, options, cancel, &mut report) {
            error!(error = %e, "Source run failed");
            report.fail(e);
        }
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            status = %report.status,
            files = report.files_processed,
            skipped = report.files_skipped,
            rows = report.rows_parsed,
            duplicates = report.duplicates,
            inserted = report.rows_inserted,
            updated = report.rows_updated,
            elapsed_ms = report.elapsed_ms,
            "Source run finished"
        );
        report
    }

    fn execute(
        &self,
        key: &KeySpec,
        policy: &BatchPolicy,
        options: &RunOptions,
        cancel: &CancelFlag,
        report: &mut StageReport,
    ) -> Result<()> {
        let source = R::SOURCE;
        let prior_state = self.state.load(source)?;
        let candidates = self.files.list()?;
        let changes = change_set::resolve(candidates, &prior_state, options.force_full_refresh);
        report.files_skipped = changes.unchanged.len();

        if changes.is_empty() {
            info!(unchanged = report.files_skipped, "No new or modified files");
            return Ok(());
        }

        let parsed = self.parse(changes.to_process);
        report.files_processed = parsed.files.len();
        report.failed_files = parsed.failed;
        if !report.failed_files.is_empty() {
            report.degrade();
        }

        let rows = self.standardize(parsed.rows);
        report.rows_parsed = rows.len();
        let new_keys: HashSet<NaturalKey> = rows.iter().map(|r| key.key_of(&r.values())).collect();

        let existing = if options.force_full_refresh {
            None
        } else {
            self.datasets.load::<R>()?
        };
        let merged = merge::merge(existing, rows, &parsed.files, source.partition_policy())?;
        let deduped = dedup::resolve(merged.rows, key);
        report.duplicates = deduped.duplicates;

        let table = TableSpec::for_record::<R>(source.table(), key);
        let loader = RelationalLoader::new(self.tables, policy, cancel);

        if options.dry_run {
            let strategy = if options.force_full_refresh {
                LoadStrategy::BulkInsert
            } else {
                loader.select_strategy(&table)?
            };
            report.strategy = Some(strategy);
            info!(strategy = strategy.as_str(), rows = deduped.rows.len(), "Dry run, nothing written");
            return Ok(());
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if options.force_full_refresh {
            // Every file stays pending until the reload lands, so a failed
            // refresh is retried by the next run instead of being skipped.
            self.state.save(source, &ProcessingState::default())?;
            let cleared = self.tables.truncate(&table)?;
            report.rows_deleted = cleared;
            info!(cleared, "Cleared table for full refresh");
        } else if !merged.replaced_partitions.is_empty() {
            let dates: Vec<Value> = merged
                .replaced_partitions
                .iter()
                .map(|d| Value::from(*d))
                .collect();
            report.rows_deleted = self
                .tables
                .delete_where_in(&table, PARTITION_COLUMN, &dates)?;
            debug!(
                partitions = dates.len(),
                deleted = report.rows_deleted,
                "Removed reprocessed partitions"
            );
        }

        let strategy = loader.select_strategy(&table)?;
        let to_load: Vec<Vec<Value>> = match strategy {
            // An empty table receives the whole deduplicated history.
            LoadStrategy::BulkInsert => deduped.rows.iter().map(|r| r.values()).collect(),
            _ => deduped
                .rows
                .iter()
                .map(|r| r.values())
                .filter(|values| new_keys.contains(&key.key_of(values)))
                .collect(),
        };

        let outcome = loader.load(&table, to_load, strategy)?;
        report.record_load(&outcome);
        // A timeout can trip the flag after the last batch.
        if outcome.cancelled || cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.datasets.save(&deduped.rows)?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut state = if options.force_full_refresh {
            ProcessingState::default()
        } else {
            prior_state
        };
        for file in &parsed.files {
            state.record(file.name.clone(), file.fingerprint);
        }
        state.last_processed = Some(Utc::now());

        match self.state.save(source, &state) {
            Ok(()) => report.state_saved = true,
            Err(e) => {
                error!(
                    error = %e,
                    "Processing state not saved; these files will be reprocessed next run"
                );
                report.degrade();
            }
        }
        Ok(())
    }

    fn parse(&self, files: Vec<FileCandidate>) -> Parsed<R> {
        let parser = self.parser;
        let results = self.workers.map(files, |file| {
            let result = parser.parse(&file);
            (file, result)
        });

        let mut parsed = Parsed {
            rows: Vec::new(),
            files: Vec::new(),
            failed: Vec::new(),
        };
        for (file, result) in results {
            match result {
                Ok(rows) => {
                    debug!(file = %file.name, rows = rows.len(), "Parsed file");
                    parsed.rows.extend(rows);
                    parsed.files.push(file);
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "Skipping unparseable file");
                    parsed.failed.push(FailedFile {
                        file: file.name,
                        reason: e.reason,
                    });
                }
            }
        }
        parsed
    }

    fn standardize(&self, rows: Vec<R>) -> Vec<R> {
        let total = rows.len();
        let rows: Vec<R> = self
            .workers
            .map_rows(rows, |mut row| {
                let cusip = standardize_cusip(row.cusip());
                row.set_cusip(cusip);
                row
            })
            .into_iter()
            .filter(|row| !row.cusip().is_empty())
            .collect();

        let dropped = total - rows.len();
        if dropped > 0 {
            warn!(dropped, "Dropped rows without an identifier");
        }
        rows
    }
}

/// Recompute pairwise spread statistics and replace the analytics table.
pub fn run_pairwise(
    source: &dyn AnalyticsSource,
    tables: &dyn TableStore,
    params: &PairwiseParams,
    options: &RunOptions,
) -> StageReport {
    let span = info_span!("analytics", stage = "pair_analytics", run_id = %options.run_id);
    let _guard = span.enter();
    run_analytics("pair_analytics", || {
        let series = source.g_spread_series()?;
        let records = pairwise::analyze(&series, params);
        let table = TableSpec::with_key::<PairAnalysisRecord>(
            PAIRS_TABLE,
            &["instrument_1", "instrument_2"],
        );
        write_analytics(tables, &table, &records, options.dry_run, series.len())
    })
}

/// Recompute the runs monitor and replace its table.
pub fn run_monitor(
    source: &dyn AnalyticsSource,
    tables: &dyn TableStore,
    params: &MonitorParams,
    options: &RunOptions,
) -> StageReport {
    let span = info_span!("analytics", stage = "runs_monitor", run_id = %options.run_id);
    let _guard = span.enter();
    run_analytics("runs_monitor", || {
        let runs = source.runs_observations()?;
        let records = monitor::monitor(&runs, params);
        let table = TableSpec::with_key::<MonitorRecord>(MONITOR_TABLE, &["cusip", "as_of_date"]);
        write_analytics(tables, &table, &records, options.dry_run, runs.len())
    })
}

fn run_analytics<F>(stage: &str, body: F) -> StageReport
where
    F: FnOnce() -> Result<StageReport>,
{
    let started = Instant::now();
    let mut report = body().unwrap_or_else(|e| {
        error!(error = %e, "Analytics stage failed");
        StageReport::failed(stage, e)
    });
    report.stage = stage.to_string();
    report.elapsed_ms = started.elapsed().as_millis() as u64;
    report
}

fn write_analytics<R: Record>(
    tables: &dyn TableStore,
    table: &TableSpec,
    records: &[R],
    dry_run: bool,
    input_rows: usize,
) -> Result<StageReport> {
    let mut report = StageReport::new(table.name.as_str());
    report.rows_parsed = input_rows;
    if !dry_run {
        let rows: Vec<Vec<Value>> = records.iter().map(|r| r.values()).collect();
        report.rows_inserted = tables.replace_all(table, &rows)?;
    }
    info!(
        table = %table.name,
        records = records.len(),
        dry_run,
        "Analytics table refreshed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cusips_are_standardized() {
        assert_eq!(standardize_cusip("  abc 12 3 "), "ABC123");
        assert_eq!(standardize_cusip("\t"), "");
        assert_eq!(standardize_cusip("912828YK0"), "912828YK0");
    }
}
