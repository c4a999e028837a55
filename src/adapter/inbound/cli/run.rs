//! Handler for the `run` command.

use serde_json::json;
use tabled::{Table, Tabled};
use tracing::warn;

use crate::adapter::inbound::cli::command::RunArgs;
use crate::adapter::inbound::cli::output;
use crate::application::load::CancelFlag;
use crate::application::pipeline::RunOptions;
use crate::application::summary::{RunSummary, StageReport};
use crate::error::Result;
use crate::infrastructure::bootstrap::{self, RunRequest};
use crate::infrastructure::config::settings::Config;

#[derive(Tabled)]
struct StageRow {
    #[tabled(rename = "Stage")]
    stage: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Files")]
    files: String,
    #[tabled(rename = "Rows")]
    rows: usize,
    #[tabled(rename = "Dups")]
    duplicates: usize,
    #[tabled(rename = "Strategy")]
    strategy: String,
    #[tabled(rename = "Inserted")]
    inserted: usize,
    #[tabled(rename = "Updated")]
    updated: usize,
    #[tabled(rename = "Deleted")]
    deleted: usize,
    #[tabled(rename = "Time")]
    elapsed: String,
}

impl From<&StageReport> for StageRow {
    fn from(report: &StageReport) -> Self {
        Self {
            stage: report.stage.clone(),
            status: output::status(report.status),
            files: format!("{}/{}", report.files_processed, report.files_skipped),
            rows: report.rows_parsed,
            duplicates: report.duplicates,
            strategy: report
                .strategy
                .map_or_else(|| "-".to_string(), |s| s.as_str().to_string()),
            inserted: report.rows_inserted,
            updated: report.rows_updated,
            deleted: report.rows_deleted,
            elapsed: format!("{:.1}s", report.elapsed_ms as f64 / 1000.0),
        }
    }
}

fn build_run_request(args: &RunArgs) -> RunRequest {
    RunRequest {
        sources: (!args.sources.is_empty()).then(|| args.sources.clone()),
        options: RunOptions {
            force_full_refresh: args.force_full_refresh,
            dry_run: args.dry_run,
            ..RunOptions::default()
        },
        parallel: args.parallel,
        batch_size: args.batch_size.map(|n| n as usize),
    }
}

/// Execute the run command. Returns `false` when any stage failed.
pub async fn execute(args: &RunArgs) -> Result<bool> {
    let config = Config::load(&args.config.config)?;
    config.init_logging();
    let request = build_run_request(args);

    if !output::is_json() {
        output::header(env!("CARGO_PKG_VERSION"));
        output::field("Run", request.options.run_id);
        output::field("Database", &config.database);
        if request.options.dry_run {
            output::note("Dry run: nothing will be written");
        }
    }

    // Ctrl-C stops stages at their next batch boundary.
    let cancel = CancelFlag::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                cancel.cancel();
            }
        })
    };
    let result = bootstrap::run(&config, &request, &cancel).await;
    watcher.abort();
    let summary = result?;

    print_summary(&summary);
    Ok(!summary.has_failures())
}

fn print_summary(summary: &RunSummary) {
    if output::is_json() {
        output::json_output(json!({
            "command": "run",
            "summary": summary,
        }));
        return;
    }

    output::section("Stages");
    if summary.stages.is_empty() {
        output::note("No stages to run");
        output::hint("add a [sources.<name>] section with an input_dir to config.toml");
        return;
    }
    let rows: Vec<StageRow> = summary.stages.iter().map(StageRow::from).collect();
    output::lines(&Table::new(rows).to_string());

    for stage in &summary.stages {
        for failed in &stage.failed_files {
            output::warning(&format!("{}: {} ({})", stage.stage, failed.file, failed.reason));
        }
        if let Some(error) = &stage.error {
            output::warning(&format!("{}: {error}", stage.stage));
        }
    }

    output::section("Summary");
    output::field("Rows written", summary.total_rows_written());
    output::field("Duplicates", summary.total_duplicates());
    let elapsed = summary.finished_at - summary.started_at;
    output::field(
        "Elapsed",
        format!("{:.1}s", elapsed.num_milliseconds() as f64 / 1000.0),
    );
    if summary.has_failures() {
        output::error("Run finished with failed stages");
    } else {
        output::success("Run complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::inbound::cli::command::{Cli, Commands};
    use crate::domain::source::SourceKind;
    use clap::Parser;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["bondlake", "run"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Run(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn request_without_sources_runs_everything() {
        let request = build_run_request(&run_args(&[]));
        assert!(request.sources.is_none());
        assert!(request.batch_size.is_none());
        assert!(!request.options.dry_run);
    }

    #[test]
    fn request_carries_flags() {
        let request = build_run_request(&run_args(&[
            "--sources",
            "portfolio",
            "--dry-run",
            "--parallel",
            "--batch-size",
            "64",
        ]));
        assert_eq!(request.sources, Some(vec![SourceKind::Portfolio]));
        assert!(request.options.dry_run);
        assert!(request.parallel);
        assert_eq!(request.batch_size, Some(64));
    }

    #[test]
    fn stage_row_shows_files_as_processed_over_skipped() {
        let mut report = StageReport::new("runs");
        report.files_processed = 2;
        report.files_skipped = 5;
        report.elapsed_ms = 1500;
        let row = StageRow::from(&report);
        assert_eq!(row.files, "2/5");
        assert_eq!(row.strategy, "-");
        assert_eq!(row.elapsed, "1.5s");
    }
}
