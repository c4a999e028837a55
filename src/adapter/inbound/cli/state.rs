//! Handler for the `state` command.

use serde_json::json;
use tabled::{Table, Tabled};

use crate::adapter::inbound::cli::command::StateArgs;
use crate::adapter::inbound::cli::output;
use crate::adapter::outbound::dataset::CsvDatasetStore;
use crate::adapter::outbound::state_file::JsonStateStore;
use crate::domain::fingerprint::ProcessingState;
use crate::domain::source::SourceKind;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::store::{DatasetStore, StateStore};

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Modified")]
    modified: String,
    #[tabled(rename = "Size")]
    size: u64,
}

/// Execute the state command.
pub fn execute(args: &StateArgs) -> Result<()> {
    let config = Config::load(&args.config.config)?;
    let store = JsonStateStore::new(&config.state_dir);

    if args.reset {
        // `--reset` requires `--source`, enforced by clap.
        if let Some(source) = args.source {
            let datasets = CsvDatasetStore::new(&config.dataset_dir);
            return reset(&store, &datasets, source);
        }
    }

    let sources: Vec<SourceKind> = match args.source {
        Some(source) => vec![source],
        None => SourceKind::ALL.to_vec(),
    };
    let states = sources
        .into_iter()
        .map(|kind| store.load(kind).map(|state| (kind, state)))
        .collect::<Result<Vec<_>>>()?;

    if output::is_json() {
        let payload: serde_json::Map<String, serde_json::Value> = states
            .iter()
            .map(|(kind, state)| -> Result<(String, serde_json::Value)> {
                Ok((kind.to_string(), serde_json::to_value(state)?))
            })
            .collect::<Result<_>>()?;
        output::json_output(json!({
            "command": "state",
            "state_dir": config.state_dir.display().to_string(),
            "sources": payload,
        }));
        return Ok(());
    }

    output::header(env!("CARGO_PKG_VERSION"));
    output::field("State dir", config.state_dir.display());
    for (kind, state) in &states {
        print_state(*kind, state);
    }
    Ok(())
}

fn print_state(kind: SourceKind, state: &ProcessingState) {
    output::section(kind.as_str());
    if state.is_empty() {
        output::note("no files processed yet");
        return;
    }
    output::field("Files", state.len());
    if let Some(last) = state.last_processed {
        output::field("Last run", last.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    let rows: Vec<FileRow> = state
        .processed_files
        .iter()
        .map(|(name, fp)| FileRow {
            file: name.clone(),
            modified: fp.modified_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            size: fp.size,
        })
        .collect();
    output::lines(&Table::new(rows).to_string());
}

/// Drop a source's state and its snapshot; the next run rebuilds both from
/// the raw files.
fn reset(store: &JsonStateStore, datasets: &CsvDatasetStore, source: SourceKind) -> Result<()> {
    let removed = store.reset(source)?;
    datasets.discard(source)?;
    if output::is_json() {
        output::json_output(json!({
            "command": "state.reset",
            "source": source.as_str(),
            "removed": removed,
        }));
    } else if removed {
        output::success(&format!("Reset state for {source}"));
        output::hint("the next run reprocesses every file of this source");
    } else {
        output::note(&format!("No state stored for {source}"));
    }
    Ok(())
}
