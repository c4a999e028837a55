//! Handler for the `check` command.

use std::path::Path;

use serde_json::json;

use crate::adapter::inbound::cli::output;
use crate::domain::source::SourceKind;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;

/// Validate a configuration file without touching any data.
pub fn execute<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let path = config_path.as_ref();
    let config = Config::load(path)?;
    let enabled = config.sources.enabled();

    if output::is_json() {
        let sources = enabled
            .iter()
            .map(|kind| -> Result<serde_json::Value> {
                let key = config.key_spec(*kind)?;
                Ok(json!({
                    "source": kind.as_str(),
                    "table": kind.table(),
                    "natural_key": key.columns(),
                    "recency_column": key.recency_column(),
                }))
            })
            .collect::<Result<Vec<_>>>()?;
        output::json_output(json!({
            "command": "check",
            "config": path.display().to_string(),
            "valid": true,
            "database": config.database,
            "sources": sources,
            "pairwise": config.analytics.pairwise.enabled,
            "monitor": config.analytics.monitor.enabled,
        }));
        return Ok(());
    }

    output::section("Configuration Check");
    output::field("Config", path.display());
    output::success("Configuration file is valid");

    output::section("Summary");
    output::field("Database", &config.database);
    output::field("State dir", config.state_dir.display());
    output::field("Datasets", config.dataset_dir.display());
    output::field("Batch size", config.pipeline.batch_size);
    output::field(
        "Parallel",
        if config.pipeline.parallel.enabled { "enabled" } else { "disabled" },
    );

    output::section("Sources");
    for kind in SourceKind::ALL {
        let Some(source) = config.sources.get(kind) else {
            output::field(kind.as_str(), output::muted("not configured"));
            continue;
        };
        if !enabled.contains(&kind) {
            output::field(kind.as_str(), output::muted("disabled"));
            continue;
        }
        let key = config.key_spec(kind)?;
        output::field(
            kind.as_str(),
            format!(
                "{} -> {} (key: {})",
                source.input_dir.display(),
                kind.table(),
                key.columns().join(", ")
            ),
        );
        if !source.input_dir.is_dir() {
            output::warning(&format!(
                "{kind}: input directory {} does not exist",
                source.input_dir.display()
            ));
        }
    }

    output::section("Analytics");
    output::field(
        "Pairwise",
        if config.analytics.pairwise.enabled { "enabled" } else { "disabled" },
    );
    output::field(
        "Monitor",
        if config.analytics.monitor.enabled { "enabled" } else { "disabled" },
    );

    if enabled.is_empty() {
        output::hint("add a [sources.<name>] section to ingest data");
    }
    Ok(())
}
