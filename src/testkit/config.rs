//! Canonical test configuration.
//!
//! Every path lives under one root so a test only needs a temp directory.

use std::path::{Path, PathBuf};

use crate::domain::source::SourceKind;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::config::source::SourceConfig;

/// Raw input directory of `kind` under `root`.
#[must_use]
pub fn raw_dir(root: &Path, kind: SourceKind) -> PathBuf {
    root.join("raw").join(kind.as_str())
}

/// All four sources and both analytics enabled, with no retry delays.
#[must_use]
pub fn workspace(root: &Path) -> Config {
    let mut config = Config {
        database: root.join("bondlake.db").display().to_string(),
        state_dir: root.join("state"),
        dataset_dir: root.join("datasets"),
        ..Config::default()
    };
    config.pipeline.retry_initial_delay_ms = 1;
    config.pipeline.retry_max_delay_ms = 1;
    config.pipeline.max_retries = 1;
    config.pipeline.stage_timeout_secs = 60;
    for kind in SourceKind::ALL {
        *config.sources.slot_mut(kind) = Some(SourceConfig::new(raw_dir(root, kind)));
    }
    config
}

/// Like [`workspace`], with only `kinds` configured and analytics off.
#[must_use]
pub fn only(root: &Path, kinds: &[SourceKind]) -> Config {
    let mut config = workspace(root);
    for kind in SourceKind::ALL {
        if !kinds.contains(&kind) {
            *config.sources.slot_mut(kind) = None;
        }
    }
    config.analytics.pairwise.enabled = false;
    config.analytics.monitor.enabled = false;
    config
}

/// The same configuration as TOML, for driving the binary.
#[must_use]
pub fn workspace_toml(root: &Path) -> String {
    let mut toml = format!(
        "database = \"{}\"\nstate_dir = \"{}\"\ndataset_dir = \"{}\"\n\n[pipeline]\nmax_retries = 1\nretry_initial_delay_ms = 1\nretry_max_delay_ms = 1\n",
        escape(&root.join("bondlake.db")),
        escape(&root.join("state")),
        escape(&root.join("datasets")),
    );
    for kind in SourceKind::ALL {
        toml.push_str(&format!(
            "\n[sources.{}]\ninput_dir = \"{}\"\n",
            kind.as_str(),
            escape(&raw_dir(root, kind))
        ));
    }
    toml
}

fn escape(path: &Path) -> String {
    path.display().to_string().replace('\\', "\\\\")
}
