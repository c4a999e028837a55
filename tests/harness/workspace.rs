use std::fs;
use std::path::{Path, PathBuf};

use bondlake::application::load::CancelFlag;
use bondlake::application::pipeline::RunOptions;
use bondlake::application::summary::RunSummary;
use bondlake::domain::source::SourceKind;
use bondlake::infrastructure::bootstrap::{self, RunRequest};
use bondlake::infrastructure::config::settings::Config;
use bondlake::testkit::{config, fixture};
use tempfile::TempDir;

use super::temp_db::TempDb;

/// A scratch directory with raw inputs, state, snapshots and a database.
pub struct Workspace {
    dir: TempDir,
    pub config: Config,
}

impl Workspace {
    /// Every source and both analytics enabled.
    pub fn full() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let config = config::workspace(dir.path());
        Self::with_dirs(dir, config)
    }

    /// Only `kinds` configured, analytics off.
    pub fn only(kinds: &[SourceKind]) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let config = config::only(dir.path(), kinds);
        Self::with_dirs(dir, config)
    }

    fn with_dirs(dir: TempDir, config: Config) -> Self {
        for kind in config.sources.enabled() {
            fs::create_dir_all(config::raw_dir(dir.path(), kind)).expect("create raw dir");
        }
        Self { dir, config }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, kind: SourceKind, name: &str, content: &str) -> PathBuf {
        fixture::write_raw(self.root(), kind, name, content)
    }

    pub fn db(&self) -> TempDb {
        TempDb::open(&self.config.database)
    }

    pub async fn run_with(&self, request: RunRequest) -> RunSummary {
        bootstrap::run(&self.config, &request, &CancelFlag::new())
            .await
            .expect("run starts")
    }

    pub async fn run(&self) -> RunSummary {
        self.run_with(RunRequest::default()).await
    }

    pub async fn run_options(&self, force_full_refresh: bool, dry_run: bool) -> RunSummary {
        self.run_with(RunRequest {
            options: RunOptions {
                force_full_refresh,
                dry_run,
                ..RunOptions::default()
            },
            ..RunRequest::default()
        })
        .await
    }
}
