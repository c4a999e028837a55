//! Processing state persisted as one JSON file per source.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::fs::write_atomic;
use crate::domain::fingerprint::{ProcessingState, STATE_VERSION};
use crate::domain::source::SourceKind;
use crate::error::{Result, StatePersistenceError};
use crate::port::outbound::store::StateStore;

/// Stores `<dir>/<source>_state.json`.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    dir: PathBuf,
}

impl JsonStateStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path_for(&self, source: SourceKind) -> PathBuf {
        self.dir.join(format!("{}_state.json", source.as_str()))
    }

    /// Remove a source's state so every file is treated as new.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be removed.
    pub fn reset(&self, source: SourceKind) -> Result<bool> {
        match fs::remove_file(self.path_for(source)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl StateStore for JsonStateStore {
    fn load(&self, source: SourceKind) -> Result<ProcessingState> {
        let path = self.path_for(source);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No processing state yet");
                return Ok(ProcessingState::default());
            }
            Err(e) => return Err(e.into()),
        };

        let state: ProcessingState = serde_json::from_str(&content)?;
        if state.version != STATE_VERSION {
            warn!(
                path = %path.display(),
                version = state.version,
                "Processing state has an unexpected version"
            );
        }
        Ok(state)
    }

    fn save(
        &self,
        source: SourceKind,
        state: &ProcessingState,
    ) -> std::result::Result<(), StatePersistenceError> {
        let path = self.path_for(source);
        let fail = |reason: String| StatePersistenceError {
            path: path.clone(),
            reason,
        };
        let json = serde_json::to_string_pretty(state).map_err(|e| fail(e.to_string()))?;
        write_atomic(&path, json.as_bytes()).map_err(|e| fail(e.to_string()))?;
        debug!(path = %path.display(), files = state.len(), "Saved processing state");
        Ok(())
    }
}
