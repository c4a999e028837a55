//! Normalized snapshots stored as one CSV file per source.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::fs::write_atomic;
use crate::domain::record::SourceRecord;
use crate::domain::source::SourceKind;
use crate::error::{Error, MergeInconsistencyError, Result};
use crate::port::outbound::store::DatasetStore;

/// Column every snapshot must carry for partition replacement to work.
const PARTITION_COLUMN: &str = "date";

/// Stores `<dir>/<source>.csv`, written with a header row in record order.
#[derive(Debug, Clone)]
pub struct CsvDatasetStore {
    dir: PathBuf,
}

impl CsvDatasetStore {
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
        self.dir.join(format!("{}.csv", source.as_str()))
    }
}

impl DatasetStore for CsvDatasetStore {
    fn load<R: SourceRecord>(&self) -> Result<Option<Vec<R>>> {
        let path = self.path_for(R::SOURCE);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::Reader::from_reader(io::BufReader::new(file));
        let has_partition = reader
            .headers()?
            .iter()
            .any(|h| h.trim() == PARTITION_COLUMN);
        if !has_partition {
            return Err(MergeInconsistencyError {
                source_name: R::SOURCE.as_str().to_string(),
                reason: format!(
                    "snapshot {} has no '{PARTITION_COLUMN}' column",
                    path.display()
                ),
            }
            .into());
        }

        let rows = reader
            .deserialize::<R>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!(path = %path.display(), rows = rows.len(), "Loaded snapshot");
        Ok(Some(rows))
    }

    fn save<R: SourceRecord>(&self, rows: &[R]) -> Result<()> {
        let path = self.path_for(R::SOURCE);
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(R::COLUMNS)?;
        for row in rows {
            writer.serialize(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;

        write_atomic(&path, &bytes)?;
        debug!(path = %path.display(), rows = rows.len(), "Saved snapshot");
        Ok(())
    }

    fn discard(&self, source: SourceKind) -> Result<()> {
        match fs::remove_file(self.path_for(source)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{GSpreadRecord, RunsRecord};
    use chrono::{NaiveDate, NaiveTime};
    use tempfile::TempDir;

    fn quote() -> RunsRecord {
        RunsRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            time: NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
            cusip: "037833AK6".into(),
            dealer: "DealerX".into(),
            security: Some("AAPL 3.45 2045".into()),
            benchmark: None,
            bid_spread: Some(95.0),
            ask_spread: None,
            bid_size: Some(2e6),
            ask_size: None,
            bid_price: None,
            ask_price: None,
        }
    }

    #[test]
    fn missing_snapshot_is_none() {
        let dir = TempDir::new().unwrap();
        let store = CsvDatasetStore::new(dir.path());
        assert!(store.load::<RunsRecord>().unwrap().is_none());
    }

    #[test]
    fn saved_snapshot_loads_back() {
        let dir = TempDir::new().unwrap();
        let store = CsvDatasetStore::new(dir.path());
        store.save(&[quote()]).unwrap();
        let rows = store.load::<RunsRecord>().unwrap().unwrap();
        assert_eq!(rows, vec![quote()]);
    }

    #[test]
    fn empty_snapshot_keeps_header() {
        let dir = TempDir::new().unwrap();
        let store = CsvDatasetStore::new(dir.path());
        store.save::<GSpreadRecord>(&[]).unwrap();
        assert_eq!(store.load::<GSpreadRecord>().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn snapshot_without_date_column_is_inconsistent() {
        let dir = TempDir::new().unwrap();
        let store = CsvDatasetStore::new(dir.path());
        fs::write(
            store.path_for(SourceKind::GSpread),
            "cusip,security,g_spread\nA,ACME,10\n",
        )
        .unwrap();
        assert!(matches!(
            store.load::<GSpreadRecord>(),
            Err(Error::MergeInconsistency(_))
        ));
    }

    #[test]
    fn discard_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = CsvDatasetStore::new(dir.path());
        store.save(&[quote()]).unwrap();
        store.discard(SourceKind::Runs).unwrap();
        store.discard(SourceKind::Runs).unwrap();
        assert!(store.load::<RunsRecord>().unwrap().is_none());
    }
}
