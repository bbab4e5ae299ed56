use crate::domain::prediction::{PredictionRow, COLUMNS};
use crate::storage::error::StorageUnavailable;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Durable log of prediction rows.
///
/// `append` is a read-modify-write of the whole log. Callers must serialize
/// access (see [`crate::storage::lock`]); two concurrent appends can lose rows.
pub trait HistoryStore: Send + Sync {
    /// Full log in insertion order. A missing log is an empty log.
    fn load(&self) -> anyhow::Result<Vec<PredictionRow>>;

    /// Adds `rows` after the existing ones and rewrites the log.
    fn append(&self, rows: &[PredictionRow]) -> anyhow::Result<()>;
}

/// CSV-backed log with columns `ticker,action,sentiment,price,date,reason`.
#[derive(Debug, Clone)]
pub struct CsvHistoryStore {
    path: PathBuf,
}

impl CsvHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, stage: &'static str, detail: impl Into<String>) -> anyhow::Error {
        StorageUnavailable {
            path: self.path.clone(),
            stage,
            detail: detail.into(),
        }
        .into()
    }

    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "history".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }

    fn write_all(&self, rows: &[PredictionRow]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                self.unavailable("create_dir", format!("{}: {e}", parent.display()))
            })?;
        }

        let tmp = self.tmp_path();
        let result = self
            .write_tmp(&tmp, rows)
            .and_then(|()| {
                std::fs::rename(&tmp, &self.path)
                    .map_err(|e| self.unavailable("rename", e.to_string()))
            });
        if result.is_err() {
            if let Err(e) = std::fs::remove_file(&tmp) {
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %tmp.display(), error = %e, "failed to remove temporary log");
                }
            }
        }
        result
    }

    fn write_tmp(&self, tmp: &Path, rows: &[PredictionRow]) -> anyhow::Result<()> {
        let file = File::create(tmp).map_err(|e| self.unavailable("create", e.to_string()))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        writer
            .write_record(COLUMNS)
            .map_err(|e| self.unavailable("write_header", e.to_string()))?;
        for row in rows {
            writer
                .serialize(row)
                .map_err(|e| self.unavailable("write_row", e.to_string()))?;
        }

        let file = writer
            .into_inner()
            .map_err(|e| self.unavailable("flush", e.to_string()))?;
        file.sync_all()
            .map_err(|e| self.unavailable("sync", e.to_string()))
    }
}

impl HistoryStore for CsvHistoryStore {
    fn load(&self) -> anyhow::Result<Vec<PredictionRow>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.unavailable("open", e.to_string())),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| self.unavailable("read_header", e.to_string()))?
            .clone();
        if headers.is_empty() {
            return Ok(Vec::new());
        }
        for col in COLUMNS {
            if !headers.iter().any(|h| h.trim() == col) {
                return Err(self.unavailable("read_header", format!("missing column '{col}'")));
            }
        }

        let mut rows = Vec::new();
        for (idx, result) in reader.deserialize::<PredictionRow>().enumerate() {
            let row = result
                .map_err(|e| self.unavailable("read_row", format!("row {}: {e}", idx + 2)))?;
            rows.push(row);
        }

        tracing::debug!(path = %self.path.display(), rows = rows.len(), "history log loaded");
        Ok(rows)
    }

    fn append(&self, rows: &[PredictionRow]) -> anyhow::Result<()> {
        let mut all = self.load()?;
        all.extend_from_slice(rows);
        self.write_all(&all)?;

        tracing::info!(
            path = %self.path.display(),
            appended = rows.len(),
            total = all.len(),
            "history log rewritten"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::Action;
    use chrono::NaiveDate;

    fn row(ticker: &str, action: Action, price: f64, day: u32) -> PredictionRow {
        PredictionRow {
            ticker: ticker.to_string(),
            action,
            sentiment: "n/a".to_string(),
            price,
            date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            reason: "r".to_string(),
        }
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvHistoryStore::new(dir.path().join("history.csv"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn append_preserves_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvHistoryStore::new(dir.path().join("history.csv"));

        let first = row("F", Action::Sell, 12.4, 1);
        store.append(std::slice::from_ref(&first)).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, vec![first.clone()]);

        let second = row("TSLA", Action::Buy, 180.0, 2);
        store.append(std::slice::from_ref(&second)).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], first);
        assert_eq!(loaded[1], second);
    }

    #[test]
    fn keeps_duplicates_and_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvHistoryStore::new(dir.path().join("history.csv"));
        let rows = vec![
            row("TSLA", Action::Buy, 180.0, 5),
            row("TSLA", Action::Buy, 180.0, 5),
            row("GM", Action::Hold, 45.0, 1),
        ];
        store.append(&rows).unwrap();
        assert_eq!(store.load().unwrap(), rows);
    }

    #[test]
    fn free_text_survives_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvHistoryStore::new(dir.path().join("history.csv"));
        let mut r = row("XOM", Action::Other("Strong Buy".to_string()), 105.0, 3);
        r.reason = "Oil, \"drill\" talk\nsecond line".to_string();
        store.append(std::slice::from_ref(&r)).unwrap();
        store.append(&[row("F", Action::Sell, 12.4, 4)]).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded[0], r);
        assert_eq!(loaded[0].action.as_str(), "Strong Buy");
    }

    #[test]
    fn header_only_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        std::fs::write(&path, "ticker,action,sentiment,price,date,reason\n").unwrap();
        assert!(CsvHistoryStore::new(path).load().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        std::fs::write(
            &path,
            "ticker,action,sentiment,price,date,reason\nTSLA,BUY,n/a,not-a-price,2026-03-01,r\n",
        )
        .unwrap();

        let err = CsvHistoryStore::new(path).load().unwrap_err();
        let storage = err.downcast_ref::<StorageUnavailable>().unwrap();
        assert_eq!(storage.stage, "read_row");
    }

    #[test]
    fn missing_column_is_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        std::fs::write(&path, "ticker,action\nTSLA,BUY\n").unwrap();
        let err = CsvHistoryStore::new(path).load().unwrap_err();
        assert!(err.downcast_ref::<StorageUnavailable>().is_some());
    }

    #[test]
    fn failed_append_leaves_log_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        let garbage = "ticker,action\nTSLA,BUY\n";
        std::fs::write(&path, garbage).unwrap();

        let store = CsvHistoryStore::new(&path);
        assert!(store.append(&[row("F", Action::Sell, 12.4, 1)]).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), garbage);
    }

    #[test]
    fn unknown_action_text_is_kept_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvHistoryStore::new(dir.path().join("history.csv"));
        let r = row("XOM", Action::parse(" Strong Buy "), 105.0, 3);
        store.append(std::slice::from_ref(&r)).unwrap();
        store.append(&[row("F", Action::Sell, 12.4, 4)]).unwrap();

        assert_eq!(store.load().unwrap()[0].action.as_str(), " Strong Buy ");
    }

    #[test]
    fn unusable_parent_dir_is_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = CsvHistoryStore::new(blocker.join("history.csv"));
        let err = store.append(&[row("F", Action::Sell, 12.4, 1)]).unwrap_err();
        let storage = err.downcast_ref::<StorageUnavailable>().unwrap();
        assert_eq!(storage.stage, "create_dir");
    }

    #[test]
    fn failed_rewrite_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory at the log path makes the final rename fail.
        let path = dir.path().join("history.csv");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let store = CsvHistoryStore::new(&path);
        let err = store.write_all(&[row("F", Action::Sell, 12.4, 1)]).unwrap_err();
        assert_eq!(err.downcast_ref::<StorageUnavailable>().unwrap().stage, "rename");
        assert!(!store.tmp_path().exists());
    }
}
