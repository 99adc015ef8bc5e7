//! Snapshot file format and persistence.
//!
//! One JSON document per export: `{table, generated_at, row_count, rows}`.
//! Stable, versionable, human-inspectable. Immutable once written; retention
//! is a separate sweep.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::connect::RowObject;
use crate::error::ExportError;

/// A full-table export at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Table the rows came from.
    pub table: String,
    /// Export time, serialized as ISO-8601.
    pub generated_at: DateTime<Utc>,
    /// Number of entries in `rows`.
    pub row_count: usize,
    /// Ordered row mappings, one object per row.
    pub rows: Vec<RowObject>,
}

impl Snapshot {
    pub fn new(table: impl Into<String>, rows: Vec<RowObject>) -> Self {
        Self {
            table: table.into(),
            generated_at: Utc::now(),
            row_count: rows.len(),
            rows,
        }
    }

    /// Deterministic file name: `backup_<table>_<YYYYmmdd_HHMMSS>.json`.
    pub fn file_name(&self) -> String {
        format!(
            "backup_{}_{}.json",
            self.table,
            self.generated_at.format("%Y%m%d_%H%M%S")
        )
    }

    /// Persist under `dir`, creating it if needed. The document is written
    /// to a temp file and renamed into place, so a crash or disk error never
    /// leaves a partial snapshot behind.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let io_err = |source| ExportError::Write {
            table: self.table.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(io_err)?;

        let path = dir.join(self.file_name());
        let tmp = path.with_extension("json.tmp");

        let body = serde_json::to_vec_pretty(self).map_err(|e| ExportError::Write {
            table: self.table.clone(),
            source: std::io::Error::other(e),
        })?;

        fs::write(&tmp, body).map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: u64, name: &str) -> RowObject {
        let mut object = RowObject::new();
        object.insert("id".to_string(), json!(id));
        object.insert("name".to_string(), json!(name));
        object
    }

    #[test]
    fn test_row_count_matches_rows() {
        let snapshot = Snapshot::new("client_bot_signups", vec![row(1, "a"), row(2, "b")]);
        assert_eq!(snapshot.row_count, 2);
        assert_eq!(snapshot.table, "client_bot_signups");
    }

    #[test]
    fn test_file_name_shape() {
        let snapshot = Snapshot::new("master_bot_data", Vec::new());
        let name = snapshot.file_name();
        assert!(name.starts_with("backup_master_bot_data_"));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn test_serialized_document_is_stable() {
        let snapshot = Snapshot::new("master_bot_data", vec![row(1, "a")]);
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&snapshot).unwrap()).unwrap();
        assert_eq!(value["table"], "master_bot_data");
        assert_eq!(value["row_count"], 1);
        assert!(value["generated_at"].is_string());
        assert_eq!(value["rows"][0]["id"], 1);
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = Snapshot::new("user_session_data", vec![row(7, "x")]);
        let path = snapshot.write_to(dir.path()).unwrap();

        let restored: Snapshot =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(restored.row_count, 1);
        assert_eq!(restored.rows, snapshot.rows);

        // No temp file left behind.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
