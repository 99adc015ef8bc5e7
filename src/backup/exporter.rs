//! Backup exporter.
//!
//! # Responsibilities
//! - Read full table contents through a pooled connection
//! - Release the connection before any disk I/O, so export latency never
//!   reduces pool availability for web requests
//! - Retry a broken read once against the (possibly failed-over) pool
//! - Apply the snapshot retention sweep
//!
//! The cadence itself lives outside this crate; an external scheduler calls
//! [`BackupExporter::export_table`] (see the snapshot-cli binary).

use std::path::Path;
use std::time::{Duration, SystemTime};
use thiserror::Error;

use crate::backup::snapshot::Snapshot;
use crate::config::BackupSettings;
use crate::connect::RowObject;
use crate::error::{ExportError, PoolError, SessionError};
use crate::observability::metrics;
use crate::pool::Pool;

#[derive(Debug, Error)]
enum ReadError {
    #[error(transparent)]
    Pool(PoolError),
    #[error(transparent)]
    Session(SessionError),
}

/// Exports tables to snapshot files using pooled connections.
///
/// Holds no long-lived lock on the pool: each export is one ordinary
/// acquire/release cycle.
pub struct BackupExporter {
    pool: Pool,
    settings: BackupSettings,
}

impl BackupExporter {
    pub fn new(pool: Pool, settings: BackupSettings) -> Self {
        Self { pool, settings }
    }

    /// Configured table names, in export order.
    pub fn tables(&self) -> Vec<String> {
        self.settings.tables.iter().map(|t| t.name.clone()).collect()
    }

    /// Export one table: read all rows ordered by its natural key, then
    /// write the snapshot file. A failed read is retried exactly once; if the
    /// retry also fails no file is written.
    pub async fn export_table(&self, table: &str) -> Result<Snapshot, ExportError> {
        let order_by = self.order_key(table);

        let rows = match self.read_rows(table, &order_by).await {
            Ok(rows) => rows,
            Err(first) => {
                tracing::warn!(table, error = %first, "table read failed, retrying once");
                match self.read_rows(table, &order_by).await {
                    Ok(rows) => rows,
                    Err(second) => {
                        metrics::record_export(table, false);
                        return Err(ExportError::Failed {
                            table: table.to_string(),
                            message: second.to_string(),
                        });
                    }
                }
            }
        };

        // The connection is already back in the pool here; only disk I/O
        // remains.
        let snapshot = Snapshot::new(table, rows);
        let path = snapshot.write_to(Path::new(&self.settings.dir))?;
        metrics::record_export(table, true);
        tracing::info!(
            table,
            rows = snapshot.row_count,
            path = %path.display(),
            "snapshot written"
        );
        Ok(snapshot)
    }

    /// Export every configured table, continuing past individual failures.
    pub async fn export_all(&self) -> Vec<(String, Result<Snapshot, ExportError>)> {
        let mut results = Vec::with_capacity(self.settings.tables.len());
        for table in self.tables() {
            let result = self.export_table(&table).await;
            results.push((table, result));
        }
        results
    }

    /// Remove snapshot files older than the configured retention window.
    /// Returns the number of files removed. A missing backup directory is
    /// treated as empty.
    pub fn cleanup_old_snapshots(&self) -> std::io::Result<usize> {
        let dir = Path::new(&self.settings.dir);
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let cutoff = SystemTime::now() - Duration::from_secs(self.settings.keep_days * 24 * 3600);
        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with("backup_") && name.ends_with(".json")) {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            if modified < cutoff {
                std::fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(removed, "retention sweep removed expired snapshots");
        }
        Ok(removed)
    }

    fn order_key(&self, table: &str) -> String {
        self.settings
            .tables
            .iter()
            .find(|t| t.name == table)
            .map(|t| t.order_by.clone())
            .unwrap_or_else(|| "id".to_string())
    }

    /// One acquire/read/release cycle. The guard is dropped (released) before
    /// this function returns rows to the caller.
    async fn read_rows(&self, table: &str, order_by: &str) -> Result<Vec<RowObject>, ReadError> {
        let mut guard = self
            .pool
            .acquire(self.settings.export_timeout())
            .await
            .map_err(ReadError::Pool)?;

        match guard.session().fetch_table(table, order_by).await {
            Ok(rows) => {
                guard.note_health_check();
                guard.release();
                Ok(rows)
            }
            Err(e) if e.is_fatal() => {
                // Connection died mid-read: close it and let the controller
                // probe; the caller retries against the recovered pool.
                guard.mark_broken(&e);
                Err(ReadError::Session(e))
            }
            Err(e) => {
                guard.release();
                Err(ReadError::Session(e))
            }
        }
    }
}
