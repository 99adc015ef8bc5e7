//! Backup/export subsystem.
//!
//! # Data Flow
//! ```text
//! External scheduler
//!     → BackupExporter::export_table (pooled read, retry once)
//!     → Snapshot (table, generated_at, row_count, rows)
//!     → snapshot.rs write_to (temp + rename, never partial)
//!     → retention sweep deletes expired backup_*.json files
//! ```

pub mod exporter;
pub mod snapshot;

pub use exporter::BackupExporter;
pub use snapshot::Snapshot;
