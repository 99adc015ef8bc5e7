//! Database connectivity layer for the dashboard.
//!
//! # Architecture Overview
//!
//! ```text
//!  Request handlers (external)        External scheduler
//!          │ acquire/release                │ export_table
//!          ▼                                ▼
//!     ┌─────────┐     probe req.      ┌──────────────┐
//!     │  pool   │────────────────────▶│   failover   │
//!     │ manager │◀────────────────────│  controller  │
//!     └────┬────┘  drain / promote    └──────────────┘
//!          │ connect                        │ probes
//!          ▼                                ▼
//!     ┌─────────┐                     ┌──────────────┐
//!     │ connect │── tokio-postgres ──▶│  primary /   │
//!     │  seam   │                     │   standbys   │
//!     └─────────┘                     └──────────────┘
//!
//!     backup exporter: acquire → read full table → release → write snapshot
//! ```
//!
//! The pool owns a bounded set of live connections to the currently active
//! target and hands them out under a single bookkeeping mutex. The failover
//! controller runs as a background task, probing the active target and
//! switching to the next reachable standby after confirmed failures. The
//! backup exporter turns full-table reads into immutable JSON snapshots
//! without ever holding a connection across disk I/O.

// Core subsystems
pub mod config;
pub mod connect;
pub mod error;
pub mod pool;

// Traffic management
pub mod backup;
pub mod failover;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use backup::{BackupExporter, Snapshot};
pub use config::PoolConfig;
pub use error::{ExportError, PoolError, SessionError};
pub use failover::FailoverController;
pub use lifecycle::Shutdown;
pub use pool::{ConnectionDescriptor, Pool, PoolGuard, PoolStatus, Role};
