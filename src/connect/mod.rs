//! Database session seam.
//!
//! # Data Flow
//! ```text
//! Pool / FailoverController / BackupExporter
//!     → Connect (open a session against one descriptor)
//!     → Box<dyn DbSession> (ping, full-table reads)
//!     → postgres.rs (production driver, tokio-postgres)
//! ```
//!
//! # Design Decisions
//! - The pool never touches the wire protocol; everything behind the trait
//! - Dyn-safe so tests can inject scripted sessions
//! - Rows cross the seam as JSON objects: the dashboard tables are small and
//!   column sets vary per table

pub mod postgres;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::SessionError;
use crate::pool::ConnectionDescriptor;

/// One row, as an ordered column → value mapping.
pub type RowObject = serde_json::Map<String, serde_json::Value>;

/// A live database session owned by exactly one holder at a time.
#[async_trait]
pub trait DbSession: Send {
    /// Trivial round-trip to verify the session is alive.
    async fn ping(&mut self) -> Result<(), SessionError>;

    /// Read the full contents of `table`, ordered by `order_by` ascending.
    async fn fetch_table(
        &mut self,
        table: &str,
        order_by: &str,
    ) -> Result<Vec<RowObject>, SessionError>;
}

/// Opens sessions against a single descriptor.
#[async_trait]
pub trait Connect: Send + Sync {
    /// Open a new session, bounded by `timeout` end to end.
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        timeout: Duration,
    ) -> Result<Box<dyn DbSession>, SessionError>;
}

pub use postgres::PgConnector;
