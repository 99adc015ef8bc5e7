//! Error taxonomy for the connectivity layer.
//!
//! # Propagation policy
//! - Individual connection failures recover internally (close and reopen);
//!   they surface only as tracing events and a probe of the active target.
//! - Only capacity exhaustion and target unreachability cross the component
//!   boundary as errors.
//! - Failover transitions are expected operational behaviour and are logged,
//!   never raised.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`Pool::acquire`](crate::pool::Pool::acquire).
#[derive(Debug, Error)]
pub enum PoolError {
    /// All connections were in use for the whole acquire timeout.
    /// Transient; callers should retry with backoff or answer 503.
    #[error("pool exhausted: all {max_size} connections in use after {waited:?}")]
    Exhausted { max_size: usize, waited: Duration },

    /// The active target is unreachable and no standby has been promoted.
    /// Callers should surface a service-degraded response.
    #[error("no reachable database target")]
    Unavailable,

    /// The pool has begun draining; no new checkouts are accepted.
    #[error("pool is shutting down")]
    ShuttingDown,
}

/// Failures observed on a single database session.
///
/// Internal to the layer: a session error drives `mark_broken` and an
/// out-of-band probe, it is never handed to request callers directly.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// TCP/startup failure while opening a session.
    #[error("could not reach {addr}: {message}")]
    Unreachable { addr: String, message: String },

    /// A bounded network operation exceeded its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The underlying connection died mid-use.
    #[error("connection broken: {0}")]
    Broken(String),

    /// The server rejected a statement; the connection itself is fine.
    #[error("query failed: {0}")]
    Query(String),
}

impl SessionError {
    /// True when the session itself is unusable and must not be recycled.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SessionError::Query(_))
    }
}

/// Errors surfaced to the external scheduler by the backup exporter.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The table read failed twice (initial attempt plus one retry).
    #[error("export of table {table} failed after retry: {message}")]
    Failed { table: String, message: String },

    /// The snapshot could not be persisted to disk.
    #[error("could not write snapshot for table {table}: {source}")]
    Write {
        table: String,
        #[source]
        source: std::io::Error,
    },
}
