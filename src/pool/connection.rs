//! Pooled connection lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Stamp each connection with the target role and pool epoch it was
//!   opened under
//!
//! A connection's state is held structurally rather than as a field: Idle
//! connections sit in the pool's idle queue, InUse connections are owned by a
//! [`PoolGuard`](crate::pool::PoolGuard), and Broken connections are dropped
//! (closed) immediately.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::connect::DbSession;
use crate::pool::Role;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is sufficient since we only need uniqueness.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn next() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One live database session plus its pool bookkeeping.
pub(crate) struct PooledConn {
    pub(crate) id: ConnectionId,
    /// Role of the descriptor this session was opened against.
    pub(crate) role: Role,
    /// Pool epoch at open time. A failover bumps the pool epoch, so a stale
    /// epoch means the session points at an abandoned target.
    pub(crate) epoch: u64,
    /// When the session last entered the idle queue.
    pub(crate) idle_since: Instant,
    /// When the session last passed a round-trip check.
    pub(crate) last_health_check: Option<Instant>,
    pub(crate) session: Box<dyn DbSession>,
}

impl PooledConn {
    pub(crate) fn new(session: Box<dyn DbSession>, role: Role, epoch: u64) -> Self {
        Self {
            id: ConnectionId::next(),
            role,
            epoch,
            idle_since: Instant::now(),
            last_health_check: None,
            session,
        }
    }
}
