//! Connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! Request handler / backup exporter
//!     → Pool::acquire (idle conn, or open a new one under the max_size cap)
//!     → PoolGuard (exclusive session access)
//!     → drop / release (recycle) | mark_broken (close + probe request)
//!
//! FailoverController
//!     → begin_failover / promote / set_status (same mutex as acquire)
//!     → reap_idle maintenance pass
//! ```
//!
//! # Design Decisions
//! - Every non-broken connection belongs to the active descriptor: a target
//!   switch bumps the pool epoch, and stale-epoch connections are drained or
//!   closed on release, never silently reused
//! - The mutex protects bookkeeping only; connect/query/probe I/O runs
//!   outside it
//! - Checkout capacity rides on a semaphore, so acquire timeouts are fair
//!   and a timed-out waiter cancels nobody else

pub mod connection;
pub mod descriptor;
pub mod manager;

pub use connection::ConnectionId;
pub use descriptor::{ConnectionDescriptor, Role};
pub use manager::{Pool, PoolGuard, PoolStats, PoolStatus, ProbeRequest};
