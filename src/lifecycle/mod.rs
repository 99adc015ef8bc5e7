//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Pool::new → spawn FailoverController
//!
//! Shutdown:
//!     Signal received → Shutdown::trigger (controller exits)
//!     → Pool::shutdown (stop acquires, bounded drain, close all)
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then pool, then background tasks
//! - Drain has a deadline: checked-out connections are abandoned after it
//! - Safe to shut down concurrently with an in-flight failover

pub mod shutdown;

pub use shutdown::Shutdown;
