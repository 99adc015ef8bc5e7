//! Failover subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic ticker:
//!     → probe active target (bounded deadline, overdue = failure)
//!     → threshold + confirmation probe → fail_over()
//!
//! Out-of-band (mark_broken / failed connection open):
//!     → ProbeRequest over the pool's channel
//!     → immediate evaluation of the active target
//!
//! fail_over():
//!     → Pool::begin_failover (epoch bump, idle drain)
//!     → probe candidates in priority order
//!     → Pool::promote | AllDown + backoff recovery probing
//! ```
//!
//! # Design Decisions
//! - Hysteresis: N consecutive failures plus one confirmation probe before a
//!   switch, so one transient timeout cannot cause flapping
//! - No automatic failback while an active target is healthy
//! - Routine failovers are logged, never raised as errors

pub mod backoff;
pub mod controller;

pub use controller::FailoverController;
