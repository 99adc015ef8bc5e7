//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events: conn ids, targets, states)
//!     → metrics.rs (counters behind the metrics facade)
//! ```
//!
//! # Design Decisions
//! - Connection id and target flow through log events as fields
//! - Metric updates are cheap; exposition belongs to the embedding process

pub mod logging;
pub mod metrics;
