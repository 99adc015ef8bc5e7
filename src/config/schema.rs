//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! connectivity layer. All types derive Serde traits for deserialization
//! from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pool::Role;

/// Root configuration for the pool, failover controller and exporter.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PoolConfig {
    /// Database targets in failover priority order (primary first).
    pub descriptors: Vec<DescriptorConfig>,

    /// Connection pool sizing and timeouts.
    pub pool: PoolSettings,

    /// Health checking and failover settings.
    pub health: HealthSettings,

    /// Backup exporter settings.
    pub backup: BackupSettings,
}

/// One database target.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DescriptorConfig {
    /// Failover role; exactly one `primary` is expected, listed first.
    pub role: Role,

    /// Database host.
    pub host: String,

    /// Database port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Login user.
    pub user: String,

    /// Login password. May be overridden by the `DB_PASSWORD` environment
    /// variable at load time so secrets can stay out of the file.
    #[serde(default)]
    pub password: String,
}

fn default_port() -> u16 {
    5432
}

/// Pool sizing and checkout timeouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum live connections to the active target.
    pub max_size: usize,

    /// Idle connections at or below this count are never reaped.
    pub min_idle: usize,

    /// Idle connections above `min_idle` are closed after this many seconds.
    pub idle_timeout_secs: u64,

    /// Default deadline for `acquire` callers.
    pub acquire_timeout_secs: u64,

    /// Deadline for opening a single new connection.
    pub connect_timeout_secs: u64,

    /// Bound on the drain wait during shutdown.
    pub shutdown_drain_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: 1,
            idle_timeout_secs: 600,
            acquire_timeout_secs: 5,
            connect_timeout_secs: 10,
            shutdown_drain_secs: 10,
        }
    }
}

impl PoolSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn shutdown_drain(&self) -> Duration {
        Duration::from_secs(self.shutdown_drain_secs)
    }
}

/// Health checking and failover settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthSettings {
    /// Seconds between periodic health checks of the active target.
    pub interval_secs: u64,

    /// Deadline for a single probe; an overdue probe counts as a failure.
    pub probe_timeout_secs: u64,

    /// Consecutive failures before the active target becomes suspect.
    pub suspect_threshold: u32,

    /// Base delay for the AllDown recovery backoff schedule.
    pub backoff_base_ms: u64,

    /// Cap for the AllDown recovery backoff schedule.
    pub backoff_max_ms: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            probe_timeout_secs: 5,
            suspect_threshold: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

impl HealthSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Backup exporter settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Directory snapshot files are written to.
    pub dir: String,

    /// Acquire deadline for export checkouts. Generous on purpose: export is
    /// lower priority than live traffic but must not starve indefinitely.
    pub export_timeout_secs: u64,

    /// Snapshots older than this many days are removed by the cleanup sweep.
    pub keep_days: u64,

    /// Tables the exporter knows about.
    pub tables: Vec<TableConfig>,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            dir: "./backups".to_string(),
            export_timeout_secs: 30,
            keep_days: 7,
            tables: Vec::new(),
        }
    }
}

impl BackupSettings {
    pub fn export_timeout(&self) -> Duration {
        Duration::from_secs(self.export_timeout_secs)
    }
}

/// One exportable table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TableConfig {
    /// Table name.
    pub name: String,

    /// Natural primary key used to order rows for reproducible snapshots.
    #[serde(default = "default_order_by")]
    pub order_by: String,
}

fn default_order_by() -> String {
    "id".to_string()
}
