//! Shared harness for integration tests: a scripted in-process database.
//!
//! The [`Switchboard`] stands in for the network. Tests flip hosts up and
//! down, load table contents, and inject read failures; the connector and
//! sessions consult it on every call, so the pool and failover controller
//! run their real code paths against fully controlled targets.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use failover_pool::config::{BackupSettings, HealthSettings, PoolSettings, TableConfig};
use failover_pool::connect::{Connect, DbSession, RowObject};
use failover_pool::error::SessionError;
use failover_pool::pool::{ConnectionDescriptor, Pool, ProbeRequest, Role};

/// Scripted network state shared by every session a test opens.
#[derive(Default)]
pub struct Switchboard {
    down: Mutex<HashSet<String>>,
    tables: Mutex<HashMap<String, Vec<RowObject>>>,
    /// Remaining `fetch_table` calls that fail with a broken connection.
    fetch_failures: AtomicUsize,
    opened: AtomicUsize,
}

impl Switchboard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_down(&self, host: &str) {
        self.down.lock().unwrap().insert(host.to_string());
    }

    pub fn set_up(&self, host: &str) {
        self.down.lock().unwrap().remove(host);
    }

    pub fn is_down(&self, host: &str) -> bool {
        self.down.lock().unwrap().contains(host)
    }

    pub fn put_table(&self, name: &str, rows: Vec<RowObject>) {
        self.tables.lock().unwrap().insert(name.to_string(), rows);
    }

    /// Make the next `n` table reads fail as if the connection dropped
    /// mid-read.
    pub fn fail_next_fetches(&self, n: usize) {
        self.fetch_failures.store(n, Ordering::SeqCst);
    }

    fn take_fetch_failure(&self) -> bool {
        self.fetch_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Total sessions successfully opened since the start of the test.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

pub struct ScriptedConnector {
    pub board: Arc<Switchboard>,
}

#[async_trait]
impl Connect for ScriptedConnector {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        _timeout: Duration,
    ) -> Result<Box<dyn DbSession>, SessionError> {
        if self.board.is_down(&descriptor.host) {
            return Err(SessionError::Unreachable {
                addr: descriptor.addr(),
                message: "connection refused".to_string(),
            });
        }
        self.board.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            board: Arc::clone(&self.board),
            host: descriptor.host.clone(),
        }))
    }
}

struct ScriptedSession {
    board: Arc<Switchboard>,
    host: String,
}

#[async_trait]
impl DbSession for ScriptedSession {
    async fn ping(&mut self) -> Result<(), SessionError> {
        if self.board.is_down(&self.host) {
            return Err(SessionError::Broken("ping failed".to_string()));
        }
        Ok(())
    }

    async fn fetch_table(
        &mut self,
        table: &str,
        _order_by: &str,
    ) -> Result<Vec<RowObject>, SessionError> {
        if self.board.is_down(&self.host) {
            return Err(SessionError::Broken("host unreachable".to_string()));
        }
        if self.board.take_fetch_failure() {
            return Err(SessionError::Broken(
                "connection reset during read".to_string(),
            ));
        }
        self.board
            .tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .ok_or_else(|| SessionError::Query(format!("relation \"{table}\" does not exist")))
    }
}

pub fn descriptor(role: Role, host: &str) -> ConnectionDescriptor {
    ConnectionDescriptor {
        role,
        host: host.to_string(),
        port: 5432,
        database: "trading_master_db".to_string(),
        user: "postgres".to_string(),
        password: String::new(),
    }
}

/// Primary plus two standbys, in priority order.
pub fn three_targets() -> Vec<ConnectionDescriptor> {
    vec![
        descriptor(Role::Primary, "db-primary"),
        descriptor(Role::Standby, "db-standby-1"),
        descriptor(Role::Standby, "db-standby-2"),
    ]
}

pub fn fast_pool_settings() -> PoolSettings {
    PoolSettings {
        max_size: 5,
        min_idle: 0,
        idle_timeout_secs: 600,
        acquire_timeout_secs: 2,
        connect_timeout_secs: 1,
        shutdown_drain_secs: 5,
    }
}

/// Tight enough that a failover completes within a few seconds of test time.
pub fn fast_health_settings() -> HealthSettings {
    HealthSettings {
        interval_secs: 1,
        probe_timeout_secs: 1,
        suspect_threshold: 2,
        backoff_base_ms: 100,
        backoff_max_ms: 500,
    }
}

pub fn backup_settings(dir: &std::path::Path, tables: &[&str]) -> BackupSettings {
    BackupSettings {
        dir: dir.to_string_lossy().into_owned(),
        export_timeout_secs: 2,
        keep_days: 7,
        tables: tables
            .iter()
            .map(|name| TableConfig {
                name: name.to_string(),
                order_by: "id".to_string(),
            })
            .collect(),
    }
}

pub fn sample_rows(count: usize) -> Vec<RowObject> {
    (1..=count)
        .map(|i| {
            let mut row = RowObject::new();
            row.insert("id".to_string(), json!(i));
            row.insert("name".to_string(), json!(format!("row-{i}")));
            row
        })
        .collect()
}

pub fn build_pool(
    descriptors: Vec<ConnectionDescriptor>,
    settings: PoolSettings,
) -> (
    Pool,
    Arc<Switchboard>,
    mpsc::UnboundedReceiver<ProbeRequest>,
) {
    let board = Switchboard::new();
    let connector = Arc::new(ScriptedConnector {
        board: Arc::clone(&board),
    });
    let (pool, probe_rx) = Pool::new(descriptors, settings, connector);
    (pool, board, probe_rx)
}

/// Poll `condition` until it holds, panicking with `what` after `timeout`.
pub async fn wait_until(timeout: Duration, what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + timeout;
    while !condition() {
        if Instant::now() >= deadline {
            panic!("timed out after {timeout:?} waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
