//! Connection pool core.
//!
//! # Responsibilities
//! - Hand out and reclaim connections (`acquire` / RAII release)
//! - Enforce the `max_size` bound and the acquire deadline
//! - Track which descriptor is active and drain connections that outlive a
//!   target switch
//! - Drain safely at shutdown, concurrently with an in-flight failover
//!
//! # Locking
//! All mutations of the connection collection and the active index go through
//! one mutex, held only for bookkeeping. Query I/O, connect I/O and probe I/O
//! always happen outside it, so one slow query can never block other
//! acquire/release calls. Capacity is enforced with a semaphore so a
//! timed-out waiter never steals another waiter's wakeup.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PoolSettings;
use crate::connect::{Connect, DbSession};
use crate::error::{PoolError, SessionError};
use crate::observability::metrics;
use crate::pool::connection::PooledConn;
use crate::pool::{ConnectionDescriptor, ConnectionId, Role};

/// Pool-wide availability state, as seen by `acquire`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    /// Active target answering health checks.
    Healthy,
    /// Active target is suspect; connections still flow.
    Degraded,
    /// Target switch in progress; acquires wait for the promotion.
    FailingOver,
    /// Every descriptor unreachable; acquires fail fast.
    AllDown,
}

impl std::fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolStatus::Healthy => write!(f, "healthy"),
            PoolStatus::Degraded => write!(f, "degraded"),
            PoolStatus::FailingOver => write!(f, "failing-over"),
            PoolStatus::AllDown => write!(f, "all-down"),
        }
    }
}

/// Out-of-band signal from the pool to the failover controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeRequest {
    /// A caller observed a query-level I/O failure on a checked-out
    /// connection.
    BrokenConnection,
    /// Opening a fresh connection against the active target failed.
    ConnectFailed,
}

/// Point-in-time pool counters, for logs, tests and the CLI.
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub status: PoolStatus,
    pub active_index: usize,
    pub epoch: u64,
    pub in_use: usize,
    pub idle: usize,
}

struct PoolInner {
    active_index: usize,
    /// Bumped on every target switch; connections stamped with an older
    /// epoch are closed on release instead of recycled.
    epoch: u64,
    status: PoolStatus,
    idle: VecDeque<PooledConn>,
    in_use: usize,
    shutting_down: bool,
}

struct PoolShared {
    descriptors: Vec<ConnectionDescriptor>,
    settings: PoolSettings,
    connector: Arc<dyn Connect>,
    inner: Mutex<PoolInner>,
    capacity: Arc<Semaphore>,
    probe_tx: mpsc::UnboundedSender<ProbeRequest>,
}

/// Bounded pool of live connections to the currently active target.
///
/// Process-wide singleton state: initialized once at startup, cloned cheaply
/// (it is a handle over shared state), torn down via [`Pool::shutdown`]. Its
/// lifetime must outlive every request handler and the backup exporter.
#[derive(Clone)]
pub struct Pool {
    shared: Arc<PoolShared>,
}

enum AcquireStep {
    Ready(PooledConn),
    Open { descriptor: ConnectionDescriptor, epoch: u64 },
    Wait,
}

impl Pool {
    /// Build a pool over an ordered descriptor list (primary first).
    ///
    /// Returns the pool and the probe-request receiver the failover
    /// controller consumes.
    pub fn new(
        descriptors: Vec<ConnectionDescriptor>,
        settings: PoolSettings,
        connector: Arc<dyn Connect>,
    ) -> (Self, mpsc::UnboundedReceiver<ProbeRequest>) {
        assert!(!descriptors.is_empty(), "descriptor list validated at config load");
        let (probe_tx, probe_rx) = mpsc::unbounded_channel();
        let capacity = Arc::new(Semaphore::new(settings.max_size));
        let pool = Self {
            shared: Arc::new(PoolShared {
                descriptors,
                inner: Mutex::new(PoolInner {
                    active_index: 0,
                    epoch: 0,
                    status: PoolStatus::Healthy,
                    idle: VecDeque::new(),
                    in_use: 0,
                    shutting_down: false,
                }),
                capacity,
                connector,
                settings,
                probe_tx,
            }),
        };
        (pool, probe_rx)
    }

    /// Check out a connection to the active target, waiting up to `timeout`
    /// for an idle connection or capacity to open a new one.
    pub async fn acquire(&self, timeout: Duration) -> Result<PoolGuard, PoolError> {
        let shared = &self.shared;
        let started = Instant::now();
        let deadline = started + timeout;

        let permit = match tokio::time::timeout_at(
            tokio::time::Instant::from_std(deadline),
            Arc::clone(&shared.capacity).acquire_owned(),
        )
        .await
        {
            Err(_elapsed) => {
                metrics::record_acquire_timeout();
                return Err(PoolError::Exhausted {
                    max_size: shared.settings.max_size,
                    waited: started.elapsed(),
                });
            }
            // The semaphore is closed when shutdown begins.
            Ok(Err(_closed)) => return Err(PoolError::ShuttingDown),
            Ok(Ok(permit)) => permit,
        };

        loop {
            let step = {
                let mut inner = shared.inner.lock().expect("pool lock poisoned");
                if inner.shutting_down {
                    return Err(PoolError::ShuttingDown);
                }
                match inner.status {
                    PoolStatus::AllDown => return Err(PoolError::Unavailable),
                    PoolStatus::FailingOver => AcquireStep::Wait,
                    PoolStatus::Healthy | PoolStatus::Degraded => {
                        let epoch = inner.epoch;
                        // Connections from before a target switch are closed
                        // here rather than handed out.
                        let mut stale = Vec::new();
                        while inner.idle.front().is_some_and(|c| c.epoch != epoch) {
                            if let Some(conn) = inner.idle.pop_front() {
                                stale.push(conn);
                            }
                        }
                        let step = match inner.idle.pop_front() {
                            Some(conn) => {
                                inner.in_use += 1;
                                AcquireStep::Ready(conn)
                            }
                            None => AcquireStep::Open {
                                descriptor: shared.descriptors[inner.active_index].clone(),
                                epoch,
                            },
                        };
                        drop(inner);
                        for conn in stale {
                            shared.close_conn(conn, "stale epoch in idle queue");
                        }
                        step
                    }
                }
            };

            match step {
                AcquireStep::Ready(conn) => {
                    metrics::record_acquire();
                    return Ok(PoolGuard::checkout(Arc::clone(shared), conn, permit));
                }
                AcquireStep::Open { descriptor, epoch } => {
                    match shared
                        .connector
                        .connect(&descriptor, shared.settings.connect_timeout())
                        .await
                    {
                        Ok(session) => {
                            let conn = PooledConn::new(session, descriptor.role, epoch);
                            let raced_failover = {
                                let mut inner = shared.inner.lock().expect("pool lock poisoned");
                                if conn.epoch != inner.epoch {
                                    true
                                } else {
                                    inner.in_use += 1;
                                    false
                                }
                            };
                            if raced_failover {
                                // A failover completed while we were
                                // connecting; this session points at the
                                // abandoned target.
                                shared.close_conn(conn, "failover raced connection open");
                                continue;
                            }
                            tracing::debug!(
                                conn = %conn.id,
                                target = %descriptor,
                                "opened new pooled connection"
                            );
                            metrics::record_connection_opened();
                            metrics::record_acquire();
                            return Ok(PoolGuard::checkout(Arc::clone(shared), conn, permit));
                        }
                        Err(e) => {
                            tracing::warn!(target = %descriptor, error = %e, "connection open failed");
                            let _ = shared.probe_tx.send(ProbeRequest::ConnectFailed);
                            return Err(PoolError::Unavailable);
                        }
                    }
                }
                AcquireStep::Wait => {
                    // Failover in progress; wait briefly for the promotion so
                    // we come back bound to the new target, never the old one.
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PoolError::Unavailable);
                    }
                    let nap = Duration::from_millis(25).min(deadline - now);
                    tokio::time::sleep(nap).await;
                }
            }
        }
    }

    /// Trivial round-trip against the active descriptor with a short
    /// deadline. Network I/O happens outside the pool lock.
    pub async fn health_check(&self, deadline: Duration) -> bool {
        let descriptor = self.active_descriptor();
        self.probe(&descriptor, deadline).await.is_ok()
    }

    /// Probe an arbitrary descriptor with a bounded deadline. Opens a
    /// short-lived dedicated session so a probe never consumes pool capacity.
    pub(crate) async fn probe(
        &self,
        descriptor: &ConnectionDescriptor,
        deadline: Duration,
    ) -> Result<(), SessionError> {
        let mut session = self.shared.connector.connect(descriptor, deadline).await?;
        tokio::time::timeout(deadline, session.ping())
            .await
            .map_err(|_| SessionError::Timeout(deadline))?
    }

    /// Currently active descriptor.
    pub fn active_descriptor(&self) -> ConnectionDescriptor {
        let inner = self.shared.inner.lock().expect("pool lock poisoned");
        self.shared.descriptors[inner.active_index].clone()
    }

    /// Full priority list, as configured.
    pub fn descriptors(&self) -> &[ConnectionDescriptor] {
        &self.shared.descriptors
    }

    /// Point-in-time counters.
    pub fn stats(&self) -> PoolStats {
        let inner = self.shared.inner.lock().expect("pool lock poisoned");
        PoolStats {
            status: inner.status,
            active_index: inner.active_index,
            epoch: inner.epoch,
            in_use: inner.in_use,
            idle: inner.idle.len(),
        }
    }

    /// Close idle connections above `min_idle` that have sat unused past the
    /// idle timeout. Called periodically by the failover controller's
    /// maintenance pass.
    pub(crate) fn reap_idle(&self) {
        let shared = &self.shared;
        let now = Instant::now();
        let mut reaped = Vec::new();
        {
            let mut inner = shared.inner.lock().expect("pool lock poisoned");
            while inner.idle.len() > shared.settings.min_idle {
                let expired = inner.idle.front().is_some_and(|c| {
                    now.duration_since(c.idle_since) >= shared.settings.idle_timeout()
                });
                if !expired {
                    break;
                }
                if let Some(conn) = inner.idle.pop_front() {
                    reaped.push(conn);
                }
            }
        }
        if !reaped.is_empty() {
            tracing::debug!(count = reaped.len(), "reaped idle connections");
            for conn in reaped {
                shared.close_conn(conn, "idle timeout");
            }
        }
    }

    /// Enter the failing-over state: bump the epoch and drain every idle
    /// connection. Checked-out connections are flagged by their stale epoch
    /// and closed on release. Returns the index being abandoned.
    pub(crate) fn begin_failover(&self) -> usize {
        let shared = &self.shared;
        let (abandoned, drained) = {
            let mut inner = shared.inner.lock().expect("pool lock poisoned");
            inner.status = PoolStatus::FailingOver;
            inner.epoch += 1;
            let drained: Vec<PooledConn> = inner.idle.drain(..).collect();
            (inner.active_index, drained)
        };
        let count = drained.len();
        for conn in drained {
            shared.close_conn(conn, "target abandoned by failover");
        }
        tracing::info!(
            abandoned = %shared.descriptors[abandoned],
            drained_idle = count,
            "failover started"
        );
        abandoned
    }

    /// Make `index` the active target and return the pool to service.
    pub(crate) fn promote(&self, index: usize) {
        {
            let mut inner = self.shared.inner.lock().expect("pool lock poisoned");
            inner.active_index = index;
            inner.status = PoolStatus::Healthy;
        }
        metrics::record_failover();
        tracing::info!(target = %self.shared.descriptors[index], "promoted active target");
    }

    pub(crate) fn set_status(&self, status: PoolStatus) {
        let mut inner = self.shared.inner.lock().expect("pool lock poisoned");
        inner.status = status;
    }

    /// Stop accepting acquires, wait (bounded) for checked-out connections to
    /// come back, then close everything. Safe to run concurrently with an
    /// in-flight failover: both paths serialize on the pool mutex.
    pub async fn shutdown(&self) {
        let shared = &self.shared;
        {
            let mut inner = shared.inner.lock().expect("pool lock poisoned");
            if inner.shutting_down {
                return;
            }
            inner.shutting_down = true;
        }
        shared.capacity.close();
        tracing::info!("pool draining");

        let deadline = Instant::now() + shared.settings.shutdown_drain();
        loop {
            let in_use = {
                let inner = shared.inner.lock().expect("pool lock poisoned");
                inner.in_use
            };
            if in_use == 0 {
                break;
            }
            if Instant::now() >= deadline {
                tracing::warn!(in_use, "drain deadline reached, abandoning checked-out connections");
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let idle: Vec<PooledConn> = {
            let mut inner = shared.inner.lock().expect("pool lock poisoned");
            inner.idle.drain(..).collect()
        };
        for conn in idle {
            shared.close_conn(conn, "pool shutdown");
        }
        tracing::info!("pool shut down");
    }
}

impl PoolShared {
    /// Return a checked-out connection. Stale or post-shutdown connections
    /// are closed instead of recycled.
    fn checkin(&self, mut conn: PooledConn) {
        let rejected = {
            let mut inner = self.inner.lock().expect("pool lock poisoned");
            inner.in_use -= 1;
            if conn.epoch != inner.epoch || inner.shutting_down || inner.status == PoolStatus::AllDown
            {
                Some(conn)
            } else {
                conn.idle_since = Instant::now();
                inner.idle.push_back(conn);
                None
            }
        };
        if let Some(conn) = rejected {
            self.close_conn(conn, "not recyclable on release");
        }
    }

    /// Close a connection a caller reported broken and ask the controller
    /// for an out-of-band probe of the active target.
    fn discard_broken(&self, conn: PooledConn, cause: &SessionError) {
        {
            let mut inner = self.inner.lock().expect("pool lock poisoned");
            inner.in_use -= 1;
        }
        tracing::warn!(conn = %conn.id, error = %cause, "connection marked broken");
        self.close_conn(conn, "marked broken by caller");
        let _ = self.probe_tx.send(ProbeRequest::BrokenConnection);
    }

    /// Dropping the session closes the wire connection.
    fn close_conn(&self, conn: PooledConn, reason: &str) {
        tracing::debug!(conn = %conn.id, role = %conn.role, reason, "closing connection");
        metrics::record_connection_closed();
        drop(conn);
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("Pool")
            .field("targets", &self.shared.descriptors.len())
            .field("status", &stats.status)
            .field("active_index", &stats.active_index)
            .field("in_use", &stats.in_use)
            .field("idle", &stats.idle)
            .finish()
    }
}

/// A checked-out connection.
///
/// The caller holds a borrowed session, never ownership: dropping the guard
/// returns the connection to the pool exactly once, which makes a double
/// release structurally impossible.
pub struct PoolGuard {
    shared: Arc<PoolShared>,
    conn: Option<PooledConn>,
    _permit: OwnedSemaphorePermit,
}

impl PoolGuard {
    fn checkout(shared: Arc<PoolShared>, conn: PooledConn, permit: OwnedSemaphorePermit) -> Self {
        Self {
            shared,
            conn: Some(conn),
            _permit: permit,
        }
    }

    fn conn(&self) -> &PooledConn {
        self.conn
            .as_ref()
            .expect("connection present until the guard is consumed")
    }

    /// Unique id of the underlying connection.
    pub fn id(&self) -> ConnectionId {
        self.conn().id
    }

    /// Role of the descriptor this connection was opened against.
    pub fn role(&self) -> Role {
        self.conn().role
    }

    /// Pool epoch this connection was opened under.
    pub fn epoch(&self) -> u64 {
        self.conn().epoch
    }

    /// The live session. Exclusive to this holder; no extra locking needed.
    pub fn session(&mut self) -> &mut dyn DbSession {
        self.conn
            .as_mut()
            .expect("connection present until the guard is consumed")
            .session
            .as_mut()
    }

    /// Record a successful round-trip observed by the holder.
    pub fn note_health_check(&mut self) {
        if let Some(conn) = self.conn.as_mut() {
            conn.last_health_check = Some(Instant::now());
        }
    }

    /// When this connection last passed a round-trip check, if ever.
    pub fn last_health_check(&self) -> Option<Instant> {
        self.conn().last_health_check
    }

    /// Explicit release. Equivalent to dropping the guard; consuming `self`
    /// makes a second release a compile error rather than a runtime bug.
    pub fn release(self) {}

    /// Report a query-level I/O failure: the connection is closed, never
    /// reused, and the failover controller probes the active target.
    pub fn mark_broken(mut self, cause: &SessionError) {
        if let Some(conn) = self.conn.take() {
            self.shared.discard_broken(conn, cause);
        }
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.shared.checkin(conn);
        }
    }
}

impl std::fmt::Debug for PoolGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolGuard")
            .field("conn", &self.conn.as_ref().map(|c| c.id))
            .finish()
    }
}
