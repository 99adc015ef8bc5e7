//! Failover controller task.
//!
//! # Responsibilities
//! - Periodically probe the active target
//! - Confirm suspected failures before acting
//! - Orchestrate the target switch: drain, probe candidates in priority
//!   order, promote
//! - Keep probing on a backoff schedule while everything is down
//!
//! All pool mutations go through the same mutex acquire/release use; the
//! controller itself owns no shared flags.

use std::time::Instant;
use tokio::sync::{broadcast, mpsc};

use crate::config::HealthSettings;
use crate::failover::backoff::calculate_backoff;
use crate::pool::{Pool, PoolStatus, ProbeRequest};

/// Controller-internal state machine.
///
/// ```text
/// Healthy → Suspect: suspect_threshold consecutive failures
/// Suspect → Healthy: confirmation probe succeeds (transient blip)
/// Suspect → FailingOver: confirmation probe fails
/// FailingOver → Healthy: a candidate target was promoted
/// FailingOver → AllDown: every descriptor unreachable
/// AllDown → Healthy: backoff probing finds any target, index 0 preferred
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailoverState {
    Healthy,
    Suspect,
    FailingOver,
    AllDown,
}

/// Monitors pool health and decides when to switch the active target.
pub struct FailoverController {
    pool: Pool,
    settings: HealthSettings,
    probe_rx: mpsc::UnboundedReceiver<ProbeRequest>,
    state: FailoverState,
    consecutive_failures: u32,
    recovery_attempts: u32,
    next_recovery_probe: Option<Instant>,
}

impl FailoverController {
    /// `probe_rx` is the receiver handed out by [`Pool::new`].
    pub fn new(
        pool: Pool,
        settings: HealthSettings,
        probe_rx: mpsc::UnboundedReceiver<ProbeRequest>,
    ) -> Self {
        Self {
            pool,
            settings,
            probe_rx,
            state: FailoverState::Healthy,
            consecutive_failures: 0,
            recovery_attempts: 0,
            next_recovery_probe: None,
        }
    }

    /// Run until the shutdown signal fires.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.settings.interval_secs,
            suspect_threshold = self.settings.suspect_threshold,
            "failover controller starting"
        );

        let mut ticker = tokio::time::interval(self.settings.interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.pool.reap_idle();
                    self.tick().await;
                }
                Some(request) = self.probe_rx.recv() => {
                    self.on_probe_request(request).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("failover controller received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn tick(&mut self) {
        match self.state {
            FailoverState::AllDown => self.try_recover().await,
            _ => self.evaluate_active().await,
        }
    }

    /// Out-of-band evidence from `mark_broken` or a failed connection open.
    async fn on_probe_request(&mut self, request: ProbeRequest) {
        tracing::debug!(?request, "out-of-band probe requested");
        match self.state {
            FailoverState::Healthy | FailoverState::Suspect => self.evaluate_active().await,
            // Already acting on the failure.
            FailoverState::FailingOver | FailoverState::AllDown => {}
        }
    }

    async fn evaluate_active(&mut self) {
        let healthy = self.pool.health_check(self.settings.probe_timeout()).await;

        if healthy {
            if self.consecutive_failures > 0 {
                tracing::info!(
                    failures = self.consecutive_failures,
                    "active target recovered before failover"
                );
            }
            self.consecutive_failures = 0;
            if self.state != FailoverState::Healthy {
                self.state = FailoverState::Healthy;
            }
            self.pool.set_status(PoolStatus::Healthy);
            return;
        }

        self.consecutive_failures += 1;
        tracing::warn!(
            target = %self.pool.active_descriptor(),
            failures = self.consecutive_failures,
            threshold = self.settings.suspect_threshold,
            "active target failed health check"
        );

        if self.consecutive_failures < self.settings.suspect_threshold {
            self.pool.set_status(PoolStatus::Degraded);
            return;
        }

        // One extra confirmation probe before acting, to avoid flapping on a
        // single transient timeout.
        self.state = FailoverState::Suspect;
        if self.pool.health_check(self.settings.probe_timeout()).await {
            tracing::info!("confirmation probe succeeded, keeping active target");
            self.consecutive_failures = 0;
            self.state = FailoverState::Healthy;
            self.pool.set_status(PoolStatus::Healthy);
            return;
        }

        self.fail_over().await;
    }

    /// Confirmed failure: drain the old target and promote the first
    /// reachable descriptor in priority order. This transition is expected
    /// operational behaviour, logged but never surfaced as an error.
    async fn fail_over(&mut self) {
        self.state = FailoverState::FailingOver;
        let abandoned = self.pool.begin_failover();

        for index in 0..self.pool.descriptors().len() {
            if index == abandoned {
                continue;
            }
            let descriptor = self.pool.descriptors()[index].clone();
            match self.pool.probe(&descriptor, self.settings.probe_timeout()).await {
                Ok(()) => {
                    self.pool.promote(index);
                    self.state = FailoverState::Healthy;
                    self.consecutive_failures = 0;
                    self.recovery_attempts = 0;
                    return;
                }
                Err(e) => {
                    tracing::warn!(target = %descriptor, error = %e, "candidate target unreachable");
                }
            }
        }

        tracing::error!("every descriptor unreachable, pool is down");
        self.state = FailoverState::AllDown;
        self.pool.set_status(PoolStatus::AllDown);
        self.recovery_attempts = 0;
        // First recovery probe happens on the next tick.
        self.next_recovery_probe = Some(Instant::now());
    }

    /// AllDown recovery: probe descriptors in priority order starting at
    /// index 0, so the original primary is preferred once it comes back.
    /// Outside of AllDown there is no automatic failback; a recovered
    /// higher-priority target waits until the active one itself fails.
    async fn try_recover(&mut self) {
        if let Some(at) = self.next_recovery_probe {
            if Instant::now() < at {
                return;
            }
        }

        for index in 0..self.pool.descriptors().len() {
            let descriptor = self.pool.descriptors()[index].clone();
            if self
                .pool
                .probe(&descriptor, self.settings.probe_timeout())
                .await
                .is_ok()
            {
                tracing::info!(target = %descriptor, "target reachable again, leaving all-down");
                self.pool.promote(index);
                self.state = FailoverState::Healthy;
                self.consecutive_failures = 0;
                self.recovery_attempts = 0;
                self.next_recovery_probe = None;
                return;
            }
        }

        self.recovery_attempts = self.recovery_attempts.saturating_add(1);
        let delay = calculate_backoff(
            self.recovery_attempts,
            self.settings.backoff_base_ms,
            self.settings.backoff_max_ms,
        );
        self.next_recovery_probe = Some(Instant::now() + delay);
        tracing::debug!(
            attempt = self.recovery_attempts,
            next_probe_in = ?delay,
            "all targets still unreachable"
        );
    }
}
