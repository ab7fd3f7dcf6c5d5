//! Quota polling timer
//!
//! Background loop that fetches usage, classifies each outcome, decides how
//! long to sleep before the next attempt, and publishes what the tray and the
//! notification layer need.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       PollScheduler                         │
//! │                                                             │
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐  │
//! │  │ PollMachine  │    │ Timer Loop   │    │ Threshold    │  │
//! │  │ - status     │    │ - fetch()    │    │ Notifier     │  │
//! │  │ - backoff    │    │ - sleep()    │    │ - armed set  │  │
//! │  └──────────────┘    └──────────────┘    └──────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!           ▲                    │                    │
//!           │                    ▼                    ▼
//!    ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//!    │SchedulerHandle│    │ watch:       │     │ mpsc:        │
//!    │ refresh/stop │     │ PollSnapshot │     │ Alert        │
//!    └──────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! # Retry policy
//!
//! | Outcome                  | Status       | Next sleep                        | Alert        |
//! |--------------------------|--------------|-----------------------------------|--------------|
//! | usage sample             | Healthy      | base interval                     | thresholds   |
//! | 401 / 403                | AuthError    | 3600s                             | once on entry|
//! | 429                      | RateLimited  | Retry-After (max 1 day), or 120s  | none         |
//! | network / malformed body | NetworkError | base × 2^(n-1), capped at 1800s   | none         |
//!
//! The loop task owns all mutable state. Readers get copies through a
//! single-slot watch channel; refresh and stop arrive over an mpsc channel
//! that the sleep selects on, so shutdown is observed immediately even in the
//! middle of a 30 minute backoff.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::notifier::{ThresholdNotifier, DEFAULT_THRESHOLDS};
use super::projector::project;
use super::provider::{FetchError, UsageSource};
use super::types::{Alert, PresentationDescriptor, StatusTag, UsageSample};
use crate::config::AppConfig;

// ============================================================================
// Constants
// ============================================================================

/// Default base polling interval in seconds
pub const DEFAULT_BASE_INTERVAL_SECS: u64 = 300;

/// Fixed retry interval after an auth failure
pub const AUTH_RETRY_SECS: u64 = 3600;

/// Retry interval after a 429 without a usable Retry-After
pub const RATE_LIMIT_DEFAULT_SECS: u64 = 120;

/// Cap of the transient-failure backoff
pub const MAX_BACKOFF_SECS: u64 = 1800;

/// Longest server-requested delay that is honored
pub const MAX_RETRY_AFTER_SECS: u64 = 86_400;

/// Queue depth of the control channel; extra refresh requests are coalesced
const CONTROL_CHANNEL_CAPACITY: usize = 8;

// ============================================================================
// Configuration
// ============================================================================

/// Settings read once when the scheduler is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSchedulerConfig {
    /// Interval after a successful poll, and base of the backoff
    pub base_interval_seconds: u64,
    /// Ascending notification thresholds in (0, 100]
    pub thresholds: Vec<f64>,
}

impl Default for PollSchedulerConfig {
    fn default() -> Self {
        Self {
            base_interval_seconds: DEFAULT_BASE_INTERVAL_SECS,
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
        }
    }
}

impl PollSchedulerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            base_interval_seconds: config.poll_interval_seconds,
            thresholds: config.notification_thresholds.clone(),
        }
        .validate()
    }

    /// Validate and normalize the configuration
    pub fn validate(&self) -> Self {
        let mut thresholds: Vec<f64> = self
            .thresholds
            .iter()
            .copied()
            .filter(|t| *t > 0.0 && *t <= 100.0)
            .collect();
        thresholds.sort_by(|a, b| a.total_cmp(b));
        thresholds.dedup();

        Self {
            base_interval_seconds: self.base_interval_seconds.max(1),
            thresholds,
        }
    }
}

// ============================================================================
// Backoff
// ============================================================================

/// Sleep after the n-th consecutive transient failure
///
/// With base 300 the sequence is 300, 600, 1200, 1800, 1800, ... The cap
/// never drops below the base so the interval stays within [base, max].
pub fn transient_backoff_secs(base_interval_seconds: u64, consecutive_failures: u32) -> u64 {
    let cap = MAX_BACKOFF_SECS.max(base_interval_seconds);
    if consecutive_failures == 0 {
        return base_interval_seconds.min(cap);
    }
    let exponent = (consecutive_failures - 1).min(32);
    base_interval_seconds
        .saturating_mul(1u64 << exponent)
        .min(cap)
}

/// Sleep after a 429 response
///
/// A positive Retry-After is honored up to one day.
pub fn rate_limit_delay_secs(retry_after_seconds: Option<u64>) -> u64 {
    match retry_after_seconds {
        Some(secs) if secs > 0 => secs.min(MAX_RETRY_AFTER_SECS),
        _ => RATE_LIMIT_DEFAULT_SECS,
    }
}

// ============================================================================
// Poll State
// ============================================================================

/// Mutable state of the polling loop, owned by the loop task alone
#[derive(Debug, Clone, PartialEq)]
pub struct PollState {
    pub status: StatusTag,
    /// Consecutive transient failures; reset by any success
    pub consecutive_failures: u32,
    /// Sleep before the next scheduled attempt
    pub current_interval_seconds: u64,
    pub last_sample: Option<UsageSample>,
    pub running: bool,
    /// Display text of the last failure, cleared on success
    pub last_error: Option<String>,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub poll_count: u64,
}

impl PollState {
    pub fn new(base_interval_seconds: u64) -> Self {
        Self {
            status: StatusTag::Initializing,
            consecutive_failures: 0,
            current_interval_seconds: base_interval_seconds,
            last_sample: None,
            running: false,
            last_error: None,
            last_poll_at: None,
            poll_count: 0,
        }
    }
}

/// Sans-I/O core of the scheduler: applies fetch outcomes to the state
#[derive(Debug, Clone)]
pub struct PollMachine {
    config: PollSchedulerConfig,
    state: PollState,
    notifier: ThresholdNotifier,
}

impl PollMachine {
    pub fn new(config: PollSchedulerConfig) -> Self {
        let config = config.validate();
        Self {
            state: PollState::new(config.base_interval_seconds),
            notifier: ThresholdNotifier::new(&config.thresholds),
            config,
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn config(&self) -> &PollSchedulerConfig {
        &self.config
    }

    pub fn set_running(&mut self, running: bool) {
        self.state.running = running;
    }

    pub fn descriptor(&self) -> PresentationDescriptor {
        project(self.state.status, self.state.last_sample.as_ref())
    }

    /// Apply one fetch outcome and return the alerts it produced
    pub fn apply(&mut self, outcome: Result<UsageSample, FetchError>, now: DateTime<Utc>) -> Vec<Alert> {
        let base = self.config.base_interval_seconds;
        let previous = self.state.status;
        let mut alerts = Vec::new();

        self.state.poll_count += 1;
        self.state.last_poll_at = Some(now);

        match outcome {
            Ok(sample) => {
                self.state.status = StatusTag::Healthy;
                self.state.consecutive_failures = 0;
                self.state.current_interval_seconds = base;
                self.state.last_error = None;
                alerts.extend(
                    self.notifier
                        .observe_sample(&sample)
                        .into_iter()
                        .map(Alert::Threshold),
                );
                self.state.last_sample = Some(sample);
            }
            Err(err) => {
                log::warn!("[quota:timer] Poll failed ({:?}): {}", err.kind(), err);
                self.state.last_error = Some(err.to_string());

                match err {
                    FetchError::Unauthorized => {
                        self.state.status = StatusTag::AuthError;
                        self.state.current_interval_seconds = AUTH_RETRY_SECS;
                        if previous != StatusTag::AuthError {
                            alerts.push(Alert::AuthExpired);
                        }
                    }
                    FetchError::RateLimited {
                        retry_after_seconds,
                    } => {
                        self.state.status = StatusTag::RateLimited;
                        self.state.current_interval_seconds =
                            rate_limit_delay_secs(retry_after_seconds);
                    }
                    FetchError::NetworkFailure { .. } | FetchError::MalformedResponse { .. } => {
                        self.state.status = StatusTag::NetworkError;
                        self.state.consecutive_failures =
                            self.state.consecutive_failures.saturating_add(1);
                        self.state.current_interval_seconds =
                            transient_backoff_secs(base, self.state.consecutive_failures);
                    }
                }
            }
        }

        if previous != self.state.status {
            log::info!(
                "[quota:timer] Status {} -> {}",
                previous,
                self.state.status
            );
        }
        log::debug!(
            "[quota:timer] Next poll in {}s (consecutive failures: {})",
            self.state.current_interval_seconds,
            self.state.consecutive_failures
        );

        alerts
    }

    /// Copy of everything readers need
    pub fn snapshot(&self, is_polling: bool) -> PollSnapshot {
        let next_poll_at = match (self.state.running, is_polling, self.state.last_poll_at) {
            (true, false, Some(last)) => {
                scheduled_after(last, self.state.current_interval_seconds)
            }
            _ => None,
        };

        PollSnapshot {
            status: self.state.status,
            descriptor: self.descriptor(),
            last_sample: self.state.last_sample.clone(),
            consecutive_failures: self.state.consecutive_failures,
            current_interval_seconds: self.state.current_interval_seconds,
            last_error: self.state.last_error.clone(),
            last_poll_at: self.state.last_poll_at,
            next_poll_at,
            poll_count: self.state.poll_count,
            is_running: self.state.running,
            is_polling,
        }
    }
}

/// `last + interval`, or None when it is not representable
fn scheduled_after(last: DateTime<Utc>, interval_seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(interval_seconds).ok()?;
    last.checked_add_signed(chrono::Duration::try_seconds(seconds)?)
}

// ============================================================================
// Published Snapshot
// ============================================================================

/// Immutable view of the loop, published after every tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSnapshot {
    pub status: StatusTag,
    pub descriptor: PresentationDescriptor,
    pub last_sample: Option<UsageSample>,
    pub consecutive_failures: u32,
    pub current_interval_seconds: u64,
    pub last_error: Option<String>,
    pub last_poll_at: Option<DateTime<Utc>>,
    /// Next scheduled poll; None while a fetch is in flight or after stop
    pub next_poll_at: Option<DateTime<Utc>>,
    pub poll_count: u64,
    pub is_running: bool,
    pub is_polling: bool,
}

// ============================================================================
// Control
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Refresh,
    Stop,
}

/// Cloneable handle for signalling the loop and reading its snapshot
///
/// Dropping every handle stops the loop.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    control_tx: mpsc::Sender<Control>,
    snapshot_rx: watch::Receiver<PollSnapshot>,
}

impl SchedulerHandle {
    /// Ask for an extra poll now
    ///
    /// Returns false once the loop has exited. Requests that pile up while a
    /// fetch is in flight are satisfied by that fetch.
    pub fn request_refresh(&self) -> bool {
        match self.control_tx.try_send(Control::Refresh) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::debug!("[quota:timer] Refresh already queued, coalescing");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Ask the loop to exit
    pub async fn stop(&self) {
        if self.control_tx.send(Control::Stop).await.is_err() {
            log::debug!("[quota:timer] Stop requested but loop already exited");
        }
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> PollSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver notified on every publish
    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.snapshot_rx.clone()
    }
}

/// Receiving end of the alert stream
pub type AlertReceiver = mpsc::UnboundedReceiver<Alert>;

// ============================================================================
// Scheduler
// ============================================================================

/// Owns the polling loop
pub struct PollScheduler {
    source: Arc<dyn UsageSource>,
    machine: PollMachine,
    control_rx: mpsc::Receiver<Control>,
    snapshot_tx: watch::Sender<PollSnapshot>,
    alert_tx: mpsc::UnboundedSender<Alert>,
}

impl PollScheduler {
    /// Build a scheduler together with its handle and alert stream
    pub fn new(
        source: Arc<dyn UsageSource>,
        config: PollSchedulerConfig,
    ) -> (Self, SchedulerHandle, AlertReceiver) {
        let machine = PollMachine::new(config);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot(false));
        let (alert_tx, alert_rx) = mpsc::unbounded_channel();

        let scheduler = Self {
            source,
            machine,
            control_rx,
            snapshot_tx,
            alert_tx,
        };
        let handle = SchedulerHandle {
            control_tx,
            snapshot_rx,
        };

        (scheduler, handle, alert_rx)
    }

    /// Build and spawn onto the current tokio runtime
    pub fn spawn(
        source: Arc<dyn UsageSource>,
        config: PollSchedulerConfig,
    ) -> (SchedulerHandle, AlertReceiver, JoinHandle<PollState>) {
        let (scheduler, handle, alerts) = Self::new(source, config);
        let join = tokio::spawn(scheduler.run());
        (handle, alerts, join)
    }

    /// Run until stopped; returns the final state
    pub async fn run(mut self) -> PollState {
        log::info!(
            "[quota:timer] Polling loop started ({}, base interval {}s, thresholds {:?})",
            self.source.source_id(),
            self.machine.config().base_interval_seconds,
            self.machine.config().thresholds
        );
        self.machine.set_running(true);

        while self.machine.state().running {
            self.publish(true);

            // Single fetch in flight; the loop does not listen for signals
            // until it returns, which the client's timeout bounds.
            let outcome = self.source.fetch().await;
            for alert in self.machine.apply(outcome, Utc::now()) {
                if self.alert_tx.send(alert).is_err() {
                    log::debug!("[quota:timer] Alert receiver dropped");
                }
            }

            if self.drain_pending_controls() == Some(Control::Stop) {
                self.machine.set_running(false);
                break;
            }
            self.publish(false);

            let interval = Duration::from_secs(self.machine.state().current_interval_seconds);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                control = self.control_rx.recv() => match control {
                    Some(Control::Refresh) => {
                        log::info!("[quota:timer] Manual refresh requested");
                    }
                    Some(Control::Stop) | None => {
                        log::info!("[quota:timer] Received shutdown signal");
                        self.machine.set_running(false);
                    }
                },
            }
        }

        self.publish(false);
        log::info!("[quota:timer] Polling loop exited");
        self.machine.state().clone()
    }

    /// Consume signals that arrived during a fetch
    ///
    /// Refresh requests are dropped because the fetch that just finished
    /// already answered them. Returns `Some(Stop)` if the loop must exit.
    fn drain_pending_controls(&mut self) -> Option<Control> {
        let mut coalesced = 0usize;
        loop {
            match self.control_rx.try_recv() {
                Ok(Control::Refresh) => coalesced += 1,
                Ok(Control::Stop) | Err(mpsc::error::TryRecvError::Disconnected) => {
                    log::info!("[quota:timer] Received shutdown signal");
                    return Some(Control::Stop);
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
            }
        }
        if coalesced > 0 {
            log::debug!(
                "[quota:timer] Coalesced {} refresh request(s) into the last fetch",
                coalesced
            );
        }
        None
    }

    fn publish(&self, is_polling: bool) {
        self.snapshot_tx.send_replace(self.machine.snapshot(is_polling));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> PollMachine {
        PollMachine::new(PollSchedulerConfig::default())
    }

    fn network() -> Result<UsageSample, FetchError> {
        Err(FetchError::network("Connection failed"))
    }

    fn usage(max: f64) -> Result<UsageSample, FetchError> {
        Ok(UsageSample::from_utilization(max, 0.0))
    }

    // =========================================================================
    // Configuration Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = PollSchedulerConfig::default();
        assert_eq!(config.base_interval_seconds, 300);
        assert_eq!(config.thresholds, vec![50.0, 75.0, 90.0]);
    }

    #[test]
    fn test_config_validate() {
        let config = PollSchedulerConfig {
            base_interval_seconds: 0,
            thresholds: vec![90.0, 0.0, 150.0, 50.0, 90.0, -3.0, 100.0],
        };
        let validated = config.validate();
        assert_eq!(validated.base_interval_seconds, 1);
        assert_eq!(validated.thresholds, vec![50.0, 90.0, 100.0]);
    }

    #[test]
    fn test_config_from_app_config() {
        let app = AppConfig {
            poll_interval_seconds: 120,
            notification_thresholds: vec![80.0, 60.0],
            ..AppConfig::default()
        };
        let config = PollSchedulerConfig::from_app_config(&app);
        assert_eq!(config.base_interval_seconds, 120);
        assert_eq!(config.thresholds, vec![60.0, 80.0]);
    }

    // =========================================================================
    // Backoff Tests
    // =========================================================================

    #[test]
    fn test_transient_backoff_sequence() {
        let sequence: Vec<u64> = (1..=6).map(|n| transient_backoff_secs(300, n)).collect();
        assert_eq!(sequence, vec![300, 600, 1200, 1800, 1800, 1800]);
    }

    #[test]
    fn test_transient_backoff_large_counts_saturate() {
        assert_eq!(transient_backoff_secs(300, 64), 1800);
        assert_eq!(transient_backoff_secs(300, u32::MAX), 1800);
    }

    #[test]
    fn test_transient_backoff_base_above_cap() {
        assert_eq!(transient_backoff_secs(3600, 1), 3600);
        assert_eq!(transient_backoff_secs(3600, 5), 3600);
    }

    #[test]
    fn test_rate_limit_delay() {
        assert_eq!(rate_limit_delay_secs(Some(45)), 45);
        assert_eq!(rate_limit_delay_secs(Some(0)), 120);
        assert_eq!(rate_limit_delay_secs(None), 120);
    }

    #[test]
    fn test_rate_limit_delay_clamps_huge_retry_after() {
        assert_eq!(rate_limit_delay_secs(Some(86_400)), 86_400);
        assert_eq!(rate_limit_delay_secs(Some(86_401)), 86_400);
        assert_eq!(rate_limit_delay_secs(Some(10_000_000_000_000_000)), 86_400);
        assert_eq!(rate_limit_delay_secs(Some(u64::MAX)), 86_400);
    }

    #[test]
    fn test_scheduled_after_out_of_range_is_none() {
        let now = Utc::now();
        assert_eq!(scheduled_after(now, 60), Some(now + chrono::Duration::seconds(60)));
        assert_eq!(scheduled_after(now, u64::MAX), None);
        assert_eq!(scheduled_after(now, i64::MAX as u64), None);
    }

    #[test]
    fn test_snapshot_with_huge_base_interval_has_no_next_poll() {
        let mut m = PollMachine::new(PollSchedulerConfig {
            base_interval_seconds: u64::MAX,
            thresholds: vec![],
        });
        m.set_running(true);
        m.apply(usage(10.0), Utc::now());

        let snapshot = m.snapshot(false);
        assert_eq!(snapshot.current_interval_seconds, u64::MAX);
        assert!(snapshot.next_poll_at.is_none());
    }

    // =========================================================================
    // Poll Machine Tests
    // =========================================================================

    #[test]
    fn test_machine_initial_state() {
        let m = machine();
        assert_eq!(m.state().status, StatusTag::Initializing);
        assert_eq!(m.state().current_interval_seconds, 300);
        assert!(m.state().last_sample.is_none());
        assert_eq!(m.descriptor().tooltip_text, "Loading usage data...");
    }

    #[test]
    fn test_machine_network_failures_from_initializing() {
        let mut m = machine();
        let mut observed = Vec::new();
        for _ in 0..3 {
            m.apply(network(), Utc::now());
            observed.push((m.state().status, m.state().current_interval_seconds));
        }
        assert_eq!(
            observed,
            vec![
                (StatusTag::NetworkError, 300),
                (StatusTag::NetworkError, 600),
                (StatusTag::NetworkError, 1200),
            ]
        );
    }

    #[test]
    fn test_machine_success_resets_backoff() {
        let mut m = machine();
        for _ in 0..5 {
            m.apply(network(), Utc::now());
        }
        assert_eq!(m.state().current_interval_seconds, 1800);

        m.apply(usage(10.0), Utc::now());
        assert_eq!(m.state().status, StatusTag::Healthy);
        assert_eq!(m.state().consecutive_failures, 0);
        assert_eq!(m.state().current_interval_seconds, 300);
        assert!(m.state().last_error.is_none());

        m.apply(network(), Utc::now());
        assert_eq!(m.state().current_interval_seconds, 300);
    }

    #[test]
    fn test_machine_malformed_counts_as_transient() {
        let mut m = machine();
        m.apply(Err(FetchError::malformed("eof")), Utc::now());
        m.apply(network(), Utc::now());
        assert_eq!(m.state().status, StatusTag::NetworkError);
        assert_eq!(m.state().consecutive_failures, 2);
        assert_eq!(m.state().current_interval_seconds, 600);
    }

    #[test]
    fn test_machine_auth_error_fixed_interval_and_single_alert() {
        let mut m = machine();
        for _ in 0..4 {
            m.apply(network(), Utc::now());
        }

        let first = m.apply(Err(FetchError::Unauthorized), Utc::now());
        assert_eq!(first, vec![Alert::AuthExpired]);
        assert_eq!(m.state().status, StatusTag::AuthError);
        assert_eq!(m.state().current_interval_seconds, 3600);

        let second = m.apply(Err(FetchError::Unauthorized), Utc::now());
        assert!(second.is_empty());
        assert_eq!(m.state().current_interval_seconds, 3600);
    }

    #[test]
    fn test_machine_auth_alert_again_after_recovery() {
        let mut m = machine();
        assert_eq!(m.apply(Err(FetchError::Unauthorized), Utc::now()), vec![Alert::AuthExpired]);
        m.apply(usage(10.0), Utc::now());
        assert_eq!(m.apply(Err(FetchError::Unauthorized), Utc::now()), vec![Alert::AuthExpired]);
    }

    #[test]
    fn test_machine_rate_limited() {
        let mut m = machine();
        let alerts = m.apply(
            Err(FetchError::RateLimited {
                retry_after_seconds: Some(42),
            }),
            Utc::now(),
        );
        assert!(alerts.is_empty());
        assert_eq!(m.state().status, StatusTag::RateLimited);
        assert_eq!(m.state().current_interval_seconds, 42);

        m.apply(
            Err(FetchError::RateLimited {
                retry_after_seconds: None,
            }),
            Utc::now(),
        );
        assert_eq!(m.state().current_interval_seconds, 120);
        assert_eq!(m.descriptor().tooltip_text, "Rate limited, retrying...");
    }

    #[test]
    fn test_machine_failures_keep_last_sample_and_skip_thresholds() {
        let mut m = machine();
        m.apply(usage(60.0), Utc::now());
        let alerts = m.apply(network(), Utc::now());
        assert!(alerts.is_empty());
        assert!(m.state().last_sample.is_some());

        // 60 -> (failure) -> 60 is not a new crossing
        assert!(m.apply(usage(60.0), Utc::now()).is_empty());
    }

    #[test]
    fn test_machine_threshold_scenario() {
        let mut m = machine();
        let thresholds = |alerts: Vec<Alert>| -> Vec<f64> {
            alerts
                .into_iter()
                .filter_map(|a| match a {
                    Alert::Threshold(e) => Some(e.threshold),
                    Alert::AuthExpired => None,
                })
                .collect()
        };

        assert!(thresholds(m.apply(usage(30.0), Utc::now())).is_empty());
        assert_eq!(thresholds(m.apply(usage(55.0), Utc::now())), vec![50.0]);
        assert_eq!(thresholds(m.apply(usage(95.0), Utc::now())), vec![75.0, 90.0]);
        assert!(thresholds(m.apply(usage(40.0), Utc::now())).is_empty());
        assert_eq!(thresholds(m.apply(usage(60.0), Utc::now())), vec![50.0]);
    }

    #[test]
    fn test_machine_snapshot_next_poll() {
        let mut m = machine();
        let now = Utc::now();
        m.set_running(true);
        m.apply(usage(10.0), now);

        let snapshot = m.snapshot(false);
        assert_eq!(snapshot.next_poll_at, Some(now + chrono::Duration::seconds(300)));
        assert_eq!(snapshot.poll_count, 1);
        assert!(m.snapshot(true).next_poll_at.is_none());

        m.set_running(false);
        assert!(m.snapshot(false).next_poll_at.is_none());
    }
}
