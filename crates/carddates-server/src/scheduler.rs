//! Periodic sync scheduling.
//!
//! The scheduler owns the timing of poll cycles:
//! - a fixed interval (hourly by default) with a little jitter
//! - exponential backoff after failed cycles, capped at the interval
//! - a cooldown that collapses bursts of manual refreshes
//! - pause/resume/stop commands through a [`SchedulerHandle`]
//!
//! A failing account is retried forever; the store keeps serving the last
//! good snapshot in the meantime.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{ServerError, ServerResult};

/// Default time between two poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3600);

/// Longest accepted poll interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(365 * 24 * 3600);

/// Scheduler timing configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Base interval between cycles.
    pub interval: Duration,
    /// Jitter applied to the interval, as a fraction in `[0, 1]`.
    pub jitter_fraction: f64,
    /// Manual refreshes inside this window are ignored unless forced.
    pub refresh_cooldown: Duration,
    /// Delay after the first failure.
    pub initial_backoff: Duration,
    /// Upper bound of the backoff delay.
    pub max_backoff: Duration,
    /// Factor applied per additional failure.
    pub backoff_multiplier: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            jitter_fraction: 0.05,
            refresh_cooldown: Duration::from_secs(60),
            initial_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(1800),
            backoff_multiplier: 2.0,
        }
    }
}

impl SchedulerConfig {
    /// Creates a config with the given interval and default tuning.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Builder: set the jitter fraction (clamped to `[0, 1]`).
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Builder: set the manual refresh cooldown.
    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    /// Builder: set the backoff curve.
    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.backoff_multiplier = multiplier;
        self
    }

    /// Checks that the timings make sense.
    pub fn validate(&self) -> ServerResult<()> {
        if self.interval.is_zero() {
            return Err(ServerError::config("poll interval must be positive"));
        }
        if self.interval > MAX_POLL_INTERVAL {
            return Err(ServerError::config(format!(
                "poll interval must be at most {}s",
                MAX_POLL_INTERVAL.as_secs()
            )));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(ServerError::config("backoff multiplier must be at least 1"));
        }
        Ok(())
    }

    /// Returns the interval with jitter applied.
    pub fn next_interval(&self) -> Duration {
        let base = self.interval.as_secs_f64();
        let spread = base * self.jitter_fraction;
        Duration::try_from_secs_f64((base + spread * unit_noise()).max(0.0))
            .unwrap_or(self.interval)
    }

    /// Returns the retry delay after `failures` consecutive failed cycles.
    ///
    /// Never longer than the regular interval.
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(failures - 1).unwrap_or(i32::MAX);
        let delay = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let cap = self.max_backoff.min(self.interval);
        Duration::try_from_secs_f64(delay)
            .map_or(cap, |delay| delay.min(cap))
    }
}

/// A value in `[-1, 1]` derived from the clock's sub-second part.
fn unit_noise() -> f64 {
    use std::time::SystemTime;

    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    f64::from(nanos) / 500_000_000.0 - 1.0
}

/// Commands accepted by a running scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Run a cycle now.
    SyncNow,
    /// Run a cycle unless a refresh happened within the cooldown.
    Refresh { force: bool },
    /// Skip timed cycles until resumed.
    Pause,
    /// Resume timed cycles.
    Resume,
    /// Leave the loop.
    Stop,
}

/// Observable scheduler state.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    /// Timed cycles are skipped while paused.
    pub paused: bool,
    /// Failed cycles since the last success.
    pub consecutive_failures: u32,
    /// Cycles run so far, successful or not.
    pub cycles: u64,
    /// End of the last successful cycle.
    pub last_success: Option<DateTime<Utc>>,
    /// End of the last cycle.
    pub last_attempt: Option<DateTime<Utc>>,
    /// Error of the last cycle, cleared on success.
    pub last_error: Option<String>,
    last_refresh: Option<Instant>,
}

impl SchedulerState {
    /// Creates a fresh state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful cycle.
    pub fn record_success(&mut self) {
        let now = Utc::now();
        self.cycles += 1;
        self.consecutive_failures = 0;
        self.last_success = Some(now);
        self.last_attempt = Some(now);
        self.last_error = None;
    }

    /// Records a failed cycle.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.cycles += 1;
        self.consecutive_failures += 1;
        self.last_attempt = Some(Utc::now());
        self.last_error = Some(error.into());
    }

    /// Records a manual refresh.
    pub fn record_refresh(&mut self) {
        self.last_refresh = Some(Instant::now());
    }

    /// Returns true while a manual refresh is within `cooldown`.
    pub fn in_cooldown(&self, cooldown: Duration) -> bool {
        self.last_refresh
            .is_some_and(|at| at.elapsed() < cooldown)
    }
}

/// Scheduler state shared with handles.
pub type SharedSchedulerState = Arc<RwLock<SchedulerState>>;

/// Drives a sync function on a timer.
pub struct Scheduler {
    config: SchedulerConfig,
    state: SharedSchedulerState,
    command_tx: mpsc::Sender<SchedulerCommand>,
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl Scheduler {
    /// Creates a scheduler.
    pub fn new(config: SchedulerConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        Self {
            config,
            state: Arc::new(RwLock::new(SchedulerState::new())),
            command_tx,
            command_rx,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Returns a handle for controlling the loop once it runs.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            command_tx: self.command_tx.clone(),
            state: self.state.clone(),
        }
    }

    /// Runs cycles until stopped. The first cycle starts immediately.
    pub async fn run<F, Fut, E>(self, sync_fn: F)
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<(), E>> + Send,
        E: Display,
    {
        let Self {
            config,
            state,
            command_rx: mut commands,
            ..
        } = self;

        info!(interval_secs = config.interval.as_secs(), "Scheduler started");
        cycle(&state, &sync_fn).await;

        loop {
            let delay = next_delay(&config, &state).await;
            debug!(delay_secs = delay.as_secs(), "Next cycle scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if state.read().await.paused {
                        debug!("Paused, skipping timed cycle");
                        continue;
                    }
                    cycle(&state, &sync_fn).await;
                }
                command = commands.recv() => match command {
                    Some(SchedulerCommand::SyncNow) => {
                        debug!("Sync requested");
                        cycle(&state, &sync_fn).await;
                    }
                    Some(SchedulerCommand::Refresh { force }) => {
                        let cooling = state.read().await.in_cooldown(config.refresh_cooldown);
                        if force || !cooling {
                            state.write().await.record_refresh();
                            cycle(&state, &sync_fn).await;
                        } else {
                            debug!(force, "Refresh ignored during cooldown");
                        }
                    }
                    Some(SchedulerCommand::Pause) => {
                        info!("Scheduler paused");
                        state.write().await.paused = true;
                    }
                    Some(SchedulerCommand::Resume) => {
                        info!("Scheduler resumed");
                        state.write().await.paused = false;
                    }
                    Some(SchedulerCommand::Stop) | None => {
                        info!("Scheduler stopping");
                        break;
                    }
                },
            }
        }
    }
}

async fn next_delay(config: &SchedulerConfig, state: &SharedSchedulerState) -> Duration {
    let state = state.read().await;

    if state.consecutive_failures > 0 {
        let backoff = config.backoff_delay(state.consecutive_failures);
        debug!(
            failures = state.consecutive_failures,
            backoff_secs = backoff.as_secs(),
            "Backing off"
        );
        return backoff;
    }

    config.next_interval()
}

async fn cycle<F, Fut, E>(state: &SharedSchedulerState, sync_fn: &F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    debug!("Cycle starting");
    match sync_fn().await {
        Ok(()) => state.write().await.record_success(),
        Err(err) => {
            let mut state = state.write().await;
            state.record_failure(err.to_string());
            warn!(error = %err, failures = state.consecutive_failures, "Cycle failed");
        }
    }
}

/// Controls a running [`Scheduler`].
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    state: SharedSchedulerState,
}

impl SchedulerHandle {
    async fn send(&self, command: SchedulerCommand) -> ServerResult<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| ServerError::SchedulerStopped)
    }

    /// Runs a cycle now.
    pub async fn sync_now(&self) -> ServerResult<()> {
        self.send(SchedulerCommand::SyncNow).await
    }

    /// Runs a cycle, honouring the cooldown unless `force` is set.
    pub async fn refresh(&self, force: bool) -> ServerResult<()> {
        self.send(SchedulerCommand::Refresh { force }).await
    }

    /// Pauses timed cycles.
    pub async fn pause(&self) -> ServerResult<()> {
        self.send(SchedulerCommand::Pause).await
    }

    /// Resumes timed cycles.
    pub async fn resume(&self) -> ServerResult<()> {
        self.send(SchedulerCommand::Resume).await
    }

    /// Stops the loop after the current cycle.
    pub async fn stop(&self) -> ServerResult<()> {
        self.send(SchedulerCommand::Stop).await
    }

    /// Returns a copy of the current state.
    pub async fn state(&self) -> SchedulerState {
        self.state.read().await.clone()
    }

    /// Returns true if the scheduler is paused.
    pub async fn is_paused(&self) -> bool {
        self.state.read().await.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting(counter: Arc<AtomicU32>) -> impl Fn() -> std::future::Ready<Result<(), String>> {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(()))
        }
    }

    #[test]
    fn default_is_hourly() {
        let config = SchedulerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn jitter_stays_in_range() {
        let config = SchedulerConfig::new(Duration::from_secs(100)).with_jitter(0.1);
        for _ in 0..20 {
            let delay = config.next_interval().as_secs_f64();
            assert!((90.0..=110.0).contains(&delay), "{delay}");
        }
    }

    #[test]
    fn no_jitter_is_exact() {
        let config = SchedulerConfig::new(Duration::from_secs(100)).with_jitter(0.0);
        assert_eq!(config.next_interval(), Duration::from_secs(100));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = SchedulerConfig::new(Duration::from_secs(3600)).with_backoff(
            Duration::from_secs(60),
            Duration::from_secs(600),
            2.0,
        );
        assert_eq!(config.backoff_delay(0), Duration::ZERO);
        assert_eq!(config.backoff_delay(1), Duration::from_secs(60));
        assert_eq!(config.backoff_delay(2), Duration::from_secs(120));
        assert_eq!(config.backoff_delay(3), Duration::from_secs(240));
        assert_eq!(config.backoff_delay(8), Duration::from_secs(600));
        assert_eq!(config.backoff_delay(u32::MAX), Duration::from_secs(600));
    }

    #[test]
    fn backoff_never_exceeds_interval() {
        let config = SchedulerConfig::new(Duration::from_secs(120));
        assert_eq!(config.backoff_delay(10), Duration::from_secs(120));
    }

    #[test]
    fn validate_rejects_bad_timings() {
        assert!(SchedulerConfig::new(Duration::ZERO).validate().is_err());
        let config = SchedulerConfig::default().with_backoff(
            Duration::from_secs(1),
            Duration::from_secs(2),
            0.5,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_interval_is_rejected_without_panicking() {
        let config = SchedulerConfig::new(Duration::from_secs(u64::MAX));
        assert!(config.validate().is_err());
        assert!(config.next_interval() > MAX_POLL_INTERVAL);
        assert!(config.backoff_delay(u32::MAX) <= config.max_backoff);

        assert!(SchedulerConfig::new(MAX_POLL_INTERVAL).validate().is_ok());
    }

    #[test]
    fn state_transitions() {
        let mut state = SchedulerState::new();
        state.record_failure("boom");
        state.record_failure("boom again");
        assert_eq!(state.consecutive_failures, 2);
        assert_eq!(state.last_error.as_deref(), Some("boom again"));
        assert!(state.last_success.is_none());

        state.record_success();
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.cycles, 3);
        assert!(state.last_error.is_none());
        assert!(state.last_success.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_expires() {
        let mut state = SchedulerState::new();
        assert!(!state.in_cooldown(Duration::from_secs(60)));
        state.record_refresh();
        assert!(state.in_cooldown(Duration::from_secs(60)));
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!state.in_cooldown(Duration::from_secs(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn runs_first_cycle_then_every_interval() {
        let config = SchedulerConfig::new(Duration::from_secs(3600)).with_jitter(0.0);
        let scheduler = Scheduler::new(config);
        let handle = scheduler.handle();
        let count = Arc::new(AtomicU32::new(0));
        let task = tokio::spawn(scheduler.run(counting(count.clone())));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        handle.stop().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn commands_control_the_loop() {
        let config = SchedulerConfig::new(Duration::from_secs(3600))
            .with_jitter(0.0)
            .with_refresh_cooldown(Duration::from_secs(60));
        let scheduler = Scheduler::new(config);
        let handle = scheduler.handle();
        let count = Arc::new(AtomicU32::new(0));
        let task = tokio::spawn(scheduler.run(counting(count.clone())));
        tokio::time::sleep(Duration::from_millis(10)).await;

        handle.sync_now().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        handle.refresh(false).await.unwrap();
        handle.refresh(false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        handle.refresh(true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);

        handle.pause().await.unwrap();
        tokio::time::sleep(Duration::from_secs(3700)).await;
        assert!(handle.is_paused().await);
        assert_eq!(count.load(Ordering::SeqCst), 4);

        handle.resume().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_paused().await);

        handle.stop().await.unwrap();
        task.await.unwrap();
        assert!(handle.sync_now().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn failures_back_off_then_recover() {
        let config = SchedulerConfig::new(Duration::from_secs(3600))
            .with_jitter(0.0)
            .with_backoff(Duration::from_secs(10), Duration::from_secs(100), 2.0);
        let scheduler = Scheduler::new(config);
        let handle = scheduler.handle();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let task = tokio::spawn(scheduler.run(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n < 2 {
                Err(format!("failure {n}"))
            } else {
                Ok(())
            })
        }));

        // Attempts at t=0, t=10 and t=30.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.state().await.consecutive_failures, 1);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.state().await.consecutive_failures, 2);
        tokio::time::sleep(Duration::from_secs(20)).await;

        let state = handle.state().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.last_error.is_none());

        handle.stop().await.unwrap();
        task.await.unwrap();
    }
}
