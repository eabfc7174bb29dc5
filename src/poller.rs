//! Fixed-period polling of the analytics source.
//!
//! Every cycle publishes a whole new `DashboardState` through a watch channel.
//! Ticks fire whether or not an earlier fetch is still outstanding, so cycles
//! can overlap; the cycle that completes last wins.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::analytics::{fallback_view_model, DashboardViewModel};
use crate::fetcher::{fetch_analytics, AnalyticsSource, DEFAULT_REQUEST_TIMEOUT_MS};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub request_timeout: Duration,
    /// Skip a cycle when another one is still outstanding.
    pub skip_when_in_flight: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            skip_when_in_flight: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    Idle,
    Fetching,
    SettledSuccess,
    SettledFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    pub phase: PollPhase,
    pub data: DashboardViewModel,
    pub loading: bool,
    pub error: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
}

impl DashboardState {
    pub fn initial() -> Self {
        Self {
            phase: PollPhase::Idle,
            data: fallback_view_model(),
            loading: false,
            error: None,
            last_update: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PollerError {
    #[error("poller has been stopped")]
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollTrigger {
    Initial,
    Tick,
    Manual,
}

impl PollTrigger {
    fn as_str(self) -> &'static str {
        match self {
            PollTrigger::Initial => "initial",
            PollTrigger::Tick => "tick",
            PollTrigger::Manual => "manual",
        }
    }
}

enum Lifecycle {
    Created,
    Running(JoinHandle<()>),
    Stopped,
}

struct Shared {
    source: Arc<dyn AnalyticsSource>,
    config: PollerConfig,
    state: watch::Sender<DashboardState>,
    in_flight: AtomicUsize,
}

impl Shared {
    /// Only timer ticks are subject to the in-flight guard. Initial and manual
    /// cycles always run, but still count as outstanding for later ticks.
    fn try_enter(self: &Arc<Self>, trigger: PollTrigger) -> Option<InFlightGuard> {
        if self.config.skip_when_in_flight && trigger == PollTrigger::Tick {
            self.in_flight
                .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                .ok()?;
        } else {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
        }

        Some(InFlightGuard {
            shared: Arc::clone(self),
        })
    }
}

struct InFlightGuard {
    shared: Arc<Shared>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Poller {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
}

impl Poller {
    pub fn new(source: Arc<dyn AnalyticsSource>, config: PollerConfig) -> Self {
        let (state, _) = watch::channel(DashboardState::initial());

        Self {
            shared: Arc::new(Shared {
                source,
                config,
                state,
                in_flight: AtomicUsize::new(0),
            }),
            lifecycle: Mutex::new(Lifecycle::Created),
        }
    }

    pub fn config(&self) -> PollerConfig {
        self.shared.config
    }

    pub fn source(&self) -> Arc<dyn AnalyticsSource> {
        Arc::clone(&self.shared.source)
    }

    /// Runs one cycle right away, then arms the repeating timer. Must be called
    /// from within a tokio runtime. Calling it while already running is a no-op.
    pub fn start(&self) {
        let mut lifecycle = self
            .lifecycle
            .lock()
            .expect("poller lifecycle lock should not be poisoned");
        if matches!(*lifecycle, Lifecycle::Running(_)) {
            return;
        }

        let config = self.shared.config;
        info!(
            component = "poller",
            event = "poller.start",
            interval_ms = config.interval.as_millis() as u64,
            request_timeout_ms = config.request_timeout.as_millis() as u64,
            skip_when_in_flight = config.skip_when_in_flight
        );

        spawn_cycle(Arc::clone(&self.shared), PollTrigger::Initial);

        let shared = Arc::clone(&self.shared);
        let timer = tokio::spawn(async move {
            let period = shared.config.interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                spawn_cycle(Arc::clone(&shared), PollTrigger::Tick);
            }
        });

        *lifecycle = Lifecycle::Running(timer);
    }

    /// Cancels the timer. Fetches already in flight are left to finish or time out.
    pub fn stop(&self) {
        let mut lifecycle = self
            .lifecycle
            .lock()
            .expect("poller lifecycle lock should not be poisoned");

        if let Lifecycle::Running(timer) = std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            timer.abort();
            info!(component = "poller", event = "poller.stop");
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(
            *self
                .lifecycle
                .lock()
                .expect("poller lifecycle lock should not be poisoned"),
            Lifecycle::Running(_)
        )
    }

    fn is_stopped(&self) -> bool {
        matches!(
            *self
                .lifecycle
                .lock()
                .expect("poller lifecycle lock should not be poisoned"),
            Lifecycle::Stopped
        )
    }

    /// Out-of-cycle fetch. Leaves the timer's period and phase untouched.
    ///
    /// The cycle runs on its own task, so dropping the returned future only
    /// stops waiting for it; the cycle still settles the published state.
    pub async fn refetch(&self) -> Result<(), PollerError> {
        if self.is_stopped() {
            return Err(PollerError::Stopped);
        }

        if let Err(err) = spawn_cycle(Arc::clone(&self.shared), PollTrigger::Manual).await {
            if err.is_panic() {
                std::panic::resume_unwind(err.into_panic());
            }
        }
        Ok(())
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.shared.state.subscribe()
    }

    pub fn state(&self) -> DashboardState {
        self.shared.state.borrow().clone()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Ok(Lifecycle::Running(timer)) = self.lifecycle.get_mut() {
            timer.abort();
        }
    }
}

fn spawn_cycle(shared: Arc<Shared>, trigger: PollTrigger) -> JoinHandle<()> {
    tokio::spawn(run_cycle(shared, trigger))
}

async fn run_cycle(shared: Arc<Shared>, trigger: PollTrigger) {
    let Some(guard) = shared.try_enter(trigger) else {
        debug!(
            component = "poller",
            event = "poll.skipped",
            trigger = trigger.as_str()
        );
        return;
    };

    shared.state.send_modify(|state| {
        state.phase = PollPhase::Fetching;
        state.loading = true;
        state.error = None;
    });
    debug!(
        component = "poller",
        event = "poll.tick",
        trigger = trigger.as_str()
    );

    let outcome = fetch_analytics(shared.source.as_ref(), shared.config.request_timeout).await;
    drop(guard);

    let phase = if outcome.is_fallback() {
        PollPhase::SettledFallback
    } else {
        PollPhase::SettledSuccess
    };
    info!(
        component = "poller",
        event = "poll.settled",
        trigger = trigger.as_str(),
        phase = ?phase
    );

    shared.state.send_replace(DashboardState {
        phase,
        data: outcome.view,
        loading: false,
        error: outcome.error.map(|err| err.to_string()),
        last_update: Some(Utc::now()),
    });
}
