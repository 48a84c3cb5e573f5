//! Periodic refresh of the selected route's vehicle positions.
//!
//! A [`LivePositionPoller`] is started for one route generation. The task
//! refreshes immediately, then once per interval, and stops when:
//!
//! - its [`PollerHandle`] is stopped or dropped, or
//! - it observes that its route generation is no longer current.
//!
//! Every refresh replaces the whole vehicle list. A batch in which every
//! lookup failed leaves the list alone and raises the live error banner.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::TransitCacheClient;
use crate::config::MIN_POLL_INTERVAL;
use crate::fanout::FanoutJoin;
use crate::fence::Generation;
use crate::geo::CameraDirector;
use crate::model::VehiclePosition;
use crate::state::{ActionOutcome, StateStore};
use crate::telemetry::EngineMetrics;

/// Poller settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub freshness_secs: u64,
    /// Fan-out concurrency (0 = unbounded).
    pub concurrency: usize,
}

/// Refreshes live vehicle positions for the selected route.
pub struct LivePositionPoller {
    store: Arc<StateStore>,
    cache: Arc<TransitCacheClient>,
    director: Arc<CameraDirector>,
    metrics: Arc<EngineMetrics>,
    config: PollerConfig,
}

impl LivePositionPoller {
    pub fn new(
        store: Arc<StateStore>,
        cache: Arc<TransitCacheClient>,
        director: Arc<CameraDirector>,
        metrics: Arc<EngineMetrics>,
        mut config: PollerConfig,
    ) -> Arc<Self> {
        config.interval = config.interval.max(MIN_POLL_INTERVAL);
        Arc::new(Self {
            store,
            cache,
            director,
            metrics,
            config,
        })
    }

    pub fn config(&self) -> PollerConfig {
        self.config
    }

    /// Run one refresh for the route generation `route_token`.
    pub async fn refresh_once(&self, route_token: Generation) -> ActionOutcome {
        if !self.store.fence().is_current(route_token) {
            return ActionOutcome::Superseded;
        }
        self.metrics.poll_tick();

        let trips = self.store.read(|state| Arc::clone(&state.route.trips));
        let requests = self
            .cache
            .vehicle_position_lookups(&trips, self.config.freshness_secs);
        let join = FanoutJoin::run(requests, self.config.concurrency).await;
        self.metrics.fanout_completed(join.len(), join.failures());

        let all_failed = join.all_failed();
        let lookups = join.len();
        let vehicles: Vec<VehiclePosition> =
            join.into_values().filter(VehiclePosition::is_usable).collect();
        let shown = vehicles.len();

        let applied = self.store.apply_if_current(&[route_token], |state| {
            if all_failed {
                let message = format!("Live positions unavailable: all {} lookups failed", lookups);
                state.live.error = Some(message.clone());
                Err(message)
            } else {
                state.route.vehicles = vehicles;
                state.live.error = None;
                Ok(self.director.follow_vehicle(state))
            }
        });

        match applied {
            None => ActionOutcome::Superseded,
            Some(Err(message)) => {
                self.metrics.poll_batch_failed();
                warn!(generation = route_token.value(), lookups, "{}", message);
                ActionOutcome::Failed(message)
            }
            Some(Ok(follow)) => {
                debug!(generation = route_token.value(), lookups, shown, "Vehicle positions refreshed");
                self.director.emit(follow);
                ActionOutcome::Applied
            }
        }
    }

    /// Spawn the polling task for `route_token`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self: &Arc<Self>, route_token: Generation) -> PollerHandle {
        let cancel = CancellationToken::new();
        let poller = Arc::clone(self);
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move { poller.run(route_token, task_cancel).await });

        PollerHandle {
            cancel,
            task: Some(task),
            route_token,
        }
    }

    async fn run(&self, route_token: Generation, cancel: CancellationToken) {
        info!(
            generation = route_token.value(),
            interval_secs = self.config.interval.as_secs_f64(),
            "Live poller started"
        );
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.set_polling(route_token, true);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.refresh_once(route_token) => outcome,
            };
            if outcome.is_superseded() {
                break;
            }
        }

        self.set_polling(route_token, false);
        info!(generation = route_token.value(), "Live poller stopped");
    }

    // A stale poller must not touch the flag of its successor.
    fn set_polling(&self, route_token: Generation, polling: bool) {
        if self.store.fence().is_current(route_token) {
            self.store.update(|state| {
                if self.store.fence().is_current(route_token) {
                    state.live.polling = polling;
                }
            });
        }
    }
}

/// Owner of a running poller task.
///
/// Stopping or dropping the handle cancels the task.
#[derive(Debug)]
pub struct PollerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    route_token: Generation,
}

impl PollerHandle {
    /// The route generation this poller refreshes.
    pub fn route_token(&self) -> Generation {
        self.route_token
    }

    /// Request cancellation. The task exits at its next suspension point.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancel and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Live poller task failed");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
