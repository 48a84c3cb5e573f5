//! The map engine facade.
//!
//! [`MapEngine`] wires every component around one [`StateStore`] and one
//! [`TransitCacheClient`]:
//!
//! ```text
//!                 ┌─────────────────── MapEngine ───────────────────┐
//!  Viewport ─────►│ ViewportWatcher ─┐                              │
//!  Route/Trip ───►│ SelectionStateMachine ──► LivePositionPoller    │
//!  Stop ─────────►│ StopPanel ──► ActiveRouteProbe                  │
//!                 │        │                                        │
//!                 │        ▼                                        │
//!                 │  TransitCacheClient ──► dyn TransitService      │
//!                 │  StateStore (Fence) ──► watch<MapSnapshot>      │
//!                 │  CameraDirector ──────► broadcast<CameraIntent> │
//!                 └─────────────────────────────────────────────────┘
//! ```
//!
//! Actions can be called as methods or sent as [`Action`] values through
//! [`MapEngine::dispatch`].

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::cache::TransitCacheClient;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::geo::{CameraDirector, CameraIntent};
use crate::model::{RouteSchedule, Viewport};
use crate::poller::{LivePositionPoller, PollerConfig};
use crate::probe::ActiveRouteProbe;
use crate::selection::SelectionStateMachine;
use crate::service::TransitService;
use crate::state::{ActionOutcome, MapSnapshot, StateStore};
use crate::stop_panel::StopPanel;
use crate::telemetry::{EngineMetrics, TelemetrySnapshot};
use crate::viewport::{StopsUpdate, ViewportWatcher};

/// A discrete engine action.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ViewportChanged(Viewport),
    SelectRoute(String),
    SelectTrip(String),
    ClearTrip,
    ClearRoute,
    PollerTick,
    OpenStop(String),
    CloseStop,
    ProbeActiveRoutes { stop_id: String, force: bool },
}

/// Selection and live-data orchestration for a transit map.
pub struct MapEngine {
    config: EngineConfig,
    store: Arc<StateStore>,
    cache: Arc<TransitCacheClient>,
    director: Arc<CameraDirector>,
    metrics: Arc<EngineMetrics>,
    viewport: ViewportWatcher,
    selection: SelectionStateMachine,
    stop_panel: StopPanel,
}

impl MapEngine {
    /// Create an engine over `service`.
    pub fn new(service: Arc<dyn TransitService>, config: EngineConfig) -> Self {
        let metrics = Arc::new(EngineMetrics::new());
        let store = Arc::new(StateStore::new(Arc::clone(&metrics)));
        let cache = Arc::new(TransitCacheClient::new(
            service,
            config.cache_policy,
            config.bbox_precision,
            Arc::clone(&metrics),
        ));
        let director = CameraDirector::new(config.focus_zoom, config.fit_padding);

        let poller = LivePositionPoller::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            Arc::clone(&director),
            Arc::clone(&metrics),
            PollerConfig {
                interval: config.poll_interval,
                freshness_secs: config.live_freshness_secs,
                concurrency: config.fanout_concurrency,
            },
        );
        let selection = SelectionStateMachine::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            Arc::clone(&director),
            poller,
            Arc::clone(&metrics),
            &config,
        );
        let probe = ActiveRouteProbe::new(
            Arc::clone(&cache),
            config.probe_cache_capacity,
            config.probe_freshness_secs,
            config.fanout_concurrency,
            Arc::clone(&metrics),
        );
        let stop_panel = StopPanel::new(Arc::clone(&store), Arc::clone(&cache), probe);
        let viewport = ViewportWatcher::new(Arc::clone(&store), Arc::clone(&cache), config.min_stop_zoom);

        info!(
            min_stop_zoom = config.min_stop_zoom,
            poll_interval_secs = config.poll_interval.as_secs_f64(),
            live_polling = config.live_polling,
            "Map engine created"
        );

        Self {
            config,
            store,
            cache,
            director,
            metrics,
            viewport,
            selection,
            stop_panel,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Receiver of displayable state, updated on every change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<MapSnapshot>> {
        self.store.subscribe()
    }

    /// Receiver of camera intents.
    pub fn camera_intents(&self) -> broadcast::Receiver<CameraIntent> {
        self.director.subscribe()
    }

    /// The current displayable state.
    pub fn snapshot(&self) -> Arc<MapSnapshot> {
        self.store.snapshot()
    }

    pub fn metrics(&self) -> TelemetrySnapshot {
        self.metrics.snapshot()
    }

    /// Whether the live poller is running.
    pub fn is_polling(&self) -> bool {
        self.selection.is_polling()
    }

    /// Run one action.
    ///
    /// Only an invalid transition returns `Err`; fetch failures are reported
    /// as [`ActionOutcome::Failed`] and in the snapshot's banners.
    pub async fn dispatch(&self, action: Action) -> EngineResult<ActionOutcome> {
        let outcome = match action {
            Action::ViewportChanged(viewport) => match self.viewport_changed(viewport).await {
                StopsUpdate::ZoomIn | StopsUpdate::Stops(_) => ActionOutcome::Applied,
                StopsUpdate::Failed(message) => ActionOutcome::Failed(message),
                StopsUpdate::Superseded => ActionOutcome::Superseded,
            },
            Action::SelectRoute(route_id) => self.select_route(&route_id).await,
            Action::SelectTrip(trip_id) => self.select_trip(&trip_id).await?,
            Action::ClearTrip => {
                self.clear_trip();
                ActionOutcome::Applied
            }
            Action::ClearRoute => {
                self.clear_route();
                ActionOutcome::Applied
            }
            Action::PollerTick => self.poll_tick().await,
            Action::OpenStop(stop_id) => self.open_stop(&stop_id).await,
            Action::CloseStop => {
                self.close_stop();
                ActionOutcome::Applied
            }
            Action::ProbeActiveRoutes { stop_id, force } => {
                self.probe_active_routes(&stop_id, force).await?
            }
        };
        Ok(outcome)
    }

    pub async fn viewport_changed(&self, viewport: Viewport) -> StopsUpdate {
        self.viewport.viewport_changed(viewport).await
    }

    pub async fn select_route(&self, route_id: &str) -> ActionOutcome {
        self.selection.select_route(route_id).await
    }

    pub async fn select_trip(&self, trip_id: &str) -> EngineResult<ActionOutcome> {
        self.selection.select_trip(trip_id).await
    }

    pub fn clear_trip(&self) {
        self.selection.clear_trip();
    }

    pub fn clear_route(&self) {
        self.selection.clear_route();
    }

    /// One live refresh for the selected route, outside the poller schedule.
    pub async fn poll_tick(&self) -> ActionOutcome {
        self.selection.poll_tick().await
    }

    pub async fn open_stop(&self, stop_id: &str) -> ActionOutcome {
        self.stop_panel.open_stop(stop_id).await
    }

    pub fn close_stop(&self) {
        self.stop_panel.close_stop();
    }

    pub async fn probe_active_routes(
        &self,
        stop_id: &str,
        force: bool,
    ) -> EngineResult<ActionOutcome> {
        self.stop_panel.probe_active_routes(stop_id, force).await
    }

    /// Timetable of a route at a stop on a service date.
    pub async fn schedule_at_stop(
        &self,
        stop_id: &str,
        route_id: &str,
        date: NaiveDate,
    ) -> EngineResult<Arc<RouteSchedule>> {
        Ok(self
            .cache
            .route_schedule_at_stop(stop_id, route_id, date)
            .await?)
    }

    /// Stop background work.
    pub fn shutdown(&self) {
        self.selection.stop_poller();
        info!("Map engine stopped");
    }
}
