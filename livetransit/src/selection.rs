//! Hierarchical route/trip selection.
//!
//! ```text
//!            select_route                 select_trip
//!   Idle ───────────────► RouteSelected ───────────────► TripSelected
//!    ▲                      │      ▲                          │
//!    │     clear_route      │      │        clear_trip        │
//!    └──────────────────────┘      └──────────────────────────┘
//! ```
//!
//! Each action bumps its scopes before any fetch starts and every result
//! is applied through [`StateStore::apply_if_current`], so a result that
//! arrives after a newer action is dropped.
//!
//! Route selection runs in three stages:
//!
//! 1. geometry and trip list, fetched concurrently
//! 2. vehicle positions for every trip (fan-out, route freshness)
//! 3. the live poller, started for the route generation
//!
//! The poller starts after stage 2 so the long-freshness list can never
//! overwrite a fresher one.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::TransitCacheClient;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::fanout::FanoutJoin;
use crate::fence::{Generation, Scope};
use crate::geo::CameraDirector;
use crate::model::{LatLon, VehiclePosition};
use crate::poller::{LivePositionPoller, PollerHandle};
use crate::state::{ActionOutcome, LiveView, MapSnapshot, RouteView, StateStore, TripView};
use crate::telemetry::EngineMetrics;

/// Drives route and trip selection and owns the live poller.
pub struct SelectionStateMachine {
    store: Arc<StateStore>,
    cache: Arc<TransitCacheClient>,
    director: Arc<CameraDirector>,
    poller: Arc<LivePositionPoller>,
    metrics: Arc<EngineMetrics>,
    active_poller: Mutex<Option<PollerHandle>>,
    route_freshness_secs: u64,
    fanout_concurrency: usize,
    live_polling: bool,
}

impl SelectionStateMachine {
    pub fn new(
        store: Arc<StateStore>,
        cache: Arc<TransitCacheClient>,
        director: Arc<CameraDirector>,
        poller: Arc<LivePositionPoller>,
        metrics: Arc<EngineMetrics>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            cache,
            director,
            poller,
            metrics,
            active_poller: Mutex::new(None),
            route_freshness_secs: config.route_freshness_secs,
            fanout_concurrency: config.fanout_concurrency,
            live_polling: config.live_polling,
        }
    }

    /// Select a route. Valid from every state.
    pub async fn select_route(&self, route_id: &str) -> ActionOutcome {
        let route_token = self.route_transition(|state| {
            state.selection.route_id = Some(route_id.to_string());
            state.selection.trip_id = None;
            state.route = RouteView {
                loading: true,
                ..RouteView::default()
            };
            state.trip = TripView::default();
            state.live = LiveView::default();
        });
        info!(route_id, generation = route_token.value(), "Route selected");

        let (geometry, trips) = tokio::join!(
            self.cache.route_geometry(route_id),
            self.cache.trips_by_route(route_id)
        );
        let (geometry, trips) = match (geometry, trips) {
            (Ok(geometry), Ok(trips)) => (geometry, trips),
            (Err(e), _) | (_, Err(e)) => {
                let message = format!("Failed to load route {}: {}", route_id, e);
                let applied = self.store.apply_if_current(&[route_token], |state| {
                    state.selection.trip_id = None;
                    state.route = RouteView {
                        error: Some(message.clone()),
                        ..RouteView::default()
                    };
                    state.trip = TripView::default();
                });
                return match applied {
                    Some(()) => {
                        warn!(route_id, "{}", message);
                        ActionOutcome::Failed(message)
                    }
                    None => ActionOutcome::Superseded,
                };
            }
        };

        let fit = self.director.fit_route(geometry.points());
        let applied = self.store.apply_if_current(&[route_token], |state| {
            state.route.geometry = Some(Arc::clone(&geometry));
            state.route.trips = Arc::clone(&trips);
            state.route.loading = false;
            state.route.vehicles_loading = !trips.is_empty();
        });
        if applied.is_none() {
            return ActionOutcome::Superseded;
        }
        self.director.emit(fit);
        debug!(route_id, trips = trips.len(), "Route geometry and trips applied");

        let join = FanoutJoin::run(
            self.cache.vehicle_position_lookups(&trips, self.route_freshness_secs),
            self.fanout_concurrency,
        )
        .await;
        self.metrics.fanout_completed(join.len(), join.failures());
        let failures = join.failures();
        let vehicles: Vec<VehiclePosition> =
            join.into_values().filter(VehiclePosition::is_usable).collect();
        let shown = vehicles.len();

        let follow = self.store.apply_if_current(&[route_token], |state| {
            state.route.vehicles = vehicles;
            state.route.vehicles_loading = false;
            self.director.follow_vehicle(state)
        });
        let Some(follow) = follow else {
            return ActionOutcome::Superseded;
        };
        self.director.emit(follow);
        debug!(route_id, shown, failures, "Route vehicles applied");

        if self.live_polling && !trips.is_empty() {
            self.start_poller(route_token);
        }
        ActionOutcome::Applied
    }

    /// Select a trip of the selected route.
    ///
    /// Fails and changes nothing with [`EngineError::NoRouteSelected`] when
    /// no route is selected, or [`EngineError::RouteNotLoaded`] while the
    /// route is loading or failed to load.
    pub async fn select_trip(&self, trip_id: &str) -> EngineResult<ActionOutcome> {
        let tokens = self.store.try_transition(&[Scope::Trip], |state| {
            let Some(route_id) = &state.selection.route_id else {
                return Err(EngineError::NoRouteSelected {
                    trip_id: trip_id.to_string(),
                });
            };
            if state.route.loading || state.route.error.is_some() {
                return Err(EngineError::RouteNotLoaded {
                    route_id: route_id.clone(),
                    trip_id: trip_id.to_string(),
                });
            }
            state.selection.trip_id = Some(trip_id.to_string());
            state.trip = TripView {
                loading: true,
                ..TripView::default()
            };
            Ok(())
        })?;
        let trip_token = tokens[0];
        info!(trip_id, generation = trip_token.value(), "Trip selected");

        let (shape, stops) = tokio::join!(
            self.cache.trip_shape(trip_id),
            self.cache.trip_stops(trip_id)
        );

        let outcome = match (shape, stops) {
            (Ok(shape), Ok(stops)) => {
                let shape = Arc::new(shape.sorted());
                let stops = Arc::new(stops.sorted());
                let fit = self.director.fit_trip(
                    shape
                        .points
                        .iter()
                        .map(|p| LatLon { lat: p.lat, lon: p.lon }),
                );

                let follow = self.store.apply_if_current(&[trip_token], |state| {
                    state.trip = TripView {
                        shape: Some(shape),
                        stops: Some(stops),
                        loading: false,
                        error: None,
                    };
                    self.director.follow_vehicle(state)
                });
                match follow {
                    Some(follow) => {
                        self.director.emit(fit.into_iter().chain(follow));
                        ActionOutcome::Applied
                    }
                    None => ActionOutcome::Superseded,
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                let message = format!("Failed to load trip {}: {}", trip_id, e);
                let applied = self.store.apply_if_current(&[trip_token], |state| {
                    state.trip = TripView {
                        error: Some(message.clone()),
                        ..TripView::default()
                    };
                });
                match applied {
                    Some(()) => {
                        warn!(trip_id, "{}", message);
                        ActionOutcome::Failed(message)
                    }
                    None => ActionOutcome::Superseded,
                }
            }
        };
        Ok(outcome)
    }

    /// Deselect the trip and return to the route view.
    pub fn clear_trip(&self) {
        let tokens = self.store.transition(&[Scope::Trip], |state| {
            state.selection.trip_id = None;
            state.trip = TripView::default();
        });
        debug!(generation = tokens[0].value(), "Trip cleared");
    }

    /// Deselect the route and its trip. Valid from every state.
    ///
    /// The open stop, if any, stays selected.
    pub fn clear_route(&self) {
        let route_token = self.route_transition(|state| {
            state.selection.route_id = None;
            state.selection.trip_id = None;
            state.route = RouteView::default();
            state.trip = TripView::default();
            state.live = LiveView::default();
        });
        info!(generation = route_token.value(), "Route cleared");
    }

    /// Run one live refresh for the selected route.
    ///
    /// Returns [`ActionOutcome::Superseded`] when no route with trips is
    /// selected.
    pub async fn poll_tick(&self) -> ActionOutcome {
        let (route_token, pollable) = self.store.read(|state| {
            (
                self.store.fence().current(Scope::Route),
                state.selection.route_id.is_some() && !state.route.trips.is_empty(),
            )
        });
        if !pollable {
            debug!("Poll tick ignored: no route with trips selected");
            return ActionOutcome::Superseded;
        }
        self.poller.refresh_once(route_token).await
    }

    /// Whether a live poller task is running.
    pub fn is_polling(&self) -> bool {
        self.active_poller
            .lock()
            .as_ref()
            .is_some_and(PollerHandle::is_running)
    }

    /// Stop the live poller, if any.
    pub fn stop_poller(&self) {
        if let Some(handle) = self.active_poller.lock().take() {
            handle.stop();
            debug!(generation = handle.route_token().value(), "Live poller stop requested");
        }
    }

    /// Bump the route and trip scopes and stop the running poller while
    /// holding the poller slot, so no poller for the old route can be
    /// installed in between.
    fn route_transition(&self, f: impl FnOnce(&mut MapSnapshot)) -> Generation {
        let mut slot = self.active_poller.lock();
        let tokens = self.store.transition(&[Scope::Route, Scope::Trip], f);
        if let Some(handle) = slot.take() {
            handle.stop();
            debug!(generation = handle.route_token().value(), "Live poller stop requested");
        }
        tokens[0]
    }

    fn start_poller(&self, route_token: Generation) {
        let mut slot = self.active_poller.lock();
        if !self.store.fence().is_current(route_token) {
            return;
        }
        if let Some(previous) = slot.replace(self.poller.start(route_token)) {
            previous.stop();
        }
    }
}
