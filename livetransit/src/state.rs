//! Displayable map state and its single owner.
//!
//! [`StateStore`] holds the mutable [`MapSnapshot`] behind a mutex together
//! with the [`Fence`]. Every component mutates state only through it:
//!
//! - [`StateStore::transition`] bumps one or more scopes and mutates state in
//!   the same critical section, so no stale result can slip in between.
//! - [`StateStore::apply_if_current`] checks the captured generations and
//!   applies a result only if all of them are still current.
//!
//! Each mutation publishes a new immutable snapshot on a `watch` channel.
//! The mutex is never held across an `.await`.

use std::convert::Infallible;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::fence::{Fence, Generation, Scope};
use crate::model::{
    Route, RouteGeometry, Selection, Stop, Trip, TripShape, TripStops, VehiclePosition,
};
use crate::telemetry::EngineMetrics;

/// Result of an engine action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The result was applied to the map state.
    Applied,
    /// The action failed; the scope's error banner holds `message`.
    Failed(String),
    /// A newer action invalidated this one; nothing was applied.
    Superseded,
}

impl ActionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ActionOutcome::Applied)
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, ActionOutcome::Superseded)
    }
}

/// Coarse selection phase, derived from [`Selection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    RouteSelected,
    TripSelected,
}

/// Stops in the current viewport.
#[derive(Debug, Clone, Default)]
pub struct StopsView {
    pub stops: Arc<Vec<Stop>>,
    /// The viewport is below the minimum stop zoom.
    pub zoom_in_hint: bool,
    pub loading: bool,
    pub error: Option<String>,
}

/// The stop panel opened by clicking a stop marker.
#[derive(Debug, Clone, Default)]
pub struct StopPanelView {
    pub stop_id: Option<String>,
    pub routes: Arc<Vec<Route>>,
    /// Result of the last active-route probe, in candidate order.
    pub active_route_ids: Option<Vec<String>>,
    pub loading: bool,
    pub probing: bool,
    pub error: Option<String>,
}

impl StopPanelView {
    /// Candidate routes that had a live vehicle at the last probe.
    pub fn active_routes(&self) -> Vec<&Route> {
        match &self.active_route_ids {
            Some(ids) => self
                .routes
                .iter()
                .filter(|r| ids.contains(&r.route_id))
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Route-level content.
#[derive(Debug, Clone, Default)]
pub struct RouteView {
    pub geometry: Option<Arc<RouteGeometry>>,
    pub trips: Arc<Vec<Trip>>,
    /// Usable positions of the route's vehicles, replaced as a whole.
    pub vehicles: Vec<VehiclePosition>,
    pub loading: bool,
    pub vehicles_loading: bool,
    pub error: Option<String>,
}

/// Trip-level content.
#[derive(Debug, Clone, Default)]
pub struct TripView {
    /// Points sorted by sequence.
    pub shape: Option<Arc<TripShape>>,
    /// Stops sorted by sequence.
    pub stops: Option<Arc<TripStops>>,
    pub loading: bool,
    pub error: Option<String>,
}

/// State of live position polling.
#[derive(Debug, Clone, Default)]
pub struct LiveView {
    pub polling: bool,
    pub error: Option<String>,
}

/// Immutable view of everything displayable.
#[derive(Debug, Clone, Default)]
pub struct MapSnapshot {
    pub selection: Selection,
    /// Zoom of the last reported viewport.
    pub viewport_zoom: Option<u8>,
    pub stops: StopsView,
    pub stop_panel: StopPanelView,
    pub route: RouteView,
    pub trip: TripView,
    pub live: LiveView,
}

impl MapSnapshot {
    pub fn phase(&self) -> Phase {
        if self.selection.trip_id.is_some() {
            Phase::TripSelected
        } else if self.selection.route_id.is_some() {
            Phase::RouteSelected
        } else {
            Phase::Idle
        }
    }

    /// Vehicles to draw: the whole route, or only the selected trip's.
    pub fn displayed_vehicles(&self) -> Vec<&VehiclePosition> {
        match &self.selection.trip_id {
            Some(trip_id) => self
                .route
                .vehicles
                .iter()
                .filter(|v| &v.trip_id == trip_id)
                .collect(),
            None => self.route.vehicles.iter().collect(),
        }
    }

    /// The selected trip's vehicle, if it has a usable position.
    pub fn selected_vehicle(&self) -> Option<&VehiclePosition> {
        let trip_id = self.selection.trip_id.as_ref()?;
        self.route
            .vehicles
            .iter()
            .find(|v| &v.trip_id == trip_id && v.is_usable())
    }
}

/// Single owner of [`MapSnapshot`] and the [`Fence`].
pub struct StateStore {
    state: Mutex<MapSnapshot>,
    fence: Fence,
    snapshots: watch::Sender<Arc<MapSnapshot>>,
    metrics: Arc<EngineMetrics>,
}

impl StateStore {
    pub fn new(metrics: Arc<EngineMetrics>) -> Self {
        let (snapshots, _) = watch::channel(Arc::new(MapSnapshot::default()));
        Self {
            state: Mutex::new(MapSnapshot::default()),
            fence: Fence::new(),
            snapshots,
            metrics,
        }
    }

    pub fn fence(&self) -> &Fence {
        &self.fence
    }

    /// Receiver of published snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Arc<MapSnapshot>> {
        self.snapshots.subscribe()
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<MapSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Read the current state without publishing.
    pub fn read<R>(&self, f: impl FnOnce(&MapSnapshot) -> R) -> R {
        f(&self.state.lock())
    }

    /// Mutate state without touching the fence.
    pub fn update<R>(&self, f: impl FnOnce(&mut MapSnapshot) -> R) -> R {
        let mut state = self.state.lock();
        let result = f(&mut state);
        self.publish(&state);
        result
    }

    /// Bump `scopes` and mutate state in one critical section.
    ///
    /// Returns the new generations in the order of `scopes`.
    pub fn transition(
        &self,
        scopes: &[Scope],
        f: impl FnOnce(&mut MapSnapshot),
    ) -> Vec<Generation> {
        match self.try_transition(scopes, |state| {
            f(state);
            Ok::<_, Infallible>(())
        }) {
            Ok(tokens) => tokens,
            Err(never) => match never {},
        }
    }

    /// Like [`transition`](Self::transition), but `f` may reject the
    /// transition. On rejection nothing is bumped or published; `f` must not
    /// have mutated state.
    pub fn try_transition<E>(
        &self,
        scopes: &[Scope],
        f: impl FnOnce(&mut MapSnapshot) -> Result<(), E>,
    ) -> Result<Vec<Generation>, E> {
        let mut state = self.state.lock();
        f(&mut state)?;
        let tokens = scopes.iter().map(|s| self.fence.bump(*s)).collect();
        self.publish(&state);
        Ok(tokens)
    }

    /// Apply `f` only if every token is still current.
    ///
    /// A stale result is dropped without side effects, counted, and logged
    /// at `debug`. Returns `None` when dropped.
    pub fn apply_if_current<R>(
        &self,
        tokens: &[Generation],
        f: impl FnOnce(&mut MapSnapshot) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock();
        if let Some(stale) = tokens.iter().find(|t| !self.fence.is_current(**t)) {
            debug!(
                token = %stale,
                current = self.fence.current(stale.scope()).value(),
                "Discarding stale result"
            );
            self.metrics.stale_discarded();
            return None;
        }
        let result = f(&mut state);
        self.publish(&state);
        Some(result)
    }

    fn publish(&self, state: &MapSnapshot) {
        self.snapshots.send_replace(Arc::new(state.clone()));
    }
}
