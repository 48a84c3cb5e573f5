//! Scripted in-memory transit service for unit tests.
//!
//! Responses are registered per call key (`"trips:R1"`, `"position:T1"`,
//! ...). A call can be held in flight with a gate until the test releases
//! it, and every call is counted.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{BoxFuture, ServiceError, ServiceResult, TransitService};
use crate::model::{
    BoundingBox, LatLon, Route, RouteGeometry, RouteSchedule, Shape, ShapePoint, Stop, Trip,
    TripShape, TripStop, TripStops, VehiclePosition,
};

#[derive(Default)]
pub(crate) struct ScriptedService {
    stops: Mutex<HashMap<String, ServiceResult<Vec<Stop>>>>,
    routes: Mutex<HashMap<String, ServiceResult<Vec<Route>>>>,
    schedules: Mutex<HashMap<String, ServiceResult<RouteSchedule>>>,
    geometry: Mutex<HashMap<String, ServiceResult<RouteGeometry>>>,
    trips: Mutex<HashMap<String, ServiceResult<Vec<Trip>>>>,
    positions: Mutex<HashMap<String, ServiceResult<VehiclePosition>>>,
    shapes: Mutex<HashMap<String, ServiceResult<TripShape>>>,
    trip_stops: Mutex<HashMap<String, ServiceResult<TripStops>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<HashMap<String, usize>>,
    freshness: Mutex<Vec<u64>>,
}

/// Error used for scripted failures.
pub(crate) fn unavailable() -> ServiceError {
    ServiceError::Status {
        status: 503,
        url: "scripted".to_string(),
    }
}

fn not_found(key: &str) -> ServiceError {
    ServiceError::Status {
        status: 404,
        url: key.to_string(),
    }
}

impl ScriptedService {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// Responds to every rectangle query with `result`.
    pub(crate) fn set_stops(&self, result: ServiceResult<Vec<Stop>>) {
        self.stops.lock().insert(String::new(), result);
    }

    pub(crate) fn set_routes(&self, stop_id: &str, result: ServiceResult<Vec<Route>>) {
        self.routes.lock().insert(stop_id.to_string(), result);
    }

    pub(crate) fn set_schedule(
        &self,
        stop_id: &str,
        route_id: &str,
        result: ServiceResult<RouteSchedule>,
    ) {
        self.schedules
            .lock()
            .insert(format!("{}:{}", stop_id, route_id), result);
    }

    pub(crate) fn set_geometry(&self, route_id: &str, result: ServiceResult<RouteGeometry>) {
        self.geometry.lock().insert(route_id.to_string(), result);
    }

    pub(crate) fn set_trips(&self, route_id: &str, result: ServiceResult<Vec<Trip>>) {
        self.trips.lock().insert(route_id.to_string(), result);
    }

    /// Trip ids without a scripted position resolve to an unknown position.
    pub(crate) fn set_position(&self, trip_id: &str, result: ServiceResult<VehiclePosition>) {
        self.positions.lock().insert(trip_id.to_string(), result);
    }

    pub(crate) fn set_trip_shape(&self, trip_id: &str, result: ServiceResult<TripShape>) {
        self.shapes.lock().insert(trip_id.to_string(), result);
    }

    pub(crate) fn set_trip_stops(&self, trip_id: &str, result: ServiceResult<TripStops>) {
        self.trip_stops.lock().insert(trip_id.to_string(), result);
    }

    /// Scripts a route with a two-point geometry and the given trips.
    pub(crate) fn script_route(&self, route_id: &str, trip_ids: &[&str]) {
        self.set_geometry(route_id, Ok(geometry(route_id)));
        self.set_trips(
            route_id,
            Ok(trip_ids.iter().map(|id| trip(id)).collect()),
        );
    }

    /// Holds calls with this key in flight until [`release`](Self::release).
    pub(crate) fn gate(&self, call_key: &str) {
        self.gates
            .lock()
            .insert(call_key.to_string(), Arc::new(Notify::new()));
    }

    /// Lets one gated call with this key complete.
    pub(crate) fn release(&self, call_key: &str) {
        if let Some(gate) = self.gates.lock().get(call_key) {
            gate.notify_one();
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub(crate) fn calls(&self, call_key: &str) -> usize {
        self.calls.lock().get(call_key).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Freshness values passed to `vehicle_position`, in call order.
    pub(crate) fn freshness_log(&self) -> Vec<u64> {
        self.freshness.lock().clone()
    }

    async fn enter(&self, call_key: String) {
        *self.calls.lock().entry(call_key.clone()).or_insert(0) += 1;
        let gate = self.gates.lock().get(&call_key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

fn lookup<T: Clone>(
    map: &Mutex<HashMap<String, ServiceResult<T>>>,
    key: &str,
    call_key: &str,
) -> ServiceResult<T> {
    map.lock()
        .get(key)
        .cloned()
        .unwrap_or_else(|| Err(not_found(call_key)))
}

impl TransitService for ScriptedService {
    fn stops_in_rect(&self, _bbox: BoundingBox) -> BoxFuture<'_, ServiceResult<Vec<Stop>>> {
        Box::pin(async move {
            self.enter("stops".to_string()).await;
            self.stops
                .lock()
                .get("")
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
        })
    }

    fn routes_through_stop<'a>(
        &'a self,
        stop_id: &'a str,
    ) -> BoxFuture<'a, ServiceResult<Vec<Route>>> {
        Box::pin(async move {
            let call_key = format!("routes:{}", stop_id);
            self.enter(call_key.clone()).await;
            lookup(&self.routes, stop_id, &call_key)
        })
    }

    fn route_schedule_at_stop<'a>(
        &'a self,
        stop_id: &'a str,
        route_id: &'a str,
        _date: NaiveDate,
    ) -> BoxFuture<'a, ServiceResult<RouteSchedule>> {
        Box::pin(async move {
            let key = format!("{}:{}", stop_id, route_id);
            let call_key = format!("schedule:{}", key);
            self.enter(call_key.clone()).await;
            lookup(&self.schedules, &key, &call_key)
        })
    }

    fn route_geometry<'a>(
        &'a self,
        route_id: &'a str,
    ) -> BoxFuture<'a, ServiceResult<RouteGeometry>> {
        Box::pin(async move {
            let call_key = format!("geometry:{}", route_id);
            self.enter(call_key.clone()).await;
            lookup(&self.geometry, route_id, &call_key)
        })
    }

    fn trips_by_route<'a>(&'a self, route_id: &'a str) -> BoxFuture<'a, ServiceResult<Vec<Trip>>> {
        Box::pin(async move {
            let call_key = format!("trips:{}", route_id);
            self.enter(call_key.clone()).await;
            lookup(&self.trips, route_id, &call_key)
        })
    }

    fn vehicle_position<'a>(
        &'a self,
        trip_id: &'a str,
        freshness_secs: u64,
    ) -> BoxFuture<'a, ServiceResult<VehiclePosition>> {
        Box::pin(async move {
            self.freshness.lock().push(freshness_secs);
            self.enter(format!("position:{}", trip_id)).await;
            self.positions
                .lock()
                .get(trip_id)
                .cloned()
                .unwrap_or_else(|| Ok(VehiclePosition::unknown(trip_id)))
        })
    }

    fn trip_shape<'a>(&'a self, trip_id: &'a str) -> BoxFuture<'a, ServiceResult<TripShape>> {
        Box::pin(async move {
            let call_key = format!("shape:{}", trip_id);
            self.enter(call_key.clone()).await;
            lookup(&self.shapes, trip_id, &call_key)
        })
    }

    fn trip_stops<'a>(&'a self, trip_id: &'a str) -> BoxFuture<'a, ServiceResult<TripStops>> {
        Box::pin(async move {
            let call_key = format!("trip_stops:{}", trip_id);
            self.enter(call_key.clone()).await;
            lookup(&self.trip_stops, trip_id, &call_key)
        })
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub(crate) fn stop(id: &str) -> Stop {
    Stop {
        id: id.to_string(),
        name: format!("Stop {}", id),
        lat: 59.3,
        lon: 18.0,
    }
}

pub(crate) fn route(id: &str) -> Route {
    Route {
        route_id: id.to_string(),
        short_name: id.to_string(),
        long_name: None,
        route_type: 3,
    }
}

pub(crate) fn trip(id: &str) -> Trip {
    Trip {
        trip_id: id.to_string(),
        service_id: "weekday".to_string(),
        headsign: None,
        direction_id: 0,
        shape_id: format!("shape-{}", id),
        short_name: None,
        block_id: None,
    }
}

pub(crate) fn geometry(route_id: &str) -> RouteGeometry {
    RouteGeometry {
        route_id: route_id.to_string(),
        stops: vec![stop("S1")],
        shapes: vec![Shape {
            shape_id: format!("shape-{}", route_id),
            points: vec![
                LatLon { lat: 59.30, lon: 18.00 },
                LatLon { lat: 59.40, lon: 18.20 },
            ],
        }],
    }
}

pub(crate) fn trip_shape(trip_id: &str, sequences: &[i64]) -> TripShape {
    TripShape {
        trip_id: trip_id.to_string(),
        route_id: "R1".to_string(),
        shape_id: format!("shape-{}", trip_id),
        points: sequences
            .iter()
            .map(|&sequence| ShapePoint {
                lat: 59.0 + sequence as f64 / 1000.0,
                lon: 18.0 + sequence as f64 / 1000.0,
                sequence,
            })
            .collect(),
    }
}

pub(crate) fn trip_stops(trip_id: &str, sequences: &[i64]) -> TripStops {
    TripStops {
        trip_id: trip_id.to_string(),
        route_id: "R1".to_string(),
        stops: sequences
            .iter()
            .map(|&sequence| TripStop {
                stop_id: format!("S{}", sequence),
                stop_name: format!("Stop {}", sequence),
                lat: 59.0,
                lon: 18.0,
                sequence,
                arrival_time: "08:00:00".to_string(),
                departure_time: "08:00:00".to_string(),
            })
            .collect(),
    }
}
