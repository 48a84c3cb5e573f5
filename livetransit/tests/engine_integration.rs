//! Integration tests for the map engine.
//!
//! These drive [`MapEngine`] through its public API against an in-memory
//! backend and cover:
//! - viewport gating and stop queries
//! - route and trip selection, including partial and total failures
//! - fencing of late results under rapid re-selection and clearing
//! - live polling lifecycle with paused time
//! - active-route probing and its per-stop reuse
//!
//! Run with: `cargo test --test engine_integration`

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tokio::sync::Notify;

use livetransit::cache::{CachePolicy, DataCache};
use livetransit::fanout::FanoutJoin;
use livetransit::model::{
    BoundingBox, LatLon, Route, RouteGeometry, RouteSchedule, Shape, ShapePoint, Stop, Trip,
    TripShape, TripStop, TripStops, VehiclePosition, Viewport,
};
use livetransit::service::{BoxFuture, ServiceError, ServiceResult, TransitService};
use livetransit::{
    ActionOutcome, CameraIntent, EngineConfig, EngineError, MapEngine, Phase, StopsUpdate,
};

// ============================================================================
// In-memory backend
// ============================================================================

/// Backend whose responses are set per call key (`"trips:1A"`,
/// `"position:T1"`, ...). Gated keys are held in flight until released.
#[derive(Default)]
struct FakeBackend {
    stops: Mutex<Vec<Stop>>,
    routes: Mutex<HashMap<String, Vec<Route>>>,
    geometry: Mutex<HashMap<String, RouteGeometry>>,
    trips: Mutex<HashMap<String, Vec<Trip>>>,
    positions: Mutex<HashMap<String, VehiclePosition>>,
    shapes: Mutex<HashMap<String, TripShape>>,
    trip_stops: Mutex<HashMap<String, TripStops>>,
    failing: Mutex<Vec<String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn route(&self, route_id: &str, trip_ids: &[&str]) {
        self.geometry.lock().insert(
            route_id.to_string(),
            RouteGeometry {
                route_id: route_id.to_string(),
                stops: vec![],
                shapes: vec![Shape {
                    shape_id: format!("shape-{}", route_id),
                    points: vec![
                        LatLon { lat: 59.30, lon: 18.00 },
                        LatLon { lat: 59.36, lon: 18.10 },
                    ],
                }],
            },
        );
        self.trips.lock().insert(
            route_id.to_string(),
            trip_ids.iter().map(|id| trip(id)).collect(),
        );
    }

    fn position(&self, trip_id: &str, lat: f64, lon: f64) {
        self.failing.lock().retain(|k| k != &format!("position:{}", trip_id));
        self.positions
            .lock()
            .insert(trip_id.to_string(), VehiclePosition::at(trip_id, lat, lon));
    }

    fn no_position(&self, trip_id: &str) {
        self.failing.lock().retain(|k| k != &format!("position:{}", trip_id));
        self.positions.lock().remove(trip_id);
    }

    fn fail(&self, call_key: &str) {
        self.failing.lock().push(call_key.to_string());
    }

    fn gate(&self, call_key: &str) {
        self.gates
            .lock()
            .insert(call_key.to_string(), Arc::new(Notify::new()));
    }

    fn release(&self, call_key: &str) {
        if let Some(gate) = self.gates.lock().get(call_key) {
            gate.notify_one();
        }
    }

    fn calls(&self, call_key: &str) -> usize {
        self.calls.lock().get(call_key).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    async fn enter(&self, call_key: &str) -> ServiceResult<()> {
        *self.calls.lock().entry(call_key.to_string()).or_insert(0) += 1;
        let gate = self.gates.lock().get(call_key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failing.lock().iter().any(|k| k == call_key) {
            return Err(ServiceError::Status {
                status: 503,
                url: call_key.to_string(),
            });
        }
        Ok(())
    }
}

fn missing(call_key: &str) -> ServiceError {
    ServiceError::Status {
        status: 404,
        url: call_key.to_string(),
    }
}

impl TransitService for FakeBackend {
    fn stops_in_rect(&self, _bbox: BoundingBox) -> BoxFuture<'_, ServiceResult<Vec<Stop>>> {
        Box::pin(async move {
            self.enter("stops").await?;
            Ok(self.stops.lock().clone())
        })
    }

    fn routes_through_stop<'a>(
        &'a self,
        stop_id: &'a str,
    ) -> BoxFuture<'a, ServiceResult<Vec<Route>>> {
        Box::pin(async move {
            let key = format!("routes:{}", stop_id);
            self.enter(&key).await?;
            self.routes.lock().get(stop_id).cloned().ok_or_else(|| missing(&key))
        })
    }

    fn route_schedule_at_stop<'a>(
        &'a self,
        stop_id: &'a str,
        route_id: &'a str,
        date: NaiveDate,
    ) -> BoxFuture<'a, ServiceResult<RouteSchedule>> {
        Box::pin(async move {
            self.enter(&format!("schedule:{}:{}", stop_id, route_id)).await?;
            Ok(RouteSchedule {
                stop_id: stop_id.to_string(),
                route_id: route_id.to_string(),
                date: date.format("%Y-%m-%d").to_string(),
                short_name: route_id.to_string(),
                long_name: None,
                route_type: 3,
                times: vec!["07:45:00".to_string(), "08:05:00".to_string()],
            })
        })
    }

    fn route_geometry<'a>(
        &'a self,
        route_id: &'a str,
    ) -> BoxFuture<'a, ServiceResult<RouteGeometry>> {
        Box::pin(async move {
            let key = format!("geometry:{}", route_id);
            self.enter(&key).await?;
            self.geometry.lock().get(route_id).cloned().ok_or_else(|| missing(&key))
        })
    }

    fn trips_by_route<'a>(&'a self, route_id: &'a str) -> BoxFuture<'a, ServiceResult<Vec<Trip>>> {
        Box::pin(async move {
            let key = format!("trips:{}", route_id);
            self.enter(&key).await?;
            self.trips.lock().get(route_id).cloned().ok_or_else(|| missing(&key))
        })
    }

    fn vehicle_position<'a>(
        &'a self,
        trip_id: &'a str,
        _freshness_secs: u64,
    ) -> BoxFuture<'a, ServiceResult<VehiclePosition>> {
        Box::pin(async move {
            self.enter(&format!("position:{}", trip_id)).await?;
            Ok(self
                .positions
                .lock()
                .get(trip_id)
                .cloned()
                .unwrap_or_else(|| VehiclePosition::unknown(trip_id)))
        })
    }

    fn trip_shape<'a>(&'a self, trip_id: &'a str) -> BoxFuture<'a, ServiceResult<TripShape>> {
        Box::pin(async move {
            let key = format!("shape:{}", trip_id);
            self.enter(&key).await?;
            self.shapes.lock().get(trip_id).cloned().ok_or_else(|| missing(&key))
        })
    }

    fn trip_stops<'a>(&'a self, trip_id: &'a str) -> BoxFuture<'a, ServiceResult<TripStops>> {
        Box::pin(async move {
            let key = format!("trip_stops:{}", trip_id);
            self.enter(&key).await?;
            self.trip_stops.lock().get(trip_id).cloned().ok_or_else(|| missing(&key))
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn trip(id: &str) -> Trip {
    Trip {
        trip_id: id.to_string(),
        service_id: "weekday".to_string(),
        headsign: Some("Centrum".to_string()),
        direction_id: 0,
        shape_id: format!("shape-{}", id),
        short_name: None,
        block_id: None,
    }
}

fn route(id: &str) -> Route {
    Route {
        route_id: id.to_string(),
        short_name: id.to_string(),
        long_name: None,
        route_type: 3,
    }
}

fn stop(id: &str, lat: f64, lon: f64) -> Stop {
    Stop {
        id: id.to_string(),
        name: format!("Stop {}", id),
        lat,
        lon,
    }
}

fn trip_detail(backend: &FakeBackend, trip_id: &str, sequences: &[i64]) {
    backend.shapes.lock().insert(
        trip_id.to_string(),
        TripShape {
            trip_id: trip_id.to_string(),
            route_id: "1A".to_string(),
            shape_id: format!("shape-{}", trip_id),
            points: sequences
                .iter()
                .map(|&sequence| ShapePoint {
                    lat: 59.3 + sequence as f64 * 0.001,
                    lon: 18.0,
                    sequence,
                })
                .collect(),
        },
    );
    backend.trip_stops.lock().insert(
        trip_id.to_string(),
        TripStops {
            trip_id: trip_id.to_string(),
            route_id: "1A".to_string(),
            stops: sequences
                .iter()
                .map(|&sequence| TripStop {
                    stop_id: format!("S{}", sequence),
                    stop_name: format!("Stop {}", sequence),
                    lat: 59.3,
                    lon: 18.0,
                    sequence,
                    arrival_time: "08:00:00".to_string(),
                    departure_time: "08:00:30".to_string(),
                })
                .collect(),
        },
    );
}

/// Engine without the background poller; ticks are driven explicitly.
fn engine(backend: &Arc<FakeBackend>) -> MapEngine {
    MapEngine::new(
        backend.clone(),
        EngineConfig::default().with_live_polling(false),
    )
}

fn viewport(zoom: u8) -> Viewport {
    Viewport::around(LatLon { lat: 59.33, lon: 18.06 }, 0.004, zoom)
}

fn shown_trips(engine: &MapEngine) -> Vec<String> {
    let snapshot = engine.snapshot();
    let mut trips: Vec<String> = snapshot
        .displayed_vehicles()
        .iter()
        .map(|v| v.trip_id.clone())
        .collect();
    trips.sort();
    trips
}

// ============================================================================
// Viewport
// ============================================================================

#[tokio::test]
async fn test_low_zoom_always_yields_zoom_hint() {
    let backend = FakeBackend::new();
    *backend.stops.lock() = vec![stop("S1", 59.33, 18.06), stop("S2", 59.331, 18.061)];
    let engine = engine(&backend);

    assert!(matches!(engine.viewport_changed(viewport(16)).await, StopsUpdate::Stops(s) if s.len() == 2));

    for zoom in [0, 8, 12, 15] {
        assert_eq!(engine.viewport_changed(viewport(zoom)).await, StopsUpdate::ZoomIn);
        let snapshot = engine.snapshot();
        assert!(snapshot.stops.stops.is_empty());
        assert!(snapshot.stops.zoom_in_hint);
    }
    assert_eq!(backend.calls("stops"), 1);
}

#[tokio::test]
async fn test_stop_query_failure_is_banner_only() {
    let backend = FakeBackend::new();
    backend.route("1A", &["T1"]);
    backend.fail("stops");
    let engine = engine(&backend);
    engine.select_route("1A").await;

    assert!(matches!(engine.viewport_changed(viewport(17)).await, StopsUpdate::Failed(_)));
    let snapshot = engine.snapshot();
    assert!(snapshot.stops.error.is_some());
    assert_eq!(snapshot.selection.route_id.as_deref(), Some("1A"));
    assert_eq!(snapshot.phase(), Phase::RouteSelected);
}

// ============================================================================
// Route selection
// ============================================================================

#[tokio::test]
async fn test_route_vehicles_are_usable_positions_only() {
    let backend = FakeBackend::new();
    backend.route("1A", &["T1", "T2"]);
    backend.position("T1", 59.3, 18.0);
    backend.fail("position:T2");
    let engine = engine(&backend);

    assert_eq!(engine.select_route("1A").await, ActionOutcome::Applied);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.route.vehicles.len(), 1);
    let vehicle = &snapshot.route.vehicles[0];
    assert_eq!(vehicle.trip_id, "T1");
    assert_eq!(vehicle.lat, Some(59.3));
    assert_eq!(vehicle.lon, Some(18.0));
}

#[tokio::test]
async fn test_unknown_positions_are_absent_not_null() {
    let backend = FakeBackend::new();
    backend.route("1A", &["T1", "T2", "T3"]);
    backend.position("T2", 59.31, 18.02);
    let engine = engine(&backend);

    engine.select_route("1A").await;
    assert_eq!(shown_trips(&engine), vec!["T2"]);
    assert!(engine.snapshot().route.vehicles.iter().all(|v| v.is_usable()));
}

#[tokio::test]
async fn test_route_selection_emits_fit_bounds() {
    let backend = FakeBackend::new();
    backend.route("1A", &["T1"]);
    let engine = engine(&backend);
    let mut intents = engine.camera_intents();

    engine.select_route("1A").await;
    match intents.try_recv() {
        Ok(CameraIntent::FitBounds(bounds)) => {
            assert!(bounds.south < 59.30 && bounds.north > 59.36);
            assert!(bounds.west < 18.00 && bounds.east > 18.10);
        }
        other => panic!("expected fit bounds, got {:?}", other),
    }
}

#[tokio::test]
async fn test_late_route_result_never_shown() {
    let backend = FakeBackend::new();
    backend.route("A", &["TA"]);
    backend.route("B", &["TB"]);
    backend.position("TA", 1.0, 1.0);
    backend.position("TB", 2.0, 2.0);
    backend.gate("trips:A");
    let engine = engine(&backend);

    let (a, b) = tokio::join!(engine.select_route("A"), async {
        tokio::task::yield_now().await;
        let outcome = engine.select_route("B").await;
        backend.release("trips:A");
        outcome
    });

    assert_eq!(a, ActionOutcome::Superseded);
    assert_eq!(b, ActionOutcome::Applied);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.route.geometry.as_ref().map(|g| g.route_id.as_str()), Some("B"));
    assert!(snapshot.route.trips.iter().all(|t| t.trip_id == "TB"));
    assert_eq!(shown_trips(&engine), vec!["TB"]);
    assert!(engine.metrics().stale_discards >= 1);
}

#[tokio::test]
async fn test_route_failure_resets_route_content() {
    let backend = FakeBackend::new();
    backend.route("1A", &["T1"]);
    backend.route("2B", &["T2"]);
    backend.position("T1", 59.3, 18.0);
    backend.fail("geometry:2B");
    let engine = engine(&backend);

    engine.select_route("1A").await;
    let outcome = engine.select_route("2B").await;
    assert!(matches!(outcome, ActionOutcome::Failed(_)));

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.selection.route_id.as_deref(), Some("2B"));
    assert!(snapshot.route.geometry.is_none());
    assert!(snapshot.route.trips.is_empty());
    assert!(snapshot.route.vehicles.is_empty());
    assert!(snapshot.route.error.is_some());

    // The banner clears on the next successful selection.
    engine.select_route("1A").await;
    assert!(engine.snapshot().route.error.is_none());
}

// ============================================================================
// Trip selection
// ============================================================================

#[tokio::test]
async fn test_trip_failure_keeps_route_state() {
    let backend = FakeBackend::new();
    backend.route("1A", &["T1", "T9"]);
    backend.position("T1", 59.3, 18.0);
    let engine = engine(&backend);
    engine.select_route("1A").await;
    let before = engine.snapshot();

    let outcome = engine.select_trip("T9").await.unwrap();
    assert!(matches!(outcome, ActionOutcome::Failed(_)));

    let after = engine.snapshot();
    assert_eq!(after.selection.trip_id.as_deref(), Some("T9"));
    assert_eq!(after.phase(), Phase::TripSelected);
    assert!(after.trip.shape.is_none());
    assert!(after.trip.stops.is_none());
    assert!(after.trip.error.is_some());
    assert_eq!(after.route.geometry, before.route.geometry);
    assert_eq!(after.route.trips, before.route.trips);
    assert_eq!(after.route.vehicles, before.route.vehicles);
    assert!(after.route.error.is_none());
}

#[tokio::test]
async fn test_trip_detail_sorted_and_vehicles_restricted() {
    let backend = FakeBackend::new();
    backend.route("1A", &["T1", "T2"]);
    backend.position("T1", 59.3, 18.0);
    backend.position("T2", 59.4, 18.1);
    trip_detail(&backend, "T2", &[40, 5, 17, 9]);
    let engine = engine(&backend);

    engine.select_route("1A").await;
    assert_eq!(shown_trips(&engine), vec!["T1", "T2"]);

    let mut intents = engine.camera_intents();
    assert_eq!(engine.select_trip("T2").await.unwrap(), ActionOutcome::Applied);

    let snapshot = engine.snapshot();
    let shape: Vec<i64> = snapshot.trip.shape.as_ref().unwrap().points.iter().map(|p| p.sequence).collect();
    assert_eq!(shape, vec![5, 9, 17, 40]);
    let stops: Vec<i64> = snapshot.trip.stops.as_ref().unwrap().stops.iter().map(|s| s.sequence).collect();
    assert_eq!(stops, vec![5, 9, 17, 40]);
    assert_eq!(shown_trips(&engine), vec!["T2"]);

    assert!(matches!(intents.try_recv(), Ok(CameraIntent::FitBounds(_))));
    assert_eq!(
        intents.try_recv().ok(),
        Some(CameraIntent::FlyTo {
            lat: 59.4,
            lon: 18.1,
            zoom: 16
        })
    );

    engine.clear_trip();
    assert_eq!(engine.snapshot().phase(), Phase::RouteSelected);
    assert_eq!(shown_trips(&engine), vec!["T1", "T2"]);
}

#[tokio::test]
async fn test_select_trip_without_route_is_rejected() {
    let backend = FakeBackend::new();
    let engine = engine(&backend);

    let err = engine.select_trip("T1").await.unwrap_err();
    assert!(matches!(err, EngineError::NoRouteSelected { .. }));
    assert_eq!(engine.snapshot().phase(), Phase::Idle);
    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test]
async fn test_clear_route_while_trip_pending() {
    let backend = FakeBackend::new();
    backend.route("1A", &["T1"]);
    backend.position("T1", 59.3, 18.0);
    trip_detail(&backend, "T1", &[1, 2, 3]);
    backend.gate("trip_stops:T1");
    let engine = engine(&backend);
    engine.select_route("1A").await;

    let (outcome, ()) = tokio::join!(engine.select_trip("T1"), async {
        tokio::task::yield_now().await;
        engine.clear_route();
        backend.release("trip_stops:T1");
    });

    assert_eq!(outcome.unwrap(), ActionOutcome::Superseded);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.phase(), Phase::Idle);
    assert!(snapshot.selection.route_id.is_none());
    assert!(snapshot.selection.trip_id.is_none());
    assert!(snapshot.trip.shape.is_none());
    assert!(snapshot.route.vehicles.is_empty());
}

// ============================================================================
// Live polling
// ============================================================================

#[tokio::test]
async fn test_poll_tick_replaces_whole_list() {
    let backend = FakeBackend::new();
    backend.route("1A", &["T1"]);
    let engine = engine(&backend);
    engine.select_route("1A").await;

    backend.position("T1", 59.3, 18.0);
    assert_eq!(engine.poll_tick().await, ActionOutcome::Applied);
    assert_eq!(shown_trips(&engine), vec!["T1"]);

    backend.no_position("T1");
    assert_eq!(engine.poll_tick().await, ActionOutcome::Applied);
    assert!(shown_trips(&engine).is_empty());
}

#[tokio::test]
async fn test_failed_tick_keeps_vehicles_and_raises_banner() {
    let backend = FakeBackend::new();
    backend.route("1A", &["T1", "T2"]);
    backend.position("T1", 59.3, 18.0);
    let engine = engine(&backend);
    engine.select_route("1A").await;

    backend.fail("position:T1");
    backend.fail("position:T2");
    assert!(matches!(engine.poll_tick().await, ActionOutcome::Failed(_)));
    assert_eq!(shown_trips(&engine), vec!["T1"]);
    assert!(engine.snapshot().live.error.is_some());

    backend.position("T1", 59.31, 18.01);
    assert_eq!(engine.poll_tick().await, ActionOutcome::Applied);
    assert!(engine.snapshot().live.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_poller_stops_on_route_change_and_clear() {
    let backend = FakeBackend::new();
    backend.route("1A", &["T1"]);
    backend.route("2B", &["T2"]);
    let engine = MapEngine::new(
        backend.clone(),
        EngineConfig::default().with_poll_interval(Duration::from_secs(5)),
    );

    engine.select_route("1A").await;
    tokio::time::sleep(Duration::from_secs(12)).await;
    assert!(engine.is_polling());
    let t1_calls = backend.calls("position:T1");
    assert!(t1_calls >= 3);

    engine.select_route("2B").await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.calls("position:T1"), t1_calls);
    assert!(backend.calls("position:T2") >= 6);

    engine.clear_route();
    assert!(!engine.is_polling());
    let t2_calls = backend.calls("position:T2");
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(backend.calls("position:T2"), t2_calls);
    assert!(!engine.snapshot().live.polling);
}

#[tokio::test(start_paused = true)]
async fn test_poller_follows_selected_vehicle() {
    let backend = FakeBackend::new();
    backend.route("1A", &["T1"]);
    backend.position("T1", 59.3, 18.0);
    trip_detail(&backend, "T1", &[1, 2]);
    let engine = MapEngine::new(
        backend.clone(),
        EngineConfig::default().with_poll_interval(Duration::from_secs(5)),
    );

    engine.select_route("1A").await;
    engine.select_trip("T1").await.unwrap();
    engine.viewport_changed(viewport(18)).await;
    let mut intents = engine.camera_intents();

    backend.position("T1", 59.35, 18.05);
    tokio::time::sleep(Duration::from_secs(6)).await;

    let mut flights = Vec::new();
    while let Ok(intent) = intents.try_recv() {
        if let CameraIntent::FlyTo { lat, zoom, .. } = intent {
            flights.push((lat, zoom));
        }
    }
    assert_eq!(flights.last(), Some(&(59.35, 18)));
    engine.shutdown();
}

// ============================================================================
// Stop panel and active routes
// ============================================================================

#[tokio::test]
async fn test_active_route_probe_scenario() {
    let backend = FakeBackend::new();
    backend
        .routes
        .lock()
        .insert("S1".to_string(), vec![route("R1"), route("R2")]);
    backend.route("R1", &[]);
    backend.route("R2", &["T7"]);
    backend.position("T7", 59.3, 18.0);
    let engine = engine(&backend);

    assert_eq!(engine.open_stop("S1").await, ActionOutcome::Applied);
    assert_eq!(
        engine.probe_active_routes("S1", false).await.unwrap(),
        ActionOutcome::Applied
    );

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.stop_panel.active_route_ids, Some(vec!["R2".to_string()]));

    let calls = backend.total_calls();
    engine.probe_active_routes("S1", false).await.unwrap();
    assert_eq!(backend.total_calls(), calls);

    engine.probe_active_routes("S1", true).await.unwrap();
    assert_eq!(backend.calls("position:T7"), 2);
}

#[tokio::test]
async fn test_probe_before_routes_loaded_is_rejected() {
    let backend = FakeBackend::new();
    let engine = engine(&backend);
    let err = engine.probe_active_routes("S1", false).await.unwrap_err();
    assert!(matches!(err, EngineError::StopRoutesNotLoaded { .. }));
}

#[tokio::test]
async fn test_clear_route_keeps_open_stop() {
    let backend = FakeBackend::new();
    backend.routes.lock().insert("S1".to_string(), vec![route("1A")]);
    backend.route("1A", &["T1"]);
    let engine = engine(&backend);

    engine.open_stop("S1").await;
    engine.select_route("1A").await;
    engine.clear_route();

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.phase(), Phase::Idle);
    assert_eq!(snapshot.selection.stop_id.as_deref(), Some("S1"));
    assert_eq!(snapshot.stop_panel.routes.len(), 1);

    engine.close_stop();
    assert!(engine.snapshot().selection.is_empty());
}

#[tokio::test]
async fn test_schedule_lookup() {
    let backend = FakeBackend::new();
    let engine = engine(&backend);
    let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

    let schedule = engine.schedule_at_stop("S1", "1A", date).await.unwrap();
    assert_eq!(schedule.date, "2025-03-14");
    assert_eq!(schedule.times.len(), 2);
}

// ============================================================================
// Building blocks
// ============================================================================

#[tokio::test]
async fn test_fanout_keeps_every_success() {
    for (n, k) in [(1usize, 0usize), (5, 2), (8, 8), (12, 1)] {
        let ops = (0..n).map(|i| async move {
            if i < k {
                Err(format!("lookup {} failed", i))
            } else {
                Ok(i)
            }
        });
        let join = FanoutJoin::run(ops, 3).await;
        assert_eq!(join.failures(), k);
        assert_eq!(join.into_values().count(), n - k);
    }
}

#[tokio::test]
async fn test_data_cache_coalesces_concurrent_fetches() {
    let cache: DataCache<String, u32> = DataCache::new("test", CachePolicy::default());
    let produced = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());

    let fetch = |value: u32| {
        let produced = Arc::clone(&produced);
        let gate = Arc::clone(&gate);
        cache.fetch("key".to_string(), move || async move {
            produced.fetch_add(1, Ordering::SeqCst);
            gate.notified().await;
            Ok::<_, ServiceError>(value)
        })
    };

    let (a, b, c, ()) = tokio::join!(fetch(1), fetch(2), fetch(3), async {
        tokio::task::yield_now().await;
        gate.notify_one();
    });

    assert_eq!(produced.load(Ordering::SeqCst), 1);
    assert_eq!(*a.unwrap(), 1);
    assert_eq!(*b.unwrap(), 1);
    assert_eq!(*c.unwrap(), 1);
}
