//! Transit service client with per-request-kind memoization.
//!
//! Wraps an `Arc<dyn TransitService>` with:
//! - Key translation: request parameters → normalized cache keys
//! - One [`DataCache`] per request kind
//! - Metrics injection: hit/miss/coalesced reporting
//!
//! Vehicle positions are live data and pass straight through.

use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::{BoxFuture, FutureExt};

use super::{BboxKey, CachePolicy, DataCache, ScheduleKey};
use crate::model::{
    BoundingBox, Route, RouteGeometry, RouteSchedule, Stop, Trip, TripShape, TripStops,
    VehiclePosition,
};
use crate::service::{ServiceResult, TransitService};
use crate::telemetry::EngineMetrics;

/// Memoizing front of the transit data service.
pub struct TransitCacheClient {
    service: Arc<dyn TransitService>,
    bbox_precision: u32,
    stops: DataCache<BboxKey, Vec<Stop>>,
    stop_routes: DataCache<String, Vec<Route>>,
    schedules: DataCache<ScheduleKey, RouteSchedule>,
    geometry: DataCache<String, RouteGeometry>,
    trips: DataCache<String, Vec<Trip>>,
    trip_shapes: DataCache<String, TripShape>,
    trip_stops: DataCache<String, TripStops>,
}

impl TransitCacheClient {
    /// Create a client.
    ///
    /// # Arguments
    ///
    /// * `service` - The underlying transit data service
    /// * `policy` - Eviction policy applied to every request kind
    /// * `bbox_precision` - Decimals kept in rectangle query keys
    /// * `metrics` - Metrics for cache reporting
    pub fn new(
        service: Arc<dyn TransitService>,
        policy: CachePolicy,
        bbox_precision: u32,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            service,
            bbox_precision,
            stops: DataCache::with_metrics("stops", policy, Arc::clone(&metrics)),
            stop_routes: DataCache::with_metrics("stop_routes", policy, Arc::clone(&metrics)),
            schedules: DataCache::with_metrics("schedules", policy, Arc::clone(&metrics)),
            geometry: DataCache::with_metrics("geometry", policy, Arc::clone(&metrics)),
            trips: DataCache::with_metrics("trips", policy, Arc::clone(&metrics)),
            trip_shapes: DataCache::with_metrics("trip_shapes", policy, Arc::clone(&metrics)),
            trip_stops: DataCache::with_metrics("trip_stops", policy, Arc::clone(&metrics)),
        }
    }

    /// The key a rectangle query is memoized under.
    pub fn bbox_key(&self, bbox: &BoundingBox) -> BboxKey {
        BboxKey::new(bbox, self.bbox_precision)
    }

    /// Stops inside the rounded rectangle.
    pub async fn stops_in_rect(&self, bbox: &BoundingBox) -> ServiceResult<Arc<Vec<Stop>>> {
        let key = self.bbox_key(bbox);
        let service = Arc::clone(&self.service);
        self.stops
            .fetch(key, move || async move {
                service.stops_in_rect(key.to_bbox()).await
            })
            .await
    }

    /// Routes serving a stop.
    pub async fn routes_through_stop(&self, stop_id: &str) -> ServiceResult<Arc<Vec<Route>>> {
        let service = Arc::clone(&self.service);
        let id = stop_id.to_string();
        self.stop_routes
            .fetch(stop_id.to_string(), move || async move {
                service.routes_through_stop(&id).await
            })
            .await
    }

    /// Timetable of a route at a stop on a service date.
    pub async fn route_schedule_at_stop(
        &self,
        stop_id: &str,
        route_id: &str,
        date: NaiveDate,
    ) -> ServiceResult<Arc<RouteSchedule>> {
        let key = ScheduleKey::new(stop_id, route_id, date);
        let service = Arc::clone(&self.service);
        let request = key.clone();
        self.schedules
            .fetch(key, move || async move {
                service
                    .route_schedule_at_stop(&request.stop_id, &request.route_id, request.date)
                    .await
            })
            .await
    }

    /// Stops and polylines of a route.
    pub async fn route_geometry(&self, route_id: &str) -> ServiceResult<Arc<RouteGeometry>> {
        let service = Arc::clone(&self.service);
        let id = route_id.to_string();
        self.geometry
            .fetch(route_id.to_string(), move || async move {
                service.route_geometry(&id).await
            })
            .await
    }

    /// Trips scheduled on a route.
    pub async fn trips_by_route(&self, route_id: &str) -> ServiceResult<Arc<Vec<Trip>>> {
        let service = Arc::clone(&self.service);
        let id = route_id.to_string();
        self.trips
            .fetch(route_id.to_string(), move || async move {
                service.trips_by_route(&id).await
            })
            .await
    }

    /// Polyline of a trip.
    pub async fn trip_shape(&self, trip_id: &str) -> ServiceResult<Arc<TripShape>> {
        let service = Arc::clone(&self.service);
        let id = trip_id.to_string();
        self.trip_shapes
            .fetch(trip_id.to_string(), move || async move {
                service.trip_shape(&id).await
            })
            .await
    }

    /// Ordered stops of a trip.
    pub async fn trip_stops(&self, trip_id: &str) -> ServiceResult<Arc<TripStops>> {
        let service = Arc::clone(&self.service);
        let id = trip_id.to_string();
        self.trip_stops
            .fetch(trip_id.to_string(), move || async move {
                service.trip_stops(&id).await
            })
            .await
    }

    /// Live vehicle position. Never memoized.
    pub async fn vehicle_position(
        &self,
        trip_id: &str,
        freshness_secs: u64,
    ) -> ServiceResult<VehiclePosition> {
        self.service.vehicle_position(trip_id, freshness_secs).await
    }

    /// One owned position lookup per trip, ready for [`crate::fanout::FanoutJoin`].
    ///
    /// The lookups borrow nothing, so a fan-out over them can run inside a
    /// spawned task.
    pub fn vehicle_position_lookups(
        &self,
        trips: &[Trip],
        freshness_secs: u64,
    ) -> Vec<BoxFuture<'static, ServiceResult<VehiclePosition>>> {
        trips
            .iter()
            .map(|trip| {
                let service = Arc::clone(&self.service);
                let trip_id = trip.trip_id.clone();
                async move { service.vehicle_position(&trip_id, freshness_secs).await }.boxed()
            })
            .collect()
    }

    /// Drop every memoized response.
    pub fn clear(&self) {
        self.stops.clear();
        self.stop_routes.clear();
        self.schedules.clear();
        self.geometry.clear();
        self.trips.clear();
        self.trip_shapes.clear();
        self.trip_stops.clear();
    }

    /// Total number of memoized entries across request kinds.
    pub fn entry_count(&self) -> usize {
        self.stops.len()
            + self.stop_routes.len()
            + self.schedules.len()
            + self.geometry.len()
            + self.trips.len()
            + self.trip_shapes.len()
            + self.trip_stops.len()
    }
}
