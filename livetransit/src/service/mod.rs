//! Transit data service abstraction.
//!
//! The engine never talks HTTP directly. Everything it needs from the
//! backend goes through the [`TransitService`] trait, so the engine can be
//! driven by [`HttpTransitService`] in production and by scripted services
//! in tests.
//!
//! # Example
//!
//! ```ignore
//! use livetransit::service::{HttpTransitService, TransitService};
//!
//! let service = HttpTransitService::new("http://localhost:8080/api")?;
//! let routes = service.routes_through_stop("9021001001001000").await?;
//! ```

mod http;

#[cfg(test)]
pub(crate) mod scripted;

pub use http::{HttpTransitService, DEFAULT_TIMEOUT_SECS};

use std::future::Future;
use std::pin::Pin;

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{
    BoundingBox, Route, RouteGeometry, RouteSchedule, Stop, Trip, TripShape, TripStops,
    VehiclePosition,
};

/// Result type for service calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors returned by a transit data service.
///
/// `Clone` so that one failed request can be handed to every caller that
/// was coalesced onto it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The request could not be sent or the connection failed.
    #[error("Request failed: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout.
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// The backend answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The response body could not be decoded.
    #[error("Invalid response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// The request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Read-only interface to the transit backend.
///
/// All methods are async and dyn-compatible (`Arc<dyn TransitService>`).
/// `vehicle_position` reports an unknown position with null coordinates,
/// but a transport failure is still an `Err`.
pub trait TransitService: Send + Sync {
    /// Stops inside a rectangle.
    fn stops_in_rect(&self, bbox: BoundingBox) -> BoxFuture<'_, ServiceResult<Vec<Stop>>>;

    /// Routes serving a stop.
    fn routes_through_stop<'a>(&'a self, stop_id: &'a str)
        -> BoxFuture<'a, ServiceResult<Vec<Route>>>;

    /// Timetable of a route at a stop on a service date.
    fn route_schedule_at_stop<'a>(
        &'a self,
        stop_id: &'a str,
        route_id: &'a str,
        date: NaiveDate,
    ) -> BoxFuture<'a, ServiceResult<RouteSchedule>>;

    /// Stops and polylines of a route.
    fn route_geometry<'a>(&'a self, route_id: &'a str)
        -> BoxFuture<'a, ServiceResult<RouteGeometry>>;

    /// Trips scheduled on a route.
    fn trips_by_route<'a>(&'a self, route_id: &'a str) -> BoxFuture<'a, ServiceResult<Vec<Trip>>>;

    /// Latest position of the vehicle serving a trip, no older than
    /// `freshness_secs`.
    fn vehicle_position<'a>(
        &'a self,
        trip_id: &'a str,
        freshness_secs: u64,
    ) -> BoxFuture<'a, ServiceResult<VehiclePosition>>;

    /// Polyline of a single trip.
    fn trip_shape<'a>(&'a self, trip_id: &'a str) -> BoxFuture<'a, ServiceResult<TripShape>>;

    /// Ordered stops of a single trip.
    fn trip_stops<'a>(&'a self, trip_id: &'a str) -> BoxFuture<'a, ServiceResult<TripStops>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_display() {
        let err = ServiceError::Status {
            status: 503,
            url: "http://backend/routes/1A/trips".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 503 from http://backend/routes/1A/trips"
        );

        let err = ServiceError::Timeout {
            url: "http://backend/stops/in-rect".to_string(),
        };
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_service_error_is_cloneable_for_coalesced_waiters() {
        let err = ServiceError::Transport("connection reset".to_string());
        let shared = err.clone();
        assert_eq!(err, shared);
    }
}
