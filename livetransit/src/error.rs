//! Engine error types.

use thiserror::Error;

use crate::config::ConfigError;
use crate::service::ServiceError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors returned by engine actions.
///
/// Fetch failures inside an action are normally reported through the
/// scope's error banner in the snapshot rather than as an `Err`; this type
/// covers invalid transitions and construction problems.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A trip was selected while no route is selected.
    #[error("Cannot select trip {trip_id}: no route is selected")]
    NoRouteSelected { trip_id: String },

    /// A trip was selected while its route is loading or failed to load.
    #[error("Cannot select trip {trip_id}: route {route_id} is not loaded")]
    RouteNotLoaded { route_id: String, trip_id: String },

    /// Active routes were probed for a stop whose routes are not loaded.
    #[error("Routes for stop {stop_id} are not loaded")]
    StopRoutesNotLoaded { stop_id: String },

    /// Transit data service error.
    #[error("Transit service error: {0}")]
    Service(#[from] ServiceError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
