//! LiveTransit - selection and live-data orchestration for transit maps
//!
//! This library turns map interactions (viewport changes, route and trip
//! selection, stop clicks) into fenced asynchronous fetches against a
//! transit backend, and publishes a race-free snapshot of what should be
//! displayed.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use livetransit::{EngineConfig, HttpTransitService, MapEngine};
//!
//! let service = Arc::new(HttpTransitService::new("http://localhost:8080/api")?);
//! let engine = MapEngine::new(service, EngineConfig::default());
//!
//! engine.select_route("1A").await;
//! for vehicle in engine.snapshot().displayed_vehicles() {
//!     println!("{} at {:?}", vehicle.trip_id, vehicle.point());
//! }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod fence;
pub mod geo;
pub mod logging;
pub mod model;
pub mod poller;
pub mod probe;
pub mod selection;
pub mod service;
pub mod state;
pub mod stop_panel;
pub mod telemetry;
pub mod viewport;

pub use config::{ConfigFile, EngineConfig, LoggingConfig};
pub use engine::{Action, MapEngine};
pub use error::{EngineError, EngineResult};
pub use geo::CameraIntent;
pub use service::{HttpTransitService, ServiceError, TransitService};
pub use state::{ActionOutcome, MapSnapshot, Phase};
pub use viewport::StopsUpdate;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
