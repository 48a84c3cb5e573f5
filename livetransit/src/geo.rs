//! Bounds arithmetic and camera intents.
//!
//! The engine never moves the camera itself. It publishes [`CameraIntent`]s
//! on a broadcast channel and the rendering surface decides whether to
//! follow them.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::model::LatLon;
use crate::state::MapSnapshot;

/// Capacity of the camera intent channel. Slow receivers lose the oldest
/// intents.
pub const CAMERA_CHANNEL_CAPACITY: usize = 16;

/// An axis-aligned lat/lon rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLonBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl LatLonBounds {
    /// Smallest rectangle containing every point, or `None` for no points.
    pub fn from_points(points: impl IntoIterator<Item = LatLon>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bounds = Self {
            south: first.lat,
            west: first.lon,
            north: first.lat,
            east: first.lon,
        };
        for p in points {
            bounds.south = bounds.south.min(p.lat);
            bounds.north = bounds.north.max(p.lat);
            bounds.west = bounds.west.min(p.lon);
            bounds.east = bounds.east.max(p.lon);
        }
        Some(bounds)
    }

    /// Grow each side by `ratio` of the rectangle's extent.
    pub fn pad(&self, ratio: f64) -> Self {
        let lat = (self.north - self.south) * ratio;
        let lon = (self.east - self.west) * ratio;
        Self {
            south: self.south - lat,
            west: self.west - lon,
            north: self.north + lat,
            east: self.east + lon,
        }
    }

    pub fn center(&self) -> LatLon {
        LatLon {
            lat: (self.south + self.north) / 2.0,
            lon: (self.west + self.east) / 2.0,
        }
    }
}

/// A camera movement the engine suggests to the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraIntent {
    FitBounds(LatLonBounds),
    FlyTo { lat: f64, lon: f64, zoom: u8 },
}

/// Derives camera intents from applied results and publishes them.
pub struct CameraDirector {
    intents: broadcast::Sender<CameraIntent>,
    focus_zoom: u8,
    fit_padding: f64,
}

impl CameraDirector {
    /// # Arguments
    ///
    /// * `focus_zoom` - Minimum zoom when flying to a vehicle
    /// * `fit_padding` - Padding ratio applied to fitted bounds
    pub fn new(focus_zoom: u8, fit_padding: f64) -> Arc<Self> {
        let (intents, _) = broadcast::channel(CAMERA_CHANNEL_CAPACITY);
        Arc::new(Self {
            intents,
            focus_zoom,
            fit_padding,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CameraIntent> {
        self.intents.subscribe()
    }

    /// Fit intent for a route polyline. Needs more than one point.
    pub fn fit_route(&self, points: impl IntoIterator<Item = LatLon>) -> Option<CameraIntent> {
        let points: Vec<LatLon> = points.into_iter().collect();
        if points.len() < 2 {
            return None;
        }
        LatLonBounds::from_points(points).map(|b| CameraIntent::FitBounds(b.pad(self.fit_padding)))
    }

    /// Fit intent for a trip polyline. Needs at least one point.
    pub fn fit_trip(&self, points: impl IntoIterator<Item = LatLon>) -> Option<CameraIntent> {
        LatLonBounds::from_points(points).map(|b| CameraIntent::FitBounds(b.pad(self.fit_padding)))
    }

    /// Fly-to intent for the selected trip's vehicle, at
    /// `max(viewport zoom, focus zoom)`.
    pub fn follow_vehicle(&self, state: &MapSnapshot) -> Option<CameraIntent> {
        let vehicle = state.selected_vehicle()?;
        let point = vehicle.point()?;
        let zoom = state
            .viewport_zoom
            .map_or(self.focus_zoom, |z| z.max(self.focus_zoom));
        Some(CameraIntent::FlyTo {
            lat: point.lat,
            lon: point.lon,
            zoom,
        })
    }

    /// Publish intents. Having no receiver is not an error.
    pub fn emit(&self, intents: impl IntoIterator<Item = CameraIntent>) {
        for intent in intents {
            debug!(?intent, "Camera intent");
            let _ = self.intents.send(intent);
        }
    }
}
