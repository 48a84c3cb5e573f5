//! Transit data model.
//!
//! These types mirror the JSON documents returned by the transit data
//! service. Field names are camelCase on the wire.
//!
//! Only [`VehiclePosition`] carries optional coordinates: the service reports
//! "no known position" as null `lat`/`lon` rather than failing the lookup,
//! so callers filter with [`VehiclePosition::is_usable`].

use serde::{Deserialize, Serialize};

/// A stop as returned by a rectangle query or embedded in route geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// A route passing through a stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub route_id: String,
    pub short_name: String,
    pub long_name: Option<String>,
    pub route_type: i32,
}

impl Route {
    /// Label used in listings: the short name, or the route id when empty.
    pub fn label(&self) -> &str {
        if self.short_name.is_empty() {
            &self.route_id
        } else {
            &self.short_name
        }
    }
}

/// Summary of a scheduled trip on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub trip_id: String,
    pub service_id: String,
    pub headsign: Option<String>,
    pub direction_id: i32,
    pub shape_id: String,
    pub short_name: Option<String>,
    pub block_id: Option<String>,
}

/// A single lat/lon vertex of a route polyline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// One polyline of a route's geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    pub shape_id: String,
    pub points: Vec<LatLon>,
}

/// Stops and polylines of a route. Cached for the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteGeometry {
    pub route_id: String,
    pub stops: Vec<Stop>,
    pub shapes: Vec<Shape>,
}

impl RouteGeometry {
    /// Iterate over every vertex of every shape.
    pub fn points(&self) -> impl Iterator<Item = LatLon> + '_ {
        self.shapes.iter().flat_map(|s| s.points.iter().copied())
    }
}

/// A vertex of a trip shape with its ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapePoint {
    pub lat: f64,
    pub lon: f64,
    pub sequence: i64,
}

/// The polyline a single trip follows.
///
/// Sequence values are not contiguous and the service does not guarantee
/// order; call [`TripShape::sorted`] before drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripShape {
    pub trip_id: String,
    pub route_id: String,
    pub shape_id: String,
    pub points: Vec<ShapePoint>,
}

impl TripShape {
    /// Returns a copy with points ordered by `sequence` (stable).
    pub fn sorted(&self) -> Self {
        let mut shape = self.clone();
        shape.points.sort_by_key(|p| p.sequence);
        shape
    }
}

/// A stop visited by a trip, with its scheduled times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripStop {
    pub stop_id: String,
    pub stop_name: String,
    pub lat: f64,
    pub lon: f64,
    pub sequence: i64,
    pub arrival_time: String,
    pub departure_time: String,
}

impl TripStop {
    /// Whether the vehicle departs at the same time it arrives.
    pub fn is_timepoint(&self) -> bool {
        self.arrival_time == self.departure_time
    }
}

/// The ordered stops of a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripStops {
    pub trip_id: String,
    pub route_id: String,
    pub stops: Vec<TripStop>,
}

impl TripStops {
    /// Returns a copy with stops ordered by `sequence` (stable).
    pub fn sorted(&self) -> Self {
        let mut stops = self.clone();
        stops.stops.sort_by_key(|s| s.sequence);
        stops
    }
}

/// Latest known position of the vehicle serving a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePosition {
    pub trip_id: String,
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub bearing: Option<f64>,
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub in_transit: Option<bool>,
}

impl VehiclePosition {
    /// A position with no known coordinates.
    pub fn unknown(trip_id: impl Into<String>) -> Self {
        Self {
            trip_id: trip_id.into(),
            vehicle_id: None,
            lat: None,
            lon: None,
            speed: None,
            bearing: None,
            route_id: None,
            status: None,
            last_updated: None,
            in_transit: None,
        }
    }

    /// A position at the given coordinates with every other field unknown.
    pub fn at(trip_id: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            lat: Some(lat),
            lon: Some(lon),
            ..Self::unknown(trip_id)
        }
    }

    /// Both latitude and longitude are known.
    pub fn is_usable(&self) -> bool {
        self.lat.is_some() && self.lon.is_some()
    }

    /// The coordinates, if usable.
    pub fn point(&self) -> Option<LatLon> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(LatLon { lat, lon }),
            _ => None,
        }
    }
}

/// Timetable of a route at a stop on a given service date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSchedule {
    pub stop_id: String,
    pub route_id: String,
    /// Service date, `YYYY-MM-DD`.
    pub date: String,
    pub short_name: String,
    pub long_name: Option<String>,
    pub route_type: i32,
    pub times: Vec<String>,
}

/// Query rectangle for [`crate::service::TransitService::stops_in_rect`].
///
/// "Top left" is the north-west corner, "bottom right" the south-east one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub top_left_lat: f64,
    pub top_left_lon: f64,
    pub bottom_right_lat: f64,
    pub bottom_right_lon: f64,
}

/// The visible map area reported by the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub top_left_lat: f64,
    pub top_left_lon: f64,
    pub bottom_right_lat: f64,
    pub bottom_right_lon: f64,
    pub zoom: u8,
}

impl Viewport {
    /// Build a viewport from its north-west and south-east corners.
    pub fn new(north_west: LatLon, south_east: LatLon, zoom: u8) -> Self {
        Self {
            top_left_lat: north_west.lat,
            top_left_lon: north_west.lon,
            bottom_right_lat: south_east.lat,
            bottom_right_lon: south_east.lon,
            zoom,
        }
    }

    /// Build a viewport centered on a point, spanning `half_span` degrees in
    /// each direction.
    pub fn around(center: LatLon, half_span: f64, zoom: u8) -> Self {
        Self {
            top_left_lat: center.lat + half_span,
            top_left_lon: center.lon - half_span,
            bottom_right_lat: center.lat - half_span,
            bottom_right_lon: center.lon + half_span,
            zoom,
        }
    }

    /// The query rectangle for this viewport.
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox {
            top_left_lat: self.top_left_lat,
            top_left_lon: self.top_left_lon,
            bottom_right_lat: self.bottom_right_lat,
            bottom_right_lon: self.bottom_right_lon,
        }
    }
}

/// What the user has selected, from coarse to fine.
///
/// `trip_id` is only ever set together with `route_id`; the state machine
/// enforces this.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub stop_id: Option<String>,
    pub route_id: Option<String>,
    pub trip_id: Option<String>,
}

impl Selection {
    /// Nothing selected.
    pub fn is_empty(&self) -> bool {
        self.stop_id.is_none() && self.route_id.is_none() && self.trip_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_position_usable_requires_both_coordinates() {
        assert!(VehiclePosition::at("T1", 59.3, 18.0).is_usable());

        let mut lat_only = VehiclePosition::unknown("T1");
        lat_only.lat = Some(59.3);
        assert!(!lat_only.is_usable());

        let mut lon_only = VehiclePosition::unknown("T1");
        lon_only.lon = Some(18.0);
        assert!(!lon_only.is_usable());

        assert!(!VehiclePosition::unknown("T1").is_usable());
    }

    #[test]
    fn test_vehicle_position_decodes_nulls() {
        let json = r#"{
            "tripId": "T1",
            "vehicleId": null,
            "lat": null,
            "lon": null,
            "speed": null,
            "bearing": null,
            "routeId": null,
            "status": null,
            "lastUpdated": null,
            "inTransit": null
        }"#;
        let position: VehiclePosition = serde_json::from_str(json).unwrap();
        assert_eq!(position, VehiclePosition::unknown("T1"));
    }

    #[test]
    fn test_vehicle_position_decodes_missing_optionals() {
        let json = r#"{"tripId": "T2", "lat": 59.33, "lon": 18.06, "inTransit": true}"#;
        let position: VehiclePosition = serde_json::from_str(json).unwrap();
        assert!(position.is_usable());
        assert_eq!(position.in_transit, Some(true));
        assert_eq!(position.vehicle_id, None);
    }

    #[test]
    fn test_trip_shape_sorted_by_sparse_sequence() {
        let shape = TripShape {
            trip_id: "T1".into(),
            route_id: "R1".into(),
            shape_id: "S1".into(),
            points: vec![
                ShapePoint { lat: 3.0, lon: 3.0, sequence: 40 },
                ShapePoint { lat: 1.0, lon: 1.0, sequence: 2 },
                ShapePoint { lat: 2.0, lon: 2.0, sequence: 17 },
            ],
        };

        let sorted = shape.sorted();
        let sequences: Vec<i64> = sorted.points.iter().map(|p| p.sequence).collect();
        assert_eq!(sequences, vec![2, 17, 40]);
        // Original is untouched
        assert_eq!(shape.points[0].sequence, 40);
    }

    #[test]
    fn test_trip_stops_decode_and_sort() {
        let json = r#"{
            "tripId": "T1",
            "routeId": "R1",
            "stops": [
                {"stopId": "B", "stopName": "Second", "lat": 1.0, "lon": 1.0,
                 "sequence": 5, "arrivalTime": "08:05:00", "departureTime": "08:06:00"},
                {"stopId": "A", "stopName": "First", "lat": 0.0, "lon": 0.0,
                 "sequence": 1, "arrivalTime": "08:00:00", "departureTime": "08:00:00"}
            ]
        }"#;
        let stops: TripStops = serde_json::from_str(json).unwrap();
        let sorted = stops.sorted();
        assert_eq!(sorted.stops[0].stop_id, "A");
        assert!(sorted.stops[0].is_timepoint());
        assert!(!sorted.stops[1].is_timepoint());
    }

    #[test]
    fn test_route_label_falls_back_to_id() {
        let mut route = Route {
            route_id: "9011001000100000".into(),
            short_name: "1A".into(),
            long_name: None,
            route_type: 3,
        };
        assert_eq!(route.label(), "1A");
        route.short_name.clear();
        assert_eq!(route.label(), "9011001000100000");
    }

    #[test]
    fn test_viewport_bbox_corners() {
        let viewport = Viewport::around(LatLon { lat: 59.0, lon: 18.0 }, 0.5, 16);
        let bbox = viewport.bbox();
        assert_eq!(bbox.top_left_lat, 59.5);
        assert_eq!(bbox.top_left_lon, 17.5);
        assert_eq!(bbox.bottom_right_lat, 58.5);
        assert_eq!(bbox.bottom_right_lon, 18.5);
    }

    #[test]
    fn test_selection_empty() {
        assert!(Selection::default().is_empty());
        let selection = Selection {
            route_id: Some("R1".into()),
            ..Default::default()
        };
        assert!(!selection.is_empty());
    }
}
