//! Normalized cache keys.

use std::fmt;

use chrono::NaiveDate;

use crate::model::BoundingBox;

/// Default number of decimals kept in a [`BboxKey`] (about 1 m).
pub const DEFAULT_BBOX_PRECISION: u32 = 5;

const MAX_BBOX_PRECISION: u32 = 9;

/// A bounding box rounded to a fixed number of decimals.
///
/// Viewports that differ by less than the rounding step share a key, and the
/// rounded rectangle is what gets requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BboxKey {
    top_left_lat: i64,
    top_left_lon: i64,
    bottom_right_lat: i64,
    bottom_right_lon: i64,
    precision: u32,
}

impl BboxKey {
    /// Round `bbox` to `precision` decimals (capped at 9).
    pub fn new(bbox: &BoundingBox, precision: u32) -> Self {
        let precision = precision.min(MAX_BBOX_PRECISION);
        let scale = Self::scale(precision);
        let round = |v: f64| (v * scale).round() as i64;
        Self {
            top_left_lat: round(bbox.top_left_lat),
            top_left_lon: round(bbox.top_left_lon),
            bottom_right_lat: round(bbox.bottom_right_lat),
            bottom_right_lon: round(bbox.bottom_right_lon),
            precision,
        }
    }

    /// Number of decimals kept.
    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// The rounded rectangle.
    pub fn to_bbox(&self) -> BoundingBox {
        let scale = Self::scale(self.precision);
        BoundingBox {
            top_left_lat: self.top_left_lat as f64 / scale,
            top_left_lon: self.top_left_lon as f64 / scale,
            bottom_right_lat: self.bottom_right_lat as f64 / scale,
            bottom_right_lon: self.bottom_right_lon as f64 / scale,
        }
    }

    fn scale(precision: u32) -> f64 {
        10f64.powi(precision as i32)
    }
}

impl fmt::Display for BboxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.to_bbox();
        let p = self.precision as usize;
        write!(
            f,
            "bbox:{:.p$},{:.p$}:{:.p$},{:.p$}",
            b.top_left_lat,
            b.top_left_lon,
            b.bottom_right_lat,
            b.bottom_right_lon,
            p = p
        )
    }
}

/// Key of a timetable lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScheduleKey {
    pub stop_id: String,
    pub route_id: String,
    pub date: NaiveDate,
}

impl ScheduleKey {
    pub fn new(stop_id: impl Into<String>, route_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            stop_id: stop_id.into(),
            route_id: route_id.into(),
            date,
        }
    }
}

impl fmt::Display for ScheduleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "schedule:{}:{}:{}",
            self.stop_id,
            self.route_id,
            self.date.format("%Y-%m-%d")
        )
    }
}
