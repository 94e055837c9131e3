use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::SafewalkError;

/// Mean Earth radius in meters, shared with the routing providers we consume.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A WGS84 coordinate. Immutable value type; `new` is the only validated
/// constructor and is the input gate for everything downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self, SafewalkError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(SafewalkError::InvalidInput(format!(
                "latitude {lat} outside [-90, 90]"
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(SafewalkError::InvalidInput(format!(
                "longitude {lon} outside [-180, 180]"
            )));
        }
        Ok(Self { lat, lon })
    }

    /// Midpoint approximation for short walking segments.
    pub fn midpoint(self, other: GeoPoint) -> GeoPoint {
        GeoPoint {
            lat: (self.lat + other.lat) / 2.0,
            lon: (self.lon + other.lon) / 2.0,
        }
    }
}

/// One edge between two consecutive route vertices plus its midpoint.
/// Derived once, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub center: GeoPoint,
}

impl Segment {
    pub fn new(start: GeoPoint, end: GeoPoint) -> Self {
        Self {
            start,
            end,
            center: start.midpoint(end),
        }
    }

    /// Degenerate zero-length segment used by the zone-status lookup.
    pub fn at_point(point: GeoPoint) -> Self {
        Self {
            start: point,
            end: point,
            center: point,
        }
    }
}

/// Great-circle (haversine) distance in meters.
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Total length of a polyline. Used when a routing provider omits the
/// summary length for a candidate.
pub fn polyline_length_meters(points: &[GeoPoint]) -> f64 {
    points
        .iter()
        .copied()
        .tuple_windows()
        .map(|(a, b)| distance_meters(a, b))
        .sum()
}
