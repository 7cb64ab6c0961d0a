//! Bounding boxes and map viewports derived from decoded polylines.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::polyline::Coordinate;

/// Fraction of each axis span added on both sides of the raw extent.
pub const BOUNDS_PADDING: f64 = 0.1;

/// Span thresholds (exclusive upper bound, degrees) and their zoom levels.
const ZOOM_TABLE: [(f64, u8); 5] = [(0.01, 14), (0.05, 12), (0.1, 11), (0.5, 9), (1.0, 8)];

/// Zoom used when the span exceeds every threshold.
const MIN_ZOOM: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no coordinates to compute bounds from")]
pub struct EmptyGeometry;

/// Axis-aligned box in degrees.
///
/// Plain scalar min/max; paths crossing the antimeridian are not handled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Raw extent of the points, without padding.
    pub fn from_points(points: &[Coordinate]) -> Result<Self, EmptyGeometry> {
        let (&(lat, lng), rest) = points.split_first().ok_or(EmptyGeometry)?;
        let init = Self {
            min_lat: lat,
            max_lat: lat,
            min_lng: lng,
            max_lng: lng,
        };

        Ok(rest.iter().fold(init, |b, &(lat, lng)| Self {
            min_lat: b.min_lat.min(lat),
            max_lat: b.max_lat.max(lat),
            min_lng: b.min_lng.min(lng),
            max_lng: b.max_lng.max(lng),
        }))
    }

    /// Extent of the points padded by [`BOUNDS_PADDING`] on each axis.
    ///
    /// A single point (or all-identical points) gives a zero-size box.
    pub fn padded(points: &[Coordinate]) -> Result<Self, EmptyGeometry> {
        Self::from_points(points).map(|b| b.pad(BOUNDS_PADDING))
    }

    /// Expands each axis outward by `fraction` of its own span.
    pub fn pad(self, fraction: f64) -> Self {
        let lat_pad = self.lat_span() * fraction;
        let lng_pad = self.lng_span() * fraction;
        Self {
            min_lat: self.min_lat - lat_pad,
            max_lat: self.max_lat + lat_pad,
            min_lng: self.min_lng - lng_pad,
            max_lng: self.max_lng + lng_pad,
        }
    }

    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lng_span(&self) -> f64 {
        self.max_lng - self.min_lng
    }

    pub fn max_span(&self) -> f64 {
        self.lat_span().max(self.lng_span())
    }

    pub fn center(&self) -> Coordinate {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Center and zoom for a static map request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapViewport {
    pub center: Coordinate,
    pub zoom: u8,
}

impl MapViewport {
    pub fn from_bounds(bounds: &BoundingBox) -> Self {
        Self {
            center: bounds.center(),
            zoom: zoom_for_span(bounds.max_span()),
        }
    }
}

/// Maps the larger axis span (degrees) to a discrete zoom level.
///
/// A zero span lands in the most detailed bucket.
pub fn zoom_for_span(span: f64) -> u8 {
    ZOOM_TABLE
        .iter()
        .find(|(limit, _)| span < *limit)
        .map(|&(_, zoom)| zoom)
        .unwrap_or(MIN_ZOOM)
}
