//! Polyline representation for activity geometries.
//!
//! Strava ships route geometry as a Google encoded polyline. This module
//! decodes it into a coordinate sequence for bounds and viewport work.
//! The encoded string itself is what gets sent on to Mapbox, so encoding
//! is only needed for building fixtures and re-encoding edited paths.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A (latitude, longitude) pair in decimal degrees.
pub type Coordinate = (f64, f64);

/// Polyline encoding uses 1e-5 degree precision.
const PRECISION: f64 = 1e5;

/// Printable offset added to every 5-bit chunk.
const CHAR_OFFSET: u8 = 63;

/// Set on every chunk except the last one of a value.
const CONTINUATION_BIT: u64 = 0x20;

const CHUNK_MASK: u64 = 0x1f;

/// Error raised for an encoded polyline that cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input ended before the value that started at `position` terminated,
    /// or a point has a latitude but no longitude.
    #[error("polyline truncated at byte {position}")]
    Truncated { position: usize },
    /// Byte below the printable offset, which no encoder emits.
    #[error("invalid polyline byte {byte:#04x} at {position}")]
    InvalidByte { position: usize, byte: u8 },
    /// Value starting at `position` needs more than 64 bits, or pushes the
    /// running coordinate total out of `i64` range.
    #[error("polyline value starting at byte {position} overflows")]
    Overflow { position: usize },
}

/// A polyline representing a route geometry as decoded coordinates.
///
/// Points are stored in path order as (latitude, longitude) tuples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Coordinate>,
}

impl Polyline {
    /// Creates a new Polyline from decoded coordinate points.
    ///
    /// Each point is a (latitude, longitude) tuple.
    pub fn new(points: Vec<Coordinate>) -> Self {
        Self { points }
    }

    /// Decodes a Google encoded polyline.
    ///
    /// An empty string yields an empty polyline. Input that ends in the
    /// middle of a value is rejected instead of being read past its end.
    pub fn decode(encoded: &str) -> Result<Self, DecodeError> {
        let bytes = encoded.as_bytes();
        let mut points = Vec::new();
        let mut index = 0;
        let mut lat: i64 = 0;
        let mut lng: i64 = 0;

        while index < bytes.len() {
            let position = index;
            lat = lat
                .checked_add(next_value(bytes, &mut index)?)
                .ok_or(DecodeError::Overflow { position })?;
            if index >= bytes.len() {
                return Err(DecodeError::Truncated { position: index });
            }
            let position = index;
            lng = lng
                .checked_add(next_value(bytes, &mut index)?)
                .ok_or(DecodeError::Overflow { position })?;

            points.push((lat as f64 / PRECISION, lng as f64 / PRECISION));
        }

        Ok(Self { points })
    }

    /// Encodes the points back into Google polyline form.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        let mut prev_lat: i64 = 0;
        let mut prev_lng: i64 = 0;

        for &(lat, lng) in &self.points {
            let lat = (lat * PRECISION).round() as i64;
            let lng = (lng * PRECISION).round() as i64;
            push_value(&mut out, lat - prev_lat);
            push_value(&mut out, lng - prev_lng);
            prev_lat = lat;
            prev_lng = lng;
        }

        out
    }

    /// Returns a reference to the coordinate points.
    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    /// Consumes the polyline and returns the owned coordinate points.
    pub fn into_points(self) -> Vec<Coordinate> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<Coordinate> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<Coordinate> {
        self.points.last().copied()
    }
}

impl FromStr for Polyline {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

/// Reads one zig-zag encoded signed delta starting at `*index`.
fn next_value(bytes: &[u8], index: &mut usize) -> Result<i64, DecodeError> {
    let start = *index;
    let mut result: u64 = 0;
    let mut shift: u32 = 0;

    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(DecodeError::Truncated { position: start });
        };
        let chunk = byte
            .checked_sub(CHAR_OFFSET)
            .map(u64::from)
            .ok_or(DecodeError::InvalidByte {
                position: *index,
                byte,
            })?;
        *index += 1;

        // The 13th chunk only has 4 bits left to fill.
        let bits = chunk & CHUNK_MASK;
        if shift >= u64::BITS || (bits << shift) >> shift != bits {
            return Err(DecodeError::Overflow { position: start });
        }
        result |= bits << shift;
        shift += 5;

        if chunk < CONTINUATION_BIT {
            break;
        }
    }

    let magnitude = (result >> 1) as i64;
    Ok(if result & 1 == 1 { !magnitude } else { magnitude })
}

fn push_value(out: &mut String, value: i64) {
    let mut v = if value < 0 {
        !((value as u64) << 1)
    } else {
        (value as u64) << 1
    };

    while v >= CONTINUATION_BIT {
        out.push(char::from((CONTINUATION_BIT | (v & CHUNK_MASK)) as u8 + CHAR_OFFSET));
        v >>= 5;
    }
    out.push(char::from(v as u8 + CHAR_OFFSET));
}
