//! Mapbox static image request assembly.
//!
//! Turns an activity's encoded path plus its start/end coordinates into a
//! Static Images API URL. Nothing here performs I/O.

use std::fmt;

use thiserror::Error;

use crate::geometry::{BoundingBox, EmptyGeometry, MapViewport};
use crate::polyline::{Coordinate, DecodeError, Polyline};

/// Mapbox rejects longer request URLs.
pub const MAX_URL_LEN: usize = 2000;

/// Start and end closer than this on both axes share one marker.
pub const MARKER_EPSILON: f64 = 0.001;

const PATH_STYLE: &str = "path-4+ff0000-1.0";
const START_STYLE: &str = "pin-s-s+ff0000";
const END_STYLE: &str = "pin-s-f+00ff00";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("static map request is {length} bytes, limit is {max}")]
pub struct RequestTooLarge {
    pub length: usize,
    pub max: usize,
}

/// Reasons a map cannot be built for an activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    EmptyGeometry(#[from] EmptyGeometry),
    #[error(transparent)]
    TooLarge(#[from] RequestTooLarge),
}

/// One drawable element of a static map.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    /// Route trace carrying the activity's encoded polyline as received.
    Path(String),
    StartMarker(Coordinate),
    EndMarker(Coordinate),
}

impl fmt::Display for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Mapbox wants lng,lat.
        match self {
            Overlay::Path(encoded) => {
                write!(f, "{}({})", PATH_STYLE, urlencoding::encode(encoded))
            }
            Overlay::StartMarker((lat, lng)) => write!(f, "{}({},{})", START_STYLE, lng, lat),
            Overlay::EndMarker((lat, lng)) => write!(f, "{}({},{})", END_STYLE, lng, lat),
        }
    }
}

/// Builds the overlay list in draw order: path, start, then end.
///
/// The end marker is dropped for loops that finish where they started.
pub fn overlays(encoded: &str, start: Coordinate, end: Option<Coordinate>) -> Vec<Overlay> {
    let mut overlays = vec![Overlay::Path(encoded.to_string()), Overlay::StartMarker(start)];

    if let Some(end) = end {
        if (end.0 - start.0).abs() > MARKER_EPSILON || (end.1 - start.1).abs() > MARKER_EPSILON {
            overlays.push(Overlay::EndMarker(end));
        }
    }

    overlays
}

#[derive(Debug, Clone)]
pub struct StaticMapOptions {
    pub base_url: String,
    pub style: String,
    pub width: u32,
    pub height: u32,
    pub max_url_len: usize,
}

impl Default for StaticMapOptions {
    fn default() -> Self {
        Self {
            base_url: "https://api.mapbox.com".to_string(),
            style: "mapbox/dark-v11".to_string(),
            width: 400,
            height: 300,
            max_url_len: MAX_URL_LEN,
        }
    }
}

/// A fully resolved static map: what to draw and where to look.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticMapRequest {
    pub overlays: Vec<Overlay>,
    pub viewport: MapViewport,
}

impl StaticMapRequest {
    /// Decodes the path, frames it, and lays out the overlays.
    pub fn new(
        encoded: &str,
        start: Coordinate,
        end: Option<Coordinate>,
    ) -> Result<Self, MapError> {
        let polyline = Polyline::decode(encoded)?;
        let bounds = BoundingBox::padded(polyline.points())?;

        Ok(Self {
            overlays: overlays(encoded, start, end),
            viewport: MapViewport::from_bounds(&bounds),
        })
    }

    /// Overlay segment of the request path.
    pub fn overlay_path(&self) -> String {
        self.overlays
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Full request URL, rejected when it reaches the length limit.
    pub fn url(&self, options: &StaticMapOptions, token: &str) -> Result<String, RequestTooLarge> {
        let (center_lat, center_lng) = self.viewport.center;
        let url = format!(
            "{}/styles/v1/{}/static/{}/{},{},{},0/{}x{}@2x?access_token={}",
            options.base_url,
            options.style,
            self.overlay_path(),
            center_lng,
            center_lat,
            self.viewport.zoom,
            options.width,
            options.height,
            token
        );

        if url.len() >= options.max_url_len {
            return Err(RequestTooLarge {
                length: url.len(),
                max: options.max_url_len,
            });
        }

        Ok(url)
    }
}

/// Decode, frame and assemble in one step.
pub fn build_static_map_url(
    encoded: &str,
    start: Coordinate,
    end: Option<Coordinate>,
    options: &StaticMapOptions,
    token: &str,
) -> Result<String, MapError> {
    let request = StaticMapRequest::new(encoded, start, end)?;
    Ok(request.url(options, token)?)
}
