//! strava-maps
//!
//! Strava activity sync and Mapbox static map rendering. The geometry core
//! (`polyline`, `geometry`, `static_map`) is pure; everything else is thin
//! I/O around it.

pub mod polyline;
pub mod geometry;
pub mod static_map;
pub mod activity;
pub mod config;
pub mod traits;
pub mod strava;
pub mod mapbox;
pub mod sync;
pub mod maps;

pub use geometry::{BoundingBox, EmptyGeometry, MapViewport};
pub use polyline::{Coordinate, DecodeError, Polyline};
pub use static_map::{MapError, Overlay, RequestTooLarge, StaticMapOptions, StaticMapRequest};
