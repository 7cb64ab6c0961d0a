//! Test fixtures for strava-maps.
//!
//! Provides:
//! - Short real-world routes as coordinate lists
//! - Builders for Strava activity JSON records

pub mod routes;

pub use routes::*;
