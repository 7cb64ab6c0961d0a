//! Strava activity records as stored in the activities JSON files.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::polyline::Coordinate;

pub const ACTIVITIES_FILE: &str = "strava_activities.json";
pub const DETAILED_FILE: &str = "strava_detailed.json";

#[derive(Debug, Error)]
pub enum ActivityFileError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid activity JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_polyline: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A Strava activity summary or detail record.
///
/// Only the fields this crate reads are typed; everything else is kept in
/// `extra` so files written back out match what the API returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_latlng: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_latlng: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<ActivityMap>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Activity {
    pub fn summary_polyline(&self) -> Option<&str> {
        self.map
            .as_ref()
            .and_then(|map| map.summary_polyline.as_deref())
            .filter(|polyline| !polyline.is_empty())
    }

    pub fn start(&self) -> Option<Coordinate> {
        latlng(self.start_latlng.as_deref())
    }

    pub fn end(&self) -> Option<Coordinate> {
        latlng(self.end_latlng.as_deref())
    }

    /// True when there is both a start point and a route to draw.
    pub fn has_gps_data(&self) -> bool {
        self.start().is_some() && self.summary_polyline().is_some()
    }

    pub fn started_after(&self, cutoff: DateTime<Utc>) -> bool {
        self.start_date.is_some_and(|date| date > cutoff)
    }
}

fn latlng(pair: Option<&[f64]>) -> Option<Coordinate> {
    match pair {
        Some(&[lat, lng]) => Some((lat, lng)),
        _ => None,
    }
}

pub fn load_activities(path: &Path) -> Result<Vec<Activity>, ActivityFileError> {
    let data = fs::read_to_string(path).map_err(|source| ActivityFileError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ActivityFileError::Json {
        path: path.display().to_string(),
        source,
    })
}

/// Writes activities as an indented JSON array.
pub fn save_activities(path: &Path, activities: &[Activity]) -> Result<(), ActivityFileError> {
    let json = serde_json::to_string_pretty(activities).map_err(|source| {
        ActivityFileError::Json {
            path: path.display().to_string(),
            source,
        }
    })?;
    fs::write(path, json).map_err(|source| ActivityFileError::Io {
        path: path.display().to_string(),
        source,
    })
}
