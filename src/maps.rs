//! Batch static map generation for synced activities.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::activity::Activity;
use crate::mapbox::MapboxError;
use crate::static_map::{self, MapError, StaticMapOptions};
use crate::traits::MapRenderer;

#[derive(Debug, Error)]
pub enum MapJobError {
    #[error("activity {0} not found or has no GPS data")]
    ActivityNotFound(u64),
    #[error("maps directory: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyExists,
    NoGpsData,
}

#[derive(Debug, Error)]
pub enum FailureReason {
    #[error("cannot build map request: {0}")]
    Request(#[from] MapError),
    #[error("render failed: {0}")]
    Render(#[from] MapboxError),
}

/// What happened to one activity in a batch.
#[derive(Debug)]
pub enum MapOutcome {
    Generated { path: PathBuf, bytes: usize },
    Skipped(SkipReason),
    Failed(FailureReason),
}

#[derive(Debug, Clone)]
pub struct MapJobOptions {
    pub static_map: StaticMapOptions,
    /// Pause after each render request.
    pub delay: Duration,
    /// Only render this activity.
    pub target: Option<u64>,
}

impl Default for MapJobOptions {
    fn default() -> Self {
        Self {
            static_map: StaticMapOptions::default(),
            delay: Duration::from_millis(100),
            target: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapSummary {
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// `*.png` files in the maps directory after the run.
    pub total_files: usize,
}

pub fn map_path(maps_dir: &Path, activity_id: u64) -> PathBuf {
    maps_dir.join(format!("{}.png", activity_id))
}

/// Renders one activity's map unless it already exists.
pub fn generate_map<R: MapRenderer>(
    renderer: &R,
    activity: &Activity,
    maps_dir: &Path,
    options: &StaticMapOptions,
    token: &str,
) -> MapOutcome {
    let (Some(encoded), Some(start)) = (activity.summary_polyline(), activity.start()) else {
        return MapOutcome::Skipped(SkipReason::NoGpsData);
    };

    let path = map_path(maps_dir, activity.id);
    if path.exists() {
        return MapOutcome::Skipped(SkipReason::AlreadyExists);
    }

    let url = match static_map::build_static_map_url(encoded, start, activity.end(), options, token)
    {
        Ok(url) => url,
        Err(err) => return MapOutcome::Failed(err.into()),
    };

    match renderer.render(&url, &path) {
        Ok(bytes) => MapOutcome::Generated { path, bytes },
        Err(err) => MapOutcome::Failed(err.into()),
    }
}

/// Renders maps for every activity with GPS data.
///
/// One bad activity never stops the batch; it is logged and counted.
pub fn generate_maps<R: MapRenderer>(
    renderer: &R,
    activities: &[Activity],
    maps_dir: &Path,
    options: &MapJobOptions,
    token: &str,
) -> Result<MapSummary, MapJobError> {
    fs::create_dir_all(maps_dir)?;

    let targets: Vec<&Activity> = activities
        .iter()
        .filter(|a| a.has_gps_data())
        .filter(|a| options.target.is_none_or(|id| a.id == id))
        .collect();

    if let Some(id) = options.target {
        if targets.is_empty() {
            return Err(MapJobError::ActivityNotFound(id));
        }
    }

    info!(count = targets.len(), "activities with GPS data");

    let mut summary = MapSummary::default();
    for (i, activity) in targets.iter().enumerate() {
        match generate_map(renderer, activity, maps_dir, &options.static_map, token) {
            MapOutcome::Generated { path, bytes } => {
                info!(
                    id = activity.id,
                    progress = %format!("{}/{}", i + 1, targets.len()),
                    bytes,
                    path = %path.display(),
                    "generated map"
                );
                summary.generated += 1;
                thread::sleep(options.delay);
            }
            MapOutcome::Skipped(reason) => {
                info!(id = activity.id, ?reason, "skipping map");
                summary.skipped += 1;
            }
            MapOutcome::Failed(reason @ FailureReason::Render(_)) => {
                warn!(id = activity.id, error = %reason, "map generation failed");
                summary.failed += 1;
                thread::sleep(options.delay);
            }
            MapOutcome::Failed(reason) => {
                warn!(id = activity.id, error = %reason, "map generation failed");
                summary.failed += 1;
            }
        }
    }

    summary.total_files = png_files(maps_dir)?.len();
    Ok(summary)
}

/// Deletes `<id>.png` files whose id is not among `activities`.
pub fn cleanup_orphaned_maps(
    maps_dir: &Path,
    activities: &[Activity],
) -> Result<Vec<PathBuf>, MapJobError> {
    let known: HashSet<String> = activities.iter().map(|a| a.id.to_string()).collect();
    let mut removed = Vec::new();

    for path in png_files(maps_dir)? {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !known.contains(stem) {
            info!(path = %path.display(), "removing orphaned map");
            fs::remove_file(&path)?;
            removed.push(path);
        }
    }

    if !removed.is_empty() {
        info!(count = removed.len(), "cleaned up orphaned maps");
    }
    Ok(removed)
}

fn png_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "png") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
