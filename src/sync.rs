//! Activity sync: pull every activity summary from Strava, then the full
//! detail for recent ones, and write both to the data directory.

use std::fs;
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::activity::{self, ACTIVITIES_FILE, Activity, ActivityFileError, DETAILED_FILE};
use crate::strava::{MAX_PER_PAGE, StravaError};
use crate::traits::ActivitySource;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to fetch activity page {page}: {source}")]
    Page {
        page: u32,
        #[source]
        source: StravaError,
    },
    #[error(transparent)]
    File(#[from] ActivityFileError),
    #[error("failed to create data directory: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub per_page: u32,
    /// Activities started within this window get a detail fetch.
    pub detail_window: chrono::Duration,
    /// Pause after each Strava call.
    pub delay: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            per_page: MAX_PER_PAGE,
            detail_window: chrono::Duration::days(30),
            delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub activities: usize,
    pub pages: u32,
    pub detailed: usize,
    pub detail_failures: usize,
}

/// Fetches pages until one comes back short or empty.
///
/// A failed page aborts the sync so a partial list never replaces the
/// previous file.
pub fn fetch_all_activities<S: ActivitySource>(
    source: &S,
    options: &SyncOptions,
) -> Result<(Vec<Activity>, u32), SyncError> {
    let mut all = Vec::new();
    let mut page = 1;

    loop {
        info!(page, "fetching activity page");
        let batch = source
            .activities_page(page, options.per_page)
            .map_err(|source| SyncError::Page { page, source })?;

        if batch.is_empty() {
            break;
        }

        let short = batch.len() < options.per_page as usize;
        all.extend(batch);
        thread::sleep(options.delay);

        if short {
            break;
        }
        page += 1;
    }

    Ok((all, page))
}

/// Detail records for activities started after `now - detail_window`.
///
/// Individual failures are logged and skipped.
pub fn fetch_recent_details<S: ActivitySource>(
    source: &S,
    activities: &[Activity],
    options: &SyncOptions,
    now: DateTime<Utc>,
) -> (Vec<Activity>, usize) {
    let cutoff = now - options.detail_window;
    let mut detailed = Vec::new();
    let mut failures = 0;

    for activity in activities.iter().filter(|a| a.started_after(cutoff)) {
        info!(id = activity.id, name = %activity.name, "fetching activity detail");
        match source.activity_detail(activity.id) {
            Ok(detail) => detailed.push(detail),
            Err(err) => {
                warn!(id = activity.id, error = %err, "skipping activity detail");
                failures += 1;
            }
        }
        thread::sleep(options.delay);
    }

    (detailed, failures)
}

/// Full sync into `data_dir`.
///
/// The detail file is only written when at least one detail was fetched,
/// leaving an older one in place otherwise.
pub fn sync_activities<S: ActivitySource>(
    source: &S,
    data_dir: &Path,
    options: &SyncOptions,
    now: DateTime<Utc>,
) -> Result<SyncReport, SyncError> {
    fs::create_dir_all(data_dir)?;

    let (activities, pages) = fetch_all_activities(source, options)?;
    info!(count = activities.len(), "found activities");

    let summary_path = data_dir.join(ACTIVITIES_FILE);
    activity::save_activities(&summary_path, &activities)?;
    info!(path = %summary_path.display(), "saved activities");

    let (detailed, detail_failures) = fetch_recent_details(source, &activities, options, now);
    if !detailed.is_empty() {
        let detail_path = data_dir.join(DETAILED_FILE);
        activity::save_activities(&detail_path, &detailed)?;
        info!(count = detailed.len(), path = %detail_path.display(), "saved detailed activities");
    }

    Ok(SyncReport {
        activities: activities.len(),
        pages,
        detailed: detailed.len(),
        detail_failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::cell::RefCell;

    struct MockSource {
        activities: Vec<Activity>,
        failing_page: Option<u32>,
        failing_detail: Option<u64>,
        pages_requested: RefCell<Vec<u32>>,
    }

    impl MockSource {
        fn new(count: u64) -> Self {
            let activities = (1..=count)
                .map(|id| {
                    serde_json::from_value(json!({
                        "id": id,
                        "name": format!("Run {}", id),
                        "start_date": format!("2024-05-{:02}T07:00:00Z", id.min(28)),
                    }))
                    .unwrap()
                })
                .collect();
            Self {
                activities,
                failing_page: None,
                failing_detail: None,
                pages_requested: RefCell::new(Vec::new()),
            }
        }
    }

    impl ActivitySource for MockSource {
        fn activities_page(&self, page: u32, per_page: u32) -> Result<Vec<Activity>, StravaError> {
            self.pages_requested.borrow_mut().push(page);
            if self.failing_page == Some(page) {
                return Err(StravaError::Status {
                    status: StatusCode::TOO_MANY_REQUESTS,
                    body: String::new(),
                });
            }
            let start = ((page - 1) * per_page) as usize;
            Ok(self
                .activities
                .iter()
                .skip(start)
                .take(per_page as usize)
                .cloned()
                .collect())
        }

        fn activity_detail(&self, activity_id: u64) -> Result<Activity, StravaError> {
            if self.failing_detail == Some(activity_id) {
                return Err(StravaError::Status {
                    status: StatusCode::NOT_FOUND,
                    body: String::new(),
                });
            }
            let mut detail = self
                .activities
                .iter()
                .find(|a| a.id == activity_id)
                .cloned()
                .unwrap();
            detail.extra.insert("calories".to_string(), json!(500));
            Ok(detail)
        }
    }

    fn options(per_page: u32) -> SyncOptions {
        SyncOptions {
            per_page,
            delay: Duration::ZERO,
            ..SyncOptions::default()
        }
    }

    fn now() -> DateTime<Utc> {
        "2024-05-31T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_pagination_stops_on_short_page() {
        let source = MockSource::new(5);
        let (all, pages) = fetch_all_activities(&source, &options(2)).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(pages, 3);
        assert_eq!(*source.pages_requested.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_pagination_stops_on_empty_page() {
        let source = MockSource::new(4);
        let (all, _) = fetch_all_activities(&source, &options(2)).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(*source.pages_requested.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_page_failure_aborts() {
        let mut source = MockSource::new(5);
        source.failing_page = Some(2);
        let err = fetch_all_activities(&source, &options(2)).unwrap_err();
        assert!(matches!(err, SyncError::Page { page: 2, .. }));
    }

    #[test]
    fn test_recent_details_only() {
        let source = MockSource::new(3);
        let activities = source.activities.clone();
        let opts = SyncOptions {
            detail_window: chrono::Duration::days(29),
            ..options(10)
        };
        // May 1st is older than 29 days before May 31st.
        let (detailed, failures) = fetch_recent_details(&source, &activities, &opts, now());
        assert_eq!(detailed.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(failures, 0);
    }

    #[test]
    fn test_detail_failure_is_skipped() {
        let mut source = MockSource::new(3);
        source.failing_detail = Some(2);
        let activities = source.activities.clone();
        let (detailed, failures) = fetch_recent_details(&source, &activities, &options(10), now());
        assert_eq!(detailed.len(), 2);
        assert_eq!(failures, 1);
    }

    #[test]
    fn test_sync_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let source = MockSource::new(3);

        let report = sync_activities(&source, &data_dir, &options(200), now()).unwrap();
        assert_eq!(report.activities, 3);
        assert_eq!(report.pages, 1);
        assert_eq!(report.detailed, 3);

        let summary = activity::load_activities(&data_dir.join(ACTIVITIES_FILE)).unwrap();
        assert_eq!(summary.len(), 3);
        let detailed = activity::load_activities(&data_dir.join(DETAILED_FILE)).unwrap();
        assert_eq!(detailed[0].extra["calories"], json!(500));
    }

    #[test]
    fn test_sync_without_recent_skips_detail_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockSource::new(2);
        let later = "2025-01-01T00:00:00Z".parse().unwrap();

        let report = sync_activities(&source, dir.path(), &options(200), later).unwrap();
        assert_eq!(report.detailed, 0);
        assert!(!dir.path().join(DETAILED_FILE).exists());
    }
}
