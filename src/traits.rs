//! Seams between the batch jobs and the remote services they call.
//!
//! The jobs only need a handful of calls from Strava and Mapbox. Keeping
//! those behind traits lets the jobs run against canned data in tests.

use std::path::Path;

use crate::activity::Activity;
use crate::mapbox::{MapboxClient, MapboxError};
use crate::strava::{StravaClient, StravaError};

/// Read access to an athlete's activities.
pub trait ActivitySource {
    /// One page (1-based) of activity summaries, newest first.
    fn activities_page(&self, page: u32, per_page: u32) -> Result<Vec<Activity>, StravaError>;

    fn activity_detail(&self, activity_id: u64) -> Result<Activity, StravaError>;
}

/// Renders a static map URL into an image file.
pub trait MapRenderer {
    /// Returns the number of bytes written to `dest`.
    fn render(&self, url: &str, dest: &Path) -> Result<usize, MapboxError>;
}

/// A Strava client paired with a live access token.
#[derive(Debug, Clone)]
pub struct StravaSession<'a> {
    client: &'a StravaClient,
    access_token: String,
}

impl<'a> StravaSession<'a> {
    pub fn new(client: &'a StravaClient, access_token: impl Into<String>) -> Self {
        Self {
            client,
            access_token: access_token.into(),
        }
    }
}

impl ActivitySource for StravaSession<'_> {
    fn activities_page(&self, page: u32, per_page: u32) -> Result<Vec<Activity>, StravaError> {
        self.client
            .activities_page(&self.access_token, page, per_page)
    }

    fn activity_detail(&self, activity_id: u64) -> Result<Activity, StravaError> {
        self.client.activity_detail(&self.access_token, activity_id)
    }
}

impl MapRenderer for MapboxClient {
    fn render(&self, url: &str, dest: &Path) -> Result<usize, MapboxError> {
        self.save_image(url, dest)
    }
}
