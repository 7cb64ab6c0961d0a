//! Mapbox HTTP adapter: token checks and static image downloads.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use thiserror::Error;

use crate::static_map::StaticMapOptions;

const PNG_SIGNATURE: &[u8] = b"\x89PNG";

#[derive(Debug, Error)]
pub enum MapboxError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Mapbox returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("response is not a PNG image (content type {content_type:?})")]
    NotPng { content_type: Option<String> },
    #[error("failed to write image: {0}")]
    Io(#[from] io::Error),
}

impl MapboxError {
    /// Short hint for the status codes Mapbox uses for token problems.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            MapboxError::Status { status, .. } if *status == StatusCode::UNAUTHORIZED => {
                Some("token invalid or expired")
            }
            MapboxError::Status { status, .. } if *status == StatusCode::FORBIDDEN => {
                Some("token valid but URL restrictions are blocking this host")
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapboxConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub download_timeout_secs: u64,
}

impl Default for MapboxConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mapbox.com".to_string(),
            timeout_secs: 10,
            download_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapboxClient {
    config: MapboxConfig,
    client: Client,
}

impl MapboxClient {
    pub fn new(config: MapboxConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Fetches a public style to confirm the token is accepted.
    pub fn check_token(&self, token: &str) -> Result<(), MapboxError> {
        let response = self
            .client
            .get(format!("{}/styles/v1/mapbox/streets-v11", self.config.base_url))
            .query(&[("access_token", token)])
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(MapboxError::Status { status, body });
        }
        Ok(())
    }

    /// Downloads a rendered static map and checks it is a PNG.
    pub fn download_image(&self, url: &str) -> Result<Vec<u8>, MapboxError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(MapboxError::Status { status, body });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes()?;

        if !bytes.starts_with(PNG_SIGNATURE) {
            return Err(MapboxError::NotPng { content_type });
        }
        Ok(bytes.to_vec())
    }

    /// Downloads to a temporary sibling and renames into place, so a failed
    /// download never leaves a partial `<id>.png` behind.
    pub fn save_image(&self, url: &str, dest: &Path) -> Result<usize, MapboxError> {
        let bytes = self.download_image(url)?;
        write_atomically(dest, &bytes)?;
        Ok(bytes.len())
    }
}

/// A small map of San Francisco used to confirm static rendering works.
pub fn check_map_url(options: &StaticMapOptions, token: &str) -> String {
    format!(
        "{}/styles/v1/{}/static/pin-l+ff0000(-122.4194,37.7749)/-122.4194,37.7749,12,0/{}x{}@2x?access_token={}",
        options.base_url, options.style, options.width, options.height, token
    )
}

fn write_atomically(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp_path = dest.with_extension("tmp");
    let result = write_file(&tmp_path, bytes).and_then(|()| fs::rename(&tmp_path, dest));
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(bytes)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_map_url() {
        let url = check_map_url(&StaticMapOptions::default(), "pk.test");
        assert_eq!(
            url,
            "https://api.mapbox.com/styles/v1/mapbox/dark-v11/static/pin-l+ff0000(-122.4194,37.7749)\
             /-122.4194,37.7749,12,0/400x300@2x?access_token=pk.test"
        );
    }

    #[test]
    fn test_hints() {
        let forbidden = MapboxError::Status {
            status: StatusCode::FORBIDDEN,
            body: String::new(),
        };
        assert!(forbidden.hint().unwrap().contains("URL restrictions"));

        let other = MapboxError::NotPng { content_type: None };
        assert_eq!(other.hint(), None);
    }

    #[test]
    fn test_write_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("42.png");
        write_atomically(&dest, b"\x89PNGdata").unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"\x89PNGdata");
        assert!(!dir.path().join("42.tmp").exists());
    }

    #[test]
    fn test_write_atomically_cleans_up_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory in the way makes the final rename fail.
        let dest = dir.path().join("42.png");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("keep"), b"x").unwrap();

        assert!(write_atomically(&dest, b"\x89PNGdata").is_err());
        assert!(!dir.path().join("42.tmp").exists());
        assert!(dest.is_dir());
    }
}
