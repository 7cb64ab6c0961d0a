//! Run configuration.
//!
//! Credentials and paths are gathered once at the binary edge and passed
//! down explicitly; nothing below this module reads the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const CLIENT_ID_VAR: &str = "STRAVA_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "STRAVA_CLIENT_SECRET";
pub const REFRESH_TOKEN_VAR: &str = "STRAVA_REFRESH_TOKEN";
pub const MAPBOX_TOKEN_VAR: &str = "MAPBOX_TOKEN";
pub const DATA_DIR_VAR: &str = "STRAVA_DATA_DIR";
pub const MAPS_DIR_VAR: &str = "STRAVA_MAPS_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
}

/// Strava OAuth application credentials plus a long-lived refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StravaCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub mapbox_token: Option<String>,
    /// Where the activity JSON files live.
    pub data_dir: PathBuf,
    /// Where rendered `<activity_id>.png` files go.
    pub maps_dir: PathBuf,
    /// Pause between Strava API calls.
    pub strava_delay: Duration,
    /// Pause between Mapbox downloads.
    pub map_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            refresh_token: None,
            mapbox_token: None,
            data_dir: PathBuf::from("data"),
            maps_dir: PathBuf::from("public/maps"),
            strava_delay: Duration::from_millis(500),
            map_delay: Duration::from_millis(100),
        }
    }
}

impl Config {
    /// Reads settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Self {
            client_id: get(CLIENT_ID_VAR),
            client_secret: get(CLIENT_SECRET_VAR),
            refresh_token: get(REFRESH_TOKEN_VAR),
            mapbox_token: get(MAPBOX_TOKEN_VAR),
            data_dir: get(DATA_DIR_VAR).map(PathBuf::from).unwrap_or(defaults.data_dir),
            maps_dir: get(MAPS_DIR_VAR).map(PathBuf::from).unwrap_or(defaults.maps_dir),
            ..defaults
        }
    }

    pub fn strava_credentials(&self) -> Result<StravaCredentials, ConfigError> {
        Ok(StravaCredentials {
            client_id: self.require_client_id()?.to_string(),
            client_secret: self
                .client_secret
                .clone()
                .ok_or(ConfigError::Missing(CLIENT_SECRET_VAR))?,
            refresh_token: self
                .refresh_token
                .clone()
                .ok_or(ConfigError::Missing(REFRESH_TOKEN_VAR))?,
        })
    }

    pub fn require_client_id(&self) -> Result<&str, ConfigError> {
        self.client_id
            .as_deref()
            .ok_or(ConfigError::Missing(CLIENT_ID_VAR))
    }

    pub fn require_mapbox_token(&self) -> Result<&str, ConfigError> {
        self.mapbox_token
            .as_deref()
            .ok_or(ConfigError::Missing(MAPBOX_TOKEN_VAR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_full_credentials() {
        let config = lookup(&[
            (CLIENT_ID_VAR, "12345"),
            (CLIENT_SECRET_VAR, "secret"),
            (REFRESH_TOKEN_VAR, "refresh"),
            (MAPBOX_TOKEN_VAR, "pk.abc"),
        ]);
        let creds = config.strava_credentials().unwrap();
        assert_eq!(creds.client_id, "12345");
        assert_eq!(creds.refresh_token, "refresh");
        assert_eq!(config.require_mapbox_token(), Ok("pk.abc"));
    }

    #[test]
    fn test_missing_secret_is_named() {
        let config = lookup(&[(CLIENT_ID_VAR, "12345"), (REFRESH_TOKEN_VAR, "refresh")]);
        assert_eq!(
            config.strava_credentials(),
            Err(ConfigError::Missing(CLIENT_SECRET_VAR))
        );
    }

    #[test]
    fn test_blank_counts_as_missing() {
        let config = lookup(&[(MAPBOX_TOKEN_VAR, "  ")]);
        assert_eq!(
            config.require_mapbox_token(),
            Err(ConfigError::Missing(MAPBOX_TOKEN_VAR))
        );
    }

    #[test]
    fn test_path_overrides() {
        let config = lookup(&[(DATA_DIR_VAR, "/tmp/strava"), (MAPS_DIR_VAR, "/tmp/maps")]);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/strava"));
        assert_eq!(config.maps_dir, PathBuf::from("/tmp/maps"));
        assert_eq!(config.map_delay, Duration::from_millis(100));
    }
}
