//! Strava HTTP adapter: OAuth token exchange and activity reads.

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::activity::Activity;
use crate::config::StravaCredentials;

/// Scope needed to read private activities.
pub const ACTIVITY_READ_ALL: &str = "activity:read_all";

/// Strava caps `per_page` at 200.
pub const MAX_PER_PAGE: u32 = 200;

#[derive(Debug, Error)]
pub enum StravaError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Strava returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unexpected response body: {0}")]
    Json(#[from] serde_json::Error),
}

impl StravaError {
    /// 401 from Strava means the token lacks a scope or has been revoked.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, StravaError::Status { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }
}

#[derive(Debug, Clone)]
pub struct StravaConfig {
    pub api_url: String,
    pub oauth_url: String,
    pub timeout_secs: u64,
}

impl Default for StravaConfig {
    fn default() -> Self {
        Self {
            api_url: "https://www.strava.com/api/v3".to_string(),
            oauth_url: "https://www.strava.com/oauth".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Body of a successful `/oauth/token` call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Whether the granted scope list includes `scope`.
    ///
    /// Strava only reports scopes on code exchange, so `None` here means
    /// unknown rather than absent.
    pub fn has_scope(&self, scope: &str) -> Option<bool> {
        self.scope
            .as_deref()
            .map(|granted| granted.split(',').any(|s| s.trim() == scope))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Athlete {
    pub id: u64,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Athlete {
    pub fn display_name(&self) -> String {
        [self.firstname.as_deref(), self.lastname.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// URL the user opens to grant `read,activity:read_all` to the app.
pub fn authorization_url(config: &StravaConfig, client_id: &str) -> String {
    format!(
        "{}/authorize?client_id={}&response_type=code&redirect_uri=http://localhost&approval_prompt=force&scope=read,{}",
        config.oauth_url,
        urlencoding::encode(client_id),
        ACTIVITY_READ_ALL
    )
}

#[derive(Debug, Clone)]
pub struct StravaClient {
    config: StravaConfig,
    client: Client,
}

impl StravaClient {
    pub fn new(config: StravaConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &StravaConfig {
        &self.config
    }

    /// Trades the long-lived refresh token for a short-lived access token.
    pub fn refresh_access_token(
        &self,
        credentials: &StravaCredentials,
    ) -> Result<TokenResponse, StravaError> {
        debug!("refreshing Strava access token");
        let response = self
            .client
            .post(format!("{}/token", self.config.oauth_url))
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("refresh_token", credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()?;

        read_json(response)
    }

    /// Exchanges the `code` from the authorization redirect for tokens.
    pub fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
    ) -> Result<TokenResponse, StravaError> {
        let response = self
            .client
            .post(format!("{}/token", self.config.oauth_url))
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()?;

        read_json(response)
    }

    pub fn athlete(&self, access_token: &str) -> Result<Athlete, StravaError> {
        let response = self
            .client
            .get(format!("{}/athlete", self.config.api_url))
            .bearer_auth(access_token)
            .send()?;

        read_json(response)
    }

    /// One page of the authenticated athlete's activities, newest first.
    pub fn activities_page(
        &self,
        access_token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Activity>, StravaError> {
        debug!(page, per_page, "fetching activity page");
        let response = self
            .client
            .get(format!("{}/athlete/activities", self.config.api_url))
            .bearer_auth(access_token)
            .query(&[("page", page), ("per_page", per_page.min(MAX_PER_PAGE))])
            .send()?;

        read_json(response)
    }

    pub fn activity_detail(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<Activity, StravaError> {
        let response = self
            .client
            .get(format!("{}/activities/{}", self.config.api_url, activity_id))
            .bearer_auth(access_token)
            .send()?;

        read_json(response)
    }
}

fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, StravaError> {
    let status = response.status();
    let body = response.text()?;

    if !status.is_success() {
        return Err(StravaError::Status { status, body });
    }

    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url() {
        let url = authorization_url(&StravaConfig::default(), "12345");
        assert_eq!(
            url,
            "https://www.strava.com/oauth/authorize?client_id=12345&response_type=code\
             &redirect_uri=http://localhost&approval_prompt=force&scope=read,activity:read_all"
        );
    }

    #[test]
    fn test_token_scope() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"token_type":"Bearer","access_token":"abc","expires_at":1700000000,"refresh_token":"def","scope":"read,activity:read_all"}"#,
        )
        .unwrap();
        assert_eq!(token.has_scope(ACTIVITY_READ_ALL), Some(true));
        assert_eq!(token.has_scope("profile:write"), Some(false));
    }

    #[test]
    fn test_refresh_response_without_scope() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","expires_at":1700000000}"#).unwrap();
        assert_eq!(token.has_scope(ACTIVITY_READ_ALL), None);
        assert_eq!(token.refresh_token, None);
    }

    #[test]
    fn test_scope_is_not_prefix_match() {
        let token = TokenResponse {
            access_token: "abc".to_string(),
            refresh_token: None,
            expires_at: None,
            token_type: None,
            scope: Some("read,activity:read".to_string()),
        };
        assert_eq!(token.has_scope(ACTIVITY_READ_ALL), Some(false));
    }

    #[test]
    fn test_athlete_display_name() {
        let athlete: Athlete =
            serde_json::from_str(r#"{"id":7,"firstname":"Sam","lastname":null}"#).unwrap();
        assert_eq!(athlete.display_name(), "Sam");
    }

    #[test]
    fn test_unauthorized() {
        let err = StravaError::Status {
            status: StatusCode::UNAUTHORIZED,
            body: "{}".to_string(),
        };
        assert!(err.is_unauthorized());
    }
}
