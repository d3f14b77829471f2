//! Access tokens for the Sheets API.
//!
//! Tokens come either from a static bearer token or from an authorized-user
//! token file (the JSON written by Google's installed-app OAuth flow). File
//! tokens are refreshed through the token endpoint when they are about to
//! expire, and the refreshed token is written back to the file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::SheetsError;

/// OAuth scope needed to create and edit spreadsheets.
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the recorded expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Contents of an authorized-user token file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    /// Fields we do not use but must keep when writing the file back.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl AuthorizedUser {
    pub fn load(path: &Path) -> Result<Self, SheetsError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SheetsError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            SheetsError::Credentials(format!("invalid token file {}: {}", path.display(), e))
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SheetsError> {
        let content = serde_json::to_string_pretty(self).map_err(SheetsError::Decode)?;
        std::fs::write(path, content).map_err(|e| {
            SheetsError::Credentials(format!("cannot write {}: {}", path.display(), e))
        })
    }

    /// Token usable at `now`, if any.
    pub fn valid_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.token.as_deref()?;
        let expiry = self
            .expiry
            .as_deref()
            .and_then(parse_expiry)?;
        (expiry - Duration::seconds(EXPIRY_MARGIN_SECS) > now).then_some(token)
    }
}

/// Accepts RFC 3339 as well as the naive ISO timestamps (assumed UTC) the
/// Python client writes.
fn parse_expiry(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Produces bearer tokens for API calls.
pub enum TokenSource {
    /// A token supplied by the environment, used as is.
    Static(String),
    /// A token file refreshed on demand.
    AuthorizedUser {
        path: PathBuf,
        http: reqwest::Client,
        cached: Mutex<Option<AuthorizedUser>>,
    },
}

impl TokenSource {
    pub fn from_token(token: impl Into<String>) -> Self {
        TokenSource::Static(token.into())
    }

    pub fn from_file(path: impl Into<PathBuf>, http: reqwest::Client) -> Self {
        TokenSource::AuthorizedUser {
            path: path.into(),
            http,
            cached: Mutex::new(None),
        }
    }

    /// Current access token, refreshing it first when needed.
    pub async fn access_token(&self) -> Result<String, SheetsError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::AuthorizedUser { path, http, cached } => {
                let mut guard = cached.lock().await;
                let mut user = match guard.take() {
                    Some(user) => user,
                    None => AuthorizedUser::load(path)?,
                };

                if let Some(token) = user.valid_token(Utc::now()) {
                    let token = token.to_string();
                    *guard = Some(user);
                    return Ok(token);
                }

                refresh(http, &mut user).await?;
                user.save(path)?;
                info!(path = %path.display(), "Refreshed access token");

                let token = user.token.clone().unwrap_or_default();
                *guard = Some(user);
                Ok(token)
            }
        }
    }
}

async fn refresh(http: &reqwest::Client, user: &mut AuthorizedUser) -> Result<(), SheetsError> {
    let refresh_token = user.refresh_token.clone().ok_or_else(|| {
        SheetsError::Credentials("token expired and no refresh token is available".to_string())
    })?;

    debug!(token_uri = %user.token_uri, "Refreshing access token");
    let response = http
        .post(&user.token_uri)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", user.client_id.as_str()),
            ("client_secret", user.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
        ])
        .send()
        .await
        .map_err(|source| SheetsError::Http {
            url: user.token_uri.clone(),
            source,
        })?;

    let status = response.status();
    let body = response.text().await.map_err(|source| SheetsError::Http {
        url: user.token_uri.clone(),
        source,
    })?;
    if !status.is_success() {
        return Err(SheetsError::Credentials(format!(
            "token refresh failed with HTTP {}: {}",
            status.as_u16(),
            body
        )));
    }

    let refreshed: RefreshResponse = serde_json::from_str(&body).map_err(SheetsError::Decode)?;
    let expires_in = refreshed.expires_in.unwrap_or(3600);
    user.token = Some(refreshed.access_token);
    user.expiry = Some((Utc::now() + Duration::seconds(expires_in)).to_rfc3339());
    Ok(())
}
