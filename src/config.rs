//! Configuration management for menor-preco.
//!
//! Settings start from defaults, then an optional `menor-preco.toml`, then
//! environment variables (a `.env` file is loaded by `main`), then command
//! line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::repository::DbContext;
use crate::scrapers::{HttpClient, MenorPrecoClient, DEFAULT_API_URL};
use crate::sheets::{GoogleSheetsClient, SheetsError, TokenSource, DEFAULT_SHEETS_API_URL};

/// Database filename used outside test mode.
pub const DEFAULT_DATABASE_FILENAME: &str = "menor-preco.db";

/// Database filename used when `MODE=test`.
pub const TEST_DATABASE_FILENAME: &str = "test_menor-preco.db";

/// Config file looked up in the data directory.
pub const CONFIG_FILENAME: &str = "menor-preco.toml";

/// Token file looked up in the data directory when `TOKEN` is not set.
pub const DEFAULT_TOKEN_FILENAME: &str = "token.json";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Contents of `menor-preco.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Database URL or path.
    pub database: Option<String>,
    /// Price service base URL.
    pub api_url: Option<String>,
    /// Sheets API base URL.
    pub sheets_api_url: Option<String>,
    /// Authorized-user token file.
    pub token_file: Option<String>,
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub request_timeout: Option<u64>,
    /// Delay between price service requests in milliseconds.
    pub request_delay_ms: Option<u64>,
    /// Localities fetched at the same time while populating.
    pub fetch_concurrency: Option<usize>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply the keys present in this file to `settings`.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref database) = self.database {
            settings.database_url = Some(database.clone());
        }
        if let Some(ref url) = self.api_url {
            settings.api_url = url.clone();
        }
        if let Some(ref url) = self.sheets_api_url {
            settings.sheets_api_url = url.clone();
        }
        if let Some(ref path) = self.token_file {
            settings.token_file = Some(expand_path(path));
        }
        if let Some(ref ua) = self.user_agent {
            settings.user_agent = Some(ua.clone());
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(delay) = self.request_delay_ms {
            settings.request_delay_ms = delay;
        }
        if let Some(n) = self.fetch_concurrency {
            settings.fetch_concurrency = n.max(1);
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename inside `data_dir`.
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    pub database_url: Option<String>,
    /// Price service base URL.
    pub api_url: String,
    /// Sheets API base URL.
    pub sheets_api_url: String,
    /// Authorized-user token file.
    pub token_file: Option<PathBuf>,
    /// Static bearer token; takes precedence over the token file.
    pub access_token: Option<String>,
    /// User agent for price service requests (None = default).
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Delay between price service requests in milliseconds.
    pub request_delay_ms: u64,
    /// Localities fetched at the same time while populating.
    pub fetch_concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        // Falls back gracefully: data dir -> home dir -> current dir
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("menor-preco");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
            api_url: DEFAULT_API_URL.to_string(),
            sheets_api_url: DEFAULT_SHEETS_API_URL.to_string(),
            token_file: None,
            access_token: None,
            user_agent: None,
            request_timeout: 30,
            request_delay_ms: 0,
            fetch_concurrency: 1,
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(mode) = get("MODE") {
            self.database_filename = if mode.eq_ignore_ascii_case("test") {
                TEST_DATABASE_FILENAME.to_string()
            } else {
                DEFAULT_DATABASE_FILENAME.to_string()
            };
        }
        if let Some(url) = get("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(url) = get("MENOR_PRECO_API_URL") {
            self.api_url = parse_base_url("MENOR_PRECO_API_URL", &url)?;
        }
        if let Some(url) = get("GOOGLE_SHEETS_API_URL") {
            self.sheets_api_url = parse_base_url("GOOGLE_SHEETS_API_URL", &url)?;
        }
        if let Some(path) = get("TOKEN") {
            self.token_file = Some(expand_path(&path));
        }
        if let Some(token) = get("GOOGLE_ACCESS_TOKEN") {
            self.access_token = Some(token);
        }
        if let Some(ua) = get("MENOR_PRECO_USER_AGENT") {
            self.user_agent = Some(ua);
        }
        if let Some(v) = get("MENOR_PRECO_TIMEOUT") {
            self.request_timeout = parse_number("MENOR_PRECO_TIMEOUT", &v)?;
        }
        if let Some(v) = get("MENOR_PRECO_DELAY_MS") {
            self.request_delay_ms = parse_number("MENOR_PRECO_DELAY_MS", &v)?;
        }
        if let Some(v) = get("MENOR_PRECO_CONCURRENCY") {
            let n: usize = parse_number("MENOR_PRECO_CONCURRENCY", &v)?;
            self.fetch_concurrency = n.max(1);
        }
        Ok(())
    }

    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        if let Some(ref url) = self.database_url {
            url.clone()
        } else {
            format!("sqlite:{}", self.database_path().display())
        }
    }

    /// Get the full path to the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Check if the database appears to be initialized.
    pub fn database_exists(&self) -> bool {
        match self.database_url {
            Some(ref url) => Path::new(url.strip_prefix("sqlite:").unwrap_or(url)).exists(),
            None => self.database_path().exists(),
        }
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })
    }

    /// Create a database context using the configured database URL or path.
    pub fn create_db_context(&self) -> DbContext {
        DbContext::from_url(&self.database_url())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Token file to use: the configured one, or `token.json` in the data dir.
    pub fn token_path(&self) -> PathBuf {
        self.token_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_TOKEN_FILENAME))
    }

    /// Price service client built from these settings.
    pub fn price_client(&self) -> Result<MenorPrecoClient, reqwest::Error> {
        let http = HttpClient::with_user_agent(
            self.request_timeout(),
            self.request_delay(),
            self.user_agent.as_deref(),
        )?;
        Ok(MenorPrecoClient::new(http, &self.api_url))
    }

    /// Sheets client authenticated with the static token if set, otherwise
    /// with the token file.
    pub fn sheets_client(&self) -> Result<GoogleSheetsClient, SheetsError> {
        let tokens = match self.access_token {
            Some(ref token) => TokenSource::from_token(token.clone()),
            None => {
                let path = self.token_path();
                if !path.exists() {
                    return Err(SheetsError::Credentials(format!(
                        "no token file at {}; set TOKEN or GOOGLE_ACCESS_TOKEN",
                        path.display()
                    )));
                }
                let http = reqwest::Client::builder()
                    .timeout(self.request_timeout())
                    .build()
                    .map_err(|source| SheetsError::Http {
                        url: path.display().to_string(),
                        source,
                    })?;
                TokenSource::from_file(path, http)
            }
        };
        GoogleSheetsClient::new(&self.sheets_api_url, tokens, self.request_timeout())
    }
}

/// Expand a leading `~` in a path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
}

/// Check that `value` is an absolute URL and drop any trailing slash.
fn parse_base_url(key: &'static str, value: &str) -> Result<String, ConfigError> {
    let value = value.trim();
    url::Url::parse(value).map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })?;
    Ok(value.trim_end_matches('/').to_string())
}

/// Load settings for this process.
///
/// The data directory comes from `data_dir` (command line), then
/// `MENOR_PRECO_DATA_DIR`, then the platform default. The config file is
/// `config_path` if given, else `menor-preco.toml` in the data directory if
/// present.
pub fn load_settings(
    data_dir: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<Settings, ConfigError> {
    let env_data_dir = std::env::var("MENOR_PRECO_DATA_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| expand_path(&v));

    let mut settings = match data_dir.map(Path::to_path_buf).or(env_data_dir) {
        Some(dir) => Settings::with_data_dir(dir),
        None => Settings::default(),
    };

    let config_file = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => Some(settings.data_dir.join(CONFIG_FILENAME)).filter(|p| p.exists()),
    };
    if let Some(path) = config_file {
        debug!(path = %path.display(), "Loading config file");
        Config::load(&path)?.apply_to_settings(&mut settings);
    }

    settings.apply_env(|key| std::env::var(key).ok())?;
    Ok(settings)
}
