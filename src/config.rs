//! Configuration types for feishu-backup

use crate::error::{Error, Result};
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Placeholder shipped in sample configs for the application id
pub const APP_ID_PLACEHOLDER: &str = "<YOUR_APP_ID>";

/// Placeholder shipped in sample configs for the application secret
pub const APP_SECRET_PLACEHOLDER: &str = "<YOUR_APP_SECRET>";

/// Placeholder redirect URI that must be replaced before authorizing
pub const REDIRECT_URI_PLACEHOLDER: &str = "https://example.com/api/oauth/callback";

/// Which remote namespace a run backs up
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupSource {
    /// The drive folder tree, starting at the user's root folder
    Drive,
    /// The wiki-style library space
    #[default]
    MyLibrary,
}

impl BackupSource {
    /// Name used in config files and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupSource::Drive => "drive",
            BackupSource::MyLibrary => "my_library",
        }
    }
}

impl std::fmt::Display for BackupSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "drive" => Ok(BackupSource::Drive),
            "my_library" => Ok(BackupSource::MyLibrary),
            _ => Err(format!(
                "invalid backup source: {s}. Valid options: drive, my_library"
            )),
        }
    }
}

/// HTTP transport settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout for JSON API calls (default: 30s)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Timeout for a whole binary download, body included (default: 30min)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub download_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            download_timeout: default_download_timeout(),
        }
    }
}

/// Retry behavior of the API client
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of requests per call, the first one included (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Linear backoff unit: attempt `n` waits `n * backoff_step` (default: 1s)
    ///
    /// A numeric `Retry-After` header on a retryable response takes precedence.
    #[serde(default = "default_backoff_step", with = "duration_serde")]
    pub backoff_step: Duration,

    /// HTTP statuses that are retried (default: 429, 500, 502, 503, 504)
    #[serde(default = "default_retryable_statuses")]
    pub retryable_statuses: Vec<u16>,

    /// Application-level codes retried even on HTTP 200 (default: 1069923)
    #[serde(default = "default_retryable_api_codes")]
    pub retryable_api_codes: Vec<i64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_step: default_backoff_step(),
            retryable_statuses: default_retryable_statuses(),
            retryable_api_codes: default_retryable_api_codes(),
        }
    }
}

impl RetryConfig {
    /// Whether a response status should be retried
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Whether an application-level code should be retried
    pub fn is_retryable_code(&self, code: i64) -> bool {
        self.retryable_api_codes.contains(&code)
    }
}

/// Export task polling
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Delay between two status queries (default: 2s)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Maximum time to wait for a task to reach a terminal state (default: 600s)
    #[serde(default = "default_max_export_wait", with = "duration_serde")]
    pub max_wait: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            max_wait: default_max_export_wait(),
        }
    }
}

/// OAuth application credentials and token storage
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Application id from the developer console
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Application secret from the developer console
    #[serde(default = "default_app_secret")]
    pub app_secret: String,

    /// Token store holding the rotating refresh token (default: "token_store.json")
    #[serde(default = "default_token_store")]
    pub token_store: PathBuf,

    /// Redirect URI registered for the authorization-code flow
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Space-separated OAuth scopes; must include `offline_access`
    #[serde(default = "default_scopes")]
    pub scopes: String,

    /// Consent page used by the authorization-code flow
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            app_secret: default_app_secret(),
            token_store: default_token_store(),
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            authorize_url: default_authorize_url(),
        }
    }
}

/// Main configuration for a backup run
///
/// Every field has a default, so a config file only needs to mention the
/// settings it changes. Durations are written as whole seconds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Namespace to back up (default: my_library)
    #[serde(default)]
    pub source: BackupSource,

    /// Library space id used in library mode (default: "my_library")
    #[serde(default = "default_space_id")]
    pub space_id: String,

    /// Root output directory (default: "feishu_backups")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Write each run into a `YYYY-MM-DD_HH-MM-SS` subdirectory (default: true)
    #[serde(default = "default_true")]
    pub run_subdir_by_date: bool,

    /// Open API base URL (default: "https://open.feishu.cn/open-apis")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Export polling
    #[serde(default)]
    pub export: ExportConfig,

    /// OAuth credentials
    #[serde(default)]
    pub credentials: CredentialConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: BackupSource::default(),
            space_id: default_space_id(),
            output_dir: default_output_dir(),
            run_subdir_by_date: true,
            base_url: default_base_url(),
            http: HttpConfig::default(),
            retry: RetryConfig::default(),
            export: ExportConfig::default(),
            credentials: CredentialConfig::default(),
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                "config",
                format!("failed to read config file '{}': {}", path.display(), e),
            )
        })?;
        serde_json::from_str(&content).map_err(|e| {
            Error::config(
                "config",
                format!("failed to parse config file '{}': {}", path.display(), e),
            )
        })
    }

    /// Check the settings a backup run depends on
    pub fn validate(&self) -> Result<()> {
        self.validate_app_credentials()?;
        if self.retry.max_attempts == 0 {
            return Err(Error::config(
                "retry.max_attempts",
                "must allow at least one attempt",
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(Error::config("base_url", "must not be empty"));
        }
        if self.source == BackupSource::MyLibrary && self.space_id.trim().is_empty() {
            return Err(Error::config(
                "space_id",
                "is required when backing up the library",
            ));
        }
        Ok(())
    }

    /// Check the application id and secret
    pub fn validate_app_credentials(&self) -> Result<()> {
        let app_id = self.credentials.app_id.trim();
        if app_id.is_empty() || app_id == APP_ID_PLACEHOLDER {
            return Err(Error::config(
                "credentials.app_id",
                "app_id is not configured (set it in the config file or FEISHU_APP_ID)",
            ));
        }
        let app_secret = self.credentials.app_secret.trim();
        if app_secret.is_empty() || app_secret == APP_SECRET_PLACEHOLDER {
            return Err(Error::config(
                "credentials.app_secret",
                "app_secret is not configured (set it in the config file or FEISHU_APP_SECRET)",
            ));
        }
        Ok(())
    }

    /// Check the redirect URI used by the authorization-code flow
    pub fn validate_redirect_uri(&self) -> Result<()> {
        let redirect = self.credentials.redirect_uri.trim();
        if redirect.is_empty() || redirect == REDIRECT_URI_PLACEHOLDER {
            return Err(Error::config(
                "credentials.redirect_uri",
                "redirect_uri is not configured (it must match the callback registered in the console)",
            ));
        }
        Ok(())
    }

    /// Output directory for a run started at `started_at`
    pub fn run_output_dir<Tz>(&self, started_at: &DateTime<Tz>) -> PathBuf
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        if self.run_subdir_by_date {
            self.output_dir
                .join(started_at.format("%Y-%m-%d_%H-%M-%S").to_string())
        } else {
            self.output_dir.clone()
        }
    }
}

// Default value functions
fn default_space_id() -> String {
    "my_library".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("feishu_backups")
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://open.feishu.cn/open-apis".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_step() -> Duration {
    Duration::from_secs(1)
}

fn default_retryable_statuses() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}

fn default_retryable_api_codes() -> Vec<i64> {
    vec![1069923]
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_max_export_wait() -> Duration {
    Duration::from_secs(600)
}

fn default_app_id() -> String {
    APP_ID_PLACEHOLDER.to_string()
}

fn default_app_secret() -> String {
    APP_SECRET_PLACEHOLDER.to_string()
}

fn default_token_store() -> PathBuf {
    PathBuf::from("token_store.json")
}

fn default_redirect_uri() -> String {
    REDIRECT_URI_PLACEHOLDER.to_string()
}

fn default_scopes() -> String {
    [
        "offline_access",
        "drive:drive",
        "drive:file:download",
        "docs:document:export",
        "drive:export:readonly",
        "wiki:node:retrieve",
        "wiki:wiki:readonly",
    ]
    .join(" ")
}

fn default_authorize_url() -> String {
    "https://accounts.feishu.cn/open-apis/authen/v1/authorize".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
