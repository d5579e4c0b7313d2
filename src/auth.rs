//! User access token management
//!
//! A backup run authenticates as a user. The long-lived credential is a
//! rotating refresh token kept in a small JSON token store:
//!
//! 1. `authorize-url` prints the consent page ([`authorize_url`])
//! 2. `exchange` turns the callback's `code` into a first refresh token
//!    ([`OAuthClient::exchange_code`]) and writes the store
//! 3. every run refreshes once ([`obtain_access_token`]), persisting the
//!    rotated refresh token before the backup starts

use crate::config::{Config, CredentialConfig};
use crate::error::{Error, Result};
use crate::utils::body_preview;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Response codes meaning the refresh token is expired or revoked
pub const INVALID_REFRESH_TOKEN_CODES: &[i64] = &[20026, 20037, 20064, 20073, 20074];

/// Path of the token endpoint, relative to the API base URL
const TOKEN_PATH: &str = "/authen/v2/oauth/token";

/// `state` parameter sent to the consent page
const AUTHORIZE_STATE: &str = "get_refresh_token";

/// Persisted tokens
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStore {
    /// Rotating refresh token (a three-part dotted token)
    #[serde(default)]
    pub refresh_token: String,
    /// Last issued access token
    #[serde(default)]
    pub access_token: String,
    /// Lifetime of `access_token` in seconds
    #[serde(default)]
    pub expires_in: i64,
    /// Unix timestamp of the last write
    #[serde(default)]
    pub updated_at: i64,
}

impl TokenStore {
    /// Store holding only a freshly exchanged refresh token
    pub fn with_refresh_token(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            access_token: String::new(),
            expires_in: 0,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Read and validate the store at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Credential(format!(
                    "token store {} not found, run `feishu-backup exchange` first",
                    path.display()
                ))
            } else {
                Error::Credential(format!("cannot read token store {}: {e}", path.display()))
            }
        })?;

        let store: TokenStore = serde_json::from_str(&content).map_err(|e| {
            Error::Credential(format!(
                "token store {} is not valid JSON, run `feishu-backup exchange` again: {e}",
                path.display()
            ))
        })?;
        store.validate()?;
        Ok(store)
    }

    /// Check that the refresh token is present and well-formed
    pub fn validate(&self) -> Result<()> {
        let token = self.refresh_token.trim();
        if token.is_empty() {
            return Err(Error::Credential(
                "refresh_token in token store is empty, run `feishu-backup exchange` again"
                    .to_string(),
            ));
        }
        if token.matches('.').count() != 2 {
            return Err(Error::Credential(
                "refresh_token in token store is malformed, run `feishu-backup exchange` again"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Write the store as pretty-printed JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Body of a token endpoint response
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    /// Result code; anything but 0 is a failure
    #[serde(default = "missing_code")]
    pub code: i64,
    /// New access token
    #[serde(default)]
    pub access_token: Option<String>,
    /// New (rotated) refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn missing_code() -> i64 {
    -1
}

impl TokenResponse {
    fn message(&self) -> &str {
        [&self.error_description, &self.msg, &self.error]
            .into_iter()
            .filter_map(|m| m.as_deref())
            .find(|m| !m.is_empty())
            .unwrap_or("unknown error")
    }
}

/// Client for the OAuth token endpoint
///
/// Token calls are sent once and never retried: a refresh token is single-use.
#[derive(Clone, Debug)]
pub struct OAuthClient {
    http: reqwest::Client,
    token_url: String,
    app_id: String,
    app_secret: String,
}

impl OAuthClient {
    /// Create a client for the configured application
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http.request_timeout)
            .connect_timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            http,
            token_url: format!("{}{}", config.base_url.trim_end_matches('/'), TOKEN_PATH),
            app_id: config.credentials.app_id.clone(),
            app_secret: config.credentials.app_secret.clone(),
        })
    }

    /// Trade a refresh token for a new access token and a rotated refresh token
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let payload = json!({
            "grant_type": "refresh_token",
            "client_id": self.app_id,
            "client_secret": self.app_secret,
            "refresh_token": refresh_token,
        });
        let response = self.post_token(&payload, "refresh user access token").await?;

        if response.code != 0 {
            if INVALID_REFRESH_TOKEN_CODES.contains(&response.code) {
                return Err(Error::Credential(
                    "refresh_token has expired or was revoked, run `feishu-backup authorize-url` and `feishu-backup exchange` again"
                        .to_string(),
                ));
            }
            return Err(Error::Credential(format!(
                "refresh user access token failed: code={}, msg={}",
                response.code,
                response.message()
            )));
        }

        let complete = [&response.access_token, &response.refresh_token]
            .iter()
            .all(|t| t.as_deref().is_some_and(|t| !t.is_empty()));
        if !complete {
            return Err(Error::Credential(
                "token refresh succeeded but the response is missing access_token or refresh_token"
                    .to_string(),
            ));
        }
        Ok(response)
    }

    /// Trade an authorization code for the first refresh token
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String> {
        let payload = json!({
            "grant_type": "authorization_code",
            "client_id": self.app_id,
            "client_secret": self.app_secret,
            "code": code,
            "redirect_uri": redirect_uri,
        });
        let response = self.post_token(&payload, "exchange authorization code").await?;

        if response.code != 0 {
            return Err(Error::Credential(format!(
                "exchange authorization code failed: code={}, msg={}",
                response.code,
                response.message()
            )));
        }

        response
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::Credential(
                    "no refresh_token returned, check that the scopes include offline_access"
                        .to_string(),
                )
            })
    }

    async fn post_token(&self, payload: &Value, action: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.token_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::Credential(format!("{action} request failed: {e}")))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Credential(format!("{action} request failed: {e}")))?;

        if status != 200 {
            return Err(Error::Credential(format!(
                "{action} failed: HTTP {status}, body={}",
                body_preview(&text)
            )));
        }

        serde_json::from_str(&text).map_err(|_| {
            Error::Credential(format!(
                "{action} returned non-JSON: {}",
                body_preview(&text)
            ))
        })
    }
}

/// Consent page URL for the authorization-code flow
///
/// # Examples
///
/// ```
/// use feishu_backup::auth::authorize_url;
/// use feishu_backup::config::CredentialConfig;
///
/// let mut credentials = CredentialConfig::default();
/// credentials.app_id = "cli_a1".to_string();
/// credentials.scopes = "offline_access drive:drive".to_string();
///
/// let url = authorize_url(&credentials);
/// assert!(url.contains("client_id=cli_a1"));
/// assert!(url.contains("scope=offline_access%20drive%3Adrive"));
/// ```
pub fn authorize_url(credentials: &CredentialConfig) -> String {
    let params = [
        ("client_id", credentials.app_id.as_str()),
        ("response_type", "code"),
        ("redirect_uri", credentials.redirect_uri.as_str()),
        ("scope", credentials.scopes.as_str()),
        ("state", AUTHORIZE_STATE),
    ];
    let query = params
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{query}", credentials.authorize_url)
}

/// Extract the authorization code from the URL the browser was redirected to
pub fn parse_callback_code(callback_url: &str) -> Result<String> {
    let parsed = url::Url::parse(callback_url.trim())
        .map_err(|e| Error::Credential(format!("invalid callback URL: {e}")))?;

    let mut code = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "error" => {
                return Err(Error::Credential(format!("authorization failed: {value}")));
            }
            "code" if code.is_none() => code = Some(value.into_owned()),
            _ => {}
        }
    }

    code.filter(|c| !c.is_empty()).ok_or_else(|| {
        Error::Credential("no `code` parameter found in the callback URL".to_string())
    })
}

/// Refresh the stored credentials and return a user access token for this run
///
/// The rotated refresh token is written back before returning, so the store
/// stays usable even if the backup itself fails.
pub async fn obtain_access_token(config: &Config) -> Result<String> {
    config.validate_app_credentials()?;
    let store_path = &config.credentials.token_store;
    let store = TokenStore::load(store_path)?;

    let response = OAuthClient::new(config)?
        .refresh(store.refresh_token.trim())
        .await?;
    let access_token = response.access_token.clone().unwrap_or_default();

    TokenStore {
        refresh_token: response.refresh_token.clone().unwrap_or_default(),
        access_token: access_token.clone(),
        expires_in: response.expires_in.unwrap_or(0),
        updated_at: chrono::Utc::now().timestamp(),
    }
    .save(store_path)?;

    info!(
        token_store = %store_path.display(),
        expires_in = response.expires_in.unwrap_or(0),
        "user access token refreshed"
    );
    Ok(access_token)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_REFRESH: &str = "ur-aaa.bbb.ccc";

    fn config_for(server: &MockServer, store: &Path) -> Config {
        let mut config = Config::default();
        config.base_url = server.uri();
        config.credentials.app_id = "cli_test".to_string();
        config.credentials.app_secret = "secret".to_string();
        config.credentials.token_store = store.to_path_buf();
        config
    }

    // =========================================================================
    // Token store
    // =========================================================================

    #[test]
    fn load_rejects_missing_empty_and_malformed_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token_store.json");

        let missing = TokenStore::load(&path).unwrap_err();
        assert!(missing.to_string().contains("not found"), "got: {missing}");

        std::fs::write(&path, "{ not json").unwrap();
        assert!(TokenStore::load(&path).is_err());

        std::fs::write(&path, r#"{"refresh_token": "  "}"#).unwrap();
        let empty = TokenStore::load(&path).unwrap_err();
        assert!(empty.to_string().contains("empty"), "got: {empty}");

        std::fs::write(&path, r#"{"refresh_token": "one.two"}"#).unwrap();
        let malformed = TokenStore::load(&path).unwrap_err();
        assert!(malformed.to_string().contains("malformed"), "got: {malformed}");
    }

    #[test]
    fn save_then_load_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/token_store.json");
        let store = TokenStore {
            refresh_token: VALID_REFRESH.to_string(),
            access_token: "u-access".to_string(),
            expires_in: 7200,
            updated_at: 1_700_000_000,
        };

        store.save(&path).unwrap();

        assert_eq!(TokenStore::load(&path).unwrap(), store);
    }

    // =========================================================================
    // Authorization code flow
    // =========================================================================

    #[test]
    fn authorize_url_encodes_every_parameter() {
        let mut credentials = CredentialConfig::default();
        credentials.app_id = "cli_x".to_string();
        credentials.redirect_uri = "https://backup.example.org/cb?x=1".to_string();

        let url = authorize_url(&credentials);

        assert!(url.starts_with("https://accounts.feishu.cn/open-apis/authen/v1/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("state=get_refresh_token"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fbackup.example.org%2Fcb%3Fx%3D1"));
        assert!(url.contains("scope=offline_access%20"));
    }

    #[test]
    fn callback_code_is_extracted() {
        let code =
            parse_callback_code("https://backup.example.org/cb?code=abc123&state=get_refresh_token")
                .unwrap();
        assert_eq!(code, "abc123");
    }

    #[test]
    fn callback_error_or_missing_code_is_rejected() {
        let denied = parse_callback_code("https://backup.example.org/cb?error=access_denied")
            .unwrap_err();
        assert!(denied.to_string().contains("access_denied"), "got: {denied}");

        assert!(parse_callback_code("https://backup.example.org/cb?state=x").is_err());
        assert!(parse_callback_code("not a url").is_err());
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    #[tokio::test]
    async fn obtain_access_token_rotates_and_persists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authen/v2/oauth/token"))
            .and(body_partial_json(json!({
                "grant_type": "refresh_token",
                "client_id": "cli_test",
                "refresh_token": VALID_REFRESH,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "access_token": "u-new-access",
                "refresh_token": "ur-new.rotated.token",
                "expires_in": 7200,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("token_store.json");
        TokenStore::with_refresh_token(VALID_REFRESH)
            .save(&store_path)
            .unwrap();

        let access = obtain_access_token(&config_for(&server, &store_path))
            .await
            .unwrap();

        assert_eq!(access, "u-new-access");
        let saved = TokenStore::load(&store_path).unwrap();
        assert_eq!(saved.refresh_token, "ur-new.rotated.token");
        assert_eq!(saved.access_token, "u-new-access");
        assert_eq!(saved.expires_in, 7200);
        assert!(saved.updated_at > 0);
    }

    #[tokio::test]
    async fn dead_refresh_token_asks_for_reauthorization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authen/v2/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 20037,
                "error": "invalid_grant",
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = OAuthClient::new(&config_for(&server, &dir.path().join("s.json"))).unwrap();

        let err = client.refresh(VALID_REFRESH).await.unwrap_err();
        assert!(err.to_string().contains("authorize-url"), "got: {err}");
    }

    #[tokio::test]
    async fn refresh_rejects_http_errors_and_incomplete_responses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"refresh_token": "a.b.http"})))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"refresh_token": "a.b.partial"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"code": 0, "access_token": "u-only"})),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = OAuthClient::new(&config_for(&server, &dir.path().join("s.json"))).unwrap();

        let http = client.refresh("a.b.http").await.unwrap_err();
        assert!(http.to_string().contains("HTTP 500"), "got: {http}");
        assert!(http.to_string().contains("upstream down"), "got: {http}");

        let partial = client.refresh("a.b.partial").await.unwrap_err();
        assert!(partial.to_string().contains("missing"), "got: {partial}");
    }

    #[tokio::test]
    async fn exchange_code_returns_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authen/v2/oauth/token"))
            .and(body_partial_json(json!({
                "grant_type": "authorization_code",
                "code": "abc123",
                "redirect_uri": "https://backup.example.org/cb",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "access_token": "u-first",
                "refresh_token": "ur-first.refresh.token",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = OAuthClient::new(&config_for(&server, &dir.path().join("s.json"))).unwrap();

        let refresh = client
            .exchange_code("abc123", "https://backup.example.org/cb")
            .await
            .unwrap();
        assert_eq!(refresh, "ur-first.refresh.token");
    }
}
