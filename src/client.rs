//! Authenticated HTTP client for the open API
//!
//! [`ApiClient`] has two call shapes: JSON calls, which unwrap the
//! `{code, msg, data}` envelope and only succeed on `code == 0`, and binary
//! calls, which hand back the streaming response. Both run every attempt
//! through [`with_retry`](crate::retry::with_retry).

use crate::config::{Config, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::{parse_retry_after, with_retry};
use crate::utils::body_preview;
use reqwest::Method;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Timeout for establishing a TCP/TLS connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Where a binary download comes from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadTarget<'a> {
    /// API path relative to the base URL, fetched with the bearer token
    Path(&'a str),
    /// Absolute pre-signed URL, fetched without credentials
    Url(&'a str),
}

/// JSON envelope wrapping every API response
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

impl ApiEnvelope {
    /// Parse a response body, mapping anything that is not an envelope to code -1
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| ApiEnvelope {
            code: -1,
            msg: Some(format!("Non-JSON response: {}", body_preview(body))),
            data: None,
        })
    }
}

/// Client for the open API, bound to one user access token
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    retry: RetryConfig,
    request_timeout: Duration,
    download_timeout: Duration,
}

impl ApiClient {
    /// Create a client for `config.base_url` authenticated with `access_token`
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &Config, access_token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("feishu-backup/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            retry: config.retry.clone(),
            request_timeout: config.http.request_timeout,
            download_timeout: config.http.download_timeout,
        })
    }

    /// Absolute URL of an API path
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET` a JSON endpoint and decode its `data` field
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.call_json(Method::GET, path, query, None).await
    }

    /// `POST` a JSON body and decode the response's `data` field
    pub async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        self.call_json(Method::POST, path, &[], Some(body)).await
    }

    /// Start a binary download and return the response once headers arrived
    ///
    /// The caller streams the body; it must arrive within the download timeout.
    pub async fn download(&self, target: DownloadTarget<'_>) -> Result<reqwest::Response> {
        let (url, with_auth) = match target {
            DownloadTarget::Path(path) => (self.endpoint(path), true),
            DownloadTarget::Url(url) => (url.to_string(), false),
        };
        let label = redact_query(&url);
        let (url, label) = (url.as_str(), label.as_str());

        with_retry(&self.retry, label, move || {
            self.download_attempt(url, label, with_auth)
        })
        .await
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T> {
        let url = self.endpoint(path);
        let url = url.as_str();
        let method = &method;

        let data = with_retry(&self.retry, path, move || {
            self.json_attempt(method.clone(), url, query, body)
        })
        .await?;

        Ok(serde_json::from_value(data)?)
    }

    async fn json_attempt(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(&self.access_token)
            .timeout(self.request_timeout);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        if self.retry.is_retryable_status(status) {
            return Err(transient(status, url, &response));
        }

        let text = response.text().await?;
        let envelope = ApiEnvelope::parse(&text);
        if status >= 400 || envelope.code != 0 {
            return Err(Error::Api {
                code: envelope.code,
                message: envelope
                    .msg
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| format!("HTTP {status}")),
                http_status: status,
                retryable: self.retry.is_retryable_code(envelope.code),
            });
        }

        Ok(match envelope.data {
            Some(Value::Null) | None => Value::Object(Default::default()),
            Some(data) => data,
        })
    }

    async fn download_attempt(
        &self,
        url: &str,
        label: &str,
        with_auth: bool,
    ) -> Result<reqwest::Response> {
        let mut request = self.http.get(url).timeout(self.download_timeout);
        if with_auth {
            request = request.bearer_auth(&self.access_token);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        if self.retry.is_retryable_status(status) {
            return Err(transient(status, label, &response));
        }
        if status >= 400 {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::HttpStatus {
                status,
                url: label.to_string(),
                preview: body_preview(&text),
            });
        }

        Ok(response)
    }
}

fn transient(status: u16, url: &str, response: &reqwest::Response) -> Error {
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    Error::TransientHttp {
        status,
        url: url.to_string(),
        retry_after,
    }
}

/// Drop the query string of a URL so signatures never reach logs or reports
fn redact_query(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.to_string()
        }
        Err(_) => raw.split('?').next().unwrap_or(raw).to_string(),
    }
}
