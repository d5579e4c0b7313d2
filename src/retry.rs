//! Retry logic with linear backoff
//!
//! Every API call runs through [`with_retry`]: an attempt that fails with a
//! retryable error (see [`IsRetryable`]) is repeated after a delay until
//! `max_attempts` requests have been issued. The delay is the server's
//! `Retry-After` when it sent a numeric one, else `attempt * backoff_step`.
//!
//! # Example
//!
//! ```no_run
//! use feishu_backup::config::RetryConfig;
//! use feishu_backup::error::Error;
//! use feishu_backup::retry::with_retry;
//!
//! # async fn example() -> Result<(), Error> {
//! let config = RetryConfig::default();
//! let listing = with_retry(&config, "/drive/v1/files", || async {
//!     // Your request here
//!     Ok::<_, Error>("page")
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, refused connections, 429/5xx, rate-limit
/// codes) should return `true`. Everything else is final.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Transport failures: connect errors, timeouts, failed sends
            Error::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            // Status was classified against the configured set when raised
            Error::TransientHttp { .. } => true,
            Error::Api { retryable, .. } => *retryable,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Config { .. }
            | Error::Credential(_)
            | Error::HttpStatus { .. }
            | Error::RetriesExhausted { .. }
            | Error::Export(_)
            | Error::Traversal(_)
            | Error::Serialization(_)
            | Error::FileCollision { .. } => false,
        }
    }
}

/// Delay before the attempt following attempt number `attempt` (1-based)
///
/// A server-provided delay wins; otherwise the backoff grows linearly.
pub fn backoff_delay(config: &RetryConfig, attempt: u32, retry_after: Option<Duration>) -> Duration {
    retry_after.unwrap_or_else(|| config.backoff_step.saturating_mul(attempt))
}

/// Parse a `Retry-After` header value given in whole seconds
///
/// HTTP-date values and anything non-numeric are ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<u64>().ok().map(Duration::from_secs)
}

/// Execute an async operation with bounded retries
///
/// # Arguments
///
/// * `config` - Retry configuration (attempt ceiling, backoff step)
/// * `target` - Path or URL being requested, used in logs and errors
/// * `operation` - Async closure performing one attempt
///
/// # Returns
///
/// The first successful result. A non-retryable error is returned as is; a
/// retryable error that survives every attempt is wrapped in
/// [`Error::RetriesExhausted`].
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, target: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt: u32 = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(target = %target, attempts = attempt, "request succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = backoff_delay(config, attempt, e.retry_after());

                tracing::warn!(
                    target = %target,
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "request failed, retrying"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) if e.is_retryable() => {
                tracing::error!(
                    target = %target,
                    error = %e,
                    attempts = attempt,
                    "request failed after all retry attempts exhausted"
                );
                return Err(Error::RetriesExhausted {
                    attempts: attempt,
                    target: target.to_string(),
                    source: Box::new(e),
                });
            }
            Err(e) => return Err(e),
        }
    }
}
