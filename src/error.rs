//! Error types for feishu-backup
//!
//! This module provides the error handling for the library:
//! - Transport and HTTP-level failures raised by the resilient client
//! - Application-level API failures (non-zero `code` in the JSON envelope)
//! - Export task failures (job failed, timed out, no artifact)
//! - Traversal anomalies, configuration and credential errors

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for feishu-backup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for feishu-backup
///
/// Per-document errors are caught at the dispatch boundary and recorded in the
/// run's failure list, so the `Display` output of every variant carries enough
/// context to diagnose a failure without re-running.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "credentials.app_id")
        key: Option<String>,
    },

    /// Credential bootstrap or refresh failed
    #[error("credential error: {0}")]
    Credential(String),

    /// HTTP status in the retryable set (429/5xx by default)
    #[error("HTTP {status} from {url}")]
    TransientHttp {
        /// Response status code
        status: u16,
        /// Requested URL
        url: String,
        /// Delay requested by the server through a numeric `Retry-After` header
        retry_after: Option<Duration>,
    },

    /// Non-retryable HTTP failure on a binary download
    #[error("binary download failed: http={status}, url={url}, body={preview}")]
    HttpStatus {
        /// Response status code
        status: u16,
        /// Requested URL
        url: String,
        /// Truncated response body
        preview: String,
    },

    /// The API answered with an error code (or an unusable payload)
    #[error("API request failed: {message} (code={code}, http={http_status})")]
    Api {
        /// Application-level code embedded in the JSON envelope (-1 for non-JSON bodies)
        code: i64,
        /// Message embedded in the envelope, or a body preview
        message: String,
        /// HTTP status of the response
        http_status: u16,
        /// Whether the code belongs to the configured retryable set
        retryable: bool,
    },

    /// A retryable failure persisted through every allowed attempt
    #[error("request failed after {attempts} attempts: {target} ({source})")]
    RetriesExhausted {
        /// Number of requests issued
        attempts: u32,
        /// Path or URL that was requested
        target: String,
        /// The last failure observed
        #[source]
        source: Box<Error>,
    },

    /// Export task error
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// Structural anomaly in the remote tree (e.g. a child-bearing node without a token)
    #[error("traversal error: {0}")]
    Traversal(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport error from the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No unused file name could be found for a target path
    #[error("file collision at {path}: {reason}")]
    FileCollision {
        /// The path where the collision occurred
        path: PathBuf,
        /// Why no alternative could be used
        reason: String,
    },
}

/// Export task errors
#[derive(Debug, Error)]
pub enum ExportError {
    /// The export task was created but the response carried no ticket
    #[error("export task created but no ticket returned")]
    MissingTicket,

    /// The remote service reported a terminal job failure
    #[error("export task {ticket} failed: {message}")]
    Failed {
        /// Ticket of the failed task
        ticket: String,
        /// Failure message reported by the service
        message: String,
    },

    /// Polling exceeded the maximum wait
    #[error("export task timeout after {}s (ticket={ticket})", .waited.as_secs_f64())]
    TimedOut {
        /// Ticket of the task that never finished
        ticket: String,
        /// Configured maximum wait
        waited: Duration,
    },

    /// The task succeeded but neither a file token nor a URL was returned
    #[error("export task {ticket} succeeded without a file token or URL")]
    MissingArtifact {
        /// Ticket of the task
        ticket: String,
    },

    /// A wiki node resolved without an underlying object
    #[error("wiki node {token} resolved without obj_token/obj_type")]
    UnresolvedWikiNode {
        /// The wiki wrapper token
        token: String,
    },
}

impl Error {
    /// Build a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Delay explicitly requested by the server for this failure, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::TransientHttp { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
