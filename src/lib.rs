//! # feishu-backup
//!
//! Backup library for Feishu/Lark cloud documents.
//!
//! Walks either the drive folder tree or a wiki-style library space, exports
//! every online document to an office format (docx, xlsx, pptx or pdf) and
//! mirrors the remote hierarchy into a local directory.
//!
//! ## Design Philosophy
//!
//! - **Keep going** - A failed document is recorded and the run continues
//! - **Never overwrite** - Colliding names get a ` (n)` suffix
//! - **Bounded** - Retries and export polling always give up eventually
//! - **Sequential** - One request in flight, one file written at a time
//!
//! ## Quick Start
//!
//! ```no_run
//! use feishu_backup::{ApiClient, BackupRunner, Config, obtain_access_token};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file(Path::new("backup.json"))?;
//!     config.validate()?;
//!
//!     let access_token = obtain_access_token(&config).await?;
//!     let output_dir = config.run_output_dir(&chrono::Local::now());
//!     let client = ApiClient::new(&config, access_token)?;
//!
//!     let report = BackupRunner::new(client, config).run(&output_dir).await?;
//!     println!("{report}");
//!     std::process::exit(report.exit_code());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// User access token management and the authorization-code flow
pub mod auth;
/// Backup runner and tree walkers (decomposed into focused submodules)
pub mod backup;
/// Command-line interface
pub mod cli;
/// Authenticated HTTP client with retries
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Export task state machine
pub mod export;
/// Cursor-based pagination
pub mod pagination;
/// Typed wrappers around the remote endpoints
pub mod remote;
/// Retry logic with linear backoff
pub mod retry;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use auth::{OAuthClient, TokenStore, obtain_access_token};
pub use backup::BackupRunner;
pub use client::ApiClient;
pub use config::{BackupSource, Config};
pub use error::{Error, ExportError, Result};
pub use export::{ExportArtifact, ExportFormat, ExportStatus, Exporter, StatusReport, classify};
pub use types::{FailureRecord, FileInfo, FileType, RunReport, RunStats};
