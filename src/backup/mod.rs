//! Backup runner split into focused submodules.
//!
//! The `BackupRunner` struct and its methods are organized by domain:
//! - [`drive`] - Recursive walk of the drive folder tree
//! - [`library`] - Recursive walk of the wiki-style library tree
//! - [`process`] - Per-file export with raw-download fallback
//!
//! Everything runs strictly in sequence: one request in flight, one file
//! written at a time. Per-item failures are recorded in [`RunStats`] and never
//! abort the walk.

mod drive;
mod library;
mod process;


use crate::client::ApiClient;
use crate::config::{BackupSource, Config};
use crate::error::Result;
use crate::export::Exporter;
use crate::types::{RunReport, RunStats};
use std::path::Path;
use tracing::info;

/// Walks one remote namespace and mirrors it to a local directory
pub struct BackupRunner {
    client: ApiClient,
    config: Config,
}

impl BackupRunner {
    /// Create a runner from an authenticated client and the run configuration
    pub fn new(client: ApiClient, config: Config) -> Self {
        Self { client, config }
    }

    /// Back up the configured source into `output_dir`
    ///
    /// Only a failure to create `output_dir` itself is returned as an error;
    /// everything below it ends up in the report's failure list.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use feishu_backup::*;
    /// # async fn example(config: Config, token: String) -> Result<()> {
    /// let client = ApiClient::new(&config, token)?;
    /// let output_dir = config.run_output_dir(&chrono::Local::now());
    /// let report = BackupRunner::new(client, config).run(&output_dir).await?;
    /// println!("{report}");
    /// std::process::exit(report.exit_code());
    /// # }
    /// ```
    pub async fn run(&self, output_dir: &Path) -> Result<RunReport> {
        tokio::fs::create_dir_all(output_dir).await?;

        let mut stats = RunStats::default();
        match self.config.source {
            BackupSource::Drive => {
                info!(output_dir = %output_dir.display(), "starting backup of drive root folder");
                self.walk_drive_folder(None, output_dir, &mut stats).await;
            }
            BackupSource::MyLibrary => {
                info!(
                    output_dir = %output_dir.display(),
                    space_id = %self.config.space_id,
                    "starting backup of library space"
                );
                self.walk_library(None, output_dir, &mut stats).await;
            }
        }

        info!(
            folders = stats.folders,
            files = stats.files,
            exported = stats.exported,
            fallback_downloaded = stats.fallback_downloaded,
            failed = stats.failed,
            "backup finished"
        );

        Ok(RunReport {
            output_dir: output_dir.to_path_buf(),
            stats,
        })
    }

    fn exporter(&self) -> Exporter<'_> {
        Exporter::new(&self.client, &self.config.export)
    }
}

/// Name of a local container directory, used when a listing fails
fn container_label(local_dir: &Path) -> String {
    local_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| local_dir.display().to_string())
}
