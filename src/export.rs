//! Export task state machine
//!
//! A document is exported in four steps:
//! 1. Wiki wrappers are resolved to their underlying object
//! 2. An export task is submitted for the chosen [`ExportFormat`]
//! 3. The task is polled until it succeeds, fails or exceeds `max_wait`
//! 4. The resulting [`ExportArtifact`] is streamed to disk
//!
//! The task status comes in two shapes (numeric `job_status` or textual
//! `status`); both are folded into a [`StatusReport`] and interpreted by
//! [`classify`].

use crate::client::ApiClient;
use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::remote::ExportTaskResult;
use crate::types::{ExportTicket, FileInfo, FileType};
use crate::utils::{export_file_name, get_unique_path, raw_file_name};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Target format of an export
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    /// Word document
    Docx,
    /// Excel workbook
    Xlsx,
    /// PowerPoint deck
    Pptx,
    /// PDF, for every other type
    Pdf,
}

impl ExportFormat {
    /// Format used for a remote object type
    pub fn for_type(file_type: &FileType) -> Self {
        match file_type {
            FileType::Doc | FileType::Docx => ExportFormat::Docx,
            FileType::Sheet | FileType::Bitable => ExportFormat::Xlsx,
            FileType::Slides => ExportFormat::Pptx,
            _ => ExportFormat::Pdf,
        }
    }

    /// File extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Docx => "docx",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Pptx => "pptx",
            ExportFormat::Pdf => "pdf",
        }
    }
}

/// Status of an export task as reported by one query
#[derive(Clone, Debug, PartialEq)]
pub enum StatusReport {
    /// Numeric `job_status` with its optional failure message
    JobCode {
        /// Raw `job_status` value
        code: Value,
        /// `job_error_msg`, if any
        error: Option<String>,
    },
    /// Textual `status` with its optional failure message
    Label {
        /// Lower-cased status label
        label: String,
        /// `error_msg`, if any
        error: Option<String>,
    },
    /// Neither field present
    Missing,
}

impl From<&ExportTaskResult> for StatusReport {
    fn from(result: &ExportTaskResult) -> Self {
        if let Some(code) = &result.job_status {
            return StatusReport::JobCode {
                code: code.clone(),
                error: result.job_error_msg.clone().filter(|m| !m.is_empty()),
            };
        }

        let label = match &result.status {
            Some(Value::String(s)) => s.trim().to_lowercase(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string().to_lowercase(),
        };
        if label.is_empty() {
            return StatusReport::Missing;
        }
        StatusReport::Label {
            label,
            error: result.error_msg.clone().filter(|m| !m.is_empty()),
        }
    }
}

const PROCESSING_LABELS: &[&str] = &["processing", "running", "queued", "pending"];
const SUCCESS_LABELS: &[&str] = &["success", "succeeded", "done"];
const FAILED_LABELS: &[&str] = &["failed", "error"];

impl StatusReport {
    /// Whether the report matches a known state; unknown ones are polled on
    pub fn is_recognized(&self) -> bool {
        match self {
            StatusReport::JobCode { .. } => true,
            StatusReport::Label { label, .. } => {
                let label = label.as_str();
                PROCESSING_LABELS.contains(&label)
                    || SUCCESS_LABELS.contains(&label)
                    || FAILED_LABELS.contains(&label)
            }
            StatusReport::Missing => false,
        }
    }
}

/// Interpreted state of an export task
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportStatus {
    /// Still running (also used for unrecognized states)
    Processing,
    /// Finished, artifact available
    Success,
    /// Finished with an error message
    Failed(String),
}

/// Interpret a status report
///
/// Never fails: anything unrecognized is treated as still processing, which
/// leaves the decision to the `max_wait` bound.
pub fn classify(report: &StatusReport) -> ExportStatus {
    match report {
        StatusReport::JobCode { code, error } => match code.as_i64() {
            Some(0) => ExportStatus::Success,
            Some(1) | Some(2) => ExportStatus::Processing,
            _ => ExportStatus::Failed(
                error
                    .clone()
                    .unwrap_or_else(|| format!("job_status={code}")),
            ),
        },
        StatusReport::Label { label, error } => {
            let label = label.as_str();
            if SUCCESS_LABELS.contains(&label) {
                ExportStatus::Success
            } else if FAILED_LABELS.contains(&label) {
                ExportStatus::Failed(error.clone().unwrap_or_else(|| "export failed".to_string()))
            } else {
                ExportStatus::Processing
            }
        }
        StatusReport::Missing => ExportStatus::Processing,
    }
}

/// Where the exported bytes can be fetched from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportArtifact {
    /// Artifact token for the authenticated download endpoint
    FileToken(String),
    /// Pre-signed URL, fetched without credentials
    Url(String),
}

impl ExportArtifact {
    /// Pick the artifact of a successful task; the file token wins over a URL
    pub fn from_result(result: &ExportTaskResult) -> Option<Self> {
        let nested = result.file.as_ref();
        let token = non_empty(result.file_token.as_deref())
            .or_else(|| non_empty(nested.and_then(|f| f.token.as_deref())));
        if let Some(token) = token {
            return Some(ExportArtifact::FileToken(token.to_string()));
        }

        non_empty(nested.and_then(|f| f.url.as_deref()))
            .or_else(|| non_empty(result.url.as_deref()))
            .map(|url| ExportArtifact::Url(url.to_string()))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Runs export tasks and writes their results
pub struct Exporter<'a> {
    client: &'a ApiClient,
    config: &'a ExportConfig,
}

impl<'a> Exporter<'a> {
    /// Create an exporter using `client` and the polling settings in `config`
    pub fn new(client: &'a ApiClient, config: &'a ExportConfig) -> Self {
        Self { client, config }
    }

    /// Export `file` into `local_dir` and return the written path
    pub async fn export_to(&self, file: &FileInfo, local_dir: &Path) -> Result<PathBuf> {
        let (token, file_type) = if file.file_type == FileType::Wiki {
            let resolved = self.client.resolve_wiki_node(&file.token).await?;
            debug!(
                wiki_token = %file.token,
                obj_token = %resolved.0,
                obj_type = %resolved.1,
                "resolved wiki node"
            );
            resolved
        } else {
            (file.token.clone(), file.file_type.clone())
        };

        let format = ExportFormat::for_type(&file_type);
        let ticket = self
            .client
            .create_export_task(&token, &file_type, format.extension())
            .await?;
        debug!(ticket = %ticket, token = %token, extension = format.extension(), "export task submitted");

        let artifact = self.wait(&ticket, &token).await?;
        let response = match &artifact {
            ExportArtifact::FileToken(artifact_token) => {
                self.client.fetch_export_artifact(artifact_token).await?
            }
            ExportArtifact::Url(url) => self.client.fetch_export_url(url).await?,
        };

        let target = local_dir.join(export_file_name(&file.name, format.extension()));
        stream_to_file(response, &target).await
    }

    /// Download an uploaded file without conversion
    pub async fn download_raw(&self, file: &FileInfo, local_dir: &Path) -> Result<PathBuf> {
        let response = self.client.fetch_raw_file(&file.token).await?;
        let target = local_dir.join(raw_file_name(&file.name));
        stream_to_file(response, &target).await
    }

    /// Poll a task until it reaches a terminal state or `max_wait` elapses
    pub async fn wait(&self, ticket: &ExportTicket, file_token: &str) -> Result<ExportArtifact> {
        let started = Instant::now();
        let mut warned_unrecognized = false;

        loop {
            let result = self.client.query_export_task(ticket, file_token).await?;
            let report = StatusReport::from(&result);

            match classify(&report) {
                ExportStatus::Success => {
                    return ExportArtifact::from_result(&result).ok_or_else(|| {
                        ExportError::MissingArtifact {
                            ticket: ticket.to_string(),
                        }
                        .into()
                    });
                }
                ExportStatus::Failed(message) => {
                    return Err(ExportError::Failed {
                        ticket: ticket.to_string(),
                        message,
                    }
                    .into());
                }
                ExportStatus::Processing => {
                    if !report.is_recognized() && !warned_unrecognized {
                        warn!(ticket = %ticket, report = ?report, "unrecognized export status, still polling");
                        warned_unrecognized = true;
                    }
                    debug!(
                        ticket = %ticket,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "export task processing"
                    );
                }
            }

            if started.elapsed() > self.config.max_wait {
                return Err(ExportError::TimedOut {
                    ticket: ticket.to_string(),
                    waited: self.config.max_wait,
                }
                .into());
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

/// Stream a response body to a fresh file next to `target`
///
/// Parent directories are created, the path is made unique right before the
/// file is opened, and a partially written file is removed if the body fails.
pub async fn stream_to_file(mut response: reqwest::Response, target: &Path) -> Result<PathBuf> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let path = get_unique_path(target)?;
    let mut file = tokio::fs::File::create(&path).await?;

    let written = async {
        let mut bytes: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;
        Ok::<_, crate::error::Error>(bytes)
    }
    .await;

    match written {
        Ok(bytes) => {
            info!(path = %path.display(), bytes, "saved");
            Ok(path)
        }
        Err(e) => {
            drop(file);
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %remove_err, "failed to remove partial file");
            }
            Err(e)
        }
    }
}
