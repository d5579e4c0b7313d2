//! Per-file dispatch: export first, raw download as fallback for uploads.

use crate::types::{FileInfo, FileType, RunStats};
use std::path::Path;
use tracing::{error, info, warn};

use super::BackupRunner;

impl BackupRunner {
    /// Save one remote object into `local_dir` and record the outcome
    ///
    /// Every call counts as a processed file. Export is always tried first;
    /// only uploaded files (`file` type) fall back to a raw download.
    pub(crate) async fn process_file(&self, file: &FileInfo, local_dir: &Path, stats: &mut RunStats) {
        stats.files += 1;
        info!(
            name = %file.name,
            file_type = %file.file_type,
            token = %file.token,
            "processing file"
        );

        let exporter = self.exporter();
        let export_error = match exporter.export_to(file, local_dir).await {
            Ok(path) => {
                stats.exported += 1;
                info!(path = %path.display(), "exported");
                return;
            }
            Err(e) => e,
        };

        if file.file_type != FileType::File {
            error!(name = %file.name, token = %file.token, error = %export_error, "file failed");
            stats.record_failure(
                &file.name,
                &file.token,
                format!("export_error={export_error}"),
            );
            return;
        }

        warn!(
            name = %file.name,
            token = %file.token,
            error = %export_error,
            "export failed, falling back to direct download"
        );
        match exporter.download_raw(file, local_dir).await {
            Ok(path) => {
                stats.fallback_downloaded += 1;
                warn!(path = %path.display(), "saved through direct download (not converted)");
            }
            Err(download_error) => {
                error!(
                    name = %file.name,
                    token = %file.token,
                    export_error = %export_error,
                    download_error = %download_error,
                    "file failed"
                );
                stats.record_failure(
                    &file.name,
                    &file.token,
                    format!("export_error={export_error}; download_error={download_error}"),
                );
            }
        }
    }
}
