//! Drive mode: mirror the folder tree starting at the root folder.

use crate::types::RunStats;
use crate::utils::{get_unique_path, sanitize_filename};
use futures::StreamExt;
use std::path::Path;
use tracing::{error, info};

use super::{BackupRunner, container_label};

impl BackupRunner {
    /// Walk one drive folder (`None` = root) into `local_dir`
    ///
    /// Subfolders become uniquely named subdirectories; every other entry is
    /// handed to [`process_file`](BackupRunner::process_file). A listing that
    /// fails after retries is recorded and the walk moves on to the next
    /// sibling of this folder.
    pub(crate) async fn walk_drive_folder(
        &self,
        folder_token: Option<&str>,
        local_dir: &Path,
        stats: &mut RunStats,
    ) {
        let folder_label = folder_token.unwrap_or("root");
        if let Err(e) = tokio::fs::create_dir_all(local_dir).await {
            error!(path = %local_dir.display(), error = %e, "cannot create folder");
            stats.record_failure(
                container_label(local_dir),
                folder_label,
                format!("folder_error={e}"),
            );
            return;
        }

        let mut entries = std::pin::pin!(self.client.folder_entries(folder_token));

        while let Some(entry) = entries.next().await {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    error!(folder = %folder_label, error = %e, "folder listing failed");
                    stats.record_failure(
                        container_label(local_dir),
                        folder_label,
                        format!("listing_error={e}"),
                    );
                    return;
                }
            };

            let name = entry.display_name();
            if !entry.is_folder() {
                match entry.to_file_info() {
                    Ok(file) => self.process_file(&file, local_dir, stats).await,
                    Err(e) => {
                        error!(name = %name, error = %e, "unusable folder entry");
                        stats.record_failure(
                            name,
                            entry.token.as_deref().unwrap_or("<unknown>"),
                            format!("entry_error={e}"),
                        );
                    }
                }
                continue;
            }

            let Some(child_token) = entry.token.as_deref().filter(|t| !t.is_empty()) else {
                error!(name = %name, "folder entry has no token");
                stats.record_failure(name, "<unknown>", "missing folder token for child traversal");
                continue;
            };

            stats.folders += 1;
            let subfolder = match get_unique_path(&local_dir.join(sanitize_filename(name))) {
                Ok(path) => path,
                Err(e) => {
                    error!(name = %name, error = %e, "no usable directory name");
                    stats.record_failure(name, child_token, format!("folder_error={e}"));
                    continue;
                }
            };

            info!(path = %subfolder.display(), "entering folder");
            Box::pin(self.walk_drive_folder(Some(child_token), &subfolder, stats)).await;
        }
    }
}
