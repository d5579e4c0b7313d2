//! Library mode: mirror the wiki-style node tree of one space.
//!
//! A node is a document and, when `has_child` is set, also a container. The
//! document is always saved first, then its children are walked inside a
//! subdirectory named after the node.

use crate::types::{LibraryNode, RunStats};
use crate::utils::{get_unique_path, sanitize_filename};
use futures::StreamExt;
use std::path::Path;
use tracing::{error, info};

use super::{BackupRunner, container_label};

impl BackupRunner {
    /// Walk the nodes under `parent_node_token` (`None` = top level) into `local_dir`
    pub(crate) async fn walk_library(
        &self,
        parent_node_token: Option<&str>,
        local_dir: &Path,
        stats: &mut RunStats,
    ) {
        let parent_label = parent_node_token.unwrap_or("root");
        if let Err(e) = tokio::fs::create_dir_all(local_dir).await {
            error!(path = %local_dir.display(), error = %e, "cannot create node directory");
            stats.record_failure(
                container_label(local_dir),
                parent_label,
                format!("node_error={e}"),
            );
            return;
        }

        let mut nodes = std::pin::pin!(
            self.client
                .library_nodes(&self.config.space_id, parent_node_token)
        );

        while let Some(node) = nodes.next().await {
            match node {
                Ok(node) => self.process_library_node(&node, local_dir, stats).await,
                Err(e) => {
                    error!(parent = %parent_label, error = %e, "node listing failed");
                    stats.record_failure(
                        container_label(local_dir),
                        parent_label,
                        format!("listing_error={e}"),
                    );
                    return;
                }
            }
        }
    }

    /// Save a node's own document, then descend into its children
    pub(crate) async fn process_library_node(
        &self,
        node: &LibraryNode,
        local_dir: &Path,
        stats: &mut RunStats,
    ) {
        let node_name = node.display_name();
        let node_token = node.child_parent_token().unwrap_or("<unknown>");

        match node.to_file_info() {
            Ok(file) => self.process_file(&file, local_dir, stats).await,
            Err(e) => {
                error!(name = %node_name, node_token = %node_token, error = %e, "node failed");
                stats.record_failure(node_name, node_token, format!("node_error={e}"));
            }
        }

        if !node.has_child {
            return;
        }

        let Some(child_parent) = node.child_parent_token() else {
            error!(name = %node_name, "node has children but no node_token");
            stats.record_failure(
                node_name,
                node_token,
                "missing node_token for child traversal",
            );
            return;
        };

        stats.folders += 1;
        let subfolder = match get_unique_path(&local_dir.join(sanitize_filename(node_name))) {
            Ok(path) => path,
            Err(e) => {
                error!(name = %node_name, error = %e, "no usable directory name");
                stats.record_failure(node_name, child_parent, format!("node_error={e}"));
                return;
            }
        };

        info!(path = %subfolder.display(), "entering library node");
        Box::pin(self.walk_library(Some(child_parent), &subfolder, stats)).await;
    }
}
