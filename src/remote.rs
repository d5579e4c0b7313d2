//! Typed wrappers around the drive, wiki and export endpoints

use crate::client::{ApiClient, DownloadTarget};
use crate::error::{ExportError, Result};
use crate::pagination::paginate;
use crate::types::{DriveEntry, ExportTicket, FileType, LibraryNode, Page, null_as_default};
use futures::Stream;
use serde::Deserialize;
use serde_json::{Value, json};

/// Page size for drive folder listings (API maximum)
pub const DRIVE_PAGE_SIZE: u32 = 200;

/// Page size for library node listings (API maximum)
pub const LIBRARY_PAGE_SIZE: u32 = 50;

#[derive(Debug, Default, Deserialize)]
struct FolderListing {
    #[serde(default)]
    files: Option<Vec<DriveEntry>>,
    #[serde(default, deserialize_with = "null_as_default")]
    has_more: bool,
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    page_token: Option<String>,
}

impl From<FolderListing> for Page<DriveEntry> {
    fn from(listing: FolderListing) -> Self {
        let next_cursor = listing
            .next_page_token
            .filter(|t| !t.is_empty())
            .or(listing.page_token.filter(|t| !t.is_empty()));
        Page {
            items: listing.files.unwrap_or_default(),
            has_more: listing.has_more,
            next_cursor,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct NodeListing {
    #[serde(default)]
    items: Option<Vec<LibraryNode>>,
    #[serde(default, deserialize_with = "null_as_default")]
    has_more: bool,
    #[serde(default)]
    page_token: Option<String>,
}

impl From<NodeListing> for Page<LibraryNode> {
    fn from(listing: NodeListing) -> Self {
        Page {
            items: listing.items.unwrap_or_default(),
            has_more: listing.has_more,
            next_cursor: listing.page_token,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WikiNodeData {
    #[serde(default)]
    node: Option<LibraryNode>,
    #[serde(flatten)]
    inline: LibraryNode,
}

#[derive(Debug, Deserialize)]
struct ExportTaskCreated {
    #[serde(default)]
    ticket: Option<String>,
}

/// Status payload of an export task, in either response schema
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ExportTaskResult {
    /// Numeric job state (0 success, 1/2 processing, other failed)
    #[serde(default)]
    pub job_status: Option<Value>,
    /// Failure message paired with `job_status`
    #[serde(default)]
    pub job_error_msg: Option<String>,
    /// Textual job state used by the older schema
    #[serde(default)]
    pub status: Option<Value>,
    /// Failure message paired with `status`
    #[serde(default)]
    pub error_msg: Option<String>,
    /// Token of the exported artifact
    #[serde(default)]
    pub file_token: Option<String>,
    /// Nested artifact description
    #[serde(default)]
    pub file: Option<ExportedFile>,
    /// Pre-signed download URL
    #[serde(default)]
    pub url: Option<String>,
    /// Server-side name of the artifact
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Nested `file` object of an export result
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ExportedFile {
    /// Artifact token
    #[serde(default)]
    pub token: Option<String>,
    /// Pre-signed download URL
    #[serde(default)]
    pub url: Option<String>,
    /// Artifact name
    #[serde(default)]
    pub name: Option<String>,
}

impl ApiClient {
    /// Stream the entries of a drive folder (`None` lists the root folder)
    pub fn folder_entries<'a>(
        &'a self,
        folder_token: Option<&'a str>,
    ) -> impl Stream<Item = Result<DriveEntry>> + 'a {
        paginate(move |cursor: Option<String>| self.folder_page(folder_token, cursor))
    }

    /// Stream the nodes of a library space under `parent` (`None` lists the top level)
    pub fn library_nodes<'a>(
        &'a self,
        space_id: &'a str,
        parent: Option<&'a str>,
    ) -> impl Stream<Item = Result<LibraryNode>> + 'a {
        paginate(move |cursor: Option<String>| self.library_page(space_id, parent, cursor))
    }

    async fn folder_page(
        &self,
        folder_token: Option<&str>,
        cursor: Option<String>,
    ) -> Result<Page<DriveEntry>> {
        let mut query = vec![("page_size", DRIVE_PAGE_SIZE.to_string())];
        if let Some(folder) = folder_token {
            query.push(("folder_token", folder.to_string()));
        }
        if let Some(cursor) = cursor {
            query.push(("page_token", cursor));
        }
        let listing: FolderListing = self.get_json("/drive/v1/files", &query).await?;
        Ok(Page::from(listing))
    }

    async fn library_page(
        &self,
        space_id: &str,
        parent: Option<&str>,
        cursor: Option<String>,
    ) -> Result<Page<LibraryNode>> {
        let mut query = vec![("page_size", LIBRARY_PAGE_SIZE.to_string())];
        if let Some(parent) = parent {
            query.push(("parent_node_token", parent.to_string()));
        }
        if let Some(cursor) = cursor {
            query.push(("page_token", cursor));
        }
        let path = format!("/wiki/v2/spaces/{}/nodes", urlencoding::encode(space_id));
        let listing: NodeListing = self.get_json(&path, &query).await?;
        Ok(Page::from(listing))
    }

    /// Resolve a wiki wrapper token to the underlying object's token and type
    pub async fn resolve_wiki_node(&self, wiki_token: &str) -> Result<(String, FileType)> {
        let data: WikiNodeData = self
            .get_json(
                "/wiki/v2/spaces/get_node",
                &[("token", wiki_token.to_string())],
            )
            .await?;

        let node = match data.node {
            Some(node) if node.obj_token.as_deref().is_some_and(|t| !t.is_empty()) => node,
            _ => data.inline,
        };
        match (node.obj_token.filter(|t| !t.is_empty()), node.obj_type) {
            (Some(token), Some(file_type)) if !file_type.as_str().is_empty() => {
                Ok((token, file_type))
            }
            _ => Err(ExportError::UnresolvedWikiNode {
                token: wiki_token.to_string(),
            }
            .into()),
        }
    }

    /// Submit an export task and return its ticket
    pub async fn create_export_task(
        &self,
        token: &str,
        file_type: &FileType,
        extension: &str,
    ) -> Result<ExportTicket> {
        let body = json!({
            "token": token,
            "type": file_type.as_str(),
            "file_extension": extension,
        });
        let created: ExportTaskCreated = self.post_json("/drive/v1/export_tasks", &body).await?;

        created
            .ticket
            .filter(|t| !t.is_empty())
            .map(ExportTicket)
            .ok_or_else(|| ExportError::MissingTicket.into())
    }

    /// Query an export task; `data.result` is preferred, `data` itself is the older schema
    pub async fn query_export_task(
        &self,
        ticket: &ExportTicket,
        file_token: &str,
    ) -> Result<ExportTaskResult> {
        let path = format!(
            "/drive/v1/export_tasks/{}",
            urlencoding::encode(ticket.as_str())
        );
        let data: Value = self
            .get_json(&path, &[("token", file_token.to_string())])
            .await?;

        let nested = data
            .get("result")
            .filter(|r| r.as_object().is_some_and(|o| !o.is_empty()))
            .cloned();
        Ok(serde_json::from_value(nested.unwrap_or(data))?)
    }

    /// Start downloading an exported artifact by its token
    pub async fn fetch_export_artifact(&self, file_token: &str) -> Result<reqwest::Response> {
        let path = format!(
            "/drive/v1/export_tasks/file/{}/download",
            urlencoding::encode(file_token)
        );
        self.download(DownloadTarget::Path(&path)).await
    }

    /// Start downloading an exported artifact from a pre-signed URL
    pub async fn fetch_export_url(&self, url: &str) -> Result<reqwest::Response> {
        self.download(DownloadTarget::Url(url)).await
    }

    /// Start downloading an uploaded file as is
    pub async fn fetch_raw_file(&self, file_token: &str) -> Result<reqwest::Response> {
        let path = format!("/drive/v1/files/{}/download", urlencoding::encode(file_token));
        self.download(DownloadTarget::Path(&path)).await
    }
}
