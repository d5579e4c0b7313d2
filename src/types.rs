//! Core types for feishu-backup

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Remote object type as reported by listings and library nodes
///
/// Unknown types are preserved verbatim so that new remote kinds still flow
/// through export (as PDF) instead of being rejected at parse time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileType {
    /// Legacy document
    Doc,
    /// New-style document
    Docx,
    /// Spreadsheet
    Sheet,
    /// Multi-dimensional table
    Bitable,
    /// Presentation
    Slides,
    /// Mind map
    Mindnote,
    /// Generic uploaded binary file
    File,
    /// Drive folder
    Folder,
    /// Wiki wrapper around another object
    Wiki,
    /// Any other type string
    Other(String),
}

impl FileType {
    /// Wire name of the type
    pub fn as_str(&self) -> &str {
        match self {
            FileType::Doc => "doc",
            FileType::Docx => "docx",
            FileType::Sheet => "sheet",
            FileType::Bitable => "bitable",
            FileType::Slides => "slides",
            FileType::Mindnote => "mindnote",
            FileType::File => "file",
            FileType::Folder => "folder",
            FileType::Wiki => "wiki",
            FileType::Other(other) => other,
        }
    }
}

impl From<&str> for FileType {
    fn from(value: &str) -> Self {
        match value {
            "doc" => FileType::Doc,
            "docx" => FileType::Docx,
            "sheet" => FileType::Sheet,
            "bitable" => FileType::Bitable,
            "slides" => FileType::Slides,
            "mindnote" => FileType::Mindnote,
            "file" => FileType::File,
            "folder" => FileType::Folder,
            "wiki" => FileType::Wiki,
            other => FileType::Other(other.to_string()),
        }
    }
}

impl From<String> for FileType {
    fn from(value: String) -> Self {
        FileType::from(value.as_str())
    }
}

impl From<FileType> for String {
    fn from(value: FileType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote object to process
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    /// Object token
    pub token: String,
    /// Object type
    pub file_type: FileType,
    /// Display name (falls back to the token)
    pub name: String,
}

/// One entry of a drive folder listing
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DriveEntry {
    /// Object token
    #[serde(default)]
    pub token: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Object type
    #[serde(default, rename = "type")]
    pub file_type: Option<FileType>,
}

impl DriveEntry {
    /// Whether this entry is a folder to descend into
    pub fn is_folder(&self) -> bool {
        self.file_type == Some(FileType::Folder)
    }

    /// Name used for logging and on disk: name, then token, then "untitled"
    pub fn display_name(&self) -> &str {
        non_empty(self.name.as_deref())
            .or_else(|| non_empty(self.token.as_deref()))
            .unwrap_or("untitled")
    }

    /// Translate into a processable file
    pub fn to_file_info(&self) -> Result<FileInfo> {
        let token = non_empty(self.token.as_deref())
            .ok_or_else(|| Error::Traversal("drive entry without token".to_string()))?;
        let file_type = self
            .file_type
            .clone()
            .ok_or_else(|| Error::Traversal(format!("drive entry {token} without type")))?;
        Ok(FileInfo {
            token: token.to_string(),
            file_type,
            name: self.display_name().to_string(),
        })
    }
}

/// One node of the wiki-style library tree
///
/// A node is both a document (`obj_token`/`obj_type`) and a potential
/// container; children are listed with `node_token` as parent.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LibraryNode {
    /// Token of the node itself (parent key for child listings)
    #[serde(default)]
    pub node_token: Option<String>,
    /// Token of the underlying object
    #[serde(default)]
    pub obj_token: Option<String>,
    /// Type of the underlying object
    #[serde(default)]
    pub obj_type: Option<FileType>,
    /// Node title
    #[serde(default)]
    pub title: Option<String>,
    /// Whether the node has children (`null` reads as `false`)
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_child: bool,
}

impl LibraryNode {
    /// Name used for logging and on disk: title, then object token, then "untitled"
    pub fn display_name(&self) -> &str {
        non_empty(self.title.as_deref())
            .or_else(|| non_empty(self.obj_token.as_deref()))
            .unwrap_or("untitled")
    }

    /// Node token if present and non-empty
    pub fn child_parent_token(&self) -> Option<&str> {
        non_empty(self.node_token.as_deref())
    }

    /// Translate the node's own object into a processable file
    pub fn to_file_info(&self) -> Result<FileInfo> {
        match (non_empty(self.obj_token.as_deref()), &self.obj_type) {
            (Some(token), Some(file_type)) if !file_type.as_str().is_empty() => Ok(FileInfo {
                token: token.to_string(),
                file_type: file_type.clone(),
                name: self.display_name().to_string(),
            }),
            _ => Err(Error::Traversal(
                "library node missing obj_token/obj_type".to_string(),
            )),
        }
    }
}

/// Deserialize a field whose explicit `null` means the type's default
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One page of a cursor-paginated listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    /// Items of this page, in API order
    pub items: Vec<T>,
    /// Whether the server reports more pages
    pub has_more: bool,
    /// Cursor for the next page
    pub next_cursor: Option<String>,
}

/// Ticket correlating an export submission with its status queries
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExportTicket(pub String);

impl ExportTicket {
    /// Get the inner ticket string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExportTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One recorded per-document or per-container failure
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureRecord {
    /// Remote name of the failed item
    pub name: String,
    /// Remote token of the failed item
    pub token: String,
    /// Underlying cause
    pub cause: String,
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) {}", self.name, self.token, self.cause)
    }
}

/// Aggregate statistics of one run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Folders (or child-bearing nodes) entered
    pub folders: u64,
    /// Files processed, whatever the outcome
    pub files: u64,
    /// Files saved through an export task
    pub exported: u64,
    /// Files saved through the raw-download fallback
    pub fallback_downloaded: u64,
    /// Recorded failures
    pub failed: u64,
    /// Failure descriptions, in the order they happened
    pub failures: Vec<FailureRecord>,
}

impl RunStats {
    /// Record a failure and bump the failure counter
    pub fn record_failure(
        &mut self,
        name: impl Into<String>,
        token: impl Into<String>,
        cause: impl Into<String>,
    ) {
        self.failed += 1;
        self.failures.push(FailureRecord {
            name: name.into(),
            token: token.into(),
            cause: cause.into(),
        });
    }

    /// Process exit status for this run: 2 when anything failed, else 0
    pub fn exit_code(&self) -> i32 {
        if self.failures.is_empty() { 0 } else { 2 }
    }
}

/// Outcome of a run: where it wrote and what happened
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Directory the run wrote into
    pub output_dir: PathBuf,
    /// Aggregated statistics
    pub stats: RunStats,
}

impl RunReport {
    /// Process exit status for this run
    pub fn exit_code(&self) -> i32 {
        self.stats.exit_code()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[SUMMARY]")?;
        writeln!(f, "Output dir: {}", self.output_dir.display())?;
        writeln!(f, "Folders visited: {}", self.stats.folders)?;
        writeln!(f, "Files processed: {}", self.stats.files)?;
        writeln!(f, "Exported files: {}", self.stats.exported)?;
        writeln!(
            f,
            "Fallback downloaded files: {}",
            self.stats.fallback_downloaded
        )?;
        write!(f, "Failed files: {}", self.stats.failed)?;

        if !self.stats.failures.is_empty() {
            writeln!(f)?;
            writeln!(f)?;
            write!(f, "[FAILED LIST]")?;
            for failure in &self.stats.failures {
                writeln!(f)?;
                write!(f, "- {failure}")?;
            }
        }
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
