//! Utility functions for file naming and path manipulation

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Name used when sanitizing leaves nothing behind
const UNTITLED: &str = "untitled";

/// Extension given to raw downloads whose name has none
const RAW_FALLBACK_EXTENSION: &str = "bin";

/// Characters that are not allowed in file names on common filesystems
const ILLEGAL_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Turn an arbitrary remote name into a safe local file name
///
/// Replaces `\ / : * ? " < > |` and ASCII control characters with `_`,
/// trims surrounding whitespace and returns `"untitled"` for empty results.
/// Names made only of dots (`.`, `..`) would resolve to the current or parent
/// directory, so their dots become `_` too.
///
/// # Examples
///
/// ```
/// use feishu_backup::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Q3: plan/draft?"), "Q3_ plan_draft_");
/// assert_eq!(sanitize_filename("   "), "untitled");
/// assert_eq!(sanitize_filename(".."), "__");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if ILLEGAL_CHARS.contains(&c) || ('\u{0}'..='\u{1f}').contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else if trimmed.chars().all(|c| c == '.') {
        "_".repeat(trimmed.chars().count())
    } else {
        trimmed.to_string()
    }
}

/// Get a path that does not exist yet
///
/// Returns `path` unchanged when nothing exists there. Otherwise tries
/// `stem (1).ext`, `stem (2).ext`, ... and returns the first unused one.
/// Must be called right before the write it guards.
///
/// # Examples
///
/// ```
/// use feishu_backup::utils::get_unique_path;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/feishu-backup-doc-example/Report.pdf");
/// let unique = get_unique_path(path).unwrap();
/// // If Report.pdf exists, returns Report (1).pdf
/// // If that exists too, returns Report (2).pdf, etc.
/// # let _ = unique;
/// ```
pub fn get_unique_path(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::FileCollision {
            path: path.to_path_buf(),
            reason: "cannot extract file stem".to_string(),
        })?;

    let extension = path.extension().and_then(|e| e.to_str());

    let parent = path.parent().ok_or_else(|| Error::FileCollision {
        path: path.to_path_buf(),
        reason: "cannot extract parent directory".to_string(),
    })?;

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let new_name = match extension {
            Some(ext) => format!("{} ({}).{}", stem, i, ext),
            None => format!("{} ({})", stem, i),
        };
        let new_path = parent.join(new_name);
        if !new_path.exists() {
            return Ok(new_path);
        }
    }

    Err(Error::FileCollision {
        path: path.to_path_buf(),
        reason: format!(
            "could not find unique filename after {} attempts",
            MAX_RENAME_ATTEMPTS
        ),
    })
}

/// File name for an exported document
///
/// Keeps `foo.docx` as is when exporting to docx; otherwise replaces the last
/// extension of the sanitized name (if any) with `extension`.
///
/// # Examples
///
/// ```
/// use feishu_backup::utils::export_file_name;
///
/// assert_eq!(export_file_name("Roadmap", "docx"), "Roadmap.docx");
/// assert_eq!(export_file_name("Roadmap.DOCX", "docx"), "Roadmap.DOCX");
/// assert_eq!(export_file_name("budget.xls", "xlsx"), "budget.xlsx");
/// ```
#[must_use]
pub fn export_file_name(original_name: &str, extension: &str) -> String {
    let sanitized = sanitize_filename(original_name);
    let suffix = format!(".{}", extension.to_lowercase());

    if sanitized.to_lowercase().ends_with(&suffix) {
        return sanitized;
    }

    let stem = Path::new(&sanitized)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(&sanitized);
    format!("{stem}{suffix}")
}

/// File name for a raw (unconverted) download
///
/// The sanitized original name, with `.bin` appended when it has no extension.
#[must_use]
pub fn raw_file_name(original_name: &str) -> String {
    let sanitized = sanitize_filename(original_name);
    if Path::new(&sanitized).extension().is_some() {
        sanitized
    } else {
        format!("{sanitized}.{RAW_FALLBACK_EXTENSION}")
    }
}

/// Truncate a response body for error messages
pub(crate) fn body_preview(body: &str) -> String {
    const PREVIEW_CHARS: usize = 200;
    body.chars().take(PREVIEW_CHARS).collect()
}
