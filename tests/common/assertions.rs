//! Assertions over the files a run wrote

use std::path::Path;
use walkdir::WalkDir;

/// Relative paths of every file below `root`, sorted, `/`-separated
pub fn files_under(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}

/// Assert that `path` exists and holds exactly `expected`
pub fn assert_file_content(path: &Path, expected: &[u8]) {
    let actual = std::fs::read(path)
        .unwrap_or_else(|e| panic!("expected {} to exist: {e}", path.display()));
    assert_eq!(
        actual,
        expected,
        "unexpected content in {}",
        path.display()
    );
}
