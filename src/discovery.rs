use std::path::{Path, PathBuf};

use crate::errors::Result;
use crate::fs::Filesystem;

/// File whose presence marks a directory as a test case.
pub const SENTINEL_FILE: &str = "composite-resource.yaml";

/// Recursively scans `root` for test-case directories.
///
/// A directory is a test case iff it directly contains [`SENTINEL_FILE`]; its
/// ancestors are not. Any traversal error aborts discovery. The returned list
/// is sorted to ensure deterministic execution and reporting order.
pub fn discover_test_cases(fs: &dyn Filesystem, root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs.walk(root) {
        let entry = entry?;
        if entry.is_dir || entry.file_name() != Some(SENTINEL_FILE) {
            continue;
        }
        if let Some(dir) = entry.path.parent() {
            dirs.push(dir.to_path_buf());
        }
    }
    dirs.sort();
    dirs.dedup();
    tracing::info!(count = dirs.len(), root = %root.display(), "found test directories");
    Ok(dirs)
}
