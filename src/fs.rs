//! Filesystem capability used by discovery, composition search, loading and
//! baseline I/O.
//!
//! Everything the harness touches on disk goes through [`Filesystem`], so the
//! whole pipeline can run against [`MemoryFilesystem`] in tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use walkdir::WalkDir;

use crate::errors::FsError;

/// One entry produced by a directory walk or listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: PathBuf,
    pub is_dir: bool,
}

impl Entry {
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Lazy walk over a directory tree. Entries are produced on demand, so a
/// consumer that stops early never visits the rest of the tree.
pub type Walk<'a> = Box<dyn Iterator<Item = Result<Entry, FsError>> + 'a>;

/// Minimal filesystem surface: list entries, read bytes, write bytes.
pub trait Filesystem: Send + Sync {
    /// Recursively lists every entry under `root` (including `root` itself),
    /// depth first with siblings sorted by file name.
    fn walk(&self, root: &Path) -> Walk<'_>;

    /// Lists the direct children of `dir`, sorted by file name.
    fn read_dir(&self, dir: &Path) -> Result<Vec<Entry>, FsError>;

    fn read(&self, path: &Path) -> Result<Vec<u8>, FsError>;

    /// Writes `data` to `path`, replacing any previous content.
    fn write(&self, path: &Path, data: &[u8]) -> Result<(), FsError>;

    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Reads `path`, mapping a missing file to `Ok(None)`.
    fn read_optional(&self, path: &Path) -> Result<Option<Vec<u8>>, FsError> {
        match self.read(path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// OPERATING SYSTEM FILESYSTEM
// ============================================================================

/// [`Filesystem`] backed by the real disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFilesystem;

impl Filesystem for OsFilesystem {
    fn walk(&self, root: &Path) -> Walk<'_> {
        let root = root.to_path_buf();
        let walker = WalkDir::new(&root).sort_by_file_name().into_iter();
        Box::new(walker.map(move |entry| -> Result<Entry, FsError> {
            let entry = entry.map_err(|e| FsError::Walk {
                path: e.path().unwrap_or(&root).to_path_buf(),
                message: e.to_string(),
            })?;
            Ok(Entry {
                path: entry.path().to_path_buf(),
                is_dir: entry.file_type().is_dir(),
            })
        }))
    }

    fn read_dir(&self, dir: &Path) -> Result<Vec<Entry>, FsError> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| FsError::io(dir, e))? {
            let entry = entry.map_err(|e| FsError::io(dir, e))?;
            let file_type = entry.file_type().map_err(|e| FsError::io(entry.path(), e))?;
            entries.push(Entry {
                path: entry.path(),
                is_dir: file_type.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        Ok(entries)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        fs::read(path).map_err(|e| FsError::io(path, e))
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<(), FsError> {
        fs::write(path, data).map_err(|e| FsError::io(path, e))
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

// ============================================================================
// IN-MEMORY FILESYSTEM
// ============================================================================

/// In-memory [`Filesystem`] for tests.
///
/// Directories are implied by the files stored beneath them. Paths are
/// normalized (`.` components dropped), so `./tests/a` and `tests/a` name the
/// same file. Cloning yields a handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilesystem {
    files: Arc<RwLock<BTreeMap<PathBuf, Vec<u8>>>>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file (for test setup).
    pub fn add_file(&self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(normalize(path.as_ref()), data.into());
        }
    }

    /// Returns the content of a file, if present.
    pub fn get_file(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files
            .read()
            .ok()
            .and_then(|files| files.get(&normalize(path.as_ref())).cloned())
    }

    fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        self.files.read().map(|f| f.clone()).unwrap_or_default()
    }

    /// Every known path (files plus implied directories) with its kind.
    fn all_entries(&self) -> BTreeMap<PathBuf, bool> {
        let mut entries = BTreeMap::new();
        for path in self.snapshot().into_keys() {
            let mut parent = path.parent();
            while let Some(dir) = parent {
                if dir.as_os_str().is_empty() {
                    break;
                }
                entries.insert(dir.to_path_buf(), true);
                parent = dir.parent();
            }
            entries.insert(path, false);
        }
        entries
    }
}

/// Drops `.` components so lookups are insensitive to a leading `./`.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Re-roots a normalized path under the caller's spelling of `root`.
fn rebase(path: &Path, normalized_root: &Path, root: &Path) -> PathBuf {
    match path.strip_prefix(normalized_root) {
        Ok(rest) if rest.as_os_str().is_empty() => root.to_path_buf(),
        Ok(rest) => root.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

impl MemoryFilesystem {
    /// Snapshot of the subtree under `root`, in walk order.
    fn entries_under(&self, root: &Path) -> Result<Vec<Entry>, FsError> {
        let normalized = normalize(root);
        let entries = self.all_entries();
        let whole_tree = normalized.as_os_str().is_empty();
        if !whole_tree && !entries.contains_key(&normalized) {
            return Err(FsError::not_found(root));
        }

        let mut out = Vec::new();
        if whole_tree || entries.get(&normalized) == Some(&true) {
            out.push(Entry {
                path: root.to_path_buf(),
                is_dir: true,
            });
        }
        // BTreeMap order on paths compares component by component, which is
        // a depth-first walk with siblings sorted by name.
        for (path, is_dir) in entries {
            if path == normalized || !(whole_tree || path.starts_with(&normalized)) {
                continue;
            }
            out.push(Entry {
                path: rebase(&path, &normalized, root),
                is_dir,
            });
        }
        if out.is_empty() {
            out.push(Entry {
                path: root.to_path_buf(),
                is_dir: false,
            });
        }
        Ok(out)
    }
}

impl Filesystem for MemoryFilesystem {
    fn walk(&self, root: &Path) -> Walk<'_> {
        match self.entries_under(root) {
            Ok(entries) => Box::new(entries.into_iter().map(Ok::<Entry, FsError>)),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn read_dir(&self, dir: &Path) -> Result<Vec<Entry>, FsError> {
        let normalized = normalize(dir);
        let entries = self.all_entries();
        if !normalized.as_os_str().is_empty() && entries.get(&normalized) != Some(&true) {
            return Err(FsError::not_found(dir));
        }
        Ok(entries
            .into_iter()
            .filter(|(path, _)| path.parent() == Some(normalized.as_path()))
            .map(|(path, is_dir)| Entry {
                path: rebase(&path, &normalized, dir),
                is_dir,
            })
            .collect())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        self.get_file(path).ok_or_else(|| FsError::not_found(path))
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<(), FsError> {
        self.add_file(path, data.to_vec());
        Ok(())
    }

    fn is_file(&self, path: &Path) -> bool {
        self.get_file(path).is_some()
    }

    fn is_dir(&self, path: &Path) -> bool {
        let normalized = normalize(path);
        normalized.as_os_str().is_empty() || self.all_entries().get(&normalized) == Some(&true)
    }
}
