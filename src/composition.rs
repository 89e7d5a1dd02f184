//! Composition lookup.
//!
//! Compositions are referenced by name from a composite resource. The search
//! is a linear scan of every YAML file under a root; the first Composition (in
//! traversal order) carrying the requested name wins.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::document::{self, Document};
use crate::errors::{HarnessError, Result};
use crate::fs::Filesystem;

/// Never treated as a composition candidate.
pub const SKIPPED_FILE: &str = "dev-extensions.yaml";

pub const COMPOSITION_KIND: &str = "Composition";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Header {
    kind: String,
    metadata: HeaderMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HeaderMetadata {
    name: String,
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml")
}

/// Reads the `kind`/`metadata.name` header of the first document in `data`.
/// Anything that does not parse is simply not a candidate.
fn parse_header(data: &[u8]) -> Option<Header> {
    let first = serde_yaml::Deserializer::from_slice(data).next()?;
    Header::deserialize(first).ok()
}

/// Finds the file holding the Composition named `name` under `root`.
///
/// Files that cannot be parsed are skipped; I/O failures are fatal. The walk
/// stops at the first match, so entries after it are never visited.
pub fn find_composition(fs: &dyn Filesystem, root: &Path, name: &str) -> Result<PathBuf> {
    for entry in fs.walk(root) {
        let entry = entry?;
        if entry.is_dir || entry.file_name() == Some(SKIPPED_FILE) || !is_yaml(&entry.path) {
            continue;
        }
        let data = fs.read(&entry.path)?;
        let Some(header) = parse_header(&data) else {
            continue;
        };
        if header.kind == COMPOSITION_KIND && header.metadata.name == name {
            tracing::debug!(composition = name, file = %entry.path.display(), "found composition");
            return Ok(entry.path);
        }
    }
    Err(HarnessError::CompositionNotFound {
        name: name.to_string(),
        root: root.to_path_buf(),
    })
}

/// Resolves and loads the Composition named `name`.
pub fn load_composition(
    fs: &dyn Filesystem,
    root: &Path,
    name: &str,
) -> Result<(PathBuf, Document)> {
    let path = find_composition(fs, root, name)?;
    let data = fs.read(&path)?;
    let doc = document::parse_documents(&data, &path)?
        .into_iter()
        .next()
        .ok_or_else(|| HarnessError::DocumentCount {
            path: path.clone(),
            found: 0,
        })?;
    Ok((path, doc))
}
