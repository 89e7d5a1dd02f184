//! YAML document helpers shared by the loader, the render invoker and the
//! verifier.

use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

use crate::errors::{HarnessError, Result};

/// An opaque structured document (composite resource, composition, composed
/// resource, function...).
pub type Document = Value;

/// Separator placed between documents in a serialized multi-document stream.
pub const DOCUMENT_SEPARATOR: &str = "---\n";

/// Parses every non-empty document of a multi-document YAML stream.
pub fn parse_documents(data: &[u8], path: &Path) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for de in serde_yaml::Deserializer::from_slice(data) {
        let value = Value::deserialize(de).map_err(|e| HarnessError::parse(path, e))?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    Ok(documents)
}

/// Parses a stream that must hold exactly one document.
pub fn parse_single(data: &[u8], path: &Path) -> Result<Document> {
    let mut documents = parse_documents(data, path)?;
    if documents.len() != 1 {
        return Err(HarnessError::DocumentCount {
            path: path.to_path_buf(),
            found: documents.len(),
        });
    }
    Ok(documents.remove(0))
}

/// Serializes documents in the given order, joined by [`DOCUMENT_SEPARATOR`].
///
/// The output only depends on the documents themselves: mapping keys keep
/// their insertion order, so serializing equal inputs is byte-identical.
pub fn serialize_documents<'a, I>(documents: I) -> Result<String>
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut out = String::new();
    for (i, doc) in documents.into_iter().enumerate() {
        if i > 0 {
            out.push_str(DOCUMENT_SEPARATOR);
        }
        let yaml = serde_yaml::to_string(doc).map_err(|e| HarnessError::serialize("document", e))?;
        out.push_str(&yaml);
    }
    Ok(out)
}

/// Looks up a nested field by its dotted segments.
pub fn lookup<'a>(doc: &'a Document, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(doc, |value, segment| value.as_mapping()?.get(*segment))
}

/// Looks up a nested string field.
pub fn lookup_str<'a>(doc: &'a Document, segments: &[&str]) -> Option<&'a str> {
    lookup(doc, segments).and_then(Value::as_str)
}

pub fn kind(doc: &Document) -> Option<&str> {
    lookup_str(doc, &["kind"])
}

pub fn name(doc: &Document) -> Option<&str> {
    lookup_str(doc, &["metadata", "name"])
}
