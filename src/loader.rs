//! Assembles the full render input bundle of one test-case directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::composition;
use crate::discovery::SENTINEL_FILE;
use crate::document::{self, Document};
use crate::errors::{HarnessError, Result};
use crate::fs::Filesystem;
use crate::functions::FunctionSet;
use crate::render::RenderInputs;

pub const EXTRA_RESOURCES_FILE: &str = "extra-resources.yaml";
pub const OBSERVED_RESOURCES_FILE: &str = "observed-resources.yaml";
pub const CONTEXTS_DIR: &str = "contexts";
pub const CONTEXT_EXTENSION: &str = "json";

/// Path of the composition name inside a composite resource.
pub const COMPOSITION_REF_PATH: [&str; 4] = ["spec", "crossplane", "compositionRef", "name"];

/// A fully loaded test case. Its identity is its directory.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub dir: PathBuf,
    pub inputs: RenderInputs,
}

/// Extracts `spec.crossplane.compositionRef.name`, naming the first segment
/// that is missing (or the leaf, if it is not a string).
pub fn composition_name<'a>(composite: &'a Document, path: &Path) -> Result<&'a str> {
    for depth in 1..COMPOSITION_REF_PATH.len() {
        let prefix = &COMPOSITION_REF_PATH[..depth];
        if !document::lookup(composite, prefix).is_some_and(|v| v.is_mapping()) {
            return Err(HarnessError::CompositionRef {
                path: path.to_path_buf(),
                field: prefix.join("."),
            });
        }
    }
    document::lookup_str(composite, &COMPOSITION_REF_PATH).ok_or_else(|| {
        HarnessError::CompositionRef {
            path: path.to_path_buf(),
            field: COMPOSITION_REF_PATH.join("."),
        }
    })
}

/// Loads test cases against a shared function set and composition search root.
#[derive(Clone)]
pub struct CaseLoader {
    fs: Arc<dyn Filesystem>,
    functions: Arc<FunctionSet>,
    search_root: PathBuf,
}

impl CaseLoader {
    pub fn new(fs: Arc<dyn Filesystem>, functions: Arc<FunctionSet>, search_root: PathBuf) -> Self {
        Self {
            fs,
            functions,
            search_root,
        }
    }

    pub fn load(&self, dir: &Path) -> Result<TestCase> {
        let fs = self.fs.as_ref();

        let composite_path = dir.join(SENTINEL_FILE);
        let composite_resource =
            document::parse_single(&fs.read(&composite_path)?, &composite_path)?;

        let name = composition_name(&composite_resource, &composite_path)?;
        tracing::debug!(dir = %dir.display(), composition = name, "resolving composition");
        let (composition_path, composition) =
            composition::load_composition(fs, &self.search_root, name)?;
        tracing::debug!(
            dir = %dir.display(),
            file = %composition_path.display(),
            "loaded composition"
        );

        let extra_resources = self.load_optional_documents(&dir.join(EXTRA_RESOURCES_FILE))?;
        let observed_resources = self.load_optional_documents(&dir.join(OBSERVED_RESOURCES_FILE))?;
        let context = self.load_contexts(&dir.join(CONTEXTS_DIR))?;

        Ok(TestCase {
            dir: dir.to_path_buf(),
            inputs: RenderInputs {
                composite_resource,
                composition,
                functions: Arc::clone(&self.functions),
                extra_resources,
                observed_resources,
                context,
            },
        })
    }

    fn load_optional_documents(&self, path: &Path) -> Result<Vec<Document>> {
        match self.fs.read_optional(path)? {
            Some(data) => {
                tracing::debug!(file = %path.display(), "found optional fixture");
                document::parse_documents(&data, path)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Every `*.json` file directly inside `dir` becomes a context named after
    /// its file stem.
    fn load_contexts(&self, dir: &Path) -> Result<BTreeMap<String, serde_json::Value>> {
        let mut contexts = BTreeMap::new();
        if !self.fs.is_dir(dir) {
            return Ok(contexts);
        }
        for entry in self.fs.read_dir(dir)? {
            if entry.is_dir || entry.path.extension().map_or(true, |e| e != CONTEXT_EXTENSION) {
                continue;
            }
            let Some(name) = entry.path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let data = self.fs.read(&entry.path)?;
            let value = serde_json::from_slice(&data).map_err(|source| HarnessError::ParseContext {
                path: entry.path.clone(),
                source,
            })?;
            tracing::debug!(context = name, file = %entry.path.display(), "found context");
            contexts.insert(name.to_string(), value);
        }
        Ok(contexts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFilesystem;

    const XR: &str = "apiVersion: example.org/v1\nkind: XBucket\nmetadata:\n  name: b\nspec:\n  crossplane:\n    compositionRef:\n      name: xbuckets\n";
    const COMPOSITION: &str = "apiVersion: apiextensions.crossplane.io/v1\nkind: Composition\nmetadata:\n  name: xbuckets\n";

    fn loader(fs: &MemoryFilesystem) -> CaseLoader {
        CaseLoader::new(
            Arc::new(fs.clone()),
            Arc::new(FunctionSet::default()),
            PathBuf::from("."),
        )
    }

    #[test]
    fn test_loads_mandatory_fixtures_only() {
        let fs = MemoryFilesystem::new();
        fs.add_file("tests/bucket/composite-resource.yaml", XR);
        fs.add_file("apis/composition.yaml", COMPOSITION);

        let case = loader(&fs).load(Path::new("tests/bucket")).unwrap();
        assert_eq!(case.dir, PathBuf::from("tests/bucket"));
        assert_eq!(document::name(&case.inputs.composition), Some("xbuckets"));
        assert!(case.inputs.extra_resources.is_empty());
        assert!(case.inputs.observed_resources.is_empty());
        assert!(case.inputs.context.is_empty());
    }

    #[test]
    fn test_loads_optional_fixtures_and_contexts() {
        let fs = MemoryFilesystem::new();
        fs.add_file("tests/bucket/composite-resource.yaml", XR);
        fs.add_file("apis/composition.yaml", COMPOSITION);
        fs.add_file(
            "tests/bucket/extra-resources.yaml",
            "kind: EnvironmentConfig\n---\nkind: Secret\n",
        );
        fs.add_file("tests/bucket/observed-resources.yaml", "kind: Bucket\n");
        fs.add_file(
            "tests/bucket/contexts/apiextensions.crossplane.io-environment.json",
            r#"{"region": "eu-west-1"}"#,
        );
        fs.add_file("tests/bucket/contexts/ignored.yaml", "a: 1\n");

        let case = loader(&fs).load(Path::new("tests/bucket")).unwrap();
        assert_eq!(case.inputs.extra_resources.len(), 2);
        assert_eq!(case.inputs.observed_resources.len(), 1);
        let keys: Vec<_> = case.inputs.context.keys().cloned().collect();
        assert_eq!(keys, vec!["apiextensions.crossplane.io-environment"]);
        assert_eq!(
            case.inputs.context["apiextensions.crossplane.io-environment"]["region"],
            "eu-west-1"
        );
    }

    #[test]
    fn test_missing_composite_resource_is_fatal() {
        let fs = MemoryFilesystem::new();
        fs.add_file("apis/composition.yaml", COMPOSITION);
        let err = loader(&fs).load(Path::new("tests/none")).unwrap_err();
        assert!(matches!(err, HarnessError::Filesystem(_)));
    }

    #[test]
    fn test_composition_ref_errors_name_missing_field() {
        let doc =
            document::parse_single(b"spec:\n  crossplane: {}\n", Path::new("xr.yaml")).unwrap();
        let err = composition_name(&doc, Path::new("xr.yaml")).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::CompositionRef { ref field, .. } if field == "spec.crossplane.compositionRef"
        ));

        let doc = document::parse_single(
            b"spec:\n  crossplane:\n    compositionRef:\n      name: 42\n",
            Path::new("xr.yaml"),
        )
        .unwrap();
        let err = composition_name(&doc, Path::new("xr.yaml")).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::CompositionRef { ref field, .. }
                if field == "spec.crossplane.compositionRef.name"
        ));
    }

    #[test]
    fn test_unresolvable_composition_is_fatal() {
        let fs = MemoryFilesystem::new();
        fs.add_file("tests/bucket/composite-resource.yaml", XR);
        let err = loader(&fs).load(Path::new("tests/bucket")).unwrap_err();
        assert!(matches!(err, HarnessError::CompositionNotFound { .. }));
    }

    #[test]
    fn test_malformed_context_is_reported() {
        let fs = MemoryFilesystem::new();
        fs.add_file("tests/bucket/composite-resource.yaml", XR);
        fs.add_file("apis/composition.yaml", COMPOSITION);
        fs.add_file("tests/bucket/contexts/env.json", "{not json");
        let err = loader(&fs).load(Path::new("tests/bucket")).unwrap_err();
        assert!(matches!(err, HarnessError::ParseContext { .. }));
    }
}
