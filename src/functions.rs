//! Function fixtures.
//!
//! A [`FunctionSet`] is either synthesized from the `spec.dependsOn` list of a
//! package manifest ([`synthesize`]) or loaded verbatim from an explicitly
//! supplied file ([`FunctionSet::load`]). Synthesized functions are routed to
//! locally running development runtimes addressed by function name.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::document::{self, Document};
use crate::errors::{HarnessError, Result};
use crate::fs::Filesystem;

pub const FUNCTION_API_VERSION: &str = "pkg.crossplane.io/v1beta1";
pub const FUNCTION_KIND: &str = "Function";
pub const RUNTIME_ANNOTATION: &str = "render.crossplane.io/runtime";
pub const RUNTIME_TARGET_ANNOTATION: &str = "render.crossplane.io/runtime-development-target";
pub const DEVELOPMENT_RUNTIME: &str = "Development";

/// Address of the development runtime serving `function_name`.
pub fn development_target(function_name: &str) -> String {
    format!("dns:///{function_name}:9443")
}

// ============================================================================
// PACKAGE MANIFEST
// ============================================================================

/// One entry of a package manifest's `spec.dependsOn` list.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PackageDependency {
    pub kind: String,
    pub package: String,
    pub version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PackageManifest {
    spec: PackageSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PackageSpec {
    depends_on: Vec<PackageDependency>,
}

/// A package reference, optionally pinned to a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub url: String,
    pub version: Option<String>,
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}:{}", self.url, version),
            None => f.write_str(&self.url),
        }
    }
}

/// Extracts the lower-bound version from a constraint like `">=v0.9.1, <v1.0.0"`.
///
/// An empty constraint yields `None`. Otherwise the first comma-separated
/// clause must start with `>=`.
pub fn lower_bound_version(package: &str, constraint: &str) -> Result<Option<String>> {
    if constraint.is_empty() {
        return Ok(None);
    }
    let first = constraint.split(',').next().unwrap_or_default().trim();
    let Some(version) = first.strip_prefix(">=") else {
        return Err(HarnessError::InvalidVersionConstraint {
            package: package.to_string(),
            clause: first.to_string(),
        });
    };
    let version = version.trim();
    Ok((!version.is_empty()).then(|| version.to_string()))
}

/// Derives a function name from a package URL:
/// `xpkg.example.io/acme/function-foo:v1` becomes `acme-function-foo`.
pub fn function_name(package_url: &str) -> String {
    let url = package_url
        .split_once(':')
        .map_or(package_url, |(head, _)| head);
    let segments: Vec<&str> = url.split('/').collect();
    match segments.as_slice() {
        [.., org, name] => format!("{org}-{name}"),
        _ => url.to_string(),
    }
}

// ============================================================================
// FUNCTION SET
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub package: Option<PackageRef>,
    /// The document handed to the render engine.
    pub document: Document,
}

impl Function {
    /// Builds a development-mode function fixture for a package.
    pub fn development(name: String, package: PackageRef) -> Self {
        let mut annotations = Mapping::new();
        annotations.insert(RUNTIME_ANNOTATION.into(), DEVELOPMENT_RUNTIME.into());
        annotations.insert(
            RUNTIME_TARGET_ANNOTATION.into(),
            development_target(&name).into(),
        );

        let mut metadata = Mapping::new();
        metadata.insert("name".into(), name.clone().into());
        metadata.insert("annotations".into(), Value::Mapping(annotations));

        let mut spec = Mapping::new();
        spec.insert("package".into(), package.to_string().into());

        let mut doc = Mapping::new();
        doc.insert("apiVersion".into(), FUNCTION_API_VERSION.into());
        doc.insert("kind".into(), FUNCTION_KIND.into());
        doc.insert("metadata".into(), Value::Mapping(metadata));
        doc.insert("spec".into(), Value::Mapping(spec));

        Self {
            name,
            package: Some(package),
            document: Value::Mapping(doc),
        }
    }
}

/// The functions available to every test case, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionSet {
    functions: Vec<Function>,
}

impl FunctionSet {
    /// Builds a set, rejecting duplicate names.
    pub fn new(functions: Vec<Function>, source: &Path) -> Result<Self> {
        let mut seen = HashSet::new();
        for function in &functions {
            if !seen.insert(function.name.as_str()) {
                return Err(HarnessError::DuplicateFunction {
                    name: function.name.clone(),
                    path: source.to_path_buf(),
                });
            }
        }
        Ok(Self { functions })
    }

    /// Loads an explicitly supplied functions file verbatim.
    pub fn load(fs: &dyn Filesystem, path: &Path) -> Result<Self> {
        let data = fs.read(path)?;
        let mut functions = Vec::new();
        for doc in document::parse_documents(&data, path)? {
            if document::kind(&doc) != Some(FUNCTION_KIND) {
                return Err(HarnessError::InvalidFunction {
                    path: path.to_path_buf(),
                    reason: format!("expected kind {FUNCTION_KIND}"),
                });
            }
            let Some(name) = document::name(&doc).map(str::to_string) else {
                return Err(HarnessError::InvalidFunction {
                    path: path.to_path_buf(),
                    reason: "metadata.name is missing".into(),
                });
            };
            let package = document::lookup_str(&doc, &["spec", "package"]).map(|p| {
                match p.rsplit_once(':').filter(|(_, tag)| !tag.contains('/')) {
                    Some((url, version)) => PackageRef {
                        url: url.to_string(),
                        version: Some(version.to_string()),
                    },
                    None => PackageRef {
                        url: p.to_string(),
                        version: None,
                    },
                }
            });
            functions.push(Function {
                name,
                package,
                document: doc,
            });
        }
        if functions.is_empty() {
            return Err(HarnessError::NoFunctions {
                path: path.to_path_buf(),
            });
        }
        Self::new(functions, path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.functions.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.functions.iter().map(|f| &f.document)
    }

    /// Serializes the set as a multi-document stream in declaration order.
    pub fn to_yaml(&self) -> Result<String> {
        document::serialize_documents(self.documents())
    }
}

// ============================================================================
// SYNTHESIS
// ============================================================================

/// Builds a development [`FunctionSet`] from a package manifest.
///
/// Only dependencies of kind `Function` are kept, in declaration order.
pub fn synthesize(manifest: &[u8], manifest_path: &Path) -> Result<FunctionSet> {
    let manifest: PackageManifest = serde_yaml::from_slice(manifest)
        .map_err(|e| HarnessError::parse(manifest_path, e))?;

    let mut functions = Vec::new();
    for dep in manifest
        .spec
        .depends_on
        .into_iter()
        .filter(|d| d.kind == FUNCTION_KIND)
    {
        let version = lower_bound_version(&dep.package, &dep.version)?;
        let name = function_name(&dep.package);
        let package = PackageRef {
            url: dep.package,
            version,
        };
        tracing::debug!(function = %name, package = %package, "synthesized function");
        functions.push(Function::development(name, package));
    }

    if functions.is_empty() {
        return Err(HarnessError::NoFunctions {
            path: manifest_path.to_path_buf(),
        });
    }
    FunctionSet::new(functions, manifest_path)
}
