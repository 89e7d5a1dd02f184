//! Shared fixtures for the integration tests: an on-disk project layout in a
//! temporary directory and a deterministic in-process renderer.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_yaml::Value;
use tempfile::TempDir;
use xrtest::config::{HarnessConfig, Mode};
use xrtest::document;
use xrtest::render::{RenderError, RenderInputs, RenderOutputs, Renderer};

pub const PACKAGE: &str = r#"apiVersion: meta.pkg.crossplane.io/v1
kind: Configuration
metadata:
  name: storage
spec:
  dependsOn:
    - kind: Function
      package: xpkg.example.io/acme/function-patch-and-transform
      version: ">=v0.9.1, <v1.0.0"
    - kind: Provider
      package: xpkg.example.io/acme/provider-aws-s3
      version: ">=v1.0.0"
"#;

pub const COMPOSITION: &str = r#"apiVersion: apiextensions.crossplane.io/v1
kind: Composition
metadata:
  name: xbuckets.example.org
spec:
  compositeTypeRef:
    apiVersion: example.org/v1
    kind: XBucket
  resources:
    - name: bucket
      base:
        apiVersion: s3.aws.upbound.io/v1beta1
        kind: Bucket
        spec:
          forProvider:
            region: eu-west-1
    - name: policy
      base:
        apiVersion: s3.aws.upbound.io/v1beta1
        kind: BucketPolicy
        spec:
          forProvider:
            region: eu-west-1
"#;

/// A composite resource named `name` referencing [`COMPOSITION`].
pub fn composite_resource(name: &str) -> String {
    format!(
        "apiVersion: example.org/v1\nkind: XBucket\nmetadata:\n  name: {name}\nspec:\n  crossplane:\n    compositionRef:\n      name: xbuckets.example.org\n"
    )
}

/// Renders every `spec.resources[*].base` of the composition, naming each
/// composed resource `<composite name>-<resource name>`.
pub struct FakeRenderer;

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(&self, inputs: &RenderInputs) -> Result<RenderOutputs, RenderError> {
        let composite = document::name(&inputs.composite_resource)
            .ok_or_else(|| RenderError::Engine("composite resource has no name".into()))?
            .to_string();
        let resources = document::lookup(&inputs.composition, &["spec", "resources"])
            .and_then(Value::as_sequence)
            .cloned()
            .unwrap_or_default();

        let mut composed_resources = Vec::new();
        for resource in resources {
            let name = resource
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| RenderError::Engine("resource has no name".into()))?
                .to_string();
            let mut base = resource.get("base").cloned().unwrap_or(Value::Null);
            base["metadata"]["name"] = Value::from(format!("{composite}-{name}"));
            composed_resources.push(base);
        }
        Ok(RenderOutputs {
            composite_resource: inputs.composite_resource.clone(),
            composed_resources,
        })
    }
}

/// A project checkout on disk: `apis/` with the package manifest and the
/// composition, and a `tests/` directory of test cases.
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let project = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        project.write("apis/package.yaml", PACKAGE);
        project.write("apis/composition.yaml", COMPOSITION);
        project
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).unwrap()
    }

    /// Adds a test case directory under `tests/` holding a composite resource.
    pub fn add_case(&self, case: &str, composite: &str) {
        self.write(
            &format!("tests/{case}/composite-resource.yaml"),
            &composite_resource(composite),
        );
    }

    pub fn config(&self, mode: Mode) -> HarnessConfig {
        HarnessConfig {
            test_dir: self.path("tests"),
            package_file: self.path("apis/package.yaml"),
            dev_functions_file: self.path("dev-functions.yaml"),
            search_root: self.root().to_path_buf(),
            mode,
            ..HarnessConfig::default()
        }
    }
}
