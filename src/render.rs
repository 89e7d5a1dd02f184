//! Render engine seam.
//!
//! The harness never interprets compositions or functions itself; it hands a
//! [`RenderInputs`] bundle to a [`Renderer`] and serializes whatever comes
//! back. [`CommandRenderer`] drives an external `crossplane render` compatible
//! binary; tests plug in their own implementation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::document::{self, Document};
use crate::errors::{HarnessError, Result};
use crate::functions::FunctionSet;
use crate::loader::TestCase;

/// Everything the render engine needs for one test case.
#[derive(Debug, Clone)]
pub struct RenderInputs {
    pub composite_resource: Document,
    pub composition: Document,
    pub functions: Arc<FunctionSet>,
    pub extra_resources: Vec<Document>,
    pub observed_resources: Vec<Document>,
    /// Context name to context value.
    pub context: BTreeMap<String, serde_json::Value>,
}

/// What the render engine produced, in the order it produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutputs {
    pub composite_resource: Document,
    pub composed_resources: Vec<Document>,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot prepare render inputs: {0}")]
    Prepare(String),

    #[error("cannot run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("cannot parse render output: {0}")]
    Output(String),

    #[error("{0}")]
    Engine(String),
}

/// A render engine.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, inputs: &RenderInputs) -> Result<RenderOutputs, RenderError>;
}

/// The serialized output of one test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCase {
    pub dir: PathBuf,
    pub output: String,
}

/// Serializes the composite resource followed by each composed resource, in
/// the order the engine returned them.
pub fn serialize_outputs(outputs: &RenderOutputs) -> Result<String> {
    document::serialize_documents(
        std::iter::once(&outputs.composite_resource).chain(&outputs.composed_resources),
    )
}

/// Renders one test case and serializes the result.
pub async fn invoke(renderer: &dyn Renderer, case: TestCase) -> Result<RenderedCase> {
    let TestCase { dir, inputs } = case;
    let outputs = match renderer.render(&inputs).await {
        Ok(outputs) => outputs,
        Err(source) => return Err(HarnessError::Render { dir, source }),
    };
    tracing::debug!(
        dir = %dir.display(),
        composed = outputs.composed_resources.len(),
        "rendered"
    );
    let output = serialize_outputs(&outputs)?;
    Ok(RenderedCase { dir, output })
}

// ============================================================================
// EXTERNAL BINARY RENDERER
// ============================================================================

/// Renders by running `<program> render` on a materialized copy of the inputs.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
}

impl CommandRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn write_yaml<'a, I>(path: &Path, documents: I) -> Result<(), RenderError>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let yaml = document::serialize_documents(documents)
            .map_err(|e| RenderError::Prepare(e.to_string()))?;
        tokio::fs::write(path, yaml)
            .await
            .map_err(|e| RenderError::Prepare(format!("{}: {e}", path.display())))
    }

    /// Writes the bundle to `dir` and returns the command arguments.
    async fn materialize(dir: &Path, inputs: &RenderInputs) -> Result<Vec<String>, RenderError> {
        let xr = dir.join("xr.yaml");
        let composition = dir.join("composition.yaml");
        let functions = dir.join("functions.yaml");
        Self::write_yaml(&xr, [&inputs.composite_resource]).await?;
        Self::write_yaml(&composition, [&inputs.composition]).await?;
        Self::write_yaml(&functions, inputs.functions.documents()).await?;

        let mut args = vec![
            "render".to_string(),
            xr.display().to_string(),
            composition.display().to_string(),
            functions.display().to_string(),
        ];

        if !inputs.extra_resources.is_empty() {
            let path = dir.join("extra-resources.yaml");
            Self::write_yaml(&path, &inputs.extra_resources).await?;
            args.push(format!("--extra-resources={}", path.display()));
        }
        if !inputs.observed_resources.is_empty() {
            let path = dir.join("observed-resources.yaml");
            Self::write_yaml(&path, &inputs.observed_resources).await?;
            args.push(format!("--observed-resources={}", path.display()));
        }
        for (name, value) in &inputs.context {
            let path = dir.join(format!("context-{name}.json"));
            let json =
                serde_json::to_vec(value).map_err(|e| RenderError::Prepare(e.to_string()))?;
            tokio::fs::write(&path, json)
                .await
                .map_err(|e| RenderError::Prepare(format!("{}: {e}", path.display())))?;
            args.push(format!("--context-files={name}={}", path.display()));
        }
        Ok(args)
    }
}

/// Splits render output into the composite resource and composed resources.
/// Function result documents are not part of the rendered state.
pub fn parse_render_output(stdout: &[u8]) -> Result<RenderOutputs, RenderError> {
    let mut documents = document::parse_documents(stdout, Path::new("<render output>"))
        .map_err(|e| RenderError::Output(e.to_string()))?
        .into_iter()
        .filter(|doc| document::kind(doc) != Some("Result"));
    let composite_resource = documents
        .next()
        .ok_or_else(|| RenderError::Output("no composite resource in output".into()))?;
    Ok(RenderOutputs {
        composite_resource,
        composed_resources: documents.collect(),
    })
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(&self, inputs: &RenderInputs) -> Result<RenderOutputs, RenderError> {
        let workdir = tempfile::tempdir().map_err(|e| RenderError::Prepare(e.to_string()))?;
        let args = Self::materialize(workdir.path(), inputs).await?;

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RenderError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_render_output(&output.stdout)
    }
}
