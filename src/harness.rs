//! End-to-end orchestration of one harness run.
//!
//! Resolve functions, discover test cases, render them concurrently, then
//! either record baselines or compare against them. The whole run shares a
//! single deadline.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{HarnessConfig, Mode};
use crate::discovery;
use crate::errors::{HarnessError, Result};
use crate::fs::Filesystem;
use crate::functions::{self, FunctionSet};
use crate::loader::CaseLoader;
use crate::render::Renderer;
use crate::runner::CaseRunner;
use crate::verify::{self, VerificationReport};
use tokio::task;

/// What a run did with the rendered output.
#[derive(Debug, Clone, PartialEq)]
pub enum RunResult {
    /// Baselines written, in discovery order.
    Recorded(Vec<PathBuf>),
    Compared(VerificationReport),
}

/// Result of a run that did not hit a fatal error.
#[derive(Debug, Clone, PartialEq)]
pub struct Outputs {
    pub test_dirs: Vec<PathBuf>,
    pub functions: Vec<String>,
    pub result: RunResult,
}

impl Outputs {
    /// Turns failed verification into [`HarnessError::VerificationFailed`].
    pub fn ensure_passed(&self) -> Result<()> {
        match &self.result {
            RunResult::Compared(report) if !report.passed() => {
                Err(HarnessError::VerificationFailed {
                    failed: report.fail_count(),
                    compared: report.compared_count(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Called with the discovered test directories before any case renders.
pub type DiscoveryHook = Box<dyn Fn(&[PathBuf]) + Send + Sync>;

pub struct Harness {
    config: Arc<HarnessConfig>,
    fs: Arc<dyn Filesystem>,
    renderer: Arc<dyn Renderer>,
    on_discovery: Option<DiscoveryHook>,
}

impl Harness {
    pub fn new(
        config: HarnessConfig,
        fs: Arc<dyn Filesystem>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            fs,
            renderer,
            on_discovery: None,
        }
    }

    pub fn with_discovery_hook(
        mut self,
        hook: impl Fn(&[PathBuf]) + Send + Sync + 'static,
    ) -> Self {
        self.on_discovery = Some(Box::new(hook));
        self
    }

    /// Runs everything under the configured deadline. Expiry aborts every
    /// case still in flight.
    pub async fn run(&self) -> Result<Outputs> {
        let timeout = self.config.timeout;
        tokio::time::timeout(timeout, self.run_to_completion())
            .await
            .map_err(|_| HarnessError::Timeout { timeout })?
    }

    async fn run_to_completion(&self) -> Result<Outputs> {
        let (fs, config) = (Arc::clone(&self.fs), Arc::clone(&self.config));
        let functions = blocking(move || resolve_functions(fs.as_ref(), &config)).await?;
        let functions = Arc::new(functions);

        let (fs, config) = (Arc::clone(&self.fs), Arc::clone(&self.config));
        let test_dirs = blocking(move || {
            discovery::discover_test_cases(fs.as_ref(), &config.test_dir)
        })
        .await?;
        if let Some(hook) = &self.on_discovery {
            hook(&test_dirs);
        }

        let loader = CaseLoader::new(
            Arc::clone(&self.fs),
            Arc::clone(&functions),
            self.config.search_root.clone(),
        );
        let runner = CaseRunner::new(loader, Arc::clone(&self.renderer))
            .with_max_concurrency(self.config.max_concurrency);
        let rendered = runner.execute(&test_dirs).await?.into_rendered()?;

        let (fs, config) = (Arc::clone(&self.fs), Arc::clone(&self.config));
        let result = blocking(move || {
            let (fs, output_file) = (fs.as_ref(), &config.output_file);
            Ok(match config.mode {
                Mode::Record => RunResult::Recorded(verify::record(fs, &rendered, output_file)?),
                Mode::Compare => RunResult::Compared(verify::compare(fs, &rendered, output_file)?),
            })
        })
        .await?;

        Ok(Outputs {
            test_dirs,
            functions: functions.names().into_iter().map(str::to_string).collect(),
            result,
        })
    }
}

/// The explicit functions file wins; otherwise functions are synthesized
/// from the package manifest and written out for reference.
fn resolve_functions(fs: &dyn Filesystem, config: &HarnessConfig) -> Result<FunctionSet> {
    if let Some(path) = &config.functions_file {
        let set = FunctionSet::load(fs, path)?;
        tracing::info!(file = %path.display(), count = set.len(), "using functions file");
        return Ok(set);
    }

    let manifest_path = &config.package_file;
    let set = functions::synthesize(&fs.read(manifest_path)?, manifest_path)?;
    fs.write(&config.dev_functions_file, set.to_yaml()?.as_bytes())?;
    tracing::info!(
        file = %config.dev_functions_file.display(),
        functions = ?set.names(),
        "synthesized development functions"
    );
    Ok(set)
}

/// Runs filesystem work on the blocking pool so the deadline stays live.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f).await.map_err(|e| HarnessError::TaskFailed {
        message: e.to_string(),
    })?
}
