//! Concurrent execution of test cases.
//!
//! Each discovered directory becomes one task on a [`JoinSet`]: the case is
//! loaded on the blocking pool and then rendered. Results land in a slot
//! indexed by discovery position, so the outcome never depends on completion
//! order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};

use crate::errors::{HarnessError, Result};
use crate::loader::CaseLoader;
use crate::render::{self, RenderedCase, Renderer};

/// The result of one test case.
#[derive(Debug)]
pub struct CaseOutcome {
    pub dir: PathBuf,
    pub result: Result<RenderedCase>,
}

/// Per-directory results, in discovery order, one entry per directory.
#[derive(Debug, Default)]
pub struct ExecutionOutcome {
    cases: Vec<CaseOutcome>,
}

impl ExecutionOutcome {
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn dirs(&self) -> impl Iterator<Item = &Path> {
        self.cases.iter().map(|c| c.dir.as_path())
    }

    pub fn get(&self, dir: &Path) -> Option<&CaseOutcome> {
        self.cases.iter().find(|c| c.dir == dir)
    }

    /// Fail-fast view: the first failure in discovery order (attributed to its
    /// directory), or every rendered case in discovery order.
    pub fn into_rendered(self) -> Result<Vec<RenderedCase>> {
        self.cases
            .into_iter()
            .map(|case| case.result.map_err(|e| e.in_case(case.dir)))
            .collect()
    }
}

/// Runs the load + render pipeline for many directories.
#[derive(Clone)]
pub struct CaseRunner {
    loader: CaseLoader,
    renderer: Arc<dyn Renderer>,
    max_concurrency: Option<usize>,
}

impl CaseRunner {
    pub fn new(loader: CaseLoader, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            loader,
            renderer,
            max_concurrency: None,
        }
    }

    /// Caps the number of cases in flight. Unbounded by default.
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit.map(|n| n.max(1));
        self
    }

    async fn run_case(
        loader: CaseLoader,
        renderer: Arc<dyn Renderer>,
        dir: PathBuf,
    ) -> Result<RenderedCase> {
        tracing::info!(dir = %dir.display(), "processing test directory");
        let case = task::spawn_blocking(move || loader.load(&dir))
            .await
            .map_err(|e| HarnessError::TaskFailed {
                message: e.to_string(),
            })??;
        render::invoke(renderer.as_ref(), case).await
    }

    /// Executes every directory concurrently and waits for all of them.
    ///
    /// A task that panics or is cancelled becomes a [`HarnessError::TaskFailed`]
    /// result in its own slot. Dropping the returned future aborts the cases
    /// still in flight.
    pub async fn execute(&self, dirs: &[PathBuf]) -> Result<ExecutionOutcome> {
        let limiter = self.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
        let mut tasks = JoinSet::new();
        let mut slot_of: HashMap<task::Id, usize> = HashMap::with_capacity(dirs.len());

        for (index, dir) in dirs.iter().cloned().enumerate() {
            let loader = self.loader.clone();
            let renderer = Arc::clone(&self.renderer);
            let limiter = limiter.clone();
            let handle = tasks.spawn(async move {
                let _permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };
                Self::run_case(loader, renderer, dir).await
            });
            slot_of.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<Result<RenderedCase>>> = dirs.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(e) => (
                    e.id(),
                    Err(HarnessError::TaskFailed {
                        message: e.to_string(),
                    }),
                ),
            };
            if let Some(&index) = slot_of.get(&id) {
                slots[index] = Some(result);
            }
        }

        let cases = dirs
            .iter()
            .cloned()
            .zip(slots)
            .map(|(dir, slot)| CaseOutcome {
                result: slot.unwrap_or_else(|| {
                    Err(HarnessError::TaskFailed {
                        message: format!("no result recorded for {}", dir.display()),
                    })
                }),
                dir,
            })
            .collect();
        Ok(ExecutionOutcome { cases })
    }
}
