//! Batch loading
//!
//! Loads a list of module directories one at a time under an aggregate
//! budget. One bad module never stops the batch.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tracing::{info, warn};

use crate::module::loader::loaded::{panic_message, LoadedModule};
use crate::module::loader::loader::ModuleLoad;
use crate::module::registry::ModuleDirectory;
use crate::module::traits::Reporter;
use crate::utils::Deadline;

/// Outcome of one batch
#[derive(Debug, Default)]
pub struct LoadResult {
    /// Successfully loaded modules, in input order
    pub modules: Vec<LoadedModule>,
    /// Names of directories that were attempted and failed
    pub failed: Vec<String>,
    /// Names of directories never attempted because the budget ran out
    pub skipped: Vec<String>,
    /// Whether the aggregate budget ran out
    pub timed_out: bool,
}

impl LoadResult {
    pub fn loaded_names(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.name().to_string()).collect()
    }
}

/// Sequential loader over many directories
#[derive(Debug, Clone)]
pub struct BatchLoader<L> {
    loader: L,
    budget: Duration,
    progress_step: usize,
    reporter: Reporter,
}

impl<L: ModuleLoad> BatchLoader<L> {
    pub fn new(loader: L, budget: Duration) -> Self {
        Self {
            loader,
            budget,
            progress_step: 0,
            reporter: Reporter::silent(),
        }
    }

    /// Report per-module progress under this step index
    pub fn with_progress_step(mut self, step: usize, reporter: Reporter) -> Self {
        self.progress_step = step;
        self.reporter = reporter;
        self
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Load every directory in order until done or out of budget
    pub fn load_all(&self, dirs: &[ModuleDirectory]) -> LoadResult {
        let deadline = Deadline::start(self.budget);
        let mut result = LoadResult::default();

        for (index, dir) in dirs.iter().enumerate() {
            if deadline.is_expired() {
                result.timed_out = true;
                result.skipped = dirs[index..].iter().map(|d| d.name.clone()).collect();
                let line = format!(
                    "[load] batch budget of {:?} exhausted, skipped {}",
                    self.budget,
                    result.skipped.join(", ")
                );
                warn!("{}", line);
                self.reporter.line(&line);
                break;
            }

            self.reporter.step(
                self.progress_step,
                &format!("Loading {} ({}/{})", dir.name, index + 1, dirs.len()),
            );

            match catch_unwind(AssertUnwindSafe(|| self.loader.load(dir))) {
                Ok(Some(module)) => result.modules.push(module),
                Ok(None) => result.failed.push(dir.name.clone()),
                Err(panic) => {
                    let line = format!(
                        "[load] {} panicked: {}",
                        dir.name,
                        panic_message(panic.as_ref())
                    );
                    warn!("{}", line);
                    self.reporter.line(&line);
                    result.failed.push(dir.name.clone());
                }
            }
        }

        info!(
            "Batch loaded {} modules ({} failed, {} skipped)",
            result.modules.len(),
            result.failed.len(),
            result.skipped.len()
        );
        result
    }
}
