//! Module manager
//!
//! Facade the host calls: discover, build what is stale, load what built,
//! and keep the failure ledger for the session. Refreshes are serialized.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::HostConfig;
use crate::module::build::{BuildInvoker, BuildState, BuildStatusChecker};
use crate::module::failures::FailureTracker;
use crate::module::loader::{
    self, BatchLoader, IsolatedLoader, LoadError, LoadedModule, ModuleLoad, SharedRuntimeProbe,
};
use crate::module::registry::{
    resolve_modules_root, DiscoveryError, DiscoveryResult, FolderFilter, ModuleDirectory,
    ModuleDiscovery,
};
use crate::module::traits::Reporter;
use crate::module::validation::StructureValidator;

/// Progress step indices reported during [`ModuleManager::refresh`]
pub const STEP_DISCOVER: usize = 0;
pub const STEP_BUILD: usize = 1;
pub const STEP_LOAD: usize = 2;
pub const STEP_DONE: usize = 3;

/// Result of one refresh
#[derive(Debug, Default)]
pub struct RefreshOutcome {
    /// Loaded modules, owned by the caller from here on
    pub modules: Vec<LoadedModule>,
    /// Modules that failed to build or load (also stored in the ledger)
    pub failures: Vec<String>,
    /// Modules not attempted because the batch budget ran out
    pub skipped: Vec<String>,
    pub timed_out: bool,
}

/// Module manager coordinates discovery, builds and loading
pub struct ModuleManager {
    config: HostConfig,
    modules_root: PathBuf,
    filter: FolderFilter,
    discovery: ModuleDiscovery,
    build_checker: BuildStatusChecker,
    builder: BuildInvoker,
    loader: IsolatedLoader,
    failures: Arc<FailureTracker>,
    reporter: Reporter,
    refresh_lock: Mutex<()>,
}

impl ModuleManager {
    /// Create a manager, resolving the modules root from the config
    pub fn new(config: HostConfig) -> Self {
        Self::with_reporter(config, Reporter::silent())
    }

    /// Create a manager that forwards progress and diagnostics to `reporter`
    pub fn with_reporter(config: HostConfig, reporter: Reporter) -> Self {
        let root = resolve_modules_root(&config.modules);
        Self::with_root(config, root, reporter)
    }

    /// Create a manager for an explicit modules root
    pub fn with_root(config: HostConfig, modules_root: PathBuf, reporter: Reporter) -> Self {
        let failures = Arc::new(FailureTracker::new());
        let layout = config.layout.clone();
        let filter = FolderFilter::new(config.modules.excluded_dirs.iter().cloned());
        let build_checker = BuildStatusChecker::new(layout.clone());

        let discovery = ModuleDiscovery::new(
            filter.clone(),
            StructureValidator::new(layout.clone()),
            build_checker.clone(),
        )
        .with_reporter(reporter.clone());

        let builder = BuildInvoker::new(&config.build)
            .with_failure_tracker(failures.clone())
            .with_reporter(reporter.clone());

        let loader = IsolatedLoader::new(layout, &config.loader, &modules_root)
            .with_failure_tracker(failures.clone())
            .with_reporter(reporter.clone());

        info!("Module manager using modules root {:?}", modules_root);

        Self {
            config,
            modules_root,
            filter,
            discovery,
            build_checker,
            builder,
            loader,
            failures,
            reporter,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Replace where the loader looks for shared runtime libraries
    pub fn with_shared_runtime(mut self, probe: SharedRuntimeProbe) -> Self {
        self.loader = self.loader.with_shared_runtime(probe);
        self
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn modules_root(&self) -> &Path {
        &self.modules_root
    }

    /// Shared handle to the session failure ledger
    pub fn failure_tracker(&self) -> Arc<FailureTracker> {
        self.failures.clone()
    }

    /// Directory a module named `name` would live in
    pub fn module_dir(&self, name: &str) -> ModuleDirectory {
        ModuleDirectory::new(self.modules_root.join(name))
    }

    /// Valid module directories under the modules root
    pub fn discover(&self) -> DiscoveryResult {
        self.discovery.discover(&self.modules_root)
    }

    /// Whether a module's artifacts are stale or missing
    pub fn needs_build(&self, dir: &ModuleDirectory) -> bool {
        self.build_checker.needs_build(&dir.path)
    }

    pub fn build_state(&self, dir: &ModuleDirectory) -> BuildState {
        self.build_checker.state(&dir.path)
    }

    /// Build one module directory; failures land in the ledger
    pub async fn build(&self, dir: &ModuleDirectory) -> bool {
        self.builder.invoke_build(&dir.path).await
    }

    /// Load one module directory; failures land in the ledger
    pub fn load(&self, dir: &ModuleDirectory) -> Option<LoadedModule> {
        self.loader.load(dir)
    }

    /// Load one module directory with the exact failure reason
    pub fn try_load(&self, dir: &ModuleDirectory) -> Result<LoadedModule, LoadError> {
        self.loader.try_load(dir)
    }

    /// Load the module whose metadata name matches `name`
    pub fn find_by_name(&self, name: &str) -> Option<LoadedModule> {
        loader::find_by_name(&self.discovery, &self.modules_root, &self.loader, name)
    }

    /// Stored failures (a copy)
    pub fn failures(&self) -> Vec<String> {
        self.failures.get()
    }

    /// Stored failures plus a fresh sweep of the modules root
    pub fn recompute_failures(&self) -> Vec<String> {
        self.failures
            .recompute(&self.modules_root, &self.filter, &self.config.layout)
    }

    pub fn clear_failures(&self) {
        self.failures.clear();
    }

    /// Discover, build stale modules, and load everything that built
    ///
    /// Runs on the caller's task; loading itself happens on a blocking
    /// thread. Only a root-level discovery failure is an error.
    pub async fn refresh(&self) -> Result<RefreshOutcome, DiscoveryError> {
        let _guard = self.refresh_lock.lock().await;

        self.reporter.step(STEP_DISCOVER, "Discovering modules");
        let discovered = match self.discover() {
            Ok(discovered) => discovered,
            Err(e) => {
                let line = format!("[discovery] {}", e);
                error!("{}", line);
                self.reporter.line(&line);
                return Err(e);
            }
        };
        self.failures.clear();

        self.reporter.step(STEP_BUILD, "Building modules");
        let mut build_failures = Vec::new();
        let mut loadable = Vec::with_capacity(discovered.len());
        for dir in discovered {
            if self.build_checker.needs_build(&dir.path) {
                self.reporter.step(STEP_BUILD, &format!("Building {}", dir.name));
                if !self.builder.invoke_build(&dir.path).await {
                    build_failures.push(dir.name.clone());
                    continue;
                }
            }
            loadable.push(dir);
        }

        self.reporter.step(STEP_LOAD, "Loading modules");
        let names: Vec<String> = loadable.iter().map(|d| d.name.clone()).collect();
        let batch = BatchLoader::new(
            self.loader.clone(),
            Duration::from_secs(self.config.loader.batch_timeout_secs),
        )
        .with_progress_step(STEP_LOAD, self.reporter.clone());

        let result = match tokio::task::spawn_blocking(move || batch.load_all(&loadable)).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Module loading task failed: {}", e);
                loader::LoadResult {
                    failed: names,
                    ..Default::default()
                }
            }
        };

        let mut failures = build_failures;
        failures.extend(result.failed);
        self.failures.store(failures);

        let outcome = RefreshOutcome {
            modules: result.modules,
            failures: self.failures.get(),
            skipped: result.skipped,
            timed_out: result.timed_out,
        };

        let summary = format!(
            "Done: {} loaded, {} failed, {} skipped",
            outcome.modules.len(),
            outcome.failures.len(),
            outcome.skipped.len()
        );
        self.reporter.step(STEP_DONE, &summary);
        Ok(outcome)
    }
}
