//! Isolated module loader
//!
//! Loads one module directory: structural gate, artifact check, context
//! composition, entry-point resolution, compatibility check, construction.
//! Every failure is contained and surfaces as a [`LoadError`]; `load`
//! flattens it to `None` after logging and recording it.

use libloading::Library;
use std::fmt;
use std::panic::catch_unwind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{LayoutConfig, LoaderConfig};
use crate::module::abi::{Incompatibility, ModuleDeclaration, ENTRY_SYMBOL};
use crate::module::build::{BuildState, BuildStatusChecker};
use crate::module::failures::FailureTracker;
use crate::module::loader::context::{ContextError, IsolatedContext, SharedRuntimeProbe};
use crate::module::loader::loaded::{panic_message, LoadedModule};
use crate::module::registry::ModuleDirectory;
use crate::module::traits::Reporter;
use crate::module::validation::StructureValidator;
use crate::utils::{Deadline, DeadlineExceeded};

/// Failures while resolving or running the module's entry point
#[derive(Debug, Error)]
pub enum EntryPointFailure {
    #[error("library failed to open or initialize: {0}")]
    LibraryOpen(String),

    #[error("entry symbol not exported: {0}")]
    SymbolMissing(String),

    #[error("entry symbol is null")]
    NullDeclaration,

    #[error("{0}")]
    Incompatible(Incompatibility),

    #[error("entry constructor panicked: {0}")]
    ConstructionPanicked(String),

    #[error("metadata accessor panicked: {0}")]
    MetadataPanicked(String),
}

/// Why a single module did not load
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{module} is not a valid module: {reason}")]
    StructuralInvalid { module: String, reason: String },

    #[error("entry artifact not found at {}", .0.display())]
    ArtifactMissing(PathBuf),

    #[error(transparent)]
    ContextResolutionFailed(#[from] ContextError),

    #[error("{module}: {failure}")]
    EntryPoint {
        module: String,
        #[source]
        failure: EntryPointFailure,
    },

    #[error("load timed out: {0}")]
    Timeout(#[from] DeadlineExceeded),
}

/// Coarse failure category for callers and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadFailureKind {
    /// Nothing loadable is there (not a module, or never built)
    Absent,
    /// Present but broken (environment, library, or constructor)
    Broken,
    /// Present but built against a different host contract
    Incompatible,
    /// Budget exhausted between steps
    TimedOut,
}

impl fmt::Display for LoadFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadFailureKind::Absent => write!(f, "absent"),
            LoadFailureKind::Broken => write!(f, "broken"),
            LoadFailureKind::Incompatible => write!(f, "incompatible"),
            LoadFailureKind::TimedOut => write!(f, "timed out"),
        }
    }
}

impl LoadError {
    pub fn kind(&self) -> LoadFailureKind {
        match self {
            LoadError::StructuralInvalid { .. } | LoadError::ArtifactMissing(_) => {
                LoadFailureKind::Absent
            }
            LoadError::EntryPoint {
                failure: EntryPointFailure::Incompatible(_),
                ..
            } => LoadFailureKind::Incompatible,
            LoadError::ContextResolutionFailed(_) | LoadError::EntryPoint { .. } => {
                LoadFailureKind::Broken
            }
            LoadError::Timeout(_) => LoadFailureKind::TimedOut,
        }
    }
}

/// Anything that turns a module directory into a loaded module
pub trait ModuleLoad {
    /// Load one module; failures are handled internally
    fn load(&self, dir: &ModuleDirectory) -> Option<LoadedModule>;
}

impl<F> ModuleLoad for F
where
    F: Fn(&ModuleDirectory) -> Option<LoadedModule>,
{
    fn load(&self, dir: &ModuleDirectory) -> Option<LoadedModule> {
        self(dir)
    }
}

/// Loads modules from their build artifacts, one context per attempt
#[derive(Debug, Clone)]
pub struct IsolatedLoader {
    validator: StructureValidator,
    build_checker: BuildStatusChecker,
    shared_runtime: SharedRuntimeProbe,
    module_timeout: Duration,
    failures: Option<Arc<FailureTracker>>,
    reporter: Reporter,
}

impl IsolatedLoader {
    pub fn new(layout: LayoutConfig, config: &LoaderConfig, modules_root: &Path) -> Self {
        Self {
            validator: StructureValidator::new(layout.clone()),
            build_checker: BuildStatusChecker::new(layout),
            shared_runtime: SharedRuntimeProbe::new(
                config.shared_lib_candidates.clone(),
                SharedRuntimeProbe::default_bases(modules_root),
                config.require_shared_runtime,
            )
            .with_libraries(config.shared_libs.clone()),
            module_timeout: Duration::from_secs(config.module_timeout_secs),
            failures: None,
            reporter: Reporter::silent(),
        }
    }

    /// Replace the shared runtime probe
    pub fn with_shared_runtime(mut self, probe: SharedRuntimeProbe) -> Self {
        self.shared_runtime = probe;
        self
    }

    pub fn with_module_timeout(mut self, timeout: Duration) -> Self {
        self.module_timeout = timeout;
        self
    }

    /// Record failed loads in the given ledger
    pub fn with_failure_tracker(mut self, failures: Arc<FailureTracker>) -> Self {
        self.failures = Some(failures);
        self
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn layout(&self) -> &LayoutConfig {
        self.validator.layout()
    }

    /// Load one module directory, reporting exactly why it failed
    ///
    /// The budget is checked between steps; a step in flight is never
    /// interrupted.
    pub fn try_load(&self, dir: &ModuleDirectory) -> Result<LoadedModule, LoadError> {
        let deadline = Deadline::start(self.module_timeout);
        let layout = self.validator.layout();

        deadline.check("structural validation")?;
        let validation = self.validator.validate(&dir.path);
        if !validation.is_valid() {
            return Err(LoadError::StructuralInvalid {
                module: dir.name.clone(),
                reason: validation.summary(),
            });
        }

        deadline.check("artifact check")?;
        match self.build_checker.state(&dir.path) {
            BuildState::Missing => {
                return Err(LoadError::ArtifactMissing(layout.artifact_path_for(&dir.path)));
            }
            BuildState::NeedsBuild => {
                warn!("Module {} has sources newer than its artifact, loading it anyway", dir.name)
            }
            BuildState::UpToDate => {}
        }

        deadline.check("context composition")?;
        let mut context = IsolatedContext::compose(
            &dir.name,
            &layout.artifact_dir_for(&dir.path),
            &self.shared_runtime,
        )?;

        deadline.check("entry-point resolution")?;
        let artifact = context
            .locate(&layout.artifact_file_name())
            .ok_or_else(|| LoadError::ArtifactMissing(layout.artifact_path_for(&dir.path)))?;
        debug!("Opening {:?} for module {}", artifact, dir.name);
        let library = context
            .open_module_library(&artifact)
            .map_err(|e| entry_point(dir, EntryPointFailure::LibraryOpen(e.to_string())))?;
        let declaration = read_declaration(&library).map_err(|failure| entry_point(dir, failure))?;
        drop(library);

        let module = instantiate(dir, declaration, context, &deadline)?;

        info!(
            "Loaded module {} v{} from {}",
            module.name(),
            module.metadata().version,
            dir.name
        );
        Ok(module)
    }
}

impl ModuleLoad for IsolatedLoader {
    fn load(&self, dir: &ModuleDirectory) -> Option<LoadedModule> {
        match self.try_load(dir) {
            Ok(module) => Some(module),
            Err(e) => {
                let line = format!("[load] {} failed ({}): {}", dir.name, e.kind(), e);
                warn!("{}", line);
                self.reporter.line(&line);
                if let Some(failures) = &self.failures {
                    failures.add(&dir.name);
                }
                None
            }
        }
    }
}

fn entry_point(dir: &ModuleDirectory, failure: EntryPointFailure) -> LoadError {
    LoadError::EntryPoint {
        module: dir.name.clone(),
        failure,
    }
}

/// Check the declaration against the host and construct the module
///
/// On success the context's libraries move into the loaded module.
fn instantiate(
    dir: &ModuleDirectory,
    declaration: ModuleDeclaration,
    context: IsolatedContext,
    deadline: &Deadline,
) -> Result<LoadedModule, LoadError> {
    deadline.check("compatibility check")?;
    declaration
        .check_compatible()
        .map_err(|e| entry_point(dir, EntryPointFailure::Incompatible(e)))?;

    deadline.check("instantiation")?;
    let instance = match catch_unwind(declaration.create) {
        Ok(instance) => instance,
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            drop(panic);
            drop(context);
            return Err(entry_point(dir, EntryPointFailure::ConstructionPanicked(detail)));
        }
    };

    LoadedModule::assemble(instance, context.into_libraries(), Some(dir.path.clone()))
        .map_err(|detail| entry_point(dir, EntryPointFailure::MetadataPanicked(detail)))
}

/// Copy the exported declaration out of the library
fn read_declaration(library: &Library) -> Result<ModuleDeclaration, EntryPointFailure> {
    // SAFETY: `ENTRY_SYMBOL` names a `static ModuleDeclaration` emitted by
    // `declare_module!`; the copy is only used while `library` stays loaded.
    unsafe {
        let symbol = library
            .get::<*const ModuleDeclaration>(ENTRY_SYMBOL)
            .map_err(|e| EntryPointFailure::SymbolMissing(e.to_string()))?;
        let declaration = *symbol;
        if declaration.is_null() {
            return Err(EntryPointFailure::NullDeclaration);
        }
        Ok(*declaration)
    }
}
