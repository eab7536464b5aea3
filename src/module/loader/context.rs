//! Isolated loading context
//!
//! One context per load attempt. It maps file names to the module's own
//! artifact directory first, then to the shared runtime locations, and it
//! owns every library opened on the module's behalf. The libraries move
//! into the [`LoadedModule`](super::LoadedModule) when instantiation
//! succeeds; otherwise they are released with the context.

use libloading::Library;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Context composition failures
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("no shared runtime location found (tried: {})", format_paths(.tried))]
    NoSharedRuntime { tried: Vec<PathBuf> },

    #[error("context has no non-empty location (tried: {})", format_paths(.tried))]
    Empty { tried: Vec<PathBuf> },
}

impl ContextError {
    /// Every path probed during composition
    pub fn tried(&self) -> &[PathBuf] {
        match self {
            ContextError::NoSharedRuntime { tried } | ContextError::Empty { tried } => tried,
        }
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where to look for the shared runtime libraries
#[derive(Debug, Clone)]
pub struct SharedRuntimeProbe {
    /// Relative candidate locations
    candidates: Vec<String>,
    /// Base directories the candidates are resolved against, in order
    bases: Vec<PathBuf>,
    /// Whether a missing shared runtime fails composition
    required: bool,
    /// Library names preloaded from the resolved locations
    libraries: Vec<String>,
}

impl SharedRuntimeProbe {
    pub fn new(candidates: Vec<String>, bases: Vec<PathBuf>, required: bool) -> Self {
        Self {
            candidates,
            bases,
            required,
            libraries: Vec::new(),
        }
    }

    /// Preload exactly these libraries (names, not file names)
    pub fn with_libraries(mut self, libraries: Vec<String>) -> Self {
        self.libraries = libraries;
        self
    }

    pub fn libraries(&self) -> &[String] {
        &self.libraries
    }

    /// Bases used by the host: working dir, modules root, its parent, executable dir
    pub fn default_bases(modules_root: &Path) -> Vec<PathBuf> {
        let mut bases = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            bases.push(cwd);
        }
        bases.push(modules_root.to_path_buf());
        if let Some(parent) = modules_root.parent() {
            bases.push(parent.to_path_buf());
        }
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            bases.push(exe_dir);
        }
        bases
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Existing, non-empty locations (deduplicated) and every path tried
    pub fn probe(&self) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        let mut tried = Vec::new();

        for base in &self.bases {
            for candidate in &self.candidates {
                let path = base.join(candidate);
                tried.push(path.clone());
                if !is_non_empty_dir(&path) {
                    continue;
                }
                let canonical = path.canonicalize().unwrap_or(path);
                if seen.insert(canonical.clone()) {
                    found.push(canonical);
                }
            }
        }

        (found, tried)
    }
}

/// Resolution boundary for one load attempt
pub struct IsolatedContext {
    module: String,
    /// Module artifact location first, then shared runtime locations
    locations: Vec<PathBuf>,
    shared_locations: Vec<PathBuf>,
    preloaded: Vec<PathBuf>,
    libraries: Vec<Arc<Library>>,
}

impl IsolatedContext {
    /// Compose a context for `module` whose build output lives in `artifact_dir`
    pub fn compose(
        module: &str,
        artifact_dir: &Path,
        shared: &SharedRuntimeProbe,
    ) -> Result<Self, ContextError> {
        let (shared_locations, mut tried) = shared.probe();

        if shared_locations.is_empty() {
            if shared.is_required() {
                warn!(
                    "No shared runtime for module {} (tried: {})",
                    module,
                    format_paths(&tried)
                );
                return Err(ContextError::NoSharedRuntime { tried });
            }
            debug!("No shared runtime for module {}, continuing without", module);
        } else {
            info!(
                "Shared runtime for module {} resolved at {}",
                module,
                format_paths(&shared_locations)
            );
        }

        let mut locations = Vec::with_capacity(shared_locations.len() + 1);
        tried.insert(0, artifact_dir.to_path_buf());
        if is_non_empty_dir(artifact_dir) {
            locations.push(artifact_dir.to_path_buf());
        }
        locations.extend(shared_locations.iter().cloned());

        if locations.is_empty() {
            return Err(ContextError::Empty { tried });
        }

        let mut context = Self {
            module: module.to_string(),
            locations,
            shared_locations,
            preloaded: Vec::new(),
            libraries: Vec::new(),
        };
        context.preload_shared(shared.libraries());
        Ok(context)
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Search order used by [`locate`](Self::locate)
    pub fn locations(&self) -> &[PathBuf] {
        &self.locations
    }

    pub fn shared_locations(&self) -> &[PathBuf] {
        &self.shared_locations
    }

    /// Shared runtime libraries opened during composition
    pub fn preloaded(&self) -> &[PathBuf] {
        &self.preloaded
    }

    /// Number of libraries currently held by the context
    pub fn library_count(&self) -> usize {
        self.libraries.len()
    }

    /// First location containing `file_name`
    pub fn locate(&self, file_name: impl AsRef<Path>) -> Option<PathBuf> {
        let file_name = file_name.as_ref();
        self.locations
            .iter()
            .map(|location| location.join(file_name))
            .find(|path| path.is_file())
    }

    /// Open the module's own artifact and keep it alive with the context
    ///
    /// Opening runs the library's static initializers.
    pub fn open_module_library(&mut self, path: &Path) -> Result<Arc<Library>, libloading::Error> {
        // SAFETY: loading arbitrary code is the point of the module system;
        // the artifact passed structural validation and was built by the host.
        let library = Arc::new(unsafe { Library::new(path) }?);
        self.libraries.push(library.clone());
        Ok(library)
    }

    /// Hand the opened libraries to the instantiated module
    pub fn into_libraries(self) -> Vec<Arc<Library>> {
        self.libraries
    }

    /// Make the listed shared runtime libraries visible to the module's dependencies
    ///
    /// Nothing else in the shared locations is opened. Missing names are skipped.
    fn preload_shared(&mut self, names: &[String]) {
        for name in names {
            let file_name = libloading::library_filename(name);
            let Some(path) = self.locate(&file_name) else {
                warn!(
                    "Shared library {} ({:?}) not found for module {}",
                    name, file_name, self.module
                );
                continue;
            };
            match open_global(&path) {
                Ok(library) => {
                    debug!("Preloaded shared library {:?} for {}", path, self.module);
                    self.preloaded.push(path);
                    self.libraries.push(Arc::new(library));
                }
                Err(e) => warn!("Skipping shared library {:?}: {}", path, e),
            }
        }
    }
}

impl fmt::Debug for IsolatedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolatedContext")
            .field("module", &self.module)
            .field("locations", &self.locations)
            .field("preloaded", &self.preloaded)
            .field("libraries", &self.libraries.len())
            .finish()
    }
}

fn is_non_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(unix)]
fn open_global(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};
    // SAFETY: shared runtime libraries ship with the host
    unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL) }.map(Library::from)
}

#[cfg(not(unix))]
fn open_global(path: &Path) -> Result<Library, libloading::Error> {
    // SAFETY: shared runtime libraries ship with the host
    unsafe { Library::new(path) }
}

/// A real shared object from the system, for fixtures that need one to open
#[cfg(all(test, target_os = "linux"))]
pub(crate) fn system_shared_object() -> Option<PathBuf> {
    [
        "/lib/x86_64-linux-gnu/libm.so.6",
        "/usr/lib/x86_64-linux-gnu/libm.so.6",
        "/lib/aarch64-linux-gnu/libm.so.6",
        "/usr/lib/aarch64-linux-gnu/libm.so.6",
        "/lib64/libm.so.6",
        "/usr/lib64/libm.so.6",
        "/usr/lib/libm.so.6",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|path| path.is_file())
}
