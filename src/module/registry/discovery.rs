//! Module discovery
//!
//! Scans the modules root and returns the directories that structurally
//! look like modules. Re-run on every refresh; nothing is cached.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::module::build::BuildStatusChecker;
use crate::module::registry::filter::FolderFilter;
use crate::module::traits::Reporter;
use crate::module::validation::{StructureValidator, ValidationResult};

/// A directory believed to contain one module
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleDirectory {
    /// Module directory path
    pub path: PathBuf,
    /// Module name (the directory name)
    pub name: String,
}

impl ModuleDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, name }
    }
}

/// Root-level discovery failures (require host/user action)
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("modules directory does not exist: {}", .0.display())]
    RootMissing(PathBuf),

    #[error("modules path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("modules directory {} is not readable: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Success carries the valid module directories (possibly empty)
pub type DiscoveryResult = Result<Vec<ModuleDirectory>, DiscoveryError>;

/// Module discovery scanner
#[derive(Debug, Clone)]
pub struct ModuleDiscovery {
    filter: FolderFilter,
    validator: StructureValidator,
    build_checker: BuildStatusChecker,
    reporter: Reporter,
}

impl ModuleDiscovery {
    pub fn new(
        filter: FolderFilter,
        validator: StructureValidator,
        build_checker: BuildStatusChecker,
    ) -> Self {
        Self {
            filter,
            validator,
            build_checker,
            reporter: Reporter::silent(),
        }
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn validator(&self) -> &StructureValidator {
        &self.validator
    }

    pub fn filter(&self) -> &FolderFilter {
        &self.filter
    }

    /// Discover all valid modules under `root`
    ///
    /// Order follows the directory listing; callers must not rely on it.
    /// An empty success triggers a diagnostic sweep but is still a success.
    pub fn discover(&self, root: &Path) -> DiscoveryResult {
        info!("Discovering modules in {:?}", root);

        let candidates = self.list_candidates(root)?;
        let mut modules = Vec::new();
        let mut rejected = Vec::new();

        for candidate in candidates {
            match self.validator.validate(&candidate.path) {
                ValidationResult::Valid => {
                    debug!("Module candidate accepted: {}", candidate.name);
                    modules.push(candidate);
                }
                invalid => {
                    debug!("Module candidate rejected: {} ({})", candidate.name, invalid.summary());
                    rejected.push((candidate, invalid));
                }
            }
        }

        if modules.is_empty() {
            self.diagnostic_sweep(root, &rejected);
        }

        info!("Discovered {} modules", modules.len());
        Ok(modules)
    }

    /// Immediate, non-excluded subdirectories of `root`
    pub fn list_candidates(&self, root: &Path) -> Result<Vec<ModuleDirectory>, DiscoveryError> {
        Self::list_candidates_with(&self.filter, root)
    }

    /// Candidate listing with an explicit filter (no structural checks)
    pub fn list_candidates_with(
        filter: &FolderFilter,
        root: &Path,
    ) -> Result<Vec<ModuleDirectory>, DiscoveryError> {
        if !root.exists() {
            return Err(DiscoveryError::RootMissing(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
        }

        let entries = fs::read_dir(root).map_err(|source| DiscoveryError::Unreadable {
            path: root.to_path_buf(),
            source,
        })?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to read entry in {:?}: {}", root, e);
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if filter.is_excluded(&name) {
                debug!("Skipping excluded directory {:?}", path);
                continue;
            }

            candidates.push(ModuleDirectory { path, name });
        }

        Ok(candidates)
    }

    /// Explain an empty result; observability only
    fn diagnostic_sweep(&self, root: &Path, rejected: &[(ModuleDirectory, ValidationResult)]) {
        if rejected.is_empty() {
            let line = format!("[discovery] no module directories under {}", root.display());
            warn!("{}", line);
            self.reporter.line(&line);
            return;
        }

        for (candidate, result) in rejected {
            let line = format!("[discovery] rejected {}: {}", candidate.name, result.summary());
            warn!("{}", line);
            self.reporter.line(&line);
        }

        for (candidate, _) in rejected {
            let state = self.build_checker.state(&candidate.path);
            let line = format!("[discovery] build status of {}: {}", candidate.name, state);
            debug!("{}", line);
            self.reporter.line(&line);
        }
    }
}
