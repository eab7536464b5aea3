//! Build staleness checks
//!
//! Compares the newest tracked source modification time with the entry
//! artifact's modification time. Recomputed on every call.

use std::fmt;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::LayoutConfig;

/// Build state of one module directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// Entry artifact exists and no tracked source is newer
    UpToDate,
    /// Entry artifact exists but a tracked source is newer
    NeedsBuild,
    /// Artifact directory or entry artifact absent
    Missing,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildState::UpToDate => write!(f, "up-to-date"),
            BuildState::NeedsBuild => write!(f, "needs-build"),
            BuildState::Missing => write!(f, "missing-entirely"),
        }
    }
}

/// Decides whether a module's artifacts are stale
#[derive(Debug, Clone)]
pub struct BuildStatusChecker {
    layout: LayoutConfig,
}

impl BuildStatusChecker {
    pub fn new(layout: LayoutConfig) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// True unless the state is [`BuildState::UpToDate`]
    pub fn needs_build(&self, dir: &Path) -> bool {
        self.state(dir) != BuildState::UpToDate
    }

    /// Current build state
    pub fn state(&self, dir: &Path) -> BuildState {
        let artifact_dir = self.layout.artifact_dir_for(dir);
        if !artifact_dir.is_dir() {
            debug!("No artifact directory at {:?}", artifact_dir);
            return BuildState::Missing;
        }

        let artifact = self.layout.artifact_path_for(dir);
        let artifact_time = match modified(&artifact) {
            Some(time) => time,
            None => {
                debug!("No entry artifact at {:?}", artifact);
                return BuildState::Missing;
            }
        };

        match self.newest_source(dir) {
            Some(source_time) if source_time > artifact_time => {
                debug!("Sources in {:?} are newer than {:?}", dir, artifact);
                BuildState::NeedsBuild
            }
            _ => BuildState::UpToDate,
        }
    }

    /// Newest modification time among tracked sources
    pub fn newest_source(&self, dir: &Path) -> Option<SystemTime> {
        let mut newest: Option<SystemTime> = None;
        let mut consider = |time: SystemTime| {
            if newest.map_or(true, |current| time > current) {
                newest = Some(time);
            }
        };

        for file in &self.layout.tracked_files {
            if let Some(time) = modified(&dir.join(file)) {
                consider(time);
            }
        }

        for source_dir in &self.layout.source_dirs {
            let root = dir.join(source_dir);
            if !root.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&root).into_iter() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Failed to walk {:?}: {}", root, e);
                        continue;
                    }
                };
                if !entry.file_type().is_file() || !self.is_tracked(entry.path()) {
                    continue;
                }
                if let Some(time) = entry.metadata().ok().and_then(|m| m.modified().ok()) {
                    consider(time);
                }
            }
        }

        newest
    }

    fn is_tracked(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| {
                self.layout
                    .tracked_extensions
                    .iter()
                    .any(|tracked| tracked.eq_ignore_ascii_case(ext))
            })
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    let metadata = std::fs::metadata(path).ok()?;
    if !metadata.is_file() {
        return None;
    }
    metadata.modified().ok()
}
