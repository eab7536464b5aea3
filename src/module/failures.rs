//! Failure ledger
//!
//! Names of modules that failed to build or load during the current
//! session. Owned explicitly and shared by `Arc`; intended for a single
//! background writer, with `store`/`clear` as last-writer-wins operations.

use std::path::Path;
use std::sync::RwLock;
use tracing::debug;

use crate::config::LayoutConfig;
use crate::module::registry::{FolderFilter, ModuleDiscovery};

/// Process-wide (per session) list of failed module names
#[derive(Debug, Default)]
pub struct FailureTracker {
    names: RwLock<Vec<String>>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole ledger (duplicates collapsed, order kept)
    pub fn store<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut deduped: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !deduped.contains(&name) {
                deduped.push(name);
            }
        }
        *self.write() = deduped;
    }

    /// Snapshot copy of the ledger
    pub fn get(&self) -> Vec<String> {
        self.read().clone()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Record one failure; adding an existing name is a no-op
    pub fn add(&self, name: &str) {
        let mut names = self.write();
        if !names.iter().any(|existing| existing == name) {
            debug!("Recording module failure: {}", name);
            names.push(name.to_string());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().iter().any(|existing| existing == name)
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Stored names plus a fresh filesystem sweep
    ///
    /// The sweep flags every candidate directory under `root` that has an
    /// entry-point source but no non-empty artifact directory. The ledger
    /// itself is not modified. A missing or unreadable root contributes
    /// nothing to the sweep.
    pub fn recompute(&self, root: &Path, filter: &FolderFilter, layout: &LayoutConfig) -> Vec<String> {
        let mut names = self.get();

        let candidates = match ModuleDiscovery::list_candidates_with(filter, root) {
            Ok(candidates) => candidates,
            Err(e) => {
                debug!("Failure sweep skipped: {}", e);
                return names;
            }
        };

        for candidate in candidates {
            let has_sources = candidate.path.join(&layout.entry_source).is_file();
            if has_sources && !has_artifacts(&layout.artifact_dir_for(&candidate.path))
                && !names.contains(&candidate.name)
            {
                debug!("Failure sweep flagged {}", candidate.name);
                names.push(candidate.name);
            }
        }

        names
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<String>> {
        self.names.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<String>> {
        self.names.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Artifact directory exists and has at least one entry
fn has_artifacts(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_add_is_idempotent() {
        let tracker = FailureTracker::new();
        tracker.add("chess");
        tracker.add("chess");
        assert_eq!(tracker.get(), vec!["chess".to_string()]);
        assert!(tracker.contains("chess"));
    }

    #[test]
    fn test_store_replaces_and_get_copies() {
        let tracker = FailureTracker::new();
        tracker.add("old");
        tracker.store(["a", "b", "a"]);
        let mut snapshot = tracker.get();
        assert_eq!(snapshot, vec!["a".to_string(), "b".to_string()]);

        snapshot.push("mutated".to_string());
        assert_eq!(tracker.get().len(), 2);

        tracker.clear();
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_recompute_unions_with_sweep() {
        let tmp = TempDir::new().unwrap();
        let layout = LayoutConfig::default();

        // sources, no artifacts -> flagged
        fs::create_dir_all(tmp.path().join("bar/src")).unwrap();
        fs::write(tmp.path().join("bar/src/lib.rs"), "").unwrap();

        // sources, empty artifact dir -> flagged
        fs::create_dir_all(tmp.path().join("empty/src")).unwrap();
        fs::write(tmp.path().join("empty/src/lib.rs"), "").unwrap();
        fs::create_dir_all(tmp.path().join("empty/target/release")).unwrap();

        // sources and artifacts -> fine
        fs::create_dir_all(tmp.path().join("ok/src")).unwrap();
        fs::write(tmp.path().join("ok/src/lib.rs"), "").unwrap();
        fs::create_dir_all(tmp.path().join("ok/target/release")).unwrap();
        fs::write(tmp.path().join("ok/target/release/x"), "").unwrap();

        // no sources -> not a module, ignored
        fs::create_dir_all(tmp.path().join("assets")).unwrap();

        let tracker = FailureTracker::new();
        tracker.add("crashed");
        tracker.add("bar");

        let mut names = tracker.recompute(tmp.path(), &FolderFilter::default(), &layout);
        assert_eq!(names[0], "crashed");
        assert_eq!(names[1], "bar");
        names.sort();
        assert_eq!(names, vec!["bar", "crashed", "empty"]);

        // ledger untouched
        assert_eq!(tracker.get(), vec!["crashed".to_string(), "bar".to_string()]);
    }

    #[test]
    fn test_recompute_with_missing_root() {
        let tracker = FailureTracker::new();
        tracker.add("x");
        let names = tracker.recompute(
            Path::new("/definitely/not/here"),
            &FolderFilter::default(),
            &LayoutConfig::default(),
        );
        assert_eq!(names, vec!["x".to_string()]);
    }

    proptest! {
        #[test]
        fn prop_add_never_duplicates(names in prop::collection::vec("[a-c]{1,2}", 0..40)) {
            let tracker = FailureTracker::new();
            for name in &names {
                tracker.add(name);
                tracker.add(name);
            }
            let stored = tracker.get();
            for name in &names {
                prop_assert_eq!(stored.iter().filter(|s| *s == name).count(), 1);
            }
            let mut unique = names.clone();
            unique.sort();
            unique.dedup();
            prop_assert_eq!(stored.len(), unique.len());
        }
    }
}
