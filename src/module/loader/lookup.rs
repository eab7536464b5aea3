//! Lookup by module name
//!
//! Names only exist once a module is loaded, so lookup loads candidates
//! one at a time and stops at the first match. Directories whose name
//! matches the wanted name are tried first.

use std::path::Path;
use tracing::{debug, warn};

use crate::module::loader::loaded::LoadedModule;
use crate::module::loader::loader::ModuleLoad;
use crate::module::registry::{ModuleDirectory, ModuleDiscovery};

/// Case-insensitive comparison of trimmed names
pub fn names_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Load the module whose metadata name equals `name`
///
/// Discovery failures and an empty root both yield `None`. Every
/// non-matching module loaded along the way is stopped before the next
/// candidate is tried.
pub fn find_by_name<L>(
    discovery: &ModuleDiscovery,
    root: &Path,
    loader: &L,
    name: &str,
) -> Option<LoadedModule>
where
    L: ModuleLoad + ?Sized,
{
    let wanted = name.trim();
    if wanted.is_empty() {
        debug!("Ignoring lookup of an empty module name");
        return None;
    }

    let dirs = match discovery.discover(root) {
        Ok(dirs) => dirs,
        Err(e) => {
            warn!("Lookup of {} failed: {}", wanted, e);
            return None;
        }
    };

    find_in(&dirs, loader, wanted)
}

/// Lookup over an already-discovered directory list
pub fn find_in<L>(dirs: &[ModuleDirectory], loader: &L, name: &str) -> Option<LoadedModule>
where
    L: ModuleLoad + ?Sized,
{
    let (likely, rest): (Vec<&ModuleDirectory>, Vec<&ModuleDirectory>) =
        dirs.iter().partition(|dir| names_match(&dir.name, name));

    for dir in likely.into_iter().chain(rest) {
        let Some(mut module) = loader.load(dir) else {
            continue;
        };
        if names_match(module.name(), name) {
            debug!("Found module {} in {:?}", module.name(), dir.path);
            return Some(module);
        }
        module.stop();
    }

    debug!("No loaded module is named {}", name);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::traits::{GameModule, HostStage, Message, ModuleMetadata, Surface};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct Tracked {
        name: String,
        stopped: Arc<Mutex<Vec<String>>>,
    }

    impl GameModule for Tracked {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata {
                name: self.name.clone(),
                version: "1.0.0".to_string(),
                description: String::new(),
                author: "tests".to_string(),
                supported_modes: Vec::new(),
                min_players: 1,
                max_players: 2,
                extra: Default::default(),
            }
        }
        fn launch(&mut self, stage: &HostStage) -> Surface {
            Surface {
                title: stage.title.clone(),
                root: serde_json::Value::Null,
            }
        }
        fn handle_message(&mut self, _message: &Message) -> Option<Message> {
            None
        }
        fn stop(&mut self) {
            self.stopped.lock().unwrap().push(self.name.clone());
        }
    }

    /// Directory `dir_x` loads a module named by `display`
    fn loader_with(
        display: &'static [(&'static str, &'static str)],
        calls: Arc<AtomicUsize>,
        stopped: Arc<Mutex<Vec<String>>>,
    ) -> impl Fn(&ModuleDirectory) -> Option<LoadedModule> {
        move |dir: &ModuleDirectory| {
            calls.fetch_add(1, Ordering::SeqCst);
            let (_, name) = display.iter().find(|(d, _)| *d == dir.name)?;
            LoadedModule::from_instance(Box::new(Tracked {
                name: name.to_string(),
                stopped: stopped.clone(),
            }))
            .ok()
        }
    }

    fn dirs(names: &[&str]) -> Vec<ModuleDirectory> {
        names
            .iter()
            .map(|n| ModuleDirectory::new(format!("/modules/{n}")))
            .collect()
    }

    #[test]
    fn test_case_insensitive_trimmed_match() {
        assert!(names_match("Chess", "  chess "));
        assert!(!names_match("chess", "checkers"));
    }

    #[test]
    fn test_stops_non_matches_and_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(Mutex::new(Vec::new()));
        let loader = loader_with(
            &[("a", "Snake"), ("b", "Chess"), ("c", "Tetris")],
            calls.clone(),
            stopped.clone(),
        );

        let found = find_in(&dirs(&["a", "b", "c"]), &loader, "chess").unwrap();
        assert_eq!(found.name(), "Chess");
        assert!(!found.is_stopped());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(stopped.lock().unwrap().as_slice(), &["Snake".to_string()]);
    }

    #[test]
    fn test_matching_directory_tried_first() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(Mutex::new(Vec::new()));
        let loader = loader_with(
            &[("a", "Snake"), ("b", "Tetris"), ("pong", "Pong")],
            calls.clone(),
            stopped.clone(),
        );

        let found = find_in(&dirs(&["a", "b", "pong"]), &loader, "PONG").unwrap();
        assert_eq!(found.name(), "Pong");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(stopped.lock().unwrap().is_empty());
    }

    #[test]
    fn test_absent_name_loads_everything_and_stops_it() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(Mutex::new(Vec::new()));
        let loader = loader_with(&[("a", "Snake"), ("b", "Tetris")], calls.clone(), stopped.clone());

        assert!(find_in(&dirs(&["a", "broken", "b"]), &loader, "chess").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(stopped.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_inputs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(Mutex::new(Vec::new()));
        let loader = loader_with(&[], calls.clone(), stopped);
        assert!(find_in(&[], &loader, "chess").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_root_is_none() {
        use crate::config::LayoutConfig;
        use crate::module::build::BuildStatusChecker;
        use crate::module::registry::FolderFilter;
        use crate::module::validation::StructureValidator;

        let layout = LayoutConfig::default();
        let discovery = ModuleDiscovery::new(
            FolderFilter::default(),
            StructureValidator::new(layout.clone()),
            BuildStatusChecker::new(layout),
        );
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = loader_with(&[], calls.clone(), Arc::new(Mutex::new(Vec::new())));
        assert!(find_by_name(&discovery, Path::new("/no/such/root"), &loader, "chess").is_none());
        assert!(find_by_name(&discovery, Path::new("/no/such/root"), &loader, "   ").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
