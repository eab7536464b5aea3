//! Handle to an instantiated module
//!
//! Owns the module instance together with every library its code lives
//! in. Field order matters: the instance is dropped before the libraries
//! that hold its vtable.

use libloading::Library;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::module::traits::{GameModule, HostStage, Message, ModuleError, ModuleMetadata, Surface};

/// A loaded module instance
pub struct LoadedModule {
    instance: Box<dyn GameModule>,
    metadata: ModuleMetadata,
    directory: Option<PathBuf>,
    stopped: bool,
    _libraries: Vec<Arc<Library>>,
}

impl LoadedModule {
    /// Wrap an instance, running the metadata smoke test
    pub(crate) fn assemble(
        instance: Box<dyn GameModule>,
        libraries: Vec<Arc<Library>>,
        directory: Option<PathBuf>,
    ) -> Result<Self, String> {
        let metadata = match catch_unwind(AssertUnwindSafe(|| instance.metadata())) {
            Ok(metadata) => metadata,
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                // Payload and instance must go before the libraries they came from
                drop(panic);
                drop(instance);
                drop(libraries);
                return Err(detail);
            }
        };
        Ok(Self {
            instance,
            metadata,
            directory,
            stopped: false,
            _libraries: libraries,
        })
    }

    /// Wrap a module compiled into the host itself
    pub fn from_instance(instance: Box<dyn GameModule>) -> Result<Self, ModuleError> {
        Self::assemble(instance, Vec::new(), None).map_err(|detail| ModuleError::Panicked {
            operation: "metadata".to_string(),
            detail,
        })
    }

    /// Metadata captured when the module was loaded
    pub fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Directory the module was loaded from (None for built-in modules)
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Produce the module's main surface
    pub fn launch(&mut self, stage: &HostStage) -> Result<Surface, ModuleError> {
        self.ensure_running()?;
        let instance = &mut self.instance;
        guard("launch", || instance.launch(stage))
    }

    /// Forward a message to the module
    pub fn handle_message(&mut self, message: &Message) -> Result<Option<Message>, ModuleError> {
        self.ensure_running()?;
        let instance = &mut self.instance;
        guard("handle_message", || instance.handle_message(message))
    }

    /// Stop the module; later calls are no-ops
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        debug!("Stopping module {}", self.metadata.name);
        let instance = &mut self.instance;
        if let Err(e) = guard("stop", || instance.stop()) {
            warn!("{}", e);
        }
    }

    fn ensure_running(&self) -> Result<(), ModuleError> {
        if self.stopped {
            return Err(ModuleError::Stopped(self.metadata.name.clone()));
        }
        Ok(())
    }
}

impl Drop for LoadedModule {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.metadata.name)
            .field("version", &self.metadata.version)
            .field("directory", &self.directory)
            .field("stopped", &self.stopped)
            .field("libraries", &self._libraries.len())
            .finish()
    }
}

/// Run module code, turning a panic into a [`ModuleError`]
fn guard<T>(operation: &str, f: impl FnOnce() -> T) -> Result<T, ModuleError> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|panic| ModuleError::Panicked {
        operation: operation.to_string(),
        detail: panic_message(panic.as_ref()),
    })
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        stops: Arc<AtomicUsize>,
        panic_on_launch: bool,
    }

    impl GameModule for Counter {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata {
                name: "counter".to_string(),
                version: "0.1.0".to_string(),
                description: "counts stops".to_string(),
                author: "tests".to_string(),
                supported_modes: Vec::new(),
                min_players: 1,
                max_players: 1,
                extra: Default::default(),
            }
        }

        fn launch(&mut self, stage: &HostStage) -> Surface {
            if self.panic_on_launch {
                panic!("board missing");
            }
            Surface {
                title: stage.title.clone(),
                root: serde_json::json!({"kind": "board"}),
            }
        }

        fn handle_message(&mut self, message: &Message) -> Option<Message> {
            Some(message.clone())
        }

        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct BrokenMetadata;

    impl GameModule for BrokenMetadata {
        fn metadata(&self) -> ModuleMetadata {
            panic!("metadata unavailable")
        }
        fn launch(&mut self, _stage: &HostStage) -> Surface {
            unreachable!()
        }
        fn handle_message(&mut self, _message: &Message) -> Option<Message> {
            None
        }
        fn stop(&mut self) {}
    }

    fn counter(panic_on_launch: bool) -> (LoadedModule, Arc<AtomicUsize>) {
        let stops = Arc::new(AtomicUsize::new(0));
        let module = LoadedModule::from_instance(Box::new(Counter {
            stops: stops.clone(),
            panic_on_launch,
        }))
        .unwrap();
        (module, stops)
    }

    #[test]
    fn test_stop_is_idempotent_and_runs_on_drop() {
        let (mut module, stops) = counter(false);
        module.stop();
        module.stop();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        drop(module);
        assert_eq!(stops.load(Ordering::SeqCst), 1);

        let (module, stops) = counter(false);
        drop(module);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_launch_and_messages() {
        let (mut module, _) = counter(false);
        assert_eq!(module.name(), "counter");
        assert!(module.directory().is_none());

        let surface = module.launch(&HostStage::new("Counter", 800, 600)).unwrap();
        assert_eq!(surface.title, "Counter");

        let mut message = Message::new();
        message.insert("move".to_string(), serde_json::json!("e4"));
        assert_eq!(module.handle_message(&message).unwrap(), Some(message.clone()));

        module.stop();
        assert!(matches!(module.handle_message(&message), Err(ModuleError::Stopped(_))));
    }

    #[test]
    fn test_panicking_launch_is_contained() {
        let (mut module, _) = counter(true);
        let err = module.launch(&HostStage::default()).unwrap_err();
        match err {
            ModuleError::Panicked { operation, detail } => {
                assert_eq!(operation, "launch");
                assert!(detail.contains("board missing"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_metadata_smoke_test_failure() {
        let err = LoadedModule::from_instance(Box::new(BrokenMetadata)).unwrap_err();
        assert!(matches!(err, ModuleError::Panicked { .. }));
    }
}
