//! Module loading system
//!
//! In-process loading of built module artifacts, one isolated context per
//! attempt, plus batch loading and lookup by name on top of it.

pub mod batch;
pub mod context;
pub mod loaded;
#[allow(clippy::module_inception)]
pub mod loader;
pub mod lookup;

pub use batch::{BatchLoader, LoadResult};
pub use context::{ContextError, IsolatedContext, SharedRuntimeProbe};
pub use loaded::LoadedModule;
pub use loader::{EntryPointFailure, IsolatedLoader, LoadError, LoadFailureKind, ModuleLoad};
pub use lookup::{find_by_name, find_in, names_match};
