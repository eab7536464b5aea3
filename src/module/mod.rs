//! Module system for arcade-host
//!
//! Discovers module directories under the modules root, builds them on
//! demand, and loads their artifacts in-process.
//!
//! ## Architecture
//!
//! - **Structural gate**: a cheap source check before any build or load
//! - **Build on demand**: staleness from timestamps, external build tool
//! - **Isolated loading**: one resolution context per load attempt, with
//!   every failure contained and categorized
//! - **Failure ledger**: names of modules that failed this session

pub mod abi;
pub mod build;
pub mod failures;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod traits;
pub mod validation;

pub use abi::{Incompatibility, ModuleDeclaration};
pub use build::{BuildError, BuildInvoker, BuildState, BuildStatusChecker};
pub use failures::FailureTracker;
pub use loader::{
    find_by_name, BatchLoader, IsolatedLoader, LoadError, LoadFailureKind, LoadResult,
    LoadedModule, ModuleLoad,
};
pub use manager::{ModuleManager, RefreshOutcome};
pub use registry::{DiscoveryError, FolderFilter, ModuleDirectory, ModuleDiscovery};
pub use traits::{
    GameModule, HostStage, Message, MessageSink, MetadataProvider, ModuleError, ModuleMetadata,
    ProgressSink, Reporter, Surface,
};
pub use validation::{StructureValidator, ValidationResult};
