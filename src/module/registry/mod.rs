//! Module registry and discovery
//!
//! Handles modules-root resolution, candidate filtering and directory discovery.

pub mod discovery;
pub mod filter;
pub mod root;

pub use discovery::{DiscoveryError, DiscoveryResult, ModuleDirectory, ModuleDiscovery};
pub use filter::FolderFilter;
pub use root::{resolve_modules_root, resolve_modules_root_from};
