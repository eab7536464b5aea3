//! Arcade Host - game module discovery, build and loading
//!
//! This crate is the module subsystem of a desktop game host. Games ship as
//! module directories (Rust `cdylib` crates) under a modules root; the host
//! finds them, rebuilds stale ones with the external build tool, and loads
//! them in-process behind the [`GameModule`] contract.
//!
//! ## Writing a module
//!
//! A module crate depends on `arcade-host`, builds as a `cdylib` named
//! `game_module`, and exports its entry type with [`declare_module!`].
//! Its `src/lib.rs` declares `struct ModuleEntry` implementing
//! [`GameModule`]; its `src/metadata.rs` implements [`MetadataProvider`].
//!
//! ## Hosting modules
//!
//! ```rust,no_run
//! use arcade_host::{HostConfig, ModuleManager};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let manager = ModuleManager::new(HostConfig::default());
//! let outcome = manager.refresh().await?;
//! for module in &outcome.modules {
//!     println!("{} {}", module.name(), module.metadata().version);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod module;
pub mod utils;

pub use config::HostConfig;
pub use module::{
    GameModule, HostStage, LoadError, LoadedModule, Message, MetadataProvider, ModuleManager,
    ModuleMetadata, RefreshOutcome, Reporter, Surface,
};
