//! Module build support
//!
//! Staleness detection from filesystem timestamps and the external build
//! tool invocation.

pub mod invoker;
pub mod status;

pub use invoker::{probe_build_tool, BuildError, BuildInvoker};
pub use status::{BuildState, BuildStatusChecker};
