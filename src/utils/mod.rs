//! Utility modules shared by the host and its module subsystem

pub mod logging;
pub mod timeout;

// Re-export commonly used items
pub use logging::{init_logging, init_logging_from_config};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
pub use timeout::{with_custom_timeout, Deadline, DeadlineExceeded};
