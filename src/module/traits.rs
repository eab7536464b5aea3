//! Module system traits and interfaces
//!
//! Defines the capability contract every loaded module satisfies, the
//! metadata it describes itself with, and the sinks the host UI hands to
//! the module subsystem for progress and diagnostics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Structured message exchanged with a module (a JSON object)
pub type Message = serde_json::Map<String, serde_json::Value>;

/// Module metadata describing module identity and capabilities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    /// Module name (unique identifier, used by lookup-by-name)
    pub name: String,
    /// Module version (semantic versioning)
    pub version: String,
    /// Human-readable description
    pub description: String,
    /// Module author
    pub author: String,
    /// Play modes the module supports (e.g. "local", "online")
    #[serde(default)]
    pub supported_modes: Vec<String>,
    /// Minimum number of players
    #[serde(default = "default_players")]
    pub min_players: u32,
    /// Maximum number of players
    #[serde(default = "default_players")]
    pub max_players: u32,
    /// Free-form additional fields
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

fn default_players() -> u32 {
    1
}

/// Metadata base every module's metadata declaration implements
///
/// The four accessors are required; the rest have defaults.
pub trait MetadataProvider {
    fn name(&self) -> String;
    fn version(&self) -> String;
    fn description(&self) -> String;
    fn author(&self) -> String;

    fn supported_modes(&self) -> Vec<String> {
        vec!["local".to_string()]
    }

    fn min_players(&self) -> u32 {
        1
    }

    fn max_players(&self) -> u32 {
        1
    }

    fn extra(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Assemble the full descriptor
    fn descriptor(&self) -> ModuleMetadata {
        ModuleMetadata {
            name: self.name(),
            version: self.version(),
            description: self.description(),
            author: self.author(),
            supported_modes: self.supported_modes(),
            min_players: self.min_players(),
            max_players: self.max_players(),
            extra: self.extra(),
        }
    }
}

/// Host-provided stage a module renders its main surface into
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostStage {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Host-specific properties (theme, locale, ...)
    #[serde(default)]
    pub properties: Message,
}

impl HostStage {
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            properties: Message::new(),
        }
    }
}

/// Declarative description of the surface a module produced
///
/// The host UI is responsible for rendering it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub title: String,
    pub root: serde_json::Value,
}

/// Capability contract that all modules must implement
///
/// Implemented by the module's entry type and handed to the host through
/// the declaration exported by `declare_module!`.
pub trait GameModule: Send {
    /// Describe the module
    fn metadata(&self) -> ModuleMetadata;

    /// Produce the main interactive surface for the given stage
    fn launch(&mut self, stage: &HostStage) -> Surface;

    /// Handle an inbound message; `None` means no response
    fn handle_message(&mut self, message: &Message) -> Option<Message>;

    /// Release resources. Called at most once by the host.
    fn stop(&mut self);
}

/// Contract-level errors raised by host helpers around modules
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Module already stopped: {0}")]
    Stopped(String),

    #[error("Module panicked during {operation}: {detail}")]
    Panicked { operation: String, detail: String },
}

/// Receives `(step index, status)` progress updates from the background worker
pub trait ProgressSink: Send + Sync {
    fn progress(&self, step: usize, status: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, &str) + Send + Sync,
{
    fn progress(&self, step: usize, status: &str) {
        self(step, status)
    }
}

/// Receives pre-formatted diagnostic lines from the background worker
pub trait MessageSink: Send + Sync {
    fn message(&self, line: &str);
}

impl<F> MessageSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn message(&self, line: &str) {
        self(line)
    }
}

/// Fan-out to the optional host sinks, mirrored into the log
///
/// Sinks are invoked on the calling (background) thread; marshalling to a
/// UI thread is the sink implementation's job.
#[derive(Clone, Default)]
pub struct Reporter {
    progress: Option<Arc<dyn ProgressSink>>,
    messages: Option<Arc<dyn MessageSink>>,
}

impl Reporter {
    /// Reporter that only logs
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn with_messages(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.messages = Some(sink);
        self
    }

    pub fn step(&self, step: usize, status: &str) {
        info!(step, "{}", status);
        if let Some(sink) = &self.progress {
            sink.progress(step, status);
        }
    }

    /// Forward a line to the message sink (callers log it at their own level)
    pub fn line(&self, line: &str) {
        if let Some(sink) = &self.messages {
            sink.message(line);
        }
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("progress", &self.progress.is_some())
            .field("messages", &self.messages.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Chess;

    impl MetadataProvider for Chess {
        fn name(&self) -> String {
            "chess".to_string()
        }
        fn version(&self) -> String {
            "1.2.0".to_string()
        }
        fn description(&self) -> String {
            "Two-player chess".to_string()
        }
        fn author(&self) -> String {
            "Arcade".to_string()
        }
        fn max_players(&self) -> u32 {
            2
        }
    }

    #[test]
    fn test_descriptor_uses_defaults() {
        let meta = Chess.descriptor();
        assert_eq!(meta.name, "chess");
        assert_eq!(meta.min_players, 1);
        assert_eq!(meta.max_players, 2);
        assert_eq!(meta.supported_modes, vec!["local".to_string()]);
        assert!(meta.extra.is_empty());
    }

    #[test]
    fn test_metadata_json_defaults() {
        let meta: ModuleMetadata = serde_json::from_str(
            r#"{"name":"x","version":"0.1.0","description":"","author":"a"}"#,
        )
        .unwrap();
        assert_eq!(meta.min_players, 1);
        assert_eq!(meta.max_players, 1);
        assert!(meta.supported_modes.is_empty());
    }

    #[test]
    fn test_reporter_forwards_to_closures() {
        let steps = Arc::new(Mutex::new(Vec::new()));
        let lines = Arc::new(Mutex::new(Vec::new()));
        let steps_sink = steps.clone();
        let lines_sink = lines.clone();

        let reporter = Reporter::silent()
            .with_progress(Arc::new(move |step: usize, status: &str| {
                steps_sink.lock().unwrap().push((step, status.to_string()));
            }))
            .with_messages(Arc::new(move |line: &str| {
                lines_sink.lock().unwrap().push(line.to_string());
            }));

        reporter.step(0, "Discovering modules");
        reporter.line("[discovery] nothing found");

        assert_eq!(
            steps.lock().unwrap().as_slice(),
            &[(0, "Discovering modules".to_string())]
        );
        assert_eq!(lines.lock().unwrap().as_slice(), &["[discovery] nothing found".to_string()]);
    }

    #[test]
    fn test_silent_reporter_is_noop() {
        let reporter = Reporter::silent();
        reporter.step(1, "Building");
        reporter.line("ignored");
    }
}
