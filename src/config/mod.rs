//! Configuration management for arcade-host
//!
//! Handles configuration loading, validation, and modules-root resolution.
//! Every field has a default so an empty file (or no file) is a valid config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Module discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Explicit modules root (skips candidate probing when set)
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Relative locations probed for the modules root, in order
    #[serde(default = "default_root_candidates")]
    pub root_candidates: Vec<String>,

    /// Directory names never treated as module candidates (hidden names are always skipped)
    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,
}

fn default_root_candidates() -> Vec<String> {
    vec![
        "modules".to_string(),
        "../modules".to_string(),
        "../../modules".to_string(),
    ]
}

fn default_excluded_dirs() -> Vec<String> {
    vec!["target".to_string(), "build".to_string(), "out".to_string()]
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            root: None,
            root_candidates: default_root_candidates(),
            excluded_dirs: default_excluded_dirs(),
        }
    }
}

/// Conventional layout of a module directory
///
/// These are the names the structural validator and build checker look for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Entry-point source, relative to the module directory
    #[serde(default = "default_entry_source")]
    pub entry_source: String,

    /// Metadata-declaration source, relative to the module directory
    #[serde(default = "default_metadata_source")]
    pub metadata_source: String,

    /// Name of the entry type the entry source must declare
    #[serde(default = "default_entry_type")]
    pub entry_type: String,

    /// Text proving the entry type implements the capability contract
    #[serde(default = "default_contract_marker")]
    pub contract_marker: String,

    /// Text proving the metadata source implements the metadata base
    #[serde(default = "default_metadata_base")]
    pub metadata_base: String,

    /// Accessor methods the metadata source must declare
    #[serde(default = "default_required_accessors")]
    pub required_accessors: Vec<String>,

    /// Source directories whose files are tracked for staleness
    #[serde(default = "default_source_dirs")]
    pub source_dirs: Vec<String>,

    /// Extra top-level files tracked for staleness
    #[serde(default = "default_tracked_files")]
    pub tracked_files: Vec<String>,

    /// File extensions tracked inside `source_dirs`
    #[serde(default = "default_tracked_extensions")]
    pub tracked_extensions: Vec<String>,

    /// Build output directory, relative to the module directory
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,

    /// Library name of the entry artifact (platform prefix/suffix added at runtime)
    #[serde(default = "default_artifact_name")]
    pub artifact_name: String,
}

fn default_entry_source() -> String {
    "src/lib.rs".to_string()
}

fn default_metadata_source() -> String {
    "src/metadata.rs".to_string()
}

fn default_entry_type() -> String {
    "ModuleEntry".to_string()
}

fn default_contract_marker() -> String {
    "GameModule for".to_string()
}

fn default_metadata_base() -> String {
    "MetadataProvider for".to_string()
}

fn default_required_accessors() -> Vec<String> {
    ["name", "version", "description", "author"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_source_dirs() -> Vec<String> {
    vec!["src".to_string()]
}

fn default_tracked_files() -> Vec<String> {
    vec!["Cargo.toml".to_string()]
}

fn default_tracked_extensions() -> Vec<String> {
    vec!["rs".to_string(), "toml".to_string()]
}

fn default_artifact_dir() -> String {
    "target/release".to_string()
}

fn default_artifact_name() -> String {
    "game_module".to_string()
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            entry_source: default_entry_source(),
            metadata_source: default_metadata_source(),
            entry_type: default_entry_type(),
            contract_marker: default_contract_marker(),
            metadata_base: default_metadata_base(),
            required_accessors: default_required_accessors(),
            source_dirs: default_source_dirs(),
            tracked_files: default_tracked_files(),
            tracked_extensions: default_tracked_extensions(),
            artifact_dir: default_artifact_dir(),
            artifact_name: default_artifact_name(),
        }
    }
}

impl LayoutConfig {
    /// Platform file name of the entry artifact (`libgame_module.so`, `game_module.dll`, ...)
    pub fn artifact_file_name(&self) -> String {
        libloading::library_filename(&self.artifact_name)
            .to_string_lossy()
            .into_owned()
    }

    /// Artifact directory for a module directory
    pub fn artifact_dir_for(&self, module_dir: &Path) -> PathBuf {
        module_dir.join(&self.artifact_dir)
    }

    /// Full path of the entry artifact for a module directory
    pub fn artifact_path_for(&self, module_dir: &Path) -> PathBuf {
        self.artifact_dir_for(module_dir)
            .join(self.artifact_file_name())
    }
}

/// External build tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Explicit build tool executable (skips probing when set)
    #[serde(default)]
    pub tool: Option<PathBuf>,

    /// Argument lists run in order; every step must exit 0
    #[serde(default = "default_build_steps")]
    pub steps: Vec<Vec<String>>,

    /// Kill a build step that runs longer than this (None = wait indefinitely)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_build_steps() -> Vec<Vec<String>> {
    vec![
        vec!["clean".to_string()],
        vec!["build".to_string(), "--release".to_string()],
    ]
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            tool: None,
            steps: default_build_steps(),
            timeout_secs: None,
        }
    }
}

/// Isolated loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Wall-clock budget for loading a single module
    #[serde(default = "default_module_timeout")]
    pub module_timeout_secs: u64,

    /// Wall-clock budget for a whole batch
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,

    /// Relative locations probed for shared runtime libraries
    #[serde(default = "default_shared_lib_candidates")]
    pub shared_lib_candidates: Vec<String>,

    /// Shared runtime libraries preloaded for every module, by library name
    /// (`"arcade_host"` resolves to `libarcade_host.so` on Linux)
    #[serde(default = "default_shared_libs")]
    pub shared_libs: Vec<String>,

    /// Fail context composition when no shared runtime location exists
    #[serde(default = "default_true")]
    pub require_shared_runtime: bool,
}

fn default_module_timeout() -> u64 {
    30
}

fn default_batch_timeout() -> u64 {
    120
}

fn default_shared_lib_candidates() -> Vec<String> {
    vec!["lib".to_string(), "../lib".to_string(), "../../lib".to_string()]
}

fn default_shared_libs() -> Vec<String> {
    vec!["arcade_host".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            module_timeout_secs: default_module_timeout(),
            batch_timeout_secs: default_batch_timeout(),
            shared_lib_candidates: default_shared_lib_candidates(),
            shared_libs: default_shared_libs(),
            require_shared_runtime: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "arcade_host::module=debug"); RUST_LOG wins when set
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON lines (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

/// Host configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub modules: ModulesConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HostConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HostConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HostConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration, picking the format from the file extension
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.loader.module_timeout_secs == 0 {
            return Err(anyhow::anyhow!("loader.module_timeout_secs must be > 0"));
        }
        if self.loader.batch_timeout_secs == 0 {
            return Err(anyhow::anyhow!("loader.batch_timeout_secs must be > 0"));
        }
        if self.build.steps.is_empty() || self.build.steps.iter().any(|step| step.is_empty()) {
            return Err(anyhow::anyhow!("build.steps must contain non-empty argument lists"));
        }
        if self.build.timeout_secs == Some(0) {
            return Err(anyhow::anyhow!("build.timeout_secs must be > 0 when set"));
        }
        if let Some(name) = self
            .loader
            .shared_libs
            .iter()
            .find(|name| name.trim().is_empty() || name.contains(['/', '\\']))
        {
            return Err(anyhow::anyhow!(
                "loader.shared_libs entries must be bare library names, got {:?}",
                name
            ));
        }

        let layout = &self.layout;
        for (field, value) in [
            ("layout.entry_source", &layout.entry_source),
            ("layout.metadata_source", &layout.metadata_source),
            ("layout.artifact_dir", &layout.artifact_dir),
            ("layout.artifact_name", &layout.artifact_name),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow::anyhow!("{} cannot be empty", field));
            }
        }

        Ok(())
    }
}
