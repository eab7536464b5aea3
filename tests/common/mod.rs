//! Test utilities for module system testing
//!
//! Provides an isolated modules root and helpers that write module
//! directories (real, compilable module crates), broken variants, and
//! stand-in build tools.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use arcade_host::config::{HostConfig, LayoutConfig};
use arcade_host::module::loader::SharedRuntimeProbe;
use arcade_host::module::{ModuleManager, Reporter};

/// Test fixture with an isolated modules root and shared runtime dir
pub struct ModuleTestFixture {
    /// Temporary directory holding everything
    pub temp_dir: TempDir,
    /// Modules root
    pub modules_dir: PathBuf,
    /// Shared runtime directory (non-empty)
    pub lib_dir: PathBuf,
    /// Lines received by the message sink
    pub lines: Arc<Mutex<Vec<String>>>,
    /// Updates received by the progress sink
    pub steps: Arc<Mutex<Vec<(usize, String)>>>,
}

impl ModuleTestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let modules_dir = temp_dir.path().join("modules");
        let lib_dir = temp_dir.path().join("lib");
        fs::create_dir_all(&modules_dir).expect("modules dir");
        fs::create_dir_all(&lib_dir).expect("lib dir");
        fs::write(lib_dir.join("RUNTIME"), "shared runtime marker").expect("runtime marker");

        Self {
            temp_dir,
            modules_dir,
            lib_dir,
            lines: Arc::new(Mutex::new(Vec::new())),
            steps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Default config rooted at the fixture
    pub fn config(&self) -> HostConfig {
        let mut config = HostConfig::default();
        config.modules.root = Some(self.modules_dir.clone());
        config
    }

    /// Reporter recording into `lines` and `steps`
    pub fn reporter(&self) -> Reporter {
        let lines = self.lines.clone();
        let steps = self.steps.clone();
        Reporter::silent()
            .with_messages(Arc::new(move |line: &str| {
                lines.lock().unwrap().push(line.to_string());
            }))
            .with_progress(Arc::new(move |step: usize, status: &str| {
                steps.lock().unwrap().push((step, status.to_string()));
            }))
    }

    /// Manager over the fixture, shared runtime limited to the fixture's lib dir
    pub fn manager(&self, config: HostConfig) -> ModuleManager {
        ModuleManager::with_root(config, self.modules_dir.clone(), self.reporter()).with_shared_runtime(
            SharedRuntimeProbe::new(
                vec!["lib".to_string()],
                vec![self.temp_dir.path().to_path_buf()],
                true,
            ),
        )
    }

    pub fn module_path(&self, dir_name: &str) -> PathBuf {
        self.modules_dir.join(dir_name)
    }

    /// Write a complete module crate whose metadata name is `display_name`
    pub fn write_module(&self, dir_name: &str, display_name: &str) -> PathBuf {
        let dir = self.module_path(dir_name);
        fs::create_dir_all(dir.join("src")).expect("module src dir");
        fs::write(dir.join("Cargo.toml"), module_manifest(dir_name)).expect("Cargo.toml");
        fs::write(dir.join("src/lib.rs"), MODULE_LIB).expect("lib.rs");
        fs::write(dir.join("src/metadata.rs"), module_metadata(display_name)).expect("metadata.rs");
        dir
    }

    /// Module whose entry source does not implement the capability contract
    pub fn write_module_without_contract(&self, dir_name: &str) -> PathBuf {
        let dir = self.write_module(dir_name, dir_name);
        fs::write(
            dir.join("src/lib.rs"),
            "mod metadata;\n\npub struct ModuleEntry;\n\nimpl ModuleEntry {\n    pub fn start(&self) {}\n}\n",
        )
        .expect("lib.rs");
        dir
    }

    /// Place a non-loadable artifact newer than every source
    pub fn write_fake_artifact(&self, dir_name: &str) -> PathBuf {
        let layout = LayoutConfig::default();
        let artifact = layout.artifact_path_for(&self.module_path(dir_name));
        fs::create_dir_all(artifact.parent().unwrap()).expect("artifact dir");
        fs::write(&artifact, b"not a shared object").expect("artifact");
        set_mtime(&artifact, SystemTime::now() + Duration::from_secs(3600));
        artifact
    }

    /// Executable shell script used as the build tool
    #[cfg(unix)]
    pub fn write_build_tool(&self, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.temp_dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("build tool");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn step_indices(&self) -> Vec<usize> {
        self.steps.lock().unwrap().iter().map(|(i, _)| *i).collect()
    }
}

pub fn set_mtime(path: &Path, time: SystemTime) {
    let file = fs::File::options().write(true).open(path).expect("open for mtime");
    file.set_modified(time).expect("set mtime");
}

fn module_manifest(dir_name: &str) -> String {
    let host = env!("CARGO_MANIFEST_DIR").replace('\\', "/");
    format!(
        r#"[package]
name = "{dir_name}"
version = "0.1.0"
edition = "2021"

[lib]
name = "game_module"
crate-type = ["cdylib"]

[dependencies]
arcade-host = {{ path = "{host}" }}
serde_json = "1"

[workspace]
"#
    )
}

const MODULE_LIB: &str = r#"mod metadata;

use arcade_host::{declare_module, GameModule, HostStage, Message, MetadataProvider, ModuleMetadata, Surface};

#[derive(Default)]
pub struct ModuleEntry {
    moves: u64,
}

impl GameModule for ModuleEntry {
    fn metadata(&self) -> ModuleMetadata {
        metadata::Info.descriptor()
    }

    fn launch(&mut self, stage: &HostStage) -> Surface {
        Surface {
            title: stage.title.clone(),
            root: serde_json::json!({ "kind": "board", "width": stage.width }),
        }
    }

    fn handle_message(&mut self, _message: &Message) -> Option<Message> {
        self.moves += 1;
        let mut reply = Message::new();
        reply.insert("moves".to_string(), self.moves.into());
        Some(reply)
    }

    fn stop(&mut self) {}
}

declare_module!(ModuleEntry, ModuleEntry::default);
"#;

fn module_metadata(display_name: &str) -> String {
    format!(
        r#"use arcade_host::MetadataProvider;

pub struct Info;

impl MetadataProvider for Info {{
    fn name(&self) -> String {{
        "{display_name}".to_string()
    }}

    fn version(&self) -> String {{
        "0.1.0".to_string()
    }}

    fn description(&self) -> String {{
        "Fixture module".to_string()
    }}

    fn author(&self) -> String {{
        "arcade-host tests".to_string()
    }}
}}
"#
    )
}
