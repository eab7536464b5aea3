//! External build tool invocation
//!
//! Spawns the build tool in a module directory and reports success or
//! failure. Errors never cross the public boundary: `invoke_build` returns
//! `false` and logs the reason.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::BuildConfig;
use crate::module::failures::FailureTracker;
use crate::module::registry::ModuleDirectory;
use crate::module::traits::Reporter;
use crate::utils::with_custom_timeout;

/// Lines of stderr kept when a step fails
const STDERR_TAIL_LINES: usize = 20;

/// Build failures (converted to `false` by `invoke_build`)
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to spawn {}: {source}", .tool.display())]
    Spawn {
        tool: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`{step}` exited with {}", describe_exit(.code))]
    Exit {
        step: String,
        code: Option<i32>,
        stderr_tail: String,
    },

    #[error("`{step}` killed after {after:?}")]
    TimedOut { step: String, after: Duration },

    #[error("failed waiting for `{step}`: {source}")]
    Wait {
        step: String,
        #[source]
        source: std::io::Error,
    },

    #[error("module directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),
}

/// Find the build tool executable
///
/// Order: explicit path; `CARGO` env var; `$CARGO_HOME/bin`;
/// `~/.cargo/bin`; plain `cargo` resolved through PATH.
pub fn probe_build_tool(explicit: Option<&Path>) -> PathBuf {
    if let Some(tool) = explicit {
        return tool.to_path_buf();
    }

    let exe = format!("cargo{}", std::env::consts::EXE_SUFFIX);
    let mut candidates = Vec::new();
    if let Some(cargo) = std::env::var_os("CARGO") {
        candidates.push(PathBuf::from(cargo));
    }
    if let Some(cargo_home) = std::env::var_os("CARGO_HOME") {
        candidates.push(PathBuf::from(cargo_home).join("bin").join(&exe));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".cargo").join("bin").join(&exe));
    }

    for candidate in candidates {
        if candidate.is_file() {
            debug!("Using build tool {:?}", candidate);
            return candidate;
        }
        debug!("Build tool candidate {:?} not found", candidate);
    }

    PathBuf::from(exe)
}

/// Runs the external build tool for one module directory at a time
#[derive(Debug, Clone)]
pub struct BuildInvoker {
    tool: PathBuf,
    steps: Vec<Vec<String>>,
    step_timeout: Option<Duration>,
    failures: Option<Arc<FailureTracker>>,
    reporter: Reporter,
}

impl BuildInvoker {
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            tool: probe_build_tool(config.tool.as_deref()),
            steps: config.steps.clone(),
            step_timeout: config.timeout_secs.map(Duration::from_secs),
            failures: None,
            reporter: Reporter::silent(),
        }
    }

    /// Record failed builds in the given ledger
    pub fn with_failure_tracker(mut self, failures: Arc<FailureTracker>) -> Self {
        self.failures = Some(failures);
        self
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    /// Build a module directory; true only if every step exits 0
    pub async fn invoke_build(&self, dir: &Path) -> bool {
        let module = ModuleDirectory::new(dir);
        match self.try_build(dir).await {
            Ok(()) => {
                info!("Built module {}", module.name);
                true
            }
            Err(e) => {
                let line = format!("[build] {} failed: {}", module.name, e);
                warn!("{}", line);
                self.reporter.line(&line);
                if let BuildError::Exit { stderr_tail, .. } = &e {
                    if !stderr_tail.is_empty() {
                        debug!("Build output for {}:\n{}", module.name, stderr_tail);
                        self.reporter.line(stderr_tail);
                    }
                }
                if let Some(failures) = &self.failures {
                    failures.add(&module.name);
                }
                false
            }
        }
    }

    /// Build a module directory, reporting the first failing step
    pub async fn try_build(&self, dir: &Path) -> Result<(), BuildError> {
        if !dir.is_dir() {
            return Err(BuildError::MissingDirectory(dir.to_path_buf()));
        }
        for args in &self.steps {
            self.run_step(dir, args).await?;
        }
        Ok(())
    }

    async fn run_step(&self, dir: &Path, args: &[String]) -> Result<(), BuildError> {
        let step = args.join(" ");
        debug!("Running {:?} {} in {:?}", self.tool, step, dir);

        let child = Command::new(&self.tool)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BuildError::Spawn {
                tool: self.tool.clone(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match self.step_timeout {
            Some(limit) => with_custom_timeout(child.wait_with_output(), limit)
                .await
                .map_err(|_| BuildError::TimedOut {
                    step: step.clone(),
                    after: limit,
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|source| BuildError::Wait {
            step: step.clone(),
            source,
        })?;

        if output.status.success() {
            return Ok(());
        }

        Err(BuildError::Exit {
            step,
            code: output.status.code(),
            stderr_tail: tail_lines(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_LINES),
        })
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}
