//! arcade-host command line
//!
//! Drives the module subsystem without a UI: discovery, builds, loads,
//! lookups and the failure ledger. Progress and diagnostics go to stdout
//! through the same sinks a UI would install; logs go to stderr.
//!
//! Usage:
//!   arcade-host [--config <file>] [--modules-dir <dir>] <command>

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use arcade_host::config::HostConfig;
use arcade_host::module::{ModuleManager, Reporter};
use arcade_host::utils::init_logging_from_config;

#[derive(Parser, Debug)]
#[command(name = "arcade-host", author, version, about = "Discover, build and load game modules")]
struct Cli {
    /// Configuration file (TOML, or JSON by extension)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Modules root (overrides the config and root probing)
    #[arg(long, short = 'm', global = true)]
    modules_dir: Option<PathBuf>,

    /// Log filter (e.g. "debug", "arcade_host::module=trace")
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List valid module directories and their build state
    Discover,

    /// Discover, build stale modules and load everything
    Refresh,

    /// Build one module directory
    Build {
        /// Module directory name under the modules root
        name: String,
    },

    /// Load one module directory and print its metadata
    Load {
        /// Module directory name under the modules root
        name: String,
    },

    /// Find a module by its metadata name and print its metadata
    Find {
        /// Module name (case-insensitive)
        name: String,
    },

    /// Sweep the modules root for modules with sources but no build output
    ///
    /// The build and load ledger lives only for one session, so a fresh
    /// process can only report what the sweep finds.
    Failures,

    /// Write the default configuration to a file
    InitConfig {
        /// Output path
        #[arg(default_value = "arcade.toml")]
        path: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<HostConfig> {
    let mut config = match &cli.config {
        Some(path) => HostConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => HostConfig::default(),
    };
    if let Some(dir) = &cli.modules_dir {
        config.modules.root = Some(dir.clone());
    }
    if let Some(filter) = &cli.log {
        config.logging.filter = Some(filter.clone());
    }
    config.validate()?;
    Ok(config)
}

fn stdout_reporter() -> Reporter {
    Reporter::silent()
        .with_progress(Arc::new(|step: usize, status: &str| {
            println!("[{}] {}", step, status);
        }))
        .with_messages(Arc::new(|line: &str| println!("{}", line)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { path } = &cli.command {
        HostConfig::default().to_toml_file(path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = load_config(&cli)?;
    init_logging_from_config(&config.logging);
    debug!("Effective configuration: {:?}", config);

    let manager = ModuleManager::with_reporter(config, stdout_reporter());

    match cli.command {
        Commands::Discover => {
            let dirs = manager.discover()?;
            if dirs.is_empty() {
                println!("No modules under {}", manager.modules_root().display());
            }
            for dir in dirs {
                println!("{}\t{}", dir.name, manager.build_state(&dir));
            }
        }
        Commands::Refresh => {
            let outcome = manager.refresh().await?;
            for module in &outcome.modules {
                let meta = module.metadata();
                println!("loaded\t{}\t{}\t{}", meta.name, meta.version, meta.author);
            }
            for name in &outcome.failures {
                println!("failed\t{}", name);
            }
            for name in &outcome.skipped {
                println!("skipped\t{}", name);
            }
            if outcome.timed_out {
                println!("Batch budget exhausted before every module was attempted");
            }
        }
        Commands::Build { name } => {
            let dir = manager.module_dir(&name);
            if !manager.build(&dir).await {
                bail!("build of {} failed", name);
            }
            println!("Built {}", name);
        }
        Commands::Load { name } => {
            let dir = manager.module_dir(&name);
            let mut module = match manager.try_load(&dir) {
                Ok(module) => module,
                Err(e) => bail!("failed to load {} ({}): {}", name, e.kind(), e),
            };
            println!("{}", serde_json::to_string_pretty(module.metadata())?);
            module.stop();
        }
        Commands::Find { name } => match manager.find_by_name(&name) {
            Some(mut module) => {
                println!("{}", serde_json::to_string_pretty(module.metadata())?);
                module.stop();
            }
            None => bail!("no module named {}", name),
        },
        Commands::Failures => {
            let names = manager.recompute_failures();
            if names.is_empty() {
                println!("No failed modules");
            }
            for name in names {
                println!("{}", name);
            }
        }
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}
