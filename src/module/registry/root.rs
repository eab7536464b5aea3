//! Modules-root resolution
//!
//! The host may be launched from different working directories, so the
//! modules root is found by probing candidate relative paths once at startup.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::ModulesConfig;

/// Resolve the modules root for this process
///
/// Bases probed: the working directory, then the executable's directory.
pub fn resolve_modules_root(config: &ModulesConfig) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut bases = vec![cwd.clone()];
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        bases.push(exe_dir);
    }
    resolve_modules_root_from(config, &bases, &cwd)
}

/// Resolve the modules root against explicit bases
///
/// Order: explicit `root`; first existing `root_candidates` entry under
/// any base; `<fallback_base>/modules`. The result is absolute whenever the
/// bases are.
pub fn resolve_modules_root_from(
    config: &ModulesConfig,
    bases: &[PathBuf],
    fallback_base: &Path,
) -> PathBuf {
    if let Some(root) = &config.root {
        let root = if root.is_absolute() {
            root.clone()
        } else {
            fallback_base.join(root)
        };
        info!("Using configured modules root {:?}", root);
        return normalize(root);
    }

    for base in bases {
        for candidate in &config.root_candidates {
            let path = base.join(candidate);
            if path.is_dir() {
                info!("Resolved modules root {:?}", path);
                return normalize(path);
            }
            debug!("Modules root candidate {:?} not found", path);
        }
    }

    let fallback = fallback_base.join("modules");
    info!("No modules root candidate exists, defaulting to {:?}", fallback);
    fallback
}

fn normalize(path: PathBuf) -> PathBuf {
    path.canonicalize().unwrap_or(path)
}
