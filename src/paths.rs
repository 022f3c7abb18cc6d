//! Centralized path resolution for svnmod
//!
//! # Environment Variables
//!
//! - `SVNMOD_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/svnmod`)
//! - `SVNMOD_PARAMS` - Params file to load (handled by the CLI)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `SVNMOD_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/svnmod` (if set)
//! 3. `~/.config/svnmod`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "SVNMOD_CONFIG_DIR";

/// Get the svnmod config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        let path = PathBuf::from(xdg_config).join("svnmod");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("svnmod");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Directory searched for user templates when none is configured
pub fn default_template_dir() -> Result<PathBuf> {
    Ok(config_dir()?.join("templates"))
}

/// Expand ~ and environment variables in a path string.
///
/// All modules should use this instead of calling shellexpand directly.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Expand `path` and anchor it at `base` when relative
pub fn expand_relative_to(path: &str, base: &Path) -> PathBuf {
    let expanded = expand(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

// ============================================================================
// Tests
// ============================================================================
