//! Source locators
//!
//! A locator names where static content comes from. Supported forms are
//! `file://` URLs and plain paths; `~` and environment variables expand,
//! relative paths resolve against the params file directory. Any other
//! scheme is rejected when the resource is applied.

use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

use crate::paths;

/// Resolve a locator to a local path
pub fn resolve(locator: &str, base_dir: &Path) -> Result<PathBuf> {
    if let Some(path) = locator.strip_prefix("file://") {
        if !path.starts_with('/') {
            bail!("file:// source must be an absolute path: {locator}");
        }
        return Ok(PathBuf::from(path));
    }

    if let Some((scheme, _)) = locator.split_once("://") {
        bail!("Unsupported source scheme '{scheme}' in {locator}");
    }

    Ok(paths::expand_relative_to(locator, base_dir))
}
