//! Params file loading
//!
//! The params file holds the module parameters at the top level plus an
//! optional `[settings]` table for svnmod itself:
//!
//! ```toml
//! version = "latest"
//! template = "spec.tmpl"
//!
//! [options]
//! opt_a = "value_a"
//!
//! [settings]
//! backend = "apt"
//! jobs = 2
//! ```
//!
//! TOML and JSON are both accepted; the format follows the file extension.

use anyhow::{Context, Result, bail};
use modkit::ModuleParams;
use pkgkit::BackendKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::ParamOverrides;
use crate::paths;

/// Key of the settings table inside a params file
const SETTINGS_KEY: &str = "settings";

/// Supported params file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Format for a path, by extension (TOML when unknown)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::Json,
            _ => Self::Toml,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }

    /// Parse text into a generic JSON value
    fn parse(self, content: &str) -> Result<serde_json::Value> {
        match self {
            Self::Toml => toml::from_str(content).context("Invalid TOML"),
            Self::Json => serde_json::from_str(content).context("Invalid JSON"),
        }
    }
}

/// Settings for svnmod itself, not part of the module parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory with user templates
    pub template_dir: Option<String>,
    /// Package manager to drive
    pub backend: BackendKind,
    /// Parallel jobs for apply
    pub jobs: Option<usize>,
}

/// Parameters and settings loaded for one run
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// File the values came from; `None` when running on defaults
    pub path: Option<PathBuf>,
    pub params: ModuleParams,
    pub settings: Settings,
}

impl LoadedConfig {
    /// Directory relative sources are resolved against
    pub fn base_dir(&self) -> PathBuf {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Template directory from settings, expanded against the base dir
    pub fn template_dir(&self) -> Option<PathBuf> {
        self.settings
            .template_dir
            .as_deref()
            .map(|dir| paths::expand_relative_to(dir, &self.base_dir()))
    }
}

/// Load the params file.
///
/// An explicit path must exist. Without one, `params.toml` and then
/// `params.json` in the config directory are tried; if neither exists the
/// module defaults are used.
pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(path) => {
            let path = paths::expand(&path.to_string_lossy());
            if !path.is_file() {
                bail!("Params file not found: {}", path.display());
            }
            Some(path)
        }
        None => find_params_file(&paths::config_dir()?),
    };

    match path {
        Some(path) => load_file(&path),
        None => {
            log::info!("No params file found, using module defaults");
            Ok(LoadedConfig::default())
        }
    }
}

/// Find `params.toml` or `params.json` in `dir`, TOML first
pub fn find_params_file(dir: &Path) -> Option<PathBuf> {
    [ConfigFormat::Toml, ConfigFormat::Json]
        .iter()
        .map(|format| dir.join(format!("params.{}", format.extension())))
        .find(|path| path.is_file())
}

/// Load a params file from a known path
pub fn load_file(path: &Path) -> Result<LoadedConfig> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    let format = ConfigFormat::from_path(path);
    let (params, settings) =
        parse(&content, format).with_context(|| format!("Invalid params file {}", path.display()))?;

    log::debug!("Loaded params from {}", path.display());
    Ok(LoadedConfig {
        path: Some(path.to_path_buf()),
        params,
        settings,
    })
}

/// Split a params document into module parameters and settings
fn parse(content: &str, format: ConfigFormat) -> Result<(ModuleParams, Settings)> {
    let mut value = format.parse(content)?;

    let settings = match value.as_object_mut() {
        Some(table) => match table.remove(SETTINGS_KEY) {
            Some(settings) => {
                serde_json::from_value(settings).context("Invalid [settings] table")?
            }
            None => Settings::default(),
        },
        None => bail!("Expected a table of parameters at the top level"),
    };

    let params = serde_json::from_value(value).context("Invalid module parameters")?;
    Ok((params, settings))
}

/// Apply command-line overrides on top of loaded params
pub fn apply_overrides(params: &mut ModuleParams, overrides: &ParamOverrides) {
    if let Some(version) = &overrides.version {
        params.version.clone_from(version);
    }
    if overrides.absent {
        params.absent = true;
    }
    if overrides.noop {
        params.noop = true;
    }
    if let Some(template) = &overrides.template {
        params.template = Some(template.clone());
    }
    if let Some(source) = &overrides.source {
        params.source = Some(source.clone());
    }
    if let Some(source_dir) = &overrides.source_dir {
        params.source_dir = Some(source_dir.clone());
    }
    if overrides.source_dir_purge {
        params.source_dir_purge = true;
    }
    if let Some(class) = &overrides.my_class {
        params.my_class = Some(class.clone());
    }
    for (key, value) in &overrides.options {
        params.options.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_toml_with_settings() {
        let (params, settings) = parse(
            r#"
version = "1.0.42"
template = "spec.tmpl"

[options]
opt_a = "value_a"

[settings]
backend = "dnf"
jobs = 2
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(params.version, "1.0.42");
        assert_eq!(params.template.as_deref(), Some("spec.tmpl"));
        assert_eq!(params.options["opt_a"], "value_a");
        assert_eq!(settings.backend, BackendKind::Dnf);
        assert_eq!(settings.jobs, Some(2));
    }

    #[test]
    fn parses_json_without_settings() {
        let (params, settings) = parse(
            r#"{"source_dir": "loc", "source_dir_purge": true, "noops": true}"#,
            ConfigFormat::Json,
        )
        .unwrap();

        assert_eq!(params.source_dir.as_deref(), Some("loc"));
        assert!(params.source_dir_purge);
        assert!(params.noop);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = parse("versoin = \"1.0\"", ConfigFormat::Toml).unwrap_err();
        assert!(format!("{err:#}").contains("versoin"));

        let err = parse("[settings]\nbackend = \"pacman\"", ConfigFormat::Toml).unwrap_err();
        assert!(format!("{err:#}").contains("settings"));
    }

    #[test]
    fn rejects_non_table_documents() {
        assert!(parse("[1, 2]", ConfigFormat::Json).is_err());
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("params.json")),
            ConfigFormat::Json
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("params.toml")),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("params")),
            ConfigFormat::Toml
        );
    }

    #[test]
    fn finds_toml_before_json() {
        let dir = TempDir::new().unwrap();
        assert_eq!(find_params_file(dir.path()), None);

        fs::write(dir.path().join("params.json"), "{}").unwrap();
        assert_eq!(
            find_params_file(dir.path()),
            Some(dir.path().join("params.json"))
        );

        fs::write(dir.path().join("params.toml"), "").unwrap();
        assert_eq!(
            find_params_file(dir.path()),
            Some(dir.path().join("params.toml"))
        );
    }

    #[test]
    fn load_file_records_base_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("params.toml");
        fs::write(&path, "source = \"files/svn.conf\"\n[settings]\ntemplate_dir = \"tpl\"\n")
            .unwrap();

        let loaded = load_file(&path).unwrap();
        assert_eq!(loaded.base_dir(), dir.path());
        assert_eq!(loaded.template_dir(), Some(dir.path().join("tpl")));
        assert_eq!(loaded.params.source.as_deref(), Some("files/svn.conf"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn overrides_replace_and_extend() {
        let mut params = ModuleParams::default();
        params.options.insert("keep".into(), "1".into());

        let overrides = ParamOverrides {
            version: Some("latest".into()),
            noop: true,
            my_class: Some("svn::spec".into()),
            options: vec![("opt_a".into(), "value_a".into())],
            ..Default::default()
        };
        apply_overrides(&mut params, &overrides);

        assert_eq!(params.version, "latest");
        assert!(params.noop);
        assert!(!params.absent);
        assert_eq!(params.my_class.as_deref(), Some("svn::spec"));
        assert_eq!(params.options.len(), 2);
    }
}
