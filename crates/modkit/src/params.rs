//! Module input parameters and host facts

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Module name used when none is given
pub const DEFAULT_NAME: &str = "svn";

/// Package managed by the module
pub const DEFAULT_PACKAGE: &str = "subversion";

/// Path of the managed configuration file
pub const DEFAULT_CONFIG_FILE: &str = "/etc/subversion/svn.conf";

/// Path of the managed configuration directory
pub const DEFAULT_CONFIG_DIR: &str = "/etc/subversion";

/// Mode of the managed configuration file
pub const DEFAULT_CONFIG_FILE_MODE: &str = "0644";

/// Version keyword meaning "any installed version"
pub const VERSION_PRESENT: &str = "present";

/// Version keyword meaning "newest available version"
pub const VERSION_LATEST: &str = "latest";

/// Parameters supplied by the caller for one resolution pass.
///
/// Immutable once handed to [`crate::resolve`]. Every field has a default,
/// so an empty TOML table or `{}` is a valid input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModuleParams {
    /// Module name; resource titles derive from it
    pub name: String,

    /// `present`, `latest`, or an explicit package version
    pub version: String,

    /// Remove every managed resource
    pub absent: bool,

    /// Report what would change without changing anything
    #[serde(alias = "noops")]
    pub noop: bool,

    /// Template used for the configuration file content
    pub template: Option<String>,

    /// Bindings passed to template rendering
    pub options: BTreeMap<String, String>,

    /// Static content locator for the configuration file
    pub source: Option<String>,

    /// Static content locator for the configuration directory
    pub source_dir: Option<String>,

    /// Purge unmanaged entries from the directory and force replacements
    pub source_dir_purge: bool,

    /// Custom class overriding the content generation path
    pub my_class: Option<String>,

    /// Package name
    pub package: String,

    /// Configuration file path
    pub config_file: PathBuf,

    /// Configuration directory path
    pub config_dir: PathBuf,

    /// Octal mode of the configuration file
    pub config_file_mode: String,
}

impl Default for ModuleParams {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            version: VERSION_PRESENT.to_string(),
            absent: false,
            noop: false,
            template: None,
            options: BTreeMap::new(),
            source: None,
            source_dir: None,
            source_dir_purge: false,
            my_class: None,
            package: DEFAULT_PACKAGE.to_string(),
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            config_file_mode: DEFAULT_CONFIG_FILE_MODE.to_string(),
        }
    }
}

/// Identity of the host the module is compiled for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facts {
    /// Fully-qualified domain name
    pub fqdn: String,
}

impl Facts {
    pub fn new(fqdn: impl Into<String>) -> Self {
        Self { fqdn: fqdn.into() }
    }
}
