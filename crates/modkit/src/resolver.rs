//! Parameter resolution
//!
//! Turns raw [`ModuleParams`] into [`ResolvedParams`]: validated, with every
//! precedence rule already applied, so that plan building never has to
//! look at the raw flags again.

use crate::error::{Error, Result};
use crate::params::{ModuleParams, VERSION_LATEST, VERSION_PRESENT};
use crate::template::is_binding_key;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]*$").expect("valid regex"));

static PACKAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9+._-]*$").expect("valid regex"));

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z_][a-z0-9_]*(::[a-z_][a-z0-9_]*)*$").expect("valid regex")
});

static MODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-7]{3,4}$").expect("valid regex"));

/// Version strings that mean "remove" and so conflict with `absent = false`
const ABSENT_KEYWORDS: &[&str] = &["absent", "purged"];

/// Target state of a managed resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    /// Exists; for packages any installed version will do
    Present,
    /// Package installed at the newest available version
    Latest,
    /// Package installed at exactly this version
    Version(String),
    /// Does not exist
    Absent,
}

impl TargetState {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Latest => write!(f, "latest"),
            Self::Version(version) => write!(f, "{version}"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// Where the configuration file content comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum ContentSource {
    /// A custom class renders its own template
    CustomClass { class: String, template: String },
    /// A caller-chosen template rendered with the options
    Template { id: String },
    /// Opaque locator, copied verbatim
    Source { locator: String },
    /// The module's builtin template
    Default,
}

/// Resolved directory attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDirectory {
    pub target: TargetState,
    /// `None` when the directory is being removed
    pub source: Option<String>,
    pub purge: bool,
    pub force: bool,
}

/// Parameters after validation and precedence resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedParams {
    pub name: String,
    pub package: String,
    pub package_target: TargetState,
    pub file_target: TargetState,
    /// `None` when the file is being removed
    pub content: Option<ContentSource>,
    pub options: BTreeMap<String, String>,
    pub directory: Option<ResolvedDirectory>,
    pub noop: bool,
    pub config_file: PathBuf,
    pub config_dir: PathBuf,
    pub config_file_mode: u32,
}

impl ResolvedParams {
    /// Title of the configuration file resource
    pub fn file_title(&self) -> String {
        format!("{}.conf", self.name)
    }

    /// Title of the configuration directory resource
    pub fn dir_title(&self) -> String {
        format!("{}.dir", self.name)
    }
}

/// Validate `params` and apply every precedence rule.
pub fn resolve(params: &ModuleParams) -> Result<ResolvedParams> {
    validate(params)?;

    let config_file_mode = u32::from_str_radix(&params.config_file_mode, 8)
        .map_err(|e| Error::validation("config_file_mode", e.to_string()))?;

    let directory = resolve_directory(params);

    let (package_target, file_target, content) = if params.absent {
        if params.version != VERSION_PRESENT {
            log::debug!(
                "absent overrides version '{}' for {}",
                params.version,
                params.package
            );
        }
        (TargetState::Absent, TargetState::Absent, None)
    } else {
        (
            resolve_version(&params.version),
            TargetState::Present,
            Some(resolve_content(params)),
        )
    };

    Ok(ResolvedParams {
        name: params.name.clone(),
        package: params.package.clone(),
        package_target,
        file_target,
        content,
        options: params.options.clone(),
        directory,
        noop: params.noop,
        config_file: params.config_file.clone(),
        config_dir: params.config_dir.clone(),
        config_file_mode,
    })
}

fn resolve_version(version: &str) -> TargetState {
    match version.trim() {
        VERSION_PRESENT => TargetState::Present,
        VERSION_LATEST => TargetState::Latest,
        explicit => TargetState::Version(explicit.to_string()),
    }
}

fn resolve_content(params: &ModuleParams) -> ContentSource {
    if let Some(class) = &params.my_class {
        if params.template.is_some() || params.source.is_some() {
            log::warn!("my_class '{}' overrides template and source", class);
        }
        return ContentSource::CustomClass {
            class: class.clone(),
            template: class_template(class),
        };
    }

    match (&params.template, &params.source) {
        (Some(id), Some(source)) => {
            log::warn!(
                "Both template '{}' and source '{}' are set; using the template",
                id,
                source
            );
            ContentSource::Template { id: id.clone() }
        }
        (Some(id), None) => ContentSource::Template { id: id.clone() },
        (None, Some(locator)) => ContentSource::Source {
            locator: locator.clone(),
        },
        (None, None) => ContentSource::Default,
    }
}

/// Template rendered by a custom class: `svn::spec` -> `svn/spec.tmpl`
pub fn class_template(class: &str) -> String {
    format!("{}.tmpl", class.replace("::", "/"))
}

fn resolve_directory(params: &ModuleParams) -> Option<ResolvedDirectory> {
    let Some(source) = &params.source_dir else {
        if params.source_dir_purge {
            log::warn!("source_dir_purge has no effect without source_dir");
        }
        return None;
    };

    let purge = params.source_dir_purge;
    if params.absent {
        Some(ResolvedDirectory {
            target: TargetState::Absent,
            source: None,
            purge,
            force: purge,
        })
    } else {
        Some(ResolvedDirectory {
            target: TargetState::Present,
            source: Some(source.clone()),
            purge,
            force: purge,
        })
    }
}

fn validate(params: &ModuleParams) -> Result<()> {
    if !NAME_RE.is_match(&params.name) {
        return Err(Error::validation(
            "name",
            format!("'{}' is not a valid module name", params.name),
        ));
    }

    if !PACKAGE_RE.is_match(&params.package) {
        return Err(Error::validation(
            "package",
            format!("'{}' is not a valid package name", params.package),
        ));
    }

    let version = params.version.trim();
    if version.is_empty() {
        return Err(Error::validation("version", "must not be empty"));
    }
    if !params.absent && ABSENT_KEYWORDS.contains(&version) {
        return Err(Error::validation(
            "version",
            format!("'{version}' conflicts with absent = false; set absent = true instead"),
        ));
    }

    for key in params.options.keys() {
        if !is_binding_key(key) {
            return Err(Error::validation(
                "options",
                format!("'{key}' cannot be used as a template binding"),
            ));
        }
    }

    if let Some(class) = &params.my_class
        && !CLASS_RE.is_match(class)
    {
        return Err(Error::validation(
            "my_class",
            format!("'{class}' is not a valid class name"),
        ));
    }

    for (field, value) in [
        ("template", &params.template),
        ("source", &params.source),
        ("source_dir", &params.source_dir),
    ] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(Error::validation(field, "must not be empty when set"));
        }
    }

    if !MODE_RE.is_match(&params.config_file_mode) {
        return Err(Error::validation(
            "config_file_mode",
            format!("'{}' is not an octal mode", params.config_file_mode),
        ));
    }

    if !params.config_file.is_absolute() {
        return Err(Error::validation("config_file", "must be an absolute path"));
    }
    if !params.config_dir.is_absolute() {
        return Err(Error::validation("config_dir", "must be an absolute path"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ModuleParams {
        ModuleParams::default()
    }

    #[test]
    fn defaults_resolve_to_present_with_default_content() {
        let resolved = resolve(&params()).unwrap();
        assert_eq!(resolved.package_target, TargetState::Present);
        assert_eq!(resolved.file_target, TargetState::Present);
        assert_eq!(resolved.content, Some(ContentSource::Default));
        assert_eq!(resolved.directory, None);
        assert_eq!(resolved.config_file_mode, 0o644);
        assert_eq!(resolved.file_title(), "svn.conf");
        assert_eq!(resolved.dir_title(), "svn.dir");
    }

    #[test]
    fn version_keywords() {
        let mut p = params();
        p.version = "latest".into();
        assert_eq!(resolve(&p).unwrap().package_target, TargetState::Latest);

        p.version = "1.0.42".into();
        assert_eq!(
            resolve(&p).unwrap().package_target,
            TargetState::Version("1.0.42".into())
        );
    }

    #[test]
    fn absent_overrides_everything() {
        let mut p = params();
        p.absent = true;
        p.version = "1.0.42".into();
        p.template = Some("spec.tmpl".into());
        p.source = Some("/srv/svn.conf".into());
        p.source_dir = Some("/srv/svn".into());

        let resolved = resolve(&p).unwrap();
        assert!(resolved.package_target.is_absent());
        assert!(resolved.file_target.is_absent());
        assert_eq!(resolved.content, None);

        let dir = resolved.directory.unwrap();
        assert!(dir.target.is_absent());
        assert_eq!(dir.source, None);
        assert!(!dir.purge && !dir.force);
    }

    #[test]
    fn absent_keeps_purge_flags_for_removal() {
        let mut p = params();
        p.absent = true;
        p.source_dir = Some("/srv/svn".into());
        p.source_dir_purge = true;

        let dir = resolve(&p).unwrap().directory.unwrap();
        assert!(dir.purge && dir.force);
    }

    #[test]
    fn content_precedence() {
        let mut p = params();
        p.source = Some("/srv/svn.conf".into());
        assert_eq!(
            resolve(&p).unwrap().content,
            Some(ContentSource::Source {
                locator: "/srv/svn.conf".into()
            })
        );

        p.template = Some("spec.tmpl".into());
        assert_eq!(
            resolve(&p).unwrap().content,
            Some(ContentSource::Template {
                id: "spec.tmpl".into()
            })
        );

        p.my_class = Some("svn::spec".into());
        assert_eq!(
            resolve(&p).unwrap().content,
            Some(ContentSource::CustomClass {
                class: "svn::spec".into(),
                template: "svn/spec.tmpl".into(),
            })
        );
    }

    #[test]
    fn purge_implies_force() {
        let mut p = params();
        p.source_dir = Some("loc".into());
        let dir = resolve(&p).unwrap().directory.unwrap();
        assert!(!dir.purge && !dir.force);

        p.source_dir_purge = true;
        let dir = resolve(&p).unwrap().directory.unwrap();
        assert!(dir.purge && dir.force);
        assert_eq!(dir.source.as_deref(), Some("loc"));
    }

    #[test]
    fn purge_without_source_dir_is_ignored() {
        let mut p = params();
        p.source_dir_purge = true;
        assert_eq!(resolve(&p).unwrap().directory, None);
    }

    #[test]
    fn conflicting_absolute_states_are_rejected() {
        let mut p = params();
        p.version = "absent".into();
        let err = resolve(&p).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "version", .. }));

        p.absent = true;
        assert!(resolve(&p).is_ok());
    }

    #[test]
    fn malformed_values_are_rejected() {
        let cases: Vec<(&str, Box<dyn Fn(&mut ModuleParams)>)> = vec![
            ("name", Box::new(|p| p.name = String::new())),
            ("package", Box::new(|p| p.package = "sub version".into())),
            ("version", Box::new(|p| p.version = "  ".into())),
            ("my_class", Box::new(|p| p.my_class = Some("Svn::".into()))),
            ("template", Box::new(|p| p.template = Some(String::new()))),
            ("config_file_mode", Box::new(|p| p.config_file_mode = "0899".into())),
            ("config_file", Box::new(|p| p.config_file = "svn.conf".into())),
            ("config_dir", Box::new(|p| p.config_dir = "etc".into())),
            (
                "options",
                Box::new(|p| {
                    p.options.insert("not a key".into(), "x".into());
                }),
            ),
        ];

        for (expected, mutate) in cases {
            let mut p = params();
            mutate(&mut p);
            match resolve(&p) {
                Err(Error::Validation { field, .. }) => assert_eq!(field, expected),
                other => panic!("{expected}: expected validation error, got {other:?}"),
            }
        }
    }

    #[test]
    fn noop_is_carried_through() {
        let mut p = params();
        p.noop = true;
        p.absent = true;
        let resolved = resolve(&p).unwrap();
        assert!(resolved.noop);
        assert!(resolved.package_target.is_absent());
    }

    #[test]
    fn target_state_display() {
        assert_eq!(TargetState::Present.to_string(), "present");
        assert_eq!(TargetState::Version("1.0.42".into()).to_string(), "1.0.42");
        assert_eq!(TargetState::Absent.to_string(), "absent");
    }
}
