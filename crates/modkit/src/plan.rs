//! Resource plan building
//!
//! A [`Plan`] is the ordered list of resources one pass wants on the host:
//! the package first, then the configuration file, then (optionally) the
//! configuration directory. Building a plan renders templates but never
//! touches the host.

use crate::error::Result;
use crate::params::Facts;
use crate::resolver::{ContentSource, ResolvedParams, TargetState};
use crate::template::{Bindings, DEFAULT_TEMPLATE, Renderer, TemplateSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Kind of managed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Package,
    File,
    Directory,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Package => write!(f, "package"),
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// Content of a file or directory resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Content {
    /// Text produced at plan time
    Inline(String),
    /// Locator the applier copies from
    Source(String),
    /// Nothing to write
    None,
}

impl Content {
    pub fn inline(&self) -> Option<&str> {
        match self {
            Self::Inline(text) => Some(text),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Source(locator) => Some(locator),
            _ => None,
        }
    }
}

/// Desired state of one resource, ready for an applier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDeclaration {
    pub kind: ResourceKind,
    /// Package name or resource title (`svn.conf`, `svn.dir`)
    pub title: String,
    /// Filesystem path for files and directories
    pub path: Option<PathBuf>,
    pub target: TargetState,
    pub content: Content,
    pub noop: bool,
    pub purge: bool,
    pub force: bool,
    /// Permission bits for files
    pub mode: Option<u32>,
}

impl ResourceDeclaration {
    fn new(kind: ResourceKind, title: String, target: TargetState, noop: bool) -> Self {
        Self {
            kind,
            title,
            path: None,
            target,
            content: Content::None,
            noop,
            purge: false,
            force: false,
            mode: None,
        }
    }

    /// `kind[title]`, e.g. `file[svn.conf]`
    pub fn reference(&self) -> String {
        format!("{}[{}]", self.kind, self.title)
    }
}

/// Ordered declarations produced by one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub declarations: Vec<ResourceDeclaration>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResourceDeclaration> {
        self.declarations.iter()
    }

    /// First declaration of the given kind
    pub fn find(&self, kind: ResourceKind) -> Option<&ResourceDeclaration> {
        self.declarations.iter().find(|d| d.kind == kind)
    }

    pub fn package(&self) -> Option<&ResourceDeclaration> {
        self.find(ResourceKind::Package)
    }

    pub fn file(&self) -> Option<&ResourceDeclaration> {
        self.find(ResourceKind::File)
    }

    pub fn directory(&self) -> Option<&ResourceDeclaration> {
        self.find(ResourceKind::Directory)
    }
}

impl IntoIterator for Plan {
    type Item = ResourceDeclaration;
    type IntoIter = std::vec::IntoIter<ResourceDeclaration>;

    fn into_iter(self) -> Self::IntoIter {
        self.declarations.into_iter()
    }
}

/// Bindings a content source renders with.
///
/// Custom classes and caller templates see the host identity plus the
/// options; the default template sees a fixed set describing the module.
pub fn bindings_for(resolved: &ResolvedParams, facts: &Facts) -> Bindings {
    match resolved.content {
        Some(ContentSource::Default) | None => {
            let mut bindings = Bindings::for_host(facts);
            bindings.insert("name", resolved.name.clone());
            bindings.insert("package", resolved.package.clone());
            bindings.insert("config_file", resolved.config_file.display().to_string());
            bindings
        }
        Some(_) => Bindings::for_host(facts).with_options(&resolved.options),
    }
}

/// Build the declarations for a resolved pass.
pub fn build(
    resolved: &ResolvedParams,
    facts: &Facts,
    templates: &dyn TemplateSource,
) -> Result<Plan> {
    let noop = resolved.noop;
    let mut declarations = Vec::with_capacity(3);

    declarations.push(ResourceDeclaration::new(
        ResourceKind::Package,
        resolved.package.clone(),
        resolved.package_target.clone(),
        noop,
    ));

    let mut file = ResourceDeclaration::new(
        ResourceKind::File,
        resolved.file_title(),
        resolved.file_target.clone(),
        noop,
    );
    file.path = Some(resolved.config_file.clone());
    file.mode = Some(resolved.config_file_mode);
    file.content = file_content(resolved, facts, templates)?;
    declarations.push(file);

    if let Some(dir) = &resolved.directory {
        let mut decl = ResourceDeclaration::new(
            ResourceKind::Directory,
            resolved.dir_title(),
            dir.target.clone(),
            noop,
        );
        decl.path = Some(resolved.config_dir.clone());
        decl.content = dir
            .source
            .clone()
            .map_or(Content::None, Content::Source);
        decl.purge = dir.purge;
        decl.force = dir.force;
        declarations.push(decl);
    }

    log::debug!(
        "Built plan for {} with {} resources",
        resolved.name,
        declarations.len()
    );
    Ok(Plan { declarations })
}

fn file_content(
    resolved: &ResolvedParams,
    facts: &Facts,
    templates: &dyn TemplateSource,
) -> Result<Content> {
    let Some(content) = &resolved.content else {
        return Ok(Content::None);
    };

    let renderer = Renderer::new(templates);
    let bindings = bindings_for(resolved, facts);
    let text = match content {
        ContentSource::Source { locator } => return Ok(Content::Source(locator.clone())),
        ContentSource::CustomClass { template, .. } => renderer.render(template, &bindings)?,
        ContentSource::Template { id } => renderer.render(id, &bindings)?,
        ContentSource::Default => renderer.render(DEFAULT_TEMPLATE, &bindings)?,
    };
    Ok(Content::Inline(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::params::ModuleParams;
    use crate::resolver::resolve;
    use crate::template::{BuiltinTemplates, MemoryTemplates};

    fn facts() -> Facts {
        Facts::new("rspec.example42.com")
    }

    fn plan_for(params: &ModuleParams) -> Result<Plan> {
        build(&resolve(params)?, &facts(), &BuiltinTemplates)
    }

    #[test]
    fn minimal_plan_order() {
        let plan = plan_for(&ModuleParams::default()).unwrap();
        let kinds: Vec<_> = plan.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![ResourceKind::Package, ResourceKind::File]);

        let file = plan.file().unwrap();
        assert_eq!(file.reference(), "file[svn.conf]");
        assert_eq!(file.path, Some(PathBuf::from("/etc/subversion/svn.conf")));
        assert_eq!(file.mode, Some(0o644));
    }

    #[test]
    fn default_template_sees_module_bindings() {
        let plan = plan_for(&ModuleParams::default()).unwrap();
        let content = plan.file().unwrap().content.inline().unwrap();
        assert!(content.contains("rspec.example42.com"));
        assert!(content.contains("Package: subversion"));
        assert!(content.contains("/etc/subversion/svn.conf"));
    }

    #[test]
    fn caller_templates_do_not_see_module_bindings() {
        let templates = MemoryTemplates::new().with("pkg.tmpl", "${package}");
        let params = ModuleParams {
            template: Some("pkg.tmpl".into()),
            ..Default::default()
        };
        let err = build(&resolve(&params).unwrap(), &facts(), &templates).unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
    }

    #[test]
    fn source_content_is_not_rendered() {
        let params = ModuleParams {
            source: Some("file:///srv/svn/spec".into()),
            ..Default::default()
        };
        let plan = plan_for(&params).unwrap();
        let file = plan.file().unwrap();
        assert_eq!(file.content.source(), Some("file:///srv/svn/spec"));
        assert_eq!(file.content.inline(), None);
    }

    #[test]
    fn missing_template_fails_the_pass() {
        let params = ModuleParams {
            template: Some("missing.tmpl".into()),
            ..Default::default()
        };
        assert!(matches!(
            plan_for(&params),
            Err(Error::TemplateNotFound { .. })
        ));
    }

    #[test]
    fn absent_file_has_no_content() {
        let params = ModuleParams {
            absent: true,
            ..Default::default()
        };
        let plan = plan_for(&params).unwrap();
        assert_eq!(plan.file().unwrap().content, Content::None);
    }

    #[test]
    fn directory_comes_last() {
        let params = ModuleParams {
            source_dir: Some("loc".into()),
            ..Default::default()
        };
        let plan = plan_for(&params).unwrap();
        assert_eq!(plan.len(), 3);
        let dir = &plan.declarations[2];
        assert_eq!(dir.kind, ResourceKind::Directory);
        assert_eq!(dir.title, "svn.dir");
        assert_eq!(dir.path, Some(PathBuf::from("/etc/subversion")));
        assert_eq!(dir.content.source(), Some("loc"));
    }

    #[test]
    fn plan_serializes_to_json() {
        let plan = plan_for(&ModuleParams {
            version: "1.0.42".into(),
            ..Default::default()
        })
        .unwrap();
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["declarations"][0]["kind"], "package");
        assert_eq!(json["declarations"][0]["target"]["version"], "1.0.42");
        assert_eq!(json["declarations"][1]["content"]["type"], "inline");
    }
}
