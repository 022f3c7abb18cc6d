//! Host resources built from plan declarations
//!
//! The package goes in the first stage. The config file usually lives
//! inside the config directory, so the two get stages of their own: the
//! directory first when it is being created, last when it is being removed.

pub mod directory;
pub mod file;
pub mod package;
pub mod source;

pub use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
pub use directory::DirectoryResource;
pub use file::{FileContent, FileResource};
pub use package::PackageResource;

use declarative::{BoxedResource, ExecutionPlan};
use modkit::{Content, Plan, ResourceDeclaration, ResourceKind};
use pkgkit::{Backend, RetryConfig};
use std::path::PathBuf;
use std::sync::Arc;

/// What resources need beyond their declaration
#[derive(Debug, Clone)]
pub struct ResourceContext {
    pub backend: Arc<dyn Backend>,
    /// Directory relative source locators resolve against
    pub base_dir: PathBuf,
    pub retry: RetryConfig,
}

impl ResourceContext {
    pub fn new(backend: Arc<dyn Backend>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            base_dir: base_dir.into(),
            retry: RetryConfig::default(),
        }
    }
}

/// Turn a plan into staged resources
pub fn execution_plan(plan: &Plan, ctx: &ResourceContext) -> ExecutionPlan {
    let mut packages: Vec<BoxedResource> = Vec::new();
    let mut files: Vec<BoxedResource> = Vec::new();
    let mut directories: Vec<BoxedResource> = Vec::new();
    let mut removing_directory = false;

    let file_paths: Vec<PathBuf> = plan
        .iter()
        .filter(|d| d.kind == ResourceKind::File)
        .filter_map(|d| d.path.clone())
        .collect();

    for decl in plan.iter() {
        match decl.kind {
            ResourceKind::Package => packages.push(Box::new(package_resource(decl, ctx))),
            ResourceKind::File => files.push(Box::new(file_resource(decl, ctx))),
            ResourceKind::Directory => {
                removing_directory |= decl.target.is_absent();
                directories.push(Box::new(
                    directory_resource(decl, ctx).with_kept(file_paths.clone()),
                ));
            }
        }
    }

    let mut execution = ExecutionPlan::new();
    execution.push_stage(packages);
    if removing_directory {
        execution.push_stage(files);
        execution.push_stage(directories);
    } else {
        execution.push_stage(directories);
        execution.push_stage(files);
    }
    execution
}

pub fn package_resource(decl: &ResourceDeclaration, ctx: &ResourceContext) -> PackageResource {
    PackageResource::new(&decl.title, decl.target.clone(), ctx.backend.clone())
        .with_retry(ctx.retry.clone())
        .with_noop(decl.noop)
}

pub fn file_resource(decl: &ResourceDeclaration, ctx: &ResourceContext) -> FileResource {
    let content = match &decl.content {
        Content::Inline(text) => FileContent::Inline(text.clone()),
        Content::Source(locator) => FileContent::Source {
            locator: locator.clone(),
            base_dir: ctx.base_dir.clone(),
        },
        Content::None => FileContent::None,
    };

    FileResource::new(&decl.title, declared_path(decl), decl.target.clone())
        .with_content(content)
        .with_mode(decl.mode)
        .with_noop(decl.noop)
}

pub fn directory_resource(decl: &ResourceDeclaration, ctx: &ResourceContext) -> DirectoryResource {
    DirectoryResource::new(&decl.title, declared_path(decl), decl.target.clone())
        .with_source(decl.content.source().map(str::to_string), &ctx.base_dir)
        .with_purge(decl.purge, decl.force)
        .with_noop(decl.noop)
}

/// Declarations built by modkit always carry a path for files and dirs
fn declared_path(decl: &ResourceDeclaration) -> PathBuf {
    decl.path.clone().unwrap_or_else(|| {
        log::warn!("{} has no path, using its title", decl.reference());
        PathBuf::from(&decl.title)
    })
}
