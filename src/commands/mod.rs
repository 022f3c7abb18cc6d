//! Command implementations
//!
//! Every command starts from a [`Session`]: the params file with CLI
//! overrides applied, the host facts, and the layered template store.

pub mod apply;
pub mod diff;
pub mod plan;
pub mod render;

use anyhow::{Context as _, Result};
use modkit::{
    BuiltinTemplates, DirTemplates, Facts, LayeredTemplates, Plan, ResolvedParams,
};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::GlobalArgs;
use crate::config::{self, LoadedConfig};
use crate::resource::ResourceContext;
use crate::{facts, paths};

/// Inputs shared by every command
#[derive(Debug)]
pub struct Session {
    pub config: LoadedConfig,
    pub facts: Facts,
    pub templates: LayeredTemplates,
}

impl Session {
    /// Load params, apply overrides, gather facts and set up templates
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let mut config = config::load(global.params.as_deref())?;
        config::apply_overrides(&mut config.params, &global.overrides);

        let facts = facts::gather(global.fqdn.as_deref());
        let templates = template_store(&template_dirs(global, &config));

        Ok(Self {
            config,
            facts,
            templates,
        })
    }

    /// Validated parameters
    pub fn resolve(&self) -> Result<ResolvedParams> {
        modkit::resolve(&self.config.params).context("Invalid module parameters")
    }

    /// Declarations for this host
    pub fn compile(&self) -> Result<Plan> {
        modkit::compile(&self.config.params, &self.facts, &self.templates)
            .context("Could not build the resource plan")
    }

    /// Backend and paths needed to turn declarations into resources
    pub fn resource_context(&self) -> Result<ResourceContext> {
        let backend = pkgkit::detect(self.config.settings.backend)
            .context("No usable package manager")?;
        log::debug!("Using package backend {}", backend.name());
        Ok(ResourceContext::new(
            Arc::from(backend),
            self.config.base_dir(),
        ))
    }

    /// Parallel jobs: flag, then settings, then the executor default
    pub fn jobs(&self, flag: Option<usize>) -> usize {
        flag.or(self.config.settings.jobs).unwrap_or(4).max(1)
    }
}

/// Template directories in lookup order: flag, settings, config dir
fn template_dirs(global: &GlobalArgs, config: &LoadedConfig) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(dir) = &global.template_dir {
        dirs.push(paths::expand(&dir.to_string_lossy()));
    }
    if let Some(dir) = config.template_dir() {
        dirs.push(dir);
    }
    match paths::default_template_dir() {
        Ok(dir) if dir.is_dir() => dirs.push(dir),
        Ok(_) => {}
        Err(e) => log::debug!("No default template dir: {e:#}"),
    }
    dirs
}

/// User directories first, builtin templates last
fn template_store(dirs: &[PathBuf]) -> LayeredTemplates {
    let mut store = LayeredTemplates::new();
    for dir in dirs {
        log::debug!("Template dir: {}", dir.display());
        store = store.push(DirTemplates::new(dir));
    }
    store.push(BuiltinTemplates)
}
