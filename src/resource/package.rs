//! System package resource

use anyhow::{Context, Result};
use modkit::TargetState;
use pkgkit::{Backend, RetryConfig, retry, version_matches};
use std::sync::Arc;

use super::{ApplyContext, ApplyResult, Resource, ResourceState};

/// A package installed through the host package manager
#[derive(Debug, Clone)]
pub struct PackageResource {
    pub name: String,
    pub target: TargetState,
    pub noop: bool,
    backend: Arc<dyn Backend>,
    retry: RetryConfig,
}

impl PackageResource {
    pub fn new(name: &str, target: TargetState, backend: Arc<dyn Backend>) -> Self {
        Self {
            name: name.to_string(),
            target,
            noop: false,
            backend,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_noop(mut self, noop: bool) -> Self {
        self.noop = noop;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn installed_version(&self) -> Result<Option<String>> {
        self.backend
            .installed_version(&self.name)
            .with_context(|| format!("Failed to query {} for {}", self.backend.name(), self.name))
    }

    /// Newest version the repositories offer
    fn candidate_version(&self) -> Option<String> {
        match self.backend.candidate_version(&self.name) {
            Ok(candidate) => candidate,
            Err(e) => {
                log::warn!("Could not determine latest version of {}: {e}", self.name);
                None
            }
        }
    }

    /// Whether an installed version satisfies the target
    fn satisfied_by(&self, installed: Option<&str>) -> bool {
        match (&self.target, installed) {
            (TargetState::Absent, installed) => installed.is_none(),
            (_, None) => false,
            (TargetState::Present, Some(_)) => true,
            (TargetState::Version(wanted), Some(installed)) => version_matches(installed, wanted),
            // Unknown candidate means nothing newer is known
            (TargetState::Latest, Some(installed)) => self
                .candidate_version()
                .is_none_or(|candidate| candidate == installed),
        }
    }

    /// Describe the change apply would make
    fn planned_change(&self, installed: Option<&str>) -> String {
        match (&self.target, installed) {
            (TargetState::Absent, _) => format!("remove {}", self.name),
            (TargetState::Version(v), None) => format!("install {} {v}", self.name),
            (TargetState::Version(v), Some(from)) => {
                format!("change {} from {from} to {v}", self.name)
            }
            (TargetState::Latest, Some(from)) => {
                format!("upgrade {} from {from} to latest", self.name)
            }
            (_, _) => format!("install {}", self.name),
        }
    }

    fn converge(&self) -> Result<()> {
        let callback = retry::LogCallback;
        let result = match &self.target {
            TargetState::Absent => {
                retry::with_retry(&self.retry, Some(&callback), || {
                    self.backend.remove(&self.name)
                })
            }
            TargetState::Present => retry::with_retry(&self.retry, Some(&callback), || {
                self.backend.install(&self.name, None)
            }),
            TargetState::Version(version) => {
                retry::with_retry(&self.retry, Some(&callback), || {
                    self.backend.install(&self.name, Some(version))
                })
            }
            TargetState::Latest => {
                let candidate = self.candidate_version();
                retry::with_retry(&self.retry, Some(&callback), || {
                    self.backend.install(&self.name, candidate.as_deref())
                })
            }
        };
        result.with_context(|| format!("{} failed for {}", self.backend.name(), self.name))
    }
}

impl Resource for PackageResource {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        match &self.target {
            TargetState::Absent => format!("Remove package {}", self.name),
            target => format!("Install package {} ({target})", self.name),
        }
    }

    fn resource_type(&self) -> &'static str {
        "package"
    }

    fn current_state(&self) -> Result<ResourceState> {
        Ok(match self.installed_version()? {
            Some(version) => ResourceState::present(version),
            None => ResourceState::Absent,
        })
    }

    fn desired_state(&self) -> ResourceState {
        match &self.target {
            TargetState::Absent => ResourceState::Absent,
            TargetState::Present => ResourceState::Present { details: None },
            target => ResourceState::present(target.to_string()),
        }
    }

    fn is_converged(&self, current: &ResourceState) -> bool {
        match current {
            ResourceState::Absent => self.satisfied_by(None),
            ResourceState::Present { details } => self.satisfied_by(details.as_deref()),
            _ => false,
        }
    }

    fn noop(&self) -> bool {
        self.noop
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let installed = self.installed_version()?;
        if self.satisfied_by(installed.as_deref()) {
            return Ok(ApplyResult::NoChange);
        }

        if ctx.dry_run {
            return Ok(ApplyResult::would(self.planned_change(installed.as_deref())));
        }

        self.converge()?;

        Ok(match (&self.target, installed) {
            (TargetState::Absent, _) => ApplyResult::Removed,
            (_, None) => ApplyResult::Created,
            (_, Some(_)) => ApplyResult::Modified,
        })
    }

    fn can_parallelize(&self) -> bool {
        // Package managers hold a global lock
        false
    }
}
