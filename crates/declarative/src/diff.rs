//! Diff computation for resources

use crate::resource::Resource;
use crate::types::ResourceState;
use serde::{Deserialize, Serialize};

/// A diff between current and desired state of a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Unique identifier of the resource
    pub resource_id: String,
    /// Type of the resource
    pub resource_type: String,
    /// Human-readable description
    pub description: String,
    /// Current state
    pub current: ResourceState,
    /// Desired state
    pub desired: ResourceState,
    /// Whether the resource will only report this change
    pub noop: bool,
}

impl ResourceDiff {
    /// Create a diff from a resource, returning None if no changes needed
    ///
    /// A resource whose current state cannot be read is reported with an
    /// `Unknown` current state, so that applying it surfaces the error.
    pub fn from_resource(resource: &dyn Resource) -> Option<Self> {
        let current = match resource.current_state() {
            Ok(current) => current,
            Err(e) => {
                log::warn!("Could not read state of {}: {:#}", resource.id(), e);
                ResourceState::Unknown
            }
        };

        if current != ResourceState::Unknown && resource.is_converged(&current) {
            return None;
        }

        Some(Self {
            resource_id: resource.id(),
            resource_type: resource.resource_type().to_string(),
            description: resource.description(),
            current,
            desired: resource.desired_state(),
            noop: resource.noop(),
        })
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Absent, ResourceState::Present { .. })
        )
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Present { .. } | ResourceState::Modified { .. }, ResourceState::Absent)
        )
    }

    /// Check if this diff represents a modification
    pub fn is_modification(&self) -> bool {
        !self.is_addition() && !self.is_removal()
    }
}

/// Compute diffs for a list of resources
///
/// Returns only resources that have differences between current and desired state.
pub fn compute_diffs<'a>(
    resources: impl IntoIterator<Item = &'a dyn Resource>,
) -> Vec<ResourceDiff> {
    resources
        .into_iter()
        .filter_map(ResourceDiff::from_resource)
        .collect()
}

/// Diff summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    /// Number of resources to add
    pub additions: usize,
    /// Number of resources to remove
    pub removals: usize,
    /// Number of resources to modify
    pub modifications: usize,
    /// Number of changes that are only reported
    pub noop: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if diff.is_addition() {
                summary.additions += 1;
            } else if diff.is_removal() {
                summary.removals += 1;
            } else {
                summary.modifications += 1;
            }
            if diff.noop {
                summary.noop += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource type
pub fn group_by_type(
    diffs: &[ResourceDiff],
) -> std::collections::BTreeMap<String, Vec<&ResourceDiff>> {
    let mut groups: std::collections::BTreeMap<String, Vec<&ResourceDiff>> =
        std::collections::BTreeMap::new();
    for diff in diffs {
        groups
            .entry(diff.resource_type.clone())
            .or_default()
            .push(diff);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApplyContext;
    use crate::types::ApplyResult;
    use anyhow::{Result, bail};

    #[derive(Debug)]
    struct Fixed {
        id: &'static str,
        current: Option<ResourceState>,
        desired: ResourceState,
    }

    impl Resource for Fixed {
        fn id(&self) -> String {
            self.id.to_string()
        }
        fn description(&self) -> String {
            format!("fixed {}", self.id)
        }
        fn resource_type(&self) -> &'static str {
            "file"
        }
        fn current_state(&self) -> Result<ResourceState> {
            match &self.current {
                Some(state) => Ok(state.clone()),
                None => bail!("permission denied"),
            }
        }
        fn desired_state(&self) -> ResourceState {
            self.desired.clone()
        }
        fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
            Ok(ApplyResult::NoChange)
        }
    }

    #[test]
    fn converged_resources_have_no_diff() {
        let r = Fixed {
            id: "a",
            current: Some(ResourceState::Absent),
            desired: ResourceState::Absent,
        };
        assert!(ResourceDiff::from_resource(&r).is_none());
    }

    #[test]
    fn unreadable_state_is_reported() {
        let r = Fixed {
            id: "a",
            current: None,
            desired: ResourceState::Absent,
        };
        let diff = ResourceDiff::from_resource(&r).unwrap();
        assert_eq!(diff.current, ResourceState::Unknown);
    }

    #[test]
    fn summary_counts_kinds() {
        let resources = [
            Fixed {
                id: "add",
                current: Some(ResourceState::Absent),
                desired: ResourceState::present("x"),
            },
            Fixed {
                id: "remove",
                current: Some(ResourceState::present("x")),
                desired: ResourceState::Absent,
            },
            Fixed {
                id: "change",
                current: Some(ResourceState::present("x")),
                desired: ResourceState::present("y"),
            },
        ];
        let diffs = compute_diffs(resources.iter().map(|r| r as &dyn Resource));
        let summary = DiffSummary::from_diffs(&diffs);
        assert_eq!(summary.additions, 1);
        assert_eq!(summary.removals, 1);
        assert_eq!(summary.modifications, 1);
        assert!(summary.has_changes());
        assert_eq!(group_by_type(&diffs)["file"].len(), 3);
    }
}
