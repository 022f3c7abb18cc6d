//! Execution planner - builds ordered resource execution plans

use crate::resource::{BoxedResource, Resource};

/// An execution plan with resources grouped into ordered stages
///
/// Stage N+1 only starts once every resource of stage N has been applied.
/// Resources inside one stage have no ordering between them.
pub struct ExecutionPlan {
    /// Stages in execution order
    pub stages: Vec<Vec<BoxedResource>>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage; empty stages are dropped
    pub fn push_stage(&mut self, resources: Vec<BoxedResource>) {
        if !resources.is_empty() {
            self.stages.push(resources);
        }
    }

    /// Add a resource to the last stage, opening one if needed
    pub fn add_resource(&mut self, resource: BoxedResource) {
        match self.stages.last_mut() {
            Some(stage) => stage.push(resource),
            None => self.stages.push(vec![resource]),
        }
    }

    /// Iterate over every resource in execution order
    pub fn resources(&self) -> impl Iterator<Item = &dyn Resource> {
        self.stages.iter().flatten().map(|r| r.as_ref())
    }

    /// Filter plan to only include resources matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn Resource) -> bool,
    {
        let mut filtered = Self::new();
        for stage in self.stages {
            filtered.push_stage(stage.into_iter().filter(|r| predicate(r.as_ref())).collect());
        }
        filtered
    }

    /// Filter plan to only include resources matching a target pattern
    ///
    /// Target format: "type" or "type.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, name) = parse_target(t);
                self.filter(|r| matches_filter(r, resource_type.as_deref(), name.as_deref()))
            }
        }
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.stages.iter().all(Vec::is_empty)
    }
}

impl Default for ExecutionPlan {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a target string like "type.name" into (type, name)
///
/// Only the first dot separates, so names may contain dots ("file.svn.conf").
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        None => (Some(target.to_string()), None),
        Some((resource_type, name)) => (Some(resource_type.to_string()), Some(name.to_string())),
    }
}

/// Check if a resource matches the filter criteria
fn matches_filter(
    resource: &dyn Resource,
    resource_type: Option<&str>,
    name: Option<&str>,
) -> bool {
    if let Some(rt) = resource_type {
        // Allow common aliases
        let matches_type = match rt {
            "packages" | "pkg" => resource.resource_type() == "package",
            "files" | "config" => resource.resource_type() == "file",
            "dirs" | "dir" => resource.resource_type() == "directory",
            _ => resource.resource_type() == rt,
        };
        if !matches_type {
            return false;
        }
    }

    if let Some(n) = name
        && !resource.id().contains(n)
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApplyContext;
    use crate::types::{ApplyResult, ResourceState};
    use anyhow::Result;

    #[derive(Debug)]
    struct Named(&'static str, &'static str);

    impl Resource for Named {
        fn id(&self) -> String {
            self.1.to_string()
        }
        fn description(&self) -> String {
            self.1.to_string()
        }
        fn resource_type(&self) -> &'static str {
            self.0
        }
        fn current_state(&self) -> Result<ResourceState> {
            Ok(ResourceState::Absent)
        }
        fn desired_state(&self) -> ResourceState {
            ResourceState::Absent
        }
        fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
            Ok(ApplyResult::NoChange)
        }
    }

    fn plan() -> ExecutionPlan {
        let mut plan = ExecutionPlan::new();
        plan.push_stage(vec![Box::new(Named("package", "subversion"))]);
        plan.push_stage(vec![
            Box::new(Named("file", "svn.conf")),
            Box::new(Named("directory", "svn.dir")),
        ]);
        plan
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("file"), (Some("file".to_string()), None));
        assert_eq!(
            parse_target("file.svn.conf"),
            (Some("file".to_string()), Some("svn.conf".to_string()))
        );
    }

    #[test]
    fn empty_stages_are_dropped() {
        let mut plan = ExecutionPlan::new();
        plan.push_stage(Vec::new());
        assert!(plan.is_empty());
        assert!(plan.stages.is_empty());
    }

    #[test]
    fn filter_by_target_keeps_stage_order() {
        let plan = plan().filter_by_target(Some("files"));
        assert_eq!(plan.total_resources(), 1);
        assert_eq!(plan.stages.len(), 1);

        let plan = self::plan().filter_by_target(Some("package.subversion"));
        let ids: Vec<_> = plan.resources().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["subversion"]);

        assert_eq!(self::plan().filter_by_target(None).total_resources(), 3);
    }
}
