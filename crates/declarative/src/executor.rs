//! Execution engine - applies resources stage by stage with parallelism
//! inside each stage

use crate::context::{ApplyContext, ConfirmCallback, ProgressCallback};
use crate::diff::compute_diffs;
use crate::planner::ExecutionPlan;
use crate::resource::Resource;
use crate::types::{ApplyResult, ExecuteOptions, ExecuteReport, ResourceOutcome};
use anyhow::Result;
use rayon::prelude::*;

/// Execute a plan with the given options and callbacks
///
/// Every resource is attempted: a failing resource is recorded as
/// [`ApplyResult::Failed`] and the remaining resources still run.
///
/// # Arguments
/// * `plan` - The execution plan to run
/// * `opts` - Execution options (dry_run, jobs, verbose)
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback, asked once before the first real change
///
/// # Returns
/// Per-resource outcomes in plan order
pub fn execute<P, C>(
    plan: ExecutionPlan,
    opts: ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteReport>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let diffs = compute_diffs(plan.resources());
    let mut report = ExecuteReport::default();

    if diffs.is_empty() {
        for resource in plan.resources() {
            report.push(outcome(resource, ApplyResult::NoChange));
        }
        return Ok(report);
    }

    // Only changes that will really happen need a confirmation
    let mutating = !opts.dry_run && diffs.iter().any(|d| !d.noop);
    if mutating && !confirm.confirm("Apply changes?")? {
        for resource in plan.resources() {
            report.push(outcome(
                resource,
                ApplyResult::Skipped {
                    reason: "Declined".into(),
                },
            ));
        }
        return Ok(report);
    }

    for (index, stage) in plan.stages.iter().enumerate() {
        progress.on_stage_start(index, stage.len());
        let results = execute_stage(stage, &opts)?;
        for (resource, result) in stage.iter().zip(results) {
            progress.on_resource_complete(&resource.id(), &result);
            report.push(outcome(resource.as_ref(), result));
        }
        progress.on_stage_complete(index);
    }

    log::info!(
        "Applied {} resources: {} changed, {} failed",
        report.summary.total(),
        report.summary.total_changes(),
        report.summary.failed
    );
    Ok(report)
}

/// Execute one stage, returning results in stage order
fn execute_stage(
    resources: &[Box<dyn Resource>],
    opts: &ExecuteOptions,
) -> Result<Vec<ApplyResult>> {
    let parallel =
        opts.jobs > 1 && resources.len() > 1 && resources.iter().all(|r| r.can_parallelize());

    if !parallel {
        return Ok(resources
            .iter()
            .map(|r| apply_resource(r.as_ref(), opts))
            .collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

    Ok(pool.install(|| {
        resources
            .par_iter()
            .map(|r| apply_resource(r.as_ref(), opts))
            .collect()
    }))
}

/// Apply a single resource, turning errors into `Failed`
fn apply_resource(resource: &dyn Resource, opts: &ExecuteOptions) -> ApplyResult {
    let mut ctx = ApplyContext::new(opts.dry_run || resource.noop(), opts.verbose);

    match resource.apply(&mut ctx) {
        Ok(result) => result,
        Err(e) => {
            log::error!("{} failed: {:#}", resource.id(), e);
            ApplyResult::Failed {
                error: format!("{e:#}"),
            }
        }
    }
}

fn outcome(resource: &dyn Resource, result: ApplyResult) -> ResourceOutcome {
    ResourceOutcome {
        resource_id: resource.id(),
        resource_type: resource.resource_type().to_string(),
        result,
    }
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn execute_simple(plan: ExecutionPlan, opts: ExecuteOptions) -> Result<ExecuteReport> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(plan, opts, &mut NoProgress, &mut AutoConfirm)
}
