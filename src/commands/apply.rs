//! `svnmod apply`

use anyhow::{Result, bail};

use super::Session;
use crate::Context;
use crate::cli::{ApplyArgs, GlobalArgs};
use crate::engine::{self, ApplyOptions};
use crate::resource;
use crate::ui;

pub fn run(ctx: &Context, global: &GlobalArgs, args: &ApplyArgs) -> Result<()> {
    let session = Session::load(global)?;
    let plan = session.compile()?;
    let resources = session.resource_context()?;

    let execution =
        resource::execution_plan(&plan, &resources).filter_by_target(args.target.as_deref());
    if execution.is_empty() {
        ui::warn("No resources match the target");
        return Ok(());
    }

    let opts = ApplyOptions {
        dry_run: args.dry_run,
        jobs: session.jobs(args.jobs),
        yes: args.yes,
        verbose: ctx.verbose > 0,
        quiet: ctx.quiet,
    };
    let report = engine::run(execution, &opts)?;

    let failures = report.failures();
    if !failures.is_empty() {
        for failure in &failures {
            log::debug!("{} failed: {:?}", failure.resource_id, failure.result);
        }
        bail!("{} of {} resources failed", failures.len(), report.summary.total());
    }
    Ok(())
}
