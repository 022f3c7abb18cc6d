//! `svnmod diff`

use anyhow::Result;
use declarative::compute_diffs;

use super::Session;
use crate::Context;
use crate::cli::GlobalArgs;
use crate::engine;
use crate::resource;

pub fn run(ctx: &Context, global: &GlobalArgs, target: Option<&str>) -> Result<()> {
    let session = Session::load(global)?;
    let plan = session.compile()?;
    let resources = session.resource_context()?;

    let execution = resource::execution_plan(&plan, &resources).filter_by_target(target);
    let diffs = compute_diffs(execution.resources());
    engine::display_diff(&diffs);

    // Show content changes of the managed file
    let files = diffs.iter().filter(|d| d.resource_type == "file");
    for diff in files {
        let Some(decl) = plan.iter().find(|d| d.title == diff.resource_id) else {
            continue;
        };
        match resource::file_resource(decl, &resources).text_change() {
            Ok(Some((current, desired))) => {
                engine::display_content_diff(&diff.resource_id, &current, &desired);
            }
            Ok(None) => {}
            Err(e) => log::warn!("Cannot diff {}: {e:#}", diff.resource_id),
        }
    }

    if !diffs.is_empty() && !ctx.quiet {
        println!();
        println!("  Run 'svnmod apply' to make these changes");
    }
    Ok(())
}
