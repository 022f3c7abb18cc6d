//! `svnmod plan`

use anyhow::Result;
use colored::Colorize;
use modkit::{Content, ResourceDeclaration};

use super::Session;
use crate::Context;
use crate::cli::GlobalArgs;
use crate::ui;

pub fn run(ctx: &Context, global: &GlobalArgs, json: bool) -> Result<()> {
    let session = Session::load(global)?;
    let plan = session.compile()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    ui::header(&format!("Plan for {}", session.facts.fqdn));
    if let Some(path) = &session.config.path
        && !ctx.quiet
    {
        ui::dim(&format!("params: {}", path.display()));
    }

    for decl in plan.iter() {
        ui::section(&decl.reference());
        for (key, value) in describe(decl) {
            ui::kv(key, &value);
        }
    }

    if plan.iter().any(|d| d.noop) {
        println!();
        println!("  {} noop is set: apply will only report", "ℹ".blue());
    }
    Ok(())
}

/// Key/value lines shown for one declaration
fn describe(decl: &ResourceDeclaration) -> Vec<(&'static str, String)> {
    let mut lines = vec![("ensure", decl.target.to_string())];

    if let Some(path) = &decl.path {
        lines.push(("path", path.display().to_string()));
    }
    match &decl.content {
        Content::Inline(text) => {
            lines.push(("content", format!("rendered, {} lines", text.lines().count())));
        }
        Content::Source(locator) => lines.push(("source", locator.clone())),
        Content::None => {}
    }
    if let Some(mode) = decl.mode {
        lines.push(("mode", format!("{mode:04o}")));
    }

    let flags: Vec<&str> = [
        (decl.noop, "noop"),
        (decl.purge, "purge"),
        (decl.force, "force"),
    ]
    .iter()
    .filter(|(set, _)| *set)
    .map(|(_, name)| *name)
    .collect();
    if !flags.is_empty() {
        lines.push(("flags", flags.join(", ")));
    }

    lines
}
