//! Diff display

use colored::Colorize;
use declarative::{DiffSummary, ResourceDiff, ResourceState, group_by_type};
use similar::{ChangeTag, TextDiff};

/// Display a list of diffs in a user-friendly format
pub fn display_diff(diffs: &[ResourceDiff]) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Configuration Diff".bold()
    );
    println!("│");

    for (resource_type, type_diffs) in &group_by_type(diffs) {
        println!("│ {}", type_heading(resource_type).bold());

        for diff in type_diffs {
            let symbol = match symbol(diff) {
                '+' => "+".green(),
                '-' => "-".red(),
                '~' => "~".yellow(),
                _ => "?".dimmed(),
            };
            let noop = if diff.noop {
                " [noop]".cyan().to_string()
            } else {
                String::new()
            };

            println!(
                "│   {} {:<30} {}{}",
                symbol,
                diff.resource_id,
                state_description(diff).dimmed(),
                noop
            );
        }
        println!("│");
    }

    let summary = DiffSummary::from_diffs(diffs);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} add, {} remove, {} modify, {} noop)",
        summary.total().to_string().bold(),
        summary.additions.to_string().green(),
        summary.removals.to_string().red(),
        summary.modifications.to_string().yellow(),
        summary.noop.to_string().cyan()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Show a unified line diff of a file's content
pub fn display_content_diff(title: &str, current: &str, desired: &str) {
    println!();
    println!("  {} {}", "---".red(), format!("{title} (current)").dimmed());
    println!("  {} {}", "+++".green(), format!("{title} (desired)").dimmed());

    let diff = TextDiff::from_lines(current, desired);
    for group in diff.grouped_ops(3) {
        println!("  {}", "@@".cyan());
        for op in group {
            for change in diff.iter_changes(&op) {
                let line = change.to_string_lossy();
                let line = line.trim_end_matches('\n');
                match change.tag() {
                    ChangeTag::Delete => println!("  {}", format!("-{line}").red()),
                    ChangeTag::Insert => println!("  {}", format!("+{line}").green()),
                    ChangeTag::Equal => println!("  {}", format!(" {line}").dimmed()),
                }
            }
        }
    }
}

fn type_heading(resource_type: &str) -> &str {
    match resource_type {
        "package" => "Packages",
        "file" => "Files",
        "directory" => "Directories",
        other => other,
    }
}

/// `+` add, `-` remove, `~` modify, `?` unknown
fn symbol(diff: &ResourceDiff) -> char {
    match (&diff.current, &diff.desired) {
        (ResourceState::Unknown, _) | (_, ResourceState::Unknown) => '?',
        _ if diff.is_addition() => '+',
        _ if diff.is_removal() => '-',
        _ => '~',
    }
}

fn state_description(diff: &ResourceDiff) -> String {
    match (&diff.current, &diff.desired) {
        (ResourceState::Absent, ResourceState::Present { details }) => format!(
            "(missing){}",
            details
                .as_ref()
                .map(|d| format!(" → {d}"))
                .unwrap_or_default()
        ),
        (ResourceState::Present { details: from }, ResourceState::Present { details: to }) => {
            format!(
                "{} → {}",
                from.as_deref().unwrap_or("current"),
                to.as_deref().unwrap_or("desired")
            )
        }
        (ResourceState::Modified { from, to }, _) => format!("{from} → {to}"),
        (_, ResourceState::Absent) => "(will remove)".to_string(),
        (ResourceState::Unknown, _) => "(state unknown)".to_string(),
        (_, ResourceState::Unknown) => "(desired state unknown)".to_string(),
        _ => String::new(),
    }
}
