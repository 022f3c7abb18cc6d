//! Terminal front end for the declarative executor

use anyhow::Result;
use colored::Colorize;
use declarative::{
    ApplyResult, ConfirmCallback, ExecuteOptions, ExecuteReport, ExecuteSummary, ExecutionPlan,
    ProgressCallback, compute_diffs,
};
use indicatif::{ProgressBar, ProgressStyle};

use super::differ::display_diff;
use crate::ui;

/// Options for an interactive apply
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of parallel jobs
    pub jobs: usize,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Verbose output
    pub verbose: bool,
    /// Hide progress bars
    pub quiet: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            yes: false,
            verbose: false,
            quiet: false,
        }
    }
}

/// One progress bar per stage
pub struct IndicatifProgress {
    labels: Vec<String>,
    bar: Option<ProgressBar>,
    hidden: bool,
}

impl IndicatifProgress {
    pub fn new(labels: Vec<String>, hidden: bool) -> Self {
        Self {
            labels,
            bar: None,
            hidden,
        }
    }
}

impl ProgressCallback for IndicatifProgress {
    fn on_stage_start(&mut self, stage: usize, count: usize) {
        let bar = if self.hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(count as u64)
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        bar.set_prefix(
            self.labels
                .get(stage)
                .cloned()
                .unwrap_or_else(|| format!("stage {}", stage + 1)),
        );
        self.bar = Some(bar);
    }

    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{} {}", result_symbol(result), ui::truncate_path(id, 30)));
            bar.inc(1);
        }
    }

    fn on_stage_complete(&mut self, _stage: usize) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Asks on the terminal unless `--yes` was given
pub struct DialoguerConfirm {
    pub yes: bool,
}

impl ConfirmCallback for DialoguerConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.yes {
            return Ok(true);
        }

        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()?;
        Ok(confirmed)
    }
}

/// Show the diff, confirm, apply, and print the outcome
pub fn run(plan: ExecutionPlan, opts: &ApplyOptions) -> Result<ExecuteReport> {
    let diffs = compute_diffs(plan.resources());
    display_diff(&diffs);

    if diffs.is_empty() {
        return Ok(ExecuteReport::default());
    }

    // Nothing is mutated when every change is noop, same as a dry run
    let preview = opts.dry_run || diffs.iter().all(|d| d.noop);
    let labels = stage_labels(&plan);
    let mut progress = IndicatifProgress::new(labels, opts.quiet);
    let mut confirm = DialoguerConfirm { yes: opts.yes };

    let report = declarative::execute(
        plan,
        ExecuteOptions {
            dry_run: opts.dry_run,
            jobs: opts.jobs,
            verbose: opts.verbose,
        },
        &mut progress,
        &mut confirm,
    )?;

    print_outcomes(&report);
    print_summary(&report.summary, preview);
    Ok(report)
}

/// `package`, `file + directory`, ... one label per stage
fn stage_labels(plan: &ExecutionPlan) -> Vec<String> {
    plan.stages
        .iter()
        .map(|stage| {
            let mut types: Vec<&str> = stage.iter().map(|r| r.resource_type()).collect();
            types.dedup();
            types.join(" + ")
        })
        .collect()
}

fn result_symbol(result: &ApplyResult) -> &'static str {
    match result {
        ApplyResult::NoChange => "○",
        ApplyResult::Created | ApplyResult::Modified | ApplyResult::Removed => "✓",
        ApplyResult::Failed { .. } => "✗",
        ApplyResult::Skipped { .. } => "⊘",
    }
}

fn result_text(result: &ApplyResult) -> String {
    match result {
        ApplyResult::NoChange => "unchanged".to_string(),
        ApplyResult::Created => "created".to_string(),
        ApplyResult::Modified => "modified".to_string(),
        ApplyResult::Removed => "removed".to_string(),
        ApplyResult::Failed { error } => error.clone(),
        ApplyResult::Skipped { reason } => reason.clone(),
    }
}

fn print_outcomes(report: &ExecuteReport) {
    println!();
    for outcome in &report.outcomes {
        let reference = format!("{}[{}]", outcome.resource_type, outcome.resource_id);
        let text = result_text(&outcome.result);
        match &outcome.result {
            ApplyResult::NoChange => {
                println!("  {} {} {}", "○".dimmed(), reference, text.dimmed());
            }
            ApplyResult::Failed { .. } => {
                println!("  {} {} {}", "✗".red(), reference, text.red());
            }
            ApplyResult::Skipped { .. } => {
                println!("  {} {} {}", "⊘".cyan(), reference, text.cyan());
            }
            _ => println!("  {} {} {}", "✓".green(), reference, text.green()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Headline {
    Preview,
    Applied,
    Errors,
}

fn headline(summary: &ExecuteSummary, preview: bool) -> Headline {
    if preview && summary.failed == 0 {
        Headline::Preview
    } else if summary.is_success() {
        Headline::Applied
    } else {
        Headline::Errors
    }
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary, preview: bool) {
    println!();
    match headline(summary, preview) {
        Headline::Preview => println!("  {} Dry run - no changes made", "ℹ".blue()),
        Headline::Applied => println!(
            "  {} Configuration applied successfully!",
            "✓".green().bold()
        ),
        Headline::Errors => println!(
            "  {} Configuration applied with errors",
            "⚠".yellow().bold()
        ),
    }

    for line in summary_lines(summary) {
        println!("    • {line}");
    }
}

fn summary_lines(summary: &ExecuteSummary) -> Vec<String> {
    [
        (summary.created, "created"),
        (summary.modified, "modified"),
        (summary.removed, "removed"),
        (summary.skipped, "skipped"),
        (summary.failed, "failed"),
    ]
    .iter()
    .filter(|(count, _)| *count > 0)
    .map(|(count, label)| format!("{count} resources {label}"))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{AutoConfirm, NoProgress, Resource, ResourceState};

    #[derive(Debug)]
    struct Stub(&'static str);

    impl Resource for Stub {
        fn id(&self) -> String {
            self.0.to_string()
        }
        fn description(&self) -> String {
            String::new()
        }
        fn resource_type(&self) -> &'static str {
            self.0
        }
        fn current_state(&self) -> Result<ResourceState> {
            Ok(ResourceState::Absent)
        }
        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }
        fn apply(&self, _ctx: &mut declarative::ApplyContext) -> Result<ApplyResult> {
            Ok(ApplyResult::Created)
        }
    }

    #[test]
    fn labels_name_resource_types() {
        let mut plan = ExecutionPlan::new();
        plan.push_stage(vec![Box::new(Stub("package"))]);
        plan.push_stage(vec![Box::new(Stub("file")), Box::new(Stub("directory"))]);
        assert_eq!(stage_labels(&plan), vec!["package", "file + directory"]);
    }

    #[test]
    fn summary_lists_non_zero_counts() {
        let summary = ExecuteSummary {
            created: 2,
            failed: 1,
            ..Default::default()
        };
        assert_eq!(
            summary_lines(&summary),
            vec!["2 resources created", "1 resources failed"]
        );
    }

    #[test]
    fn noop_only_runs_read_as_dry_runs() {
        let skipped = ExecuteSummary {
            skipped: 3,
            ..Default::default()
        };
        assert_eq!(headline(&skipped, true), Headline::Preview);
        assert_eq!(headline(&skipped, false), Headline::Applied);

        let failed = ExecuteSummary {
            failed: 1,
            ..Default::default()
        };
        assert_eq!(headline(&failed, true), Headline::Errors);
    }

    #[test]
    fn yes_skips_the_prompt() {
        let mut confirm = DialoguerConfirm { yes: true };
        assert!(confirm.confirm("Apply changes?").unwrap());
    }

    #[test]
    fn hidden_progress_tracks_stages() {
        let mut plan = ExecutionPlan::new();
        plan.push_stage(vec![Box::new(Stub("package"))]);
        let mut progress = IndicatifProgress::new(stage_labels(&plan), true);

        let report =
            declarative::execute(plan, ExecuteOptions::default(), &mut progress, &mut AutoConfirm)
                .unwrap();
        assert_eq!(report.summary.created, 1);
        assert!(progress.bar.is_none());

        // NoProgress is interchangeable
        let mut plan = ExecutionPlan::new();
        plan.push_stage(vec![Box::new(Stub("file"))]);
        let report =
            declarative::execute(plan, ExecuteOptions::default(), &mut NoProgress, &mut AutoConfirm)
                .unwrap();
        assert!(report.is_success());
    }

    #[test]
    fn result_text_carries_reasons() {
        assert_eq!(result_text(&ApplyResult::would("remove x")), "noop: would remove x");
        assert_eq!(result_symbol(&ApplyResult::Removed), "✓");
    }
}
