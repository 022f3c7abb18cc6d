use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "svnmod")]
#[command(author = "Alberto Cavalcante")]
#[command(about = "Install and configure Subversion declaratively", long_about = None)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Where parameters and templates come from
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Params file (TOML or JSON)
    #[arg(long, global = true, env = "SVNMOD_PARAMS")]
    pub params: Option<PathBuf>,

    /// Host name to render templates for (default: detected)
    #[arg(long, global = true)]
    pub fqdn: Option<String>,

    /// Directory with user templates, searched before the builtin ones
    #[arg(long, global = true)]
    pub template_dir: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ParamOverrides,
}

/// Per-field overrides applied on top of the params file
#[derive(Args, Debug, Clone, Default)]
pub struct ParamOverrides {
    /// Package version: present, latest, or an exact version
    #[arg(long = "version", global = true, value_name = "VERSION")]
    pub version: Option<String>,

    /// Remove everything the module manages
    #[arg(long, global = true)]
    pub absent: bool,

    /// Only report what would change
    #[arg(long, global = true)]
    pub noop: bool,

    /// Template id for the configuration file
    #[arg(long, global = true)]
    pub template: Option<String>,

    /// Static source for the configuration file
    #[arg(long, global = true)]
    pub source: Option<String>,

    /// Source for the configuration directory
    #[arg(long, global = true)]
    pub source_dir: Option<String>,

    /// Remove files in the configuration directory that are not in the source
    #[arg(long, global = true)]
    pub source_dir_purge: bool,

    /// Custom class supplying the configuration template (e.g. svn::spec)
    #[arg(long, global = true)]
    pub my_class: Option<String>,

    /// Template option (repeatable)
    #[arg(short = 'o', long = "option", global = true, value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub options: Vec<(String, String)>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the resource declarations the parameters produce
    Plan(PlanArgs),

    /// Preview what apply would change
    Diff(TargetArgs),

    /// Make the host match the declarations
    Apply(ApplyArgs),

    /// Render one template with the resolved bindings
    Render {
        /// Template id (e.g. svn.conf.tmpl, spec.tmpl, svn/spec.tmpl)
        template: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct PlanArgs {
    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct TargetArgs {
    /// Only these resources: package, file, directory, or type.name
    #[arg(short, long)]
    pub target: Option<String>,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Only these resources: package, file, directory, or type.name
    #[arg(short, long)]
    pub target: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Show what would be done without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Number of parallel jobs (default: settings.jobs or 4)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

/// Parse `key=value`
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid option '{s}': expected KEY=VALUE"))?;
    if key.is_empty() {
        return Err(format!("invalid option '{s}': empty key"));
    }
    Ok((key.to_string(), value.to_string()))
}
