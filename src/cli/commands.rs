use clap::Subcommand;
use std::path::PathBuf;

use crate::config::{AlertSourceKind, OutputFormat, VersionStrategy};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize open Dependabot alerts per package
    Alerts(AlertsArgs),

    /// Merge the open Dependabot fix pull requests of vulnerable packages
    Merge(MergeArgs),

    /// Initialize a .dependabot-digest.toml config file in the current directory
    Init,
}

#[derive(clap::Args, Debug)]
pub struct AlertsArgs {
    /// Alert feed (default from config: graphql)
    #[arg(long, value_enum)]
    pub source: Option<AlertSourceKind>,

    /// How declared versions are resolved (default from config: graph)
    #[arg(long, value_enum)]
    pub versions: Option<VersionStrategy>,

    /// Browse results interactively in the terminal
    #[arg(short, long)]
    pub interactive: bool,

    /// Output format (default from config: table)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write the JSON report to a file
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Fail (exit code 1) if findings at or above this severity are found.
    /// Values: critical, high, medium, low
    #[arg(long)]
    pub fail_on: Option<String>,

    /// Hide findings below this severity
    #[arg(long)]
    pub min_severity: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct MergeArgs {
    /// Merge without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Do not wait for pull requests to become mergeable
    #[arg(long)]
    pub no_wait: bool,

    /// Only merge fixes for findings at or above this severity
    #[arg(long)]
    pub min_severity: Option<String>,
}
