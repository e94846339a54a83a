pub mod browser;
pub mod commands;

use clap::Parser;

pub use commands::{AlertsArgs, Commands, MergeArgs};

/// dependabot-digest: Dependabot alerts, one line per package
///
/// Folds every open alert of a repository into one finding per package,
/// with the version in use and the version to upgrade to.
#[derive(Parser, Debug)]
#[command(
    name = "dependabot-digest",
    version,
    about = "Dependabot alerts, one line per package",
    long_about = "dependabot-digest folds the open Dependabot alerts of a repository into one finding per package.\nIt shows the most severe advisory, the version in use, and the version to upgrade to,\nand can merge the matching Dependabot pull requests."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Repository to query (OWNER/NAME or HOST/OWNER/NAME).
    /// Defaults to the `origin` remote of the current directory.
    #[arg(short = 'R', long, global = true)]
    pub repo: Option<String>,

    /// Enable verbose output (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AlertSourceKind, OutputFormat};
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_alerts() {
        let cli = Cli::try_parse_from([
            "dependabot-digest",
            "--repo",
            "octocat/example-repo",
            "alerts",
            "--source",
            "rest",
            "--format",
            "json",
            "--fail-on",
            "high",
        ])
        .unwrap();

        assert_eq!(cli.repo.as_deref(), Some("octocat/example-repo"));
        match cli.command {
            Commands::Alerts(args) => {
                assert_eq!(args.source, Some(AlertSourceKind::Rest));
                assert_eq!(args.format, Some(OutputFormat::Json));
                assert_eq!(args.fail_on.as_deref(), Some("high"));
                assert!(!args.interactive);
                assert!(args.versions.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_merge() {
        let cli = Cli::try_parse_from(["dependabot-digest", "merge", "--yes", "-R", "o/r"]).unwrap();
        match cli.command {
            Commands::Merge(args) => {
                assert!(args.yes);
                assert!(!args.no_wait);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.repo.as_deref(), Some("o/r"));
    }
}
