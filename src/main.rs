mod cli;
mod config;
mod engine;
mod github;
mod report;
mod resolver;

use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{AlertsArgs, Cli, Commands, MergeArgs};
use config::{AlertSourceKind, DigestConfig, OutputFormat};
use engine::merge::{merge_candidates, MergeWorkflow, WaitPolicy};
use engine::Summarizer;
use github::pulls::PullRequestClient;
use github::{GitHubClient, Repository};
use report::finding::Severity;
use resolver::{DependencyGraphResolver, DependencyMap};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("dependabot_digest=debug")
    } else if cli.quiet {
        EnvFilter::new("dependabot_digest=error")
    } else {
        EnvFilter::new("dependabot_digest=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    info!("dependabot-digest v{}", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Alerts(args) => {
            let config = DigestConfig::load_or_default();
            run_alerts(&cli, args, &config)?;
        }
        Commands::Merge(args) => {
            let config = DigestConfig::load_or_default();
            run_merge(&cli, args, &config)?;
        }
        Commands::Init => {
            config::init_config()?;
        }
    }

    Ok(())
}

/// Resolve the target repository and open an API client for it
fn connect(cli: &Cli, config: &DigestConfig) -> Result<GitHubClient> {
    let repo = match &cli.repo {
        Some(name) => {
            let mut repo = Repository::parse(name)?;
            if let (Some(host), 2) = (&config.github.host, name.split('/').count()) {
                repo.host = host.clone();
            }
            repo
        }
        None => Repository::from_git_remote()?,
    };
    if repo.is_default_host() {
        info!("Repository: {}", repo);
    } else {
        info!("Repository: {} on {}", repo, repo.host);
    }

    Ok(GitHubClient::new(&config.github, repo)?)
}

fn run_alerts(cli: &Cli, args: &AlertsArgs, config: &DigestConfig) -> Result<()> {
    let client = connect(cli, config)?;
    let source_kind = args.source.unwrap_or(config.alerts.source);
    let strategy = args.versions.unwrap_or(config.alerts.versions);

    let source = engine::alert_source(&client, source_kind);
    let resolver = engine::version_resolver(&client, strategy)?;
    let mut report = Summarizer::new(client.repo().full_name(), source.as_ref(), resolver.as_ref())
        .run()
        .context("Failed to summarize alerts")?;

    if let Some(min) = args.min_severity.as_ref().or(config.output.min_severity.as_ref()) {
        report.retain_at_or_above(Severity::from_level(min));
    }

    if args.interactive {
        cli::browser::run_browser(client.repo(), &report)?;
    } else {
        match args.format.unwrap_or(config.output.format) {
            OutputFormat::Json => println!("{}", report::json::render(&report)?),
            OutputFormat::Table => report::terminal::render(&report),
        }
    }

    if let Some(ref path) = args.out {
        let json_output = report::json::render(&report)?;
        std::fs::write(path, &json_output)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("JSON report written to {}", path.display());
    }

    // Exit code based on findings
    if let Some(ref fail_on) = args.fail_on {
        let threshold = Severity::from_level(fail_on);
        if report.has_findings_at_or_above(threshold) {
            std::process::exit(1);
        }
    }

    Ok(())
}

fn run_merge(cli: &Cli, args: &MergeArgs, config: &DigestConfig) -> Result<()> {
    let client = connect(cli, config)?;

    // Only the GraphQL feed links alerts to their fix pull requests, and
    // declared versions are not needed to merge.
    let source = engine::alert_source(&client, AlertSourceKind::Graphql);
    let no_versions = DependencyGraphResolver::new(DependencyMap::new());

    let mut report = Summarizer::new(client.repo().full_name(), source.as_ref(), &no_versions)
        .run()
        .context("Failed to summarize alerts")?;
    if let Some(min) = &args.min_severity {
        report.retain_at_or_above(Severity::from_level(min));
    }

    let candidates = merge_candidates(&report.findings);
    if candidates.is_empty() {
        println!("  {}  No open Dependabot pull requests to merge", "✅".bold());
        return Ok(());
    }

    println!();
    for candidate in &candidates {
        println!("  #{:<6} {}  {}", candidate.id, candidate.package.bold(), candidate.url.dimmed());
    }
    println!();

    if !args.yes {
        let confirmed = inquire::Confirm::new(&format!("Merge {} pull requests?", candidates.len()))
            .with_default(false)
            .prompt()?;
        if !confirmed {
            println!("  {}", "Merge cancelled.".dimmed());
            return Ok(());
        }
    }

    let policy = if args.no_wait {
        WaitPolicy::none()
    } else {
        config.merge.wait_policy()
    };
    let api = PullRequestClient::new(&client);
    let reports = MergeWorkflow::new(&api, policy).run(&candidates)?;
    report::terminal::render_merge_reports(&reports);

    Ok(())
}
