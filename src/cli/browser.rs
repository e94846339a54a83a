use std::process::Command;

use anyhow::Result;
use inquire::Select;
use owo_colors::OwoColorize;
use reqwest::Url;
use tracing::warn;

use crate::github::Repository;
use crate::report::finding::{AlertReport, Finding};
use crate::report::terminal::severity_label;

// ── Helpers ──────────────────────────────────────────────────────────

/// Print a horizontal separator.
fn separator() {
    println!("{}", "━".repeat(60));
}

/// Security tab of the repository, filtered to one package's open alerts.
pub fn alerts_url(repo: &Repository, finding: &Finding) -> Result<Url> {
    let base = format!(
        "https://{}/{}/{}/security/dependabot",
        repo.host, repo.owner, repo.name
    );
    let query = format!(
        "is:open package:{} ecosystem:{}",
        finding.name, finding.ecosystem
    );
    Ok(Url::parse_with_params(&base, &[("q", query)])?)
}

/// Hand a URL to the desktop's default browser.
fn open_in_browser(url: &str) {
    let result = if cfg!(target_os = "macos") {
        Command::new("open").arg(url).status()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", "", url]).status()
    } else {
        Command::new("xdg-open").arg(url).status()
    };

    match result {
        Ok(status) if status.success() => {}
        Ok(status) => warn!("Browser exited with {} for {}", status, url),
        Err(e) => warn!("Could not open a browser for {}: {}", url, e),
    }
}

// ── Screens ──────────────────────────────────────────────────────────

/// One row of the findings list
struct FindingItem<'a> {
    index: usize,
    finding: &'a Finding,
}

impl std::fmt::Display for FindingItem<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<4} {}  {} -> {}",
            self.finding.top_summary_severity.abbrev(),
            self.finding.package_string(),
            self.finding.usage_string(),
            self.finding.top_patched_version
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    OpenAlerts,
    OpenPullRequest,
    Back,
    Quit,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Action::OpenAlerts => "Open alerts in browser",
            Action::OpenPullRequest => "Open fix pull request",
            Action::Back => "Back to list",
            Action::Quit => "Quit",
        };
        write!(f, "{}", label)
    }
}

fn actions_for(finding: &Finding) -> Vec<Action> {
    let mut actions = vec![Action::OpenAlerts];
    if finding.pull_request_url.is_some() {
        actions.push(Action::OpenPullRequest);
    }
    actions.extend([Action::Back, Action::Quit]);
    actions
}

/// Detail card for one finding
fn screen_details(finding: &Finding) {
    println!();
    separator();
    println!("  {}  {}", "Package:".green(), finding.package_string().bold());
    println!("  {}  {}", "Severity:".green(), severity_label(finding.top_summary_severity));
    println!();
    println!("  {}", "Summary:".green());
    println!("    {}", finding.summary_string());
    println!();
    println!("  {}     {}", "Usage:".green(), finding.usage_string());
    println!("  {}   {}", "Upgrade:".green(), finding.top_patched_version);
    if let Some(scope) = &finding.dependency_scope {
        println!("  {}     {}", "Scope:".green(), scope.to_lowercase());
    }
    if let Some(url) = &finding.pull_request_url {
        println!("  {}  {}", "Fix PR:".green(), url.cyan());
    }
    separator();
    println!();
}

// ── Public entry-point ──────────────────────────────────────────────

/// Interactive findings browser: pick a finding, read its details, open its
/// alerts or pull request in the browser. Esc on the list quits.
pub fn run_browser(repo: &Repository, report: &AlertReport) -> Result<()> {
    if report.findings.is_empty() {
        println!("  {}  No open alerts for {}", "✅".bold(), repo.full_name());
        return Ok(());
    }

    let title = format!("Dependabot alerts for {}", repo.full_name());
    let mut cursor = 0;

    loop {
        let items: Vec<FindingItem> = report
            .findings
            .iter()
            .enumerate()
            .map(|(index, finding)| FindingItem { index, finding })
            .collect();

        let picked = Select::new(&title, items)
            .with_page_size(15)
            .with_starting_cursor(cursor)
            .with_help_message("↑↓ to move, enter to inspect, esc to quit")
            .prompt_skippable()?;

        let Some(item) = picked else {
            break;
        };
        cursor = item.index;
        screen_details(item.finding);

        let action = Select::new("Action:", actions_for(item.finding)).prompt_skippable()?;
        match action {
            Some(Action::OpenAlerts) => {
                let url = alerts_url(repo, item.finding)?;
                open_in_browser(url.as_str());
            }
            Some(Action::OpenPullRequest) => {
                if let Some(url) = &item.finding.pull_request_url {
                    open_in_browser(url);
                }
            }
            Some(Action::Back) | None => {}
            Some(Action::Quit) => break,
        }
    }

    println!("  {}", "Goodbye!".dimmed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::finding::Severity;

    fn finding(pr: Option<&str>) -> Finding {
        Finding {
            name: "testpkg".to_string(),
            ecosystem: "pip".to_string(),
            manifest_path: "a/s/d/f".to_string(),
            manifest_version: "> 1.2.3".to_string(),
            top_summary: "Something happened".to_string(),
            top_summary_severity: Severity::Critical,
            top_patched_version: "5.0.1".to_string(),
            count: 1,
            dependency_scope: None,
            pull_request_url: pr.map(str::to_string),
        }
    }

    #[test]
    fn test_alerts_url() {
        let repo = Repository::parse("octocat/example-repo").unwrap();
        let url = alerts_url(&repo, &finding(None)).unwrap();
        assert_eq!(
            url.as_str(),
            "https://github.com/octocat/example-repo/security/dependabot?q=is%3Aopen+package%3Atestpkg+ecosystem%3Apip"
        );
    }

    #[test]
    fn test_item_label() {
        let f = finding(None);
        let item = FindingItem { index: 0, finding: &f };
        assert_eq!(item.to_string(), "crit testpkg (pip)  > 1.2.3 (a/s/d/f) -> 5.0.1");
    }

    #[test]
    fn test_actions_follow_pull_request() {
        assert_eq!(
            actions_for(&finding(None)),
            vec![Action::OpenAlerts, Action::Back, Action::Quit]
        );
        assert_eq!(
            actions_for(&finding(Some("https://github.com/o/r/pull/1"))),
            vec![Action::OpenAlerts, Action::OpenPullRequest, Action::Back, Action::Quit]
        );
    }
}
