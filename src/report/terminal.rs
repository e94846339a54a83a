use comfy_table::presets::NOTHING;
use comfy_table::{Cell, ContentArrangement, Table};
use owo_colors::OwoColorize;

use crate::engine::merge::{MergeAction, MergeReport};
use crate::report::finding::{AlertReport, Severity};

/// Colored severity abbreviation
pub fn severity_label(severity: Severity) -> String {
    let label = severity.abbrev();
    match severity {
        Severity::Critical => label.red().bold().to_string(),
        Severity::High => label.yellow().bold().to_string(),
        Severity::Medium => label.blue().to_string(),
        Severity::Low => label.to_string(),
    }
}

/// Build the findings table: Dependency, Summary, Sev, Usage, Upgrade
pub fn findings_table(report: &AlertReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Dependency", "Summary", "Sev", "Usage", "Upgrade"]);

    for finding in &report.findings {
        table.add_row(vec![
            Cell::new(finding.package_string()),
            Cell::new(finding.summary_string()),
            Cell::new(severity_label(finding.top_summary_severity)),
            Cell::new(finding.usage_string()),
            Cell::new(&finding.top_patched_version),
        ]);
    }

    table
}

/// Render an alert report to the terminal
pub fn render(report: &AlertReport) {
    println!();
    println!(
        "{}  Dependabot alerts for {} ({} open alerts)",
        "🔍".bold(),
        report.repository.bold(),
        report.alerts
    );
    println!();

    if report.findings.is_empty() {
        println!("  {}  No open alerts!", "✅".bold());
        println!();
        return;
    }

    println!("{}", findings_table(report));
    println!();

    // Summary bar
    println!("{}", "━".repeat(60));

    let mut summary_parts = Vec::new();
    if report.summary.critical > 0 {
        summary_parts.push(
            format!("{} critical", report.summary.critical).red().bold().to_string()
        );
    }
    if report.summary.high > 0 {
        summary_parts.push(
            format!("{} high", report.summary.high).yellow().bold().to_string()
        );
    }
    if report.summary.medium > 0 {
        summary_parts.push(
            format!("{} medium", report.summary.medium).blue().to_string()
        );
    }
    if report.summary.low > 0 {
        summary_parts.push(format!("{} low", report.summary.low));
    }

    println!(
        " {} vulnerable packages: {}",
        report.summary.total.to_string().bold(),
        summary_parts.join(", ")
    );
    println!("{}", "━".repeat(60));
    println!();
}

/// One line per merge candidate
pub fn render_merge_reports(reports: &[MergeReport]) {
    for report in reports {
        match &report.action {
            MergeAction::Skipped { state } => println!(
                "  {}  #{} {} — {}",
                "⏭".dimmed(),
                report.id,
                report.package,
                format!("skipped ({state})").dimmed()
            ),
            MergeAction::Attempted { outcome, .. } if outcome.merged => println!(
                "  {}  #{} {} — {}",
                "✅".bold(),
                report.id,
                report.package,
                outcome.message.green()
            ),
            MergeAction::Attempted { outcome, .. } => println!(
                "  {}  #{} {} — {}",
                "❌".bold(),
                report.id,
                report.package,
                outcome.message.red()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::finding::{AlertSummary, Finding};

    #[test]
    fn test_findings_table_rows() {
        let finding = Finding {
            name: "testpkg".to_string(),
            ecosystem: "pip".to_string(),
            manifest_path: "a/s/d/f".to_string(),
            manifest_version: "> 1.2.3".to_string(),
            top_summary: "Something happened".to_string(),
            top_summary_severity: Severity::Critical,
            top_patched_version: "5.0.1".to_string(),
            count: 2,
            dependency_scope: None,
            pull_request_url: None,
        };
        let report = AlertReport {
            version: "0.0.0".to_string(),
            timestamp: String::new(),
            repository: "o/r".to_string(),
            source: "graphql".to_string(),
            alerts: 2,
            summary: AlertSummary::from_findings(std::slice::from_ref(&finding)),
            findings: vec![finding],
        };

        let rendered = findings_table(&report).to_string();
        assert!(rendered.contains("Dependency"));
        assert!(rendered.contains("testpkg (pip)"));
        assert!(rendered.contains("(+ 2) Something happened"));
        assert!(rendered.contains("> 1.2.3 (a/s/d/f)"));
        assert!(rendered.contains("5.0.1"));
    }
}
