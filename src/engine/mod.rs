pub mod merge;

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::{AlertSourceKind, VersionStrategy};
use crate::github::alerts::{AlertPages, AlertSource, GraphqlAlertSource, RestAlertSource};
use crate::github::contents::RepoContents;
use crate::github::graph::fetch_dependency_graph;
use crate::github::GitHubClient;
use crate::report::finding::{AlertReport, AlertSummary};
use crate::report::merger::{aggregate, rank_findings};
use crate::resolver::{ContentScanResolver, DependencyGraphResolver, ManifestVersionResolver};

/// Pick the alert feed.
pub fn alert_source<'a>(client: &'a GitHubClient, kind: AlertSourceKind) -> Box<dyn AlertSource + 'a> {
    match kind {
        AlertSourceKind::Rest => Box::new(RestAlertSource::new(client)),
        AlertSourceKind::Graphql => Box::new(GraphqlAlertSource::new(client)),
    }
}

/// Pick the version resolver. The graph strategy fetches the whole
/// dependency graph up front; the contents strategy fetches lazily.
pub fn version_resolver<'a>(
    client: &'a GitHubClient,
    strategy: VersionStrategy,
) -> Result<Box<dyn ManifestVersionResolver + 'a>> {
    match strategy {
        VersionStrategy::Contents => Ok(Box::new(ContentScanResolver::new(RepoContents::new(client)))),
        VersionStrategy::Graph => {
            info!("Fetching dependency graph for {}", client.repo());
            let dependencies =
                fetch_dependency_graph(client).context("Failed to fetch the dependency graph")?;
            Ok(Box::new(DependencyGraphResolver::new(dependencies)))
        }
    }
}

/// Orchestrates alert paging, aggregation and ranking for one repository.
pub struct Summarizer<'a> {
    repository: String,
    source: &'a dyn AlertSource,
    resolver: &'a dyn ManifestVersionResolver,
}

impl<'a> Summarizer<'a> {
    pub fn new(
        repository: impl Into<String>,
        source: &'a dyn AlertSource,
        resolver: &'a dyn ManifestVersionResolver,
    ) -> Self {
        Summarizer {
            repository: repository.into(),
            source,
            resolver,
        }
    }

    /// Fetch every page, then fold and rank the alerts. Any page failure aborts
    /// the whole run.
    pub fn run(&self) -> Result<AlertReport> {
        let start = Instant::now();
        info!(
            "Fetching open alerts for {} ({} source, {} versions)",
            self.repository,
            self.source.name(),
            self.resolver.name()
        );

        let mut alerts = Vec::new();
        for (index, page) in AlertPages::new(self.source).enumerate() {
            let page = page.with_context(|| format!("Failed to fetch alerts page {}", index + 1))?;
            alerts.extend(page);
        }

        let folded = aggregate(&alerts, self.resolver, self.source.scale())?;
        let findings = rank_findings(folded.into_values());
        info!(
            "{} alerts folded into {} findings in {:.2}s",
            alerts.len(),
            findings.len(),
            start.elapsed().as_secs_f64()
        );

        let summary = AlertSummary::from_findings(&findings);

        Ok(AlertReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            repository: self.repository.clone(),
            source: self.source.name().to_string(),
            alerts: alerts.len(),
            findings,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::alerts::AlertPage;
    use crate::github::ApiError;
    use crate::report::finding::{Alert, Package, Severity, SeverityScale};
    use crate::resolver::DependencyMap;

    struct StaticPages {
        pages: Vec<Vec<Alert>>,
        fail_second: bool,
    }

    impl AlertSource for StaticPages {
        fn name(&self) -> &str {
            "graphql"
        }

        fn scale(&self) -> SeverityScale {
            SeverityScale::Lowercase
        }

        fn fetch_alerts_page(&self, cursor: Option<&str>) -> Result<AlertPage, ApiError> {
            let index: usize = cursor.map_or(0, |c| c.parse().unwrap());
            if self.fail_second && index == 1 {
                return Err(ApiError::Http {
                    status: 502,
                    url: "graphql".to_string(),
                    message: "Bad Gateway".to_string(),
                });
            }
            Ok(AlertPage {
                alerts: self.pages[index].clone(),
                next_cursor: (index + 1 < self.pages.len()).then(|| (index + 1).to_string()),
            })
        }
    }

    fn alert(id: u64, name: &str, severity: &str, patched: &str) -> Alert {
        Alert {
            id,
            state: "open".to_string(),
            manifest_path: "a/s/d/f".to_string(),
            security_summary: format!("advisory {id}"),
            package: Package {
                ecosystem: "pip".to_string(),
                name: name.to_string(),
            },
            severity: severity.to_string(),
            first_patched_version: patched.to_string(),
            dependency_scope: None,
            pull_request: None,
        }
    }

    fn resolver() -> DependencyGraphResolver {
        let mut deps = DependencyMap::new();
        deps.insert("a/s/d/f", "pip", "testpkg", "> 1.2.3");
        DependencyGraphResolver::new(deps)
    }

    #[test]
    fn test_end_to_end_across_pages() {
        let source = StaticPages {
            pages: vec![
                vec![alert(1, "TestPkg", "critical", "5.0.0")],
                vec![alert(2, "TestPkg", "high", "5.0.1"), alert(3, "other", "medium", "0.2.0")],
            ],
            fail_second: false,
        };
        let resolver = resolver();

        let report = Summarizer::new("octocat/example-repo", &source, &resolver)
            .run()
            .unwrap();

        assert_eq!(report.alerts, 3);
        assert_eq!(report.repository, "octocat/example-repo");
        assert_eq!(report.findings.len(), 2);

        let top = &report.findings[0];
        assert_eq!(top.package_string(), "testpkg (pip)");
        assert_eq!(top.count, 2);
        assert_eq!(top.top_summary_severity.rank(), 4);
        assert_eq!(top.top_patched_version, "5.0.1");
        assert_eq!(top.manifest_version, "> 1.2.3");
        assert_eq!(top.summary_string(), "(+ 2) advisory 1");

        let other = &report.findings[1];
        assert_eq!(other.manifest_version, "");
        assert_eq!(other.top_summary_severity, Severity::Medium);

        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.critical, 1);
        assert_eq!(report.summary.medium, 1);
    }

    #[test]
    fn test_page_failure_aborts() {
        let source = StaticPages {
            pages: vec![vec![alert(1, "testpkg", "low", "1.0.0")], vec![]],
            fail_second: true,
        };
        let resolver = resolver();

        let err = Summarizer::new("o/r", &source, &resolver).run().unwrap_err();
        assert!(err.to_string().contains("page 2"));
    }
}
