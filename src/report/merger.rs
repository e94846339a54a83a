use std::collections::HashMap;

use anyhow::Result;
use tracing::debug;

use crate::report::finding::{Alert, Finding, FindingKey, SeverityScale};
use crate::report::version::version_less;
use crate::resolver::ManifestVersionResolver;

/// Folds alerts into one finding per (package, ecosystem).
///
/// The fold is strict and order-based: the first alert for a key seeds the
/// manifest path and resolved version, later alerts only raise severity and
/// patched version and bump the count. Feeding the same alerts page by page
/// or all at once gives the same result.
pub struct FindingAggregator<'r> {
    resolver: &'r dyn ManifestVersionResolver,
    scale: SeverityScale,
    findings: HashMap<FindingKey, Finding>,
}

impl<'r> FindingAggregator<'r> {
    pub fn new(resolver: &'r dyn ManifestVersionResolver, scale: SeverityScale) -> Self {
        FindingAggregator {
            resolver,
            scale,
            findings: HashMap::new(),
        }
    }

    /// Fold a single alert.
    pub fn push(&mut self, alert: &Alert) -> Result<()> {
        let key = FindingKey::for_package(&alert.package);
        let severity = self.scale.parse(&alert.severity);
        let open_pr = alert
            .pull_request
            .as_ref()
            .filter(|pr| pr.is_open())
            .map(|pr| pr.url.clone());

        if let Some(finding) = self.findings.get_mut(&key) {
            if severity > finding.top_summary_severity {
                finding.top_summary = alert.security_summary.clone();
                finding.top_summary_severity = severity;
            }
            if version_less(&finding.top_patched_version, &alert.first_patched_version) {
                finding.top_patched_version = alert.first_patched_version.clone();
            }
            finding.count += 1;
            if open_pr.is_some() {
                finding.pull_request_url = open_pr;
            }
            return Ok(());
        }

        let manifest_version =
            self.resolver
                .resolve(&alert.manifest_path, &key.ecosystem, &key.name)?;
        debug!(
            "New finding {} in {} (declared {:?}, via {})",
            key,
            alert.manifest_path,
            manifest_version,
            self.resolver.name()
        );

        let finding = Finding {
            name: key.name.clone(),
            ecosystem: key.ecosystem.clone(),
            manifest_path: alert.manifest_path.clone(),
            manifest_version,
            top_summary: alert.security_summary.clone(),
            top_summary_severity: severity,
            top_patched_version: alert.first_patched_version.clone(),
            count: 1,
            dependency_scope: alert.dependency_scope.clone(),
            pull_request_url: open_pr,
        };
        self.findings.insert(key, finding);
        Ok(())
    }

    /// Fold a page (or any sequence) of alerts in order.
    pub fn extend<'a, I>(&mut self, alerts: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Alert>,
    {
        for alert in alerts {
            self.push(alert)?;
        }
        Ok(())
    }

    pub fn finish(self) -> HashMap<FindingKey, Finding> {
        self.findings
    }
}

/// One-shot fold over a materialized alert list.
pub fn aggregate(
    alerts: &[Alert],
    resolver: &dyn ManifestVersionResolver,
    scale: SeverityScale,
) -> Result<HashMap<FindingKey, Finding>> {
    let mut aggregator = FindingAggregator::new(resolver, scale);
    aggregator.extend(alerts)?;
    Ok(aggregator.finish())
}

/// Order findings for display: most severe first, then most alerts.
/// Remaining ties fall back to the package string so output is stable.
pub fn rank_findings<I>(findings: I) -> Vec<Finding>
where
    I: IntoIterator<Item = Finding>,
{
    let mut ranked: Vec<Finding> = findings.into_iter().collect();

    ranked.sort_by(|a, b| {
        b.top_summary_severity
            .cmp(&a.top_summary_severity)
            .then_with(|| b.count.cmp(&a.count))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.ecosystem.cmp(&b.ecosystem))
    });

    ranked
}
