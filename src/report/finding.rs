use serde::{Deserialize, Serialize};

/// Severity level of an alert or finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Severity {
    /// Numeric rank on the 1-4 scale
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Inverse of [`Severity::rank`]; anything outside 2..=4 is `Low`.
    pub fn from_rank(rank: u8) -> Self {
        match rank {
            4 => Severity::Critical,
            3 => Severity::High,
            2 => Severity::Medium,
            _ => Severity::Low,
        }
    }

    /// Abbreviated label for terminal columns
    pub fn abbrev(self) -> &'static str {
        match self {
            Severity::Critical => "crit",
            Severity::High => "high",
            Severity::Medium => "med",
            Severity::Low => "low",
        }
    }

    /// Lenient parse for user-supplied thresholds (`--fail-on`, config).
    pub fn from_level(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "critical" | "crit" => Severity::Critical,
            "high" => Severity::High,
            "medium" | "moderate" | "med" => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.abbrev())
    }
}

/// Label convention of an alert source.
///
/// The REST alerts API reports `critical`/`high`/`medium`/`low`; the GraphQL
/// API reports `CRITICAL`/`HIGH`/`MODERATE`/`LOW`. Matching is exact within a
/// scale and unknown labels fall to `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityScale {
    Lowercase,
    Uppercase,
}

impl SeverityScale {
    /// Rank of a label on the 1-4 scale
    pub fn rank(self, label: &str) -> u8 {
        match (self, label) {
            (SeverityScale::Lowercase, "critical") | (SeverityScale::Uppercase, "CRITICAL") => 4,
            (SeverityScale::Lowercase, "high") | (SeverityScale::Uppercase, "HIGH") => 3,
            (SeverityScale::Lowercase, "medium") | (SeverityScale::Uppercase, "MODERATE" | "MEDIUM") => 2,
            _ => 1,
        }
    }

    pub fn parse(self, label: &str) -> Severity {
        Severity::from_rank(self.rank(label))
    }
}

/// Package coordinates as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub ecosystem: String,
    pub name: String,
}

/// Fix pull request attached to an alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub url: String,
    pub state: String,
}

impl PullRequestRef {
    pub fn is_open(&self) -> bool {
        self.state.eq_ignore_ascii_case("open")
    }
}

/// A single open vulnerability alert, normalized from either alert source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,
    pub state: String,
    pub manifest_path: String,
    pub security_summary: String,
    pub package: Package,
    /// Raw severity label; interpreted through a [`SeverityScale`]
    pub severity: String,
    /// Empty when no patched release exists
    pub first_patched_version: String,
    pub dependency_scope: Option<String>,
    pub pull_request: Option<PullRequestRef>,
}

/// Aggregation key: lowercased package name and ecosystem
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FindingKey {
    pub name: String,
    pub ecosystem: String,
}

impl FindingKey {
    pub fn for_package(package: &Package) -> Self {
        FindingKey {
            name: package.name.to_lowercase(),
            ecosystem: package.ecosystem.to_lowercase(),
        }
    }
}

impl std::fmt::Display for FindingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.ecosystem)
    }
}

/// All open alerts for one package in one ecosystem, folded together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Lowercased package name
    pub name: String,

    /// Lowercased ecosystem, e.g. "pip"
    pub ecosystem: String,

    /// Manifest of the first alert seen for this package
    pub manifest_path: String,

    /// Declared version in that manifest; empty when unknown
    pub manifest_version: String,

    /// Advisory summary of the most severe alert
    pub top_summary: String,

    pub top_summary_severity: Severity,

    /// Highest first-patched version across all alerts
    pub top_patched_version: String,

    /// Number of alerts folded into this finding
    pub count: usize,

    pub dependency_scope: Option<String>,

    /// Open fix pull request, if any
    pub pull_request_url: Option<String>,
}

impl Finding {
    /// `"name (ecosystem)"`
    pub fn package_string(&self) -> String {
        format!("{} ({})", self.name, self.ecosystem)
    }

    /// `"version (manifest path)"`
    pub fn usage_string(&self) -> String {
        format!("{} ({})", self.manifest_version, self.manifest_path)
    }

    pub fn summary_string(&self) -> String {
        if self.count > 1 {
            format!("(+ {}) {}", self.count, self.top_summary)
        } else {
            self.top_summary.clone()
        }
    }
}

/// The complete alert report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertReport {
    /// Tool version
    pub version: String,

    /// When the report was built
    pub timestamp: String,

    /// "owner/name"
    pub repository: String,

    /// Alert source the findings came from ("rest" or "graphql")
    pub source: String,

    /// Raw alerts folded into the findings
    pub alerts: usize,

    /// Findings, ranked (most severe first)
    pub findings: Vec<Finding>,

    pub summary: AlertSummary,
}

impl AlertReport {
    /// Check if there are findings at or above a severity threshold
    pub fn has_findings_at_or_above(&self, threshold: Severity) -> bool {
        self.findings
            .iter()
            .any(|f| f.top_summary_severity >= threshold)
    }

    /// Drop findings below `min`, keeping the summary in step.
    pub fn retain_at_or_above(&mut self, min: Severity) {
        self.findings.retain(|f| f.top_summary_severity >= min);
        self.summary = AlertSummary::from_findings(&self.findings);
    }
}

/// Summary statistics, by finding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl AlertSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = AlertSummary {
            total: findings.len(),
            ..AlertSummary::default()
        };
        for f in findings {
            match f.top_summary_severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
            }
        }
        summary
    }
}
