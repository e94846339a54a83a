use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::github::{ApiError, GitHubClient, PageInfo};
use crate::report::finding::{Alert, Package, PullRequestRef, SeverityScale};

const PER_PAGE: u32 = 100;

/// One page of alerts plus the cursor for the next one
#[derive(Debug, Clone, Default)]
pub struct AlertPage {
    pub alerts: Vec<Alert>,
    pub next_cursor: Option<String>,
}

/// A paginated feed of open alerts.
pub trait AlertSource {
    /// "rest" or "graphql"
    fn name(&self) -> &str;

    /// Label convention of this source's severities
    fn scale(&self) -> SeverityScale;

    /// Fetch the page at `cursor`; `None` is the first page.
    fn fetch_alerts_page(&self, cursor: Option<&str>) -> Result<AlertPage, ApiError>;
}

/// Iterates pages until the source reports no next cursor.
///
/// The cursor lives here, one value per iteration, and stops the feed after
/// the first error.
pub struct AlertPages<'a, S: ?Sized> {
    source: &'a S,
    cursor: Option<String>,
    done: bool,
}

impl<'a, S: AlertSource + ?Sized> AlertPages<'a, S> {
    pub fn new(source: &'a S) -> Self {
        AlertPages {
            source,
            cursor: None,
            done: false,
        }
    }
}

impl<S: AlertSource + ?Sized> Iterator for AlertPages<'_, S> {
    type Item = Result<Vec<Alert>, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.source.fetch_alerts_page(self.cursor.as_deref()) {
            Ok(page) => {
                self.done = page.next_cursor.is_none();
                self.cursor = page.next_cursor;
                Some(Ok(page.alerts))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

// ── REST ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RestAlert {
    number: u64,
    state: String,
    dependency: RestDependency,
    security_advisory: RestAdvisory,
    security_vulnerability: RestVulnerability,
}

#[derive(Debug, Deserialize)]
struct RestDependency {
    #[serde(default)]
    manifest_path: String,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestAdvisory {
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Deserialize)]
struct RestVulnerability {
    package: RestPackage,
    severity: String,
    first_patched_version: Option<RestPatchedVersion>,
}

#[derive(Debug, Deserialize)]
struct RestPackage {
    ecosystem: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RestPatchedVersion {
    identifier: String,
}

impl From<RestAlert> for Alert {
    fn from(a: RestAlert) -> Self {
        Alert {
            id: a.number,
            state: a.state,
            manifest_path: a.dependency.manifest_path,
            security_summary: a.security_advisory.summary,
            package: Package {
                ecosystem: a.security_vulnerability.package.ecosystem,
                name: a.security_vulnerability.package.name,
            },
            severity: a.security_vulnerability.severity,
            first_patched_version: a
                .security_vulnerability
                .first_patched_version
                .map(|v| v.identifier)
                .unwrap_or_default(),
            dependency_scope: a.dependency.scope,
            pull_request: None,
        }
    }
}

/// Dependabot alerts REST endpoint, paged through `Link` headers.
pub struct RestAlertSource<'a> {
    client: &'a GitHubClient,
}

impl<'a> RestAlertSource<'a> {
    pub fn new(client: &'a GitHubClient) -> Self {
        RestAlertSource { client }
    }
}

impl AlertSource for RestAlertSource<'_> {
    fn name(&self) -> &str {
        "rest"
    }

    fn scale(&self) -> SeverityScale {
        SeverityScale::Lowercase
    }

    fn fetch_alerts_page(&self, cursor: Option<&str>) -> Result<AlertPage, ApiError> {
        let path = match cursor {
            Some(next_url) => next_url.to_string(),
            None => self
                .client
                .repo_path(&format!("dependabot/alerts?state=open&per_page={PER_PAGE}")),
        };

        let (alerts, next_cursor): (Vec<RestAlert>, _) = self.client.get_page(&path)?;
        debug!("REST alerts page: {} alerts, more: {}", alerts.len(), next_cursor.is_some());

        Ok(AlertPage {
            alerts: alerts.into_iter().map(Alert::from).collect(),
            next_cursor,
        })
    }
}

// ── GraphQL ─────────────────────────────────────────────────────────

const VULNERABILITY_ALERTS_QUERY: &str = r#"
query VulnerabilityAlerts($owner: String!, $name: String!, $first: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    vulnerabilityAlerts(first: $first, after: $cursor, states: OPEN) {
      nodes {
        number
        state
        vulnerableManifestPath
        dependencyScope
        securityAdvisory { summary }
        securityVulnerability {
          severity
          package { ecosystem name }
          firstPatchedVersion { identifier }
        }
        dependabotUpdate {
          pullRequest { url state }
        }
      }
      pageInfo { hasNextPage endCursor }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct AlertsData {
    repository: Option<AlertsRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertsRepository {
    vulnerability_alerts: AlertConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertConnection {
    #[serde(default)]
    nodes: Vec<GraphqlAlert>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlAlert {
    number: u64,
    state: String,
    #[serde(default)]
    vulnerable_manifest_path: String,
    dependency_scope: Option<String>,
    security_advisory: Option<GraphqlAdvisory>,
    security_vulnerability: GraphqlVulnerability,
    dependabot_update: Option<GraphqlUpdate>,
}

#[derive(Debug, Deserialize)]
struct GraphqlAdvisory {
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlVulnerability {
    severity: String,
    package: RestPackage,
    first_patched_version: Option<RestPatchedVersion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlUpdate {
    pull_request: Option<PullRequestRef>,
}

impl From<GraphqlAlert> for Alert {
    fn from(a: GraphqlAlert) -> Self {
        Alert {
            id: a.number,
            state: a.state,
            manifest_path: a.vulnerable_manifest_path,
            security_summary: a.security_advisory.map(|s| s.summary).unwrap_or_default(),
            package: Package {
                ecosystem: a.security_vulnerability.package.ecosystem,
                name: a.security_vulnerability.package.name,
            },
            severity: a.security_vulnerability.severity,
            first_patched_version: a
                .security_vulnerability
                .first_patched_version
                .map(|v| v.identifier)
                .unwrap_or_default(),
            dependency_scope: a.dependency_scope,
            pull_request: a.dependabot_update.and_then(|u| u.pull_request),
        }
    }
}

/// `repository.vulnerabilityAlerts` GraphQL connection. Carries dependency
/// scope and the Dependabot fix pull request of each alert.
pub struct GraphqlAlertSource<'a> {
    client: &'a GitHubClient,
}

impl<'a> GraphqlAlertSource<'a> {
    pub fn new(client: &'a GitHubClient) -> Self {
        GraphqlAlertSource { client }
    }
}

impl AlertSource for GraphqlAlertSource<'_> {
    fn name(&self) -> &str {
        "graphql"
    }

    fn scale(&self) -> SeverityScale {
        SeverityScale::Uppercase
    }

    fn fetch_alerts_page(&self, cursor: Option<&str>) -> Result<AlertPage, ApiError> {
        let repo = self.client.repo();
        let variables = json!({
            "owner": repo.owner,
            "name": repo.name,
            "first": PER_PAGE,
            "cursor": cursor,
        });

        let data: AlertsData = self
            .client
            .graphql(VULNERABILITY_ALERTS_QUERY, variables, None)?;
        let connection = data
            .repository
            .ok_or_else(|| ApiError::GraphQl(format!("repository {} not found", repo.full_name())))?
            .vulnerability_alerts;

        debug!(
            "GraphQL alerts page: {} alerts, more: {}",
            connection.nodes.len(),
            connection.page_info.has_next_page
        );

        Ok(AlertPage {
            next_cursor: connection.page_info.next_cursor(),
            alerts: connection.nodes.into_iter().map(Alert::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct PagedSource {
        pages: Vec<Vec<u64>>,
        requested: RefCell<Vec<Option<String>>>,
        fail_at: Option<usize>,
    }

    impl PagedSource {
        fn new(pages: Vec<Vec<u64>>) -> Self {
            PagedSource {
                pages,
                requested: RefCell::new(Vec::new()),
                fail_at: None,
            }
        }
    }

    fn stub_alert(id: u64) -> Alert {
        Alert {
            id,
            state: "open".to_string(),
            manifest_path: "requirements.txt".to_string(),
            security_summary: String::new(),
            package: Package {
                ecosystem: "pip".to_string(),
                name: format!("pkg{id}"),
            },
            severity: "low".to_string(),
            first_patched_version: String::new(),
            dependency_scope: None,
            pull_request: None,
        }
    }

    impl AlertSource for PagedSource {
        fn name(&self) -> &str {
            "paged"
        }

        fn scale(&self) -> SeverityScale {
            SeverityScale::Lowercase
        }

        fn fetch_alerts_page(&self, cursor: Option<&str>) -> Result<AlertPage, ApiError> {
            self.requested.borrow_mut().push(cursor.map(str::to_string));
            let index = cursor.map_or(0, |c| c.parse::<usize>().unwrap());
            if self.fail_at == Some(index) {
                return Err(ApiError::GraphQl("boom".to_string()));
            }
            let next_cursor = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
            Ok(AlertPage {
                alerts: self.pages[index].iter().copied().map(stub_alert).collect(),
                next_cursor,
            })
        }
    }

    #[test]
    fn test_pages_follow_cursor() {
        let source = PagedSource::new(vec![vec![1, 2], vec![3], vec![4, 5]]);
        let ids: Vec<u64> = AlertPages::new(&source)
            .map(|page| page.unwrap())
            .flatten()
            .map(|a| a.id)
            .collect();

        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(
            *source.requested.borrow(),
            vec![None, Some("1".to_string()), Some("2".to_string())]
        );
    }

    #[test]
    fn test_single_page() {
        let source = PagedSource::new(vec![vec![]]);
        let pages: Vec<_> = AlertPages::new(&source).collect();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_error_stops_iteration() {
        let mut source = PagedSource::new(vec![vec![1], vec![2], vec![3]]);
        source.fail_at = Some(1);
        let pages: Vec<_> = AlertPages::new(&source).collect();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].is_ok());
        assert!(pages[1].is_err());
    }

    #[test]
    fn test_rest_alert_decoding() {
        let body = r#"[{
            "number": 7,
            "state": "open",
            "dependency": {
                "package": {"ecosystem": "pip", "name": "TestPkg"},
                "manifest_path": "a/s/d/f",
                "scope": "runtime"
            },
            "security_advisory": {"summary": "Something happened", "severity": "critical"},
            "security_vulnerability": {
                "package": {"ecosystem": "pip", "name": "TestPkg"},
                "severity": "critical",
                "vulnerable_version_range": "< 5.0.0",
                "first_patched_version": {"identifier": "5.0.0"}
            }
        }, {
            "number": 8,
            "state": "open",
            "dependency": {"manifest_path": "a/s/d/f"},
            "security_advisory": {"summary": "No fix"},
            "security_vulnerability": {
                "package": {"ecosystem": "pip", "name": "TestPkg"},
                "severity": "high",
                "first_patched_version": null
            }
        }]"#;

        let raw: Vec<RestAlert> = serde_json::from_str(body).unwrap();
        let alerts: Vec<Alert> = raw.into_iter().map(Alert::from).collect();

        assert_eq!(alerts[0].id, 7);
        assert_eq!(alerts[0].manifest_path, "a/s/d/f");
        assert_eq!(alerts[0].package.name, "TestPkg");
        assert_eq!(alerts[0].severity, "critical");
        assert_eq!(alerts[0].first_patched_version, "5.0.0");
        assert_eq!(alerts[0].dependency_scope.as_deref(), Some("runtime"));
        assert_eq!(alerts[1].first_patched_version, "");
        assert!(alerts[1].dependency_scope.is_none());
    }

    #[test]
    fn test_graphql_alert_decoding() {
        let body = r#"{
            "repository": {
                "vulnerabilityAlerts": {
                    "nodes": [{
                        "number": 3,
                        "state": "OPEN",
                        "vulnerableManifestPath": "a/s/d/f",
                        "dependencyScope": "DEVELOPMENT",
                        "securityAdvisory": {"summary": "Something happened"},
                        "securityVulnerability": {
                            "severity": "CRITICAL",
                            "package": {"ecosystem": "PIP", "name": "TestPkg"},
                            "firstPatchedVersion": {"identifier": "5.0.0"}
                        },
                        "dependabotUpdate": {
                            "pullRequest": {"url": "https://github.com/o/r/pull/12", "state": "OPEN"}
                        }
                    }, {
                        "number": 4,
                        "state": "OPEN",
                        "vulnerableManifestPath": "a/s/d/f",
                        "dependencyScope": null,
                        "securityAdvisory": {"summary": "Other"},
                        "securityVulnerability": {
                            "severity": "LOW",
                            "package": {"ecosystem": "PIP", "name": "TestPkg"},
                            "firstPatchedVersion": null
                        },
                        "dependabotUpdate": null
                    }],
                    "pageInfo": {"hasNextPage": true, "endCursor": "Y3Vyc29yOjI="}
                }
            }
        }"#;

        let data: AlertsData = serde_json::from_str(body).unwrap();
        let connection = data.repository.unwrap().vulnerability_alerts;
        assert_eq!(connection.page_info.next_cursor().as_deref(), Some("Y3Vyc29yOjI="));

        let alerts: Vec<Alert> = connection.nodes.into_iter().map(Alert::from).collect();
        assert_eq!(alerts[0].severity, "CRITICAL");
        assert_eq!(alerts[0].package.ecosystem, "PIP");
        assert_eq!(alerts[0].dependency_scope.as_deref(), Some("DEVELOPMENT"));
        let pr = alerts[0].pull_request.as_ref().unwrap();
        assert!(pr.is_open());
        assert_eq!(pr.url, "https://github.com/o/r/pull/12");
        assert!(alerts[1].pull_request.is_none());
        assert_eq!(alerts[1].first_patched_version, "");
    }
}
