use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::github::{ApiError, GitHubClient, PageInfo};
use crate::resolver::DependencyMap;

/// The dependency graph API is still behind a preview media type.
const DEPENDENCY_GRAPH_ACCEPT: &str = "application/vnd.github.hawkgirl-preview+json";
const PER_PAGE: u32 = 100;

const MANIFESTS_QUERY: &str = r#"
query RepositoryDependencies($owner: String!, $name: String!, $first: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    dependencyGraphManifests(first: $first, after: $cursor) {
      nodes {
        id
        filename
        dependencies(first: $first) {
          nodes { packageManager packageName requirements }
          pageInfo { hasNextPage endCursor }
        }
      }
      pageInfo { hasNextPage endCursor }
    }
  }
}
"#;

const MANIFEST_DEPENDENCIES_QUERY: &str = r#"
query ManifestDependencies($id: ID!, $first: Int!, $cursor: String) {
  node(id: $id) {
    ... on DependencyGraphManifest {
      dependencies(first: $first, after: $cursor) {
        nodes { packageManager packageName requirements }
        pageInfo { hasNextPage endCursor }
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct ManifestsData {
    repository: Option<ManifestsRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestsRepository {
    dependency_graph_manifests: ManifestConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestConnection {
    #[serde(default)]
    nodes: Vec<ManifestNode>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct ManifestNode {
    id: String,
    filename: String,
    dependencies: DependencyConnection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DependencyConnection {
    #[serde(default)]
    nodes: Vec<DependencyNode>,
    #[serde(default)]
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DependencyNode {
    #[serde(default)]
    package_manager: String,
    #[serde(default)]
    package_name: String,
    #[serde(default)]
    requirements: String,
}

#[derive(Debug, Deserialize)]
struct NodeData {
    node: Option<ManifestDependencies>,
}

#[derive(Debug, Deserialize)]
struct ManifestDependencies {
    #[serde(default)]
    dependencies: DependencyConnection,
}

fn record(dependencies: &mut DependencyMap, filename: &str, nodes: &[DependencyNode]) {
    for dep in nodes {
        dependencies.insert(filename, &dep.package_manager, &dep.package_name, &dep.requirements);
    }
}

/// Fetch every manifest of the repository's dependency graph with the
/// declared requirement of each dependency.
pub fn fetch_dependency_graph(client: &GitHubClient) -> Result<DependencyMap, ApiError> {
    let repo = client.repo();
    let mut dependencies = DependencyMap::new();
    let mut cursor: Option<String> = None;

    loop {
        let variables = json!({
            "owner": repo.owner,
            "name": repo.name,
            "first": PER_PAGE,
            "cursor": cursor,
        });
        let data: ManifestsData =
            client.graphql(MANIFESTS_QUERY, variables, Some(DEPENDENCY_GRAPH_ACCEPT))?;
        let manifests = data
            .repository
            .ok_or_else(|| ApiError::GraphQl(format!("repository {} not found", repo.full_name())))?
            .dependency_graph_manifests;

        for manifest in &manifests.nodes {
            record(&mut dependencies, &manifest.filename, &manifest.dependencies.nodes);

            let mut dep_cursor = manifest.dependencies.page_info.next_cursor();
            while let Some(after) = dep_cursor {
                debug!("More dependencies in {} after {}", manifest.filename, after);
                let page = fetch_manifest_dependencies(client, &manifest.id, &after)?;
                record(&mut dependencies, &manifest.filename, &page.nodes);
                dep_cursor = page.page_info.next_cursor();
            }
        }

        cursor = manifests.page_info.next_cursor();
        if cursor.is_none() {
            break;
        }
    }

    info!(
        "Dependency graph: {} manifests, {} dependencies",
        dependencies.manifest_count(),
        dependencies.dependency_count()
    );
    Ok(dependencies)
}

fn fetch_manifest_dependencies(
    client: &GitHubClient,
    manifest_id: &str,
    after: &str,
) -> Result<DependencyConnection, ApiError> {
    let variables = json!({
        "id": manifest_id,
        "first": PER_PAGE,
        "cursor": after,
    });
    let data: NodeData = client.graphql(
        MANIFEST_DEPENDENCIES_QUERY,
        variables,
        Some(DEPENDENCY_GRAPH_ACCEPT),
    )?;
    data.node
        .map(|n| n.dependencies)
        .ok_or_else(|| ApiError::GraphQl(format!("manifest {manifest_id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_page_decoding() {
        let body = r#"{
            "repository": {
                "dependencyGraphManifests": {
                    "nodes": [{
                        "id": "MDIzOkRlcGVuZGVuY3lHcmFwaE1hbmlmZXN0MQ==",
                        "filename": "a/s/d/f",
                        "dependencies": {
                            "nodes": [
                                {"packageManager": "PIP", "packageName": "TestPkg", "requirements": "> 1.2.3"},
                                {"packageManager": "PIP", "packageName": "other", "requirements": "= 0.1.0"}
                            ],
                            "pageInfo": {"hasNextPage": false, "endCursor": "MQ"}
                        }
                    }],
                    "pageInfo": {"hasNextPage": false, "endCursor": null}
                }
            }
        }"#;

        let data: ManifestsData = serde_json::from_str(body).unwrap();
        let manifests = data.repository.unwrap().dependency_graph_manifests;
        assert!(manifests.page_info.next_cursor().is_none());

        let mut deps = DependencyMap::new();
        for m in &manifests.nodes {
            record(&mut deps, &m.filename, &m.dependencies.nodes);
        }
        assert_eq!(deps.get("a/s/d/f", "pip", "testpkg"), Some("> 1.2.3"));
        assert_eq!(deps.dependency_count(), 2);
    }

    #[test]
    fn test_node_page_decoding() {
        let body = r#"{
            "node": {
                "dependencies": {
                    "nodes": [{"packageManager": "NPM", "packageName": "lodash", "requirements": "4.17.20"}],
                    "pageInfo": {"hasNextPage": true, "endCursor": "Mg"}
                }
            }
        }"#;
        let data: NodeData = serde_json::from_str(body).unwrap();
        let page = data.node.unwrap().dependencies;
        assert_eq!(page.nodes[0].package_name, "lodash");
        assert_eq!(page.page_info.next_cursor().as_deref(), Some("Mg"));
    }
}
