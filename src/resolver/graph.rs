use std::collections::HashMap;

use anyhow::Result;

use crate::resolver::ManifestVersionResolver;

/// Manifest path -> ecosystem -> package name -> requirement string.
///
/// Ecosystem and package name are stored lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyMap {
    manifests: HashMap<String, HashMap<String, HashMap<String, String>>>,
}

impl DependencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, manifest_path: &str, ecosystem: &str, package_name: &str, requirement: &str) {
        self.manifests
            .entry(manifest_path.to_string())
            .or_default()
            .entry(ecosystem.to_lowercase())
            .or_default()
            .insert(package_name.to_lowercase(), requirement.to_string());
    }

    pub fn get(&self, manifest_path: &str, ecosystem: &str, package_name: &str) -> Option<&str> {
        self.manifests
            .get(manifest_path)?
            .get(ecosystem)?
            .get(package_name)
            .map(String::as_str)
    }

    pub fn manifest_count(&self) -> usize {
        self.manifests.len()
    }

    /// Total dependency entries across all manifests
    pub fn dependency_count(&self) -> usize {
        self.manifests
            .values()
            .flat_map(|ecosystems| ecosystems.values())
            .map(HashMap::len)
            .sum()
    }
}

/// Looks versions up in a pre-fetched dependency graph.
pub struct DependencyGraphResolver {
    dependencies: DependencyMap,
}

impl DependencyGraphResolver {
    pub fn new(dependencies: DependencyMap) -> Self {
        DependencyGraphResolver { dependencies }
    }
}

impl ManifestVersionResolver for DependencyGraphResolver {
    fn name(&self) -> &str {
        "graph"
    }

    fn resolve(&self, manifest_path: &str, ecosystem: &str, package_name: &str) -> Result<String> {
        Ok(self
            .dependencies
            .get(manifest_path, ecosystem, package_name)
            .unwrap_or_default()
            .to_string())
    }
}
