pub mod content;
pub mod graph;

use anyhow::Result;

pub use content::{content_to_version, ContentScanResolver, ManifestSource};
pub use graph::{DependencyGraphResolver, DependencyMap};

/// Resolves the version of a package currently declared in a manifest.
///
/// Called once per (package, ecosystem) the first time aggregation sees it.
/// An empty string means the version could not be determined; errors are
/// reserved for transport failures.
pub trait ManifestVersionResolver {
    /// Short name for logs ("contents", "graph")
    fn name(&self) -> &str;

    fn resolve(&self, manifest_path: &str, ecosystem: &str, package_name: &str) -> Result<String>;
}

