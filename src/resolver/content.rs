use std::cell::RefCell;
use std::collections::HashMap;

use anyhow::Result;
use regex::RegexBuilder;
use tracing::debug;

use crate::report::version::extract_version;
use crate::resolver::ManifestVersionResolver;

/// Anything that can hand back the raw text of a manifest file.
pub trait ManifestSource {
    fn fetch_manifest_content(&self, manifest_path: &str) -> Result<String>;
}

/// Find the declared version of `package_name` in raw manifest text.
///
/// Takes the first line that mentions the package (case-insensitive) and
/// pulls the first version-like token out of it. Returns `""` when the
/// package is not mentioned or the line carries no version.
pub fn content_to_version(content: &str, package_name: &str) -> String {
    let pattern = format!(".*{}.*", regex::escape(package_name));
    let line_re = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re,
        Err(_) => return String::new(),
    };

    let line = match line_re.find(content) {
        Some(m) => m.as_str().trim_matches('\n'),
        None => return String::new(),
    };

    extract_version(line).to_string()
}

/// Scans manifest file contents for the declared version.
///
/// Each manifest is fetched at most once per run.
pub struct ContentScanResolver<S> {
    source: S,
    cache: RefCell<HashMap<String, String>>,
}

impl<S: ManifestSource> ContentScanResolver<S> {
    pub fn new(source: S) -> Self {
        ContentScanResolver {
            source,
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn manifest(&self, manifest_path: &str) -> Result<String> {
        if let Some(content) = self.cache.borrow().get(manifest_path) {
            return Ok(content.clone());
        }

        debug!("Fetching manifest {}", manifest_path);
        let content = self.source.fetch_manifest_content(manifest_path)?;
        self.cache
            .borrow_mut()
            .insert(manifest_path.to_string(), content.clone());
        Ok(content)
    }
}

impl<S: ManifestSource> ManifestVersionResolver for ContentScanResolver<S> {
    fn name(&self) -> &str {
        "contents"
    }

    fn resolve(&self, manifest_path: &str, _ecosystem: &str, package_name: &str) -> Result<String> {
        let content = self.manifest(manifest_path)?;
        Ok(content_to_version(&content, package_name))
    }
}
