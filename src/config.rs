use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::merge::WaitPolicy;
use crate::github::repo::DEFAULT_HOST;

pub const CONFIG_FILE: &str = ".dependabot-digest.toml";

/// Configuration loaded from .dependabot-digest.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub merge: MergeConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// REST base URL; derived from the repository host when unset
    #[serde(default)]
    pub api_url: Option<String>,

    /// GraphQL endpoint; derived from the repository host when unset
    #[serde(default)]
    pub graphql_url: Option<String>,

    /// Host used when --repo gives only OWNER/NAME
    #[serde(default)]
    pub host: Option<String>,

    /// API token (GITHUB_TOKEN / GH_TOKEN / `gh auth token` otherwise)
    #[serde(default)]
    pub token: Option<String>,
}

impl GitHubConfig {
    /// REST and GraphQL endpoints for a host. github.com uses api.github.com,
    /// Enterprise Server hosts use /api/v3 and /api/graphql.
    pub fn endpoints(&self, host: &str) -> (String, String) {
        let (default_api, default_graphql) = if host == DEFAULT_HOST {
            (
                "https://api.github.com".to_string(),
                "https://api.github.com/graphql".to_string(),
            )
        } else {
            (
                format!("https://{host}/api/v3"),
                format!("https://{host}/api/graphql"),
            )
        };

        (
            self.api_url.clone().unwrap_or(default_api),
            self.graphql_url.clone().unwrap_or(default_graphql),
        )
    }
}

/// Which alert feed to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AlertSourceKind {
    /// Dependabot alerts REST API (no pull request data)
    Rest,
    /// vulnerabilityAlerts GraphQL API (includes fix pull requests)
    #[default]
    Graphql,
}

/// How declared versions are looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VersionStrategy {
    /// Scan manifest file contents
    Contents,
    /// Look up the dependency graph
    #[default]
    Graph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub source: AlertSourceKind,

    #[serde(default)]
    pub versions: VersionStrategy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Minimum severity to report
    #[serde(default)]
    pub min_severity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
        }
    }
}

impl MergeConfig {
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_secs(self.base_delay_secs),
        }
    }
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_delay_secs() -> u64 {
    5
}

impl DigestConfig {
    /// Try to load .dependabot-digest.toml from the given directory or its parents
    pub fn load(start: &Path) -> Option<Self> {
        let config_path = find_config_file(start)?;
        debug!("Found config: {}", config_path.display());

        match std::fs::read_to_string(&config_path) {
            Ok(content) => match toml::from_str::<DigestConfig>(&content) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    Some(config)
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}", config_path.display(), e);
                    None
                }
            },
            Err(e) => {
                debug!("Could not read {}: {}", config_path.display(), e);
                None
            }
        }
    }

    /// Load from the current directory upwards, falling back to defaults
    pub fn load_or_default() -> Self {
        std::env::current_dir()
            .ok()
            .and_then(|cwd| Self::load(&cwd))
            .unwrap_or_default()
    }
}

/// Walk up from `start` to find the config file
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let config = current.join(CONFIG_FILE);
        if config.exists() {
            return Some(config);
        }
        if !current.pop() {
            return None;
        }
    }
}

const DEFAULT_CONFIG: &str = r#"# dependabot-digest configuration

[github]
# REST / GraphQL endpoints. Derived from the repository host when unset.
# api_url = "https://api.github.com"
# graphql_url = "https://api.github.com/graphql"

# Host used when --repo is given as OWNER/NAME
# host = "github.com"

# Prefer GITHUB_TOKEN / GH_TOKEN or `gh auth login` over storing a token here
# token = ""

[alerts]
# Alert feed: "graphql" (includes fix pull requests) or "rest"
source = "graphql"

# Declared version lookup: "graph" (dependency graph) or "contents" (scan manifests)
versions = "graph"

[output]
# Default output format: "table" or "json"
format = "table"

# Minimum severity to report: "low", "medium", "high", "critical"
# min_severity = "low"

[merge]
# Wait for mergeability: attempt i sleeps base_delay_secs * 2^i
max_attempts = 4
base_delay_secs = 5
"#;

/// Write a default config file into `dir`. Returns false if one exists.
pub fn write_default_config(dir: &Path) -> Result<bool> {
    let config_path = dir.join(CONFIG_FILE);
    if config_path.exists() {
        return Ok(false);
    }
    std::fs::write(&config_path, DEFAULT_CONFIG)?;
    Ok(true)
}

/// Create a default .dependabot-digest.toml in the current directory
pub fn init_config() -> Result<()> {
    let cwd = std::env::current_dir()?;

    if !write_default_config(&cwd)? {
        println!("⚠️  {} already exists in this directory", CONFIG_FILE);
        return Ok(());
    }

    println!("✅ Created {}", CONFIG_FILE);
    println!("   Edit it to customize alert sources and output.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: DigestConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.alerts.source, AlertSourceKind::Graphql);
        assert_eq!(config.alerts.versions, VersionStrategy::Graph);
        assert_eq!(config.output.format, OutputFormat::Table);
        assert_eq!(config.merge.wait_policy(), WaitPolicy::default());
    }

    #[test]
    fn test_partial_config() {
        let config: DigestConfig = toml::from_str(
            r#"
            [alerts]
            source = "rest"
            versions = "contents"
            "#,
        )
        .unwrap();
        assert_eq!(config.alerts.source, AlertSourceKind::Rest);
        assert_eq!(config.alerts.versions, VersionStrategy::Contents);
        assert_eq!(config.merge.max_attempts, 4);
        assert!(config.github.token.is_none());
    }

    #[test]
    fn test_endpoints() {
        let config = GitHubConfig::default();
        assert_eq!(
            config.endpoints("github.com"),
            (
                "https://api.github.com".to_string(),
                "https://api.github.com/graphql".to_string()
            )
        );
        assert_eq!(
            config.endpoints("ghe.example.com"),
            (
                "https://ghe.example.com/api/v3".to_string(),
                "https://ghe.example.com/api/graphql".to_string()
            )
        );

        let pinned = GitHubConfig {
            api_url: Some("http://localhost:8080".to_string()),
            ..GitHubConfig::default()
        };
        assert_eq!(pinned.endpoints("github.com").0, "http://localhost:8080");
    }

    #[test]
    fn test_load_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[output]\nformat = \"json\"\n",
        )
        .unwrap();

        let config = DigestConfig::load(&nested).expect("config found");
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_load_invalid_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[alerts]\nsource = 7\n").unwrap();
        assert!(DigestConfig::load(dir.path()).is_none());
    }

    #[test]
    fn test_write_default_config_once() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_default_config(dir.path()).unwrap());
        assert!(!write_default_config(dir.path()).unwrap());
        assert!(DigestConfig::load(dir.path()).is_some());
    }
}
