use std::process::Command;

use tracing::debug;

use crate::github::error::ApiError;

pub const DEFAULT_HOST: &str = "github.com";

/// A repository on a GitHub host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub host: String,
    pub owner: String,
    pub name: String,
}

impl Repository {
    /// Parse `OWNER/NAME` or `HOST/OWNER/NAME`.
    pub fn parse(s: &str) -> Result<Self, ApiError> {
        let parts: Vec<&str> = s.trim().trim_end_matches('/').split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(ApiError::InvalidRepository(s.to_string()));
        }

        match parts.as_slice() {
            [owner, name] => Ok(Repository {
                host: DEFAULT_HOST.to_string(),
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            [host, owner, name] => Ok(Repository {
                host: host.to_string(),
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err(ApiError::InvalidRepository(s.to_string())),
        }
    }

    /// Derive the repository from the `origin` remote of the current directory.
    pub fn from_git_remote() -> Result<Self, ApiError> {
        let output = Command::new("git")
            .args(["remote", "get-url", "origin"])
            .output()
            .map_err(|e| ApiError::InvalidRepository(format!("git remote lookup failed: {e}")))?;

        if !output.status.success() {
            return Err(ApiError::InvalidRepository(
                "no `origin` remote in the current directory; pass --repo".to_string(),
            ));
        }

        let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("origin remote: {}", url);
        parse_remote_url(&url).ok_or(ApiError::InvalidRepository(url))
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn is_default_host(&self) -> bool {
        self.host == DEFAULT_HOST
    }
}

impl std::fmt::Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Parse a git remote URL (https, ssh or scp-like) into a repository
pub fn parse_remote_url(url: &str) -> Option<Repository> {
    let url = url.trim();

    // https://host/owner/repo(.git), ssh://git@host/owner/repo.git
    let rest = if let Some(rest) = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .or_else(|| url.strip_prefix("ssh://"))
    {
        rest.rsplit_once('@').map_or(rest, |(_, r)| r).to_string()
    // git@host:owner/repo.git
    } else if let Some((user_host, path)) = url.split_once(':') {
        let host = user_host.rsplit_once('@').map_or(user_host, |(_, h)| h);
        format!("{host}/{path}")
    } else {
        return None;
    };

    let rest = rest.trim_end_matches('/').trim_end_matches(".git");
    let parts: Vec<&str> = rest.split('/').collect();
    match parts.as_slice() {
        [host, owner, name] if !owner.is_empty() && !name.is_empty() => Some(Repository {
            // ssh://git@host:22/... carries a port
            host: host.split(':').next().unwrap_or(host).to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
        }),
        _ => None,
    }
}
