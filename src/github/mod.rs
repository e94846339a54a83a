pub mod alerts;
pub mod contents;
pub mod error;
pub mod graph;
pub mod pulls;
pub mod repo;

use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LINK};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::GitHubConfig;
pub use error::ApiError;
pub use repo::Repository;

const REST_ACCEPT: &str = "application/vnd.github+json";

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<([^>]+)>;\s*rel="([^"]+)""#).unwrap());

/// Relay-style page info shared by the GraphQL connections we read
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

impl PageInfo {
    /// Cursor for the following page, if there is one
    pub fn next_cursor(&self) -> Option<String> {
        if self.has_next_page {
            self.end_cursor.clone()
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Blocking client for one repository on one GitHub host
pub struct GitHubClient {
    http: Client,
    token: String,
    api_url: String,
    graphql_url: String,
    repo: Repository,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig, repo: Repository) -> Result<Self, ApiError> {
        let token = resolve_token(config).ok_or(ApiError::MissingToken)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(REST_ACCEPT));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));

        let http = Client::builder()
            .user_agent(concat!("dependabot-digest/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        let (api_url, graphql_url) = config.endpoints(&repo.host);
        debug!("GitHub endpoints: {} / {}", api_url, graphql_url);

        Ok(GitHubClient {
            http,
            token,
            api_url,
            graphql_url,
            repo,
        })
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// `repos/{owner}/{name}/{suffix}`
    pub fn repo_path(&self, suffix: &str) -> String {
        format!("repos/{}/{}/{}", self.repo.owner, self.repo.name, suffix)
    }

    /// Absolute URLs (e.g. from Link headers) pass through untouched.
    fn rest_url(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            format!("{}/{}", self.api_url.trim_end_matches('/'), path.trim_start_matches('/'))
        }
    }

    fn send(&self, url: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        request
            .bearer_auth(&self.token)
            .send()
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })
    }

    fn check_status(url: &str, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().unwrap_or_default();
        Err(ApiError::Http {
            status: status.as_u16(),
            url: url.to_string(),
            message: api_message(&message),
        })
    }

    fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ApiError> {
        response.json::<T>().map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// GET a REST path and decode the JSON body.
    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get_page(path).map(|(body, _)| body)
    }

    /// GET a REST path, returning the body and the `rel="next"` link.
    pub fn get_page<T: DeserializeOwned>(&self, path: &str) -> Result<(T, Option<String>), ApiError> {
        let url = self.rest_url(path);
        debug!("GET {}", url);

        let response = self.send(&url, self.http.get(&url))?;
        let response = Self::check_status(&url, response)?;
        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_page_link);

        Ok((Self::decode(&url, response)?, next))
    }

    /// PUT to a REST path with an empty body. Returns the status code and the
    /// raw body so callers can interpret refusals themselves.
    pub fn put(&self, path: &str) -> Result<(u16, String), ApiError> {
        let url = self.rest_url(path);
        debug!("PUT {}", url);

        let response = self.send(&url, self.http.put(&url).json(&serde_json::json!({})))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;
        Ok((status, body))
    }

    /// Run a GraphQL query, optionally with a preview Accept header.
    pub fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
        accept: Option<&'static str>,
    ) -> Result<T, ApiError> {
        let url = self.graphql_url.clone();
        let mut request = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "query": query, "variables": variables }));
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }

        let response = self.send(&url, request)?;
        let response = Self::check_status(&url, response)?;
        let body: GraphQlResponse<T> = Self::decode(&url, response)?;

        if !body.errors.is_empty() {
            let messages: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
            return Err(ApiError::GraphQl(messages.join("; ")));
        }
        body.data
            .ok_or_else(|| ApiError::GraphQl("response carried no data".to_string()))
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_url", &self.api_url)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

/// Token from config, then GITHUB_TOKEN / GH_TOKEN, then `gh auth token`.
fn resolve_token(config: &GitHubConfig) -> Option<String> {
    pick_token(config.token.as_deref(), |name| std::env::var(name).ok(), gh_cli_token)
}

/// First non-blank token; blank values never hide a later source.
fn pick_token(
    configured: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
    gh_cli: impl FnOnce() -> Option<String>,
) -> Option<String> {
    let non_blank = |t: &String| !t.trim().is_empty();
    configured
        .map(str::to_string)
        .filter(non_blank)
        .or_else(|| env("GITHUB_TOKEN").filter(non_blank))
        .or_else(|| env("GH_TOKEN").filter(non_blank))
        .or_else(|| gh_cli().filter(non_blank))
}

fn gh_cli_token() -> Option<String> {
    let output = Command::new("gh").args(["auth", "token"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!token.is_empty()).then_some(token)
}

/// Extract the `rel="next"` target from a Link header
pub fn next_page_link(header: &str) -> Option<String> {
    LINK_RE
        .captures_iter(header)
        .find(|caps| &caps[2] == "next")
        .map(|caps| caps[1].to_string())
}

/// Pull the `message` field out of a GitHub error body, or return it as is
pub(crate) fn api_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Message {
        message: String,
    }
    serde_json::from_str::<Message>(body)
        .map(|m| m.message)
        .unwrap_or_else(|_| body.trim().to_string())
}
