use serde::Deserialize;

use crate::engine::merge::{MergeOutcome, PrState, PullRequestApi, PullRequestStatus};
use crate::github::{api_message, ApiError, GitHubClient};

#[derive(Debug, Deserialize)]
struct RestPull {
    state: String,
    #[serde(default)]
    merged: bool,
    /// `null` while GitHub is still computing it
    mergeable: Option<bool>,
}

impl From<RestPull> for PullRequestStatus {
    fn from(pull: RestPull) -> Self {
        let state = if pull.merged {
            PrState::Merged
        } else if pull.state == "open" {
            PrState::Open
        } else {
            PrState::Closed
        };
        PullRequestStatus {
            state,
            mergeable: pull.mergeable.unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RestMerge {
    #[serde(default)]
    merged: bool,
    #[serde(default)]
    message: String,
}

/// Interpret the response of `PUT pulls/{id}/merge`.
///
/// GitHub refuses unmergeable pull requests with 405/409/422 and a message;
/// those are reported as a failed merge rather than an error.
fn merge_outcome(status: u16, body: &str, url: &str) -> Result<MergeOutcome, ApiError> {
    match status {
        200..=299 => {
            let merge: RestMerge = serde_json::from_str(body).map_err(|e| ApiError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            Ok(MergeOutcome {
                merged: merge.merged,
                message: merge.message,
            })
        }
        405 | 409 | 422 => Ok(MergeOutcome {
            merged: false,
            message: api_message(body),
        }),
        _ => Err(ApiError::Http {
            status,
            url: url.to_string(),
            message: api_message(body),
        }),
    }
}

/// Pull request endpoints of the REST API
pub struct PullRequestClient<'a> {
    client: &'a GitHubClient,
}

impl<'a> PullRequestClient<'a> {
    pub fn new(client: &'a GitHubClient) -> Self {
        PullRequestClient { client }
    }
}

impl PullRequestApi for PullRequestClient<'_> {
    fn fetch_pull_request(&self, id: &str) -> anyhow::Result<PullRequestStatus> {
        let pull: RestPull = self.client.get_json(&self.client.repo_path(&format!("pulls/{id}")))?;
        Ok(pull.into())
    }

    fn merge_pull_request(&self, id: &str) -> anyhow::Result<MergeOutcome> {
        let path = self.client.repo_path(&format!("pulls/{id}/merge"));
        let (status, body) = self.client.put(&path)?;
        Ok(merge_outcome(status, &body, &path)?)
    }
}
