use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::report::finding::Finding;

/// Lifecycle state of a pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PrState::Open => "open",
            PrState::Closed => "closed",
            PrState::Merged => "merged",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullRequestStatus {
    pub state: PrState,
    pub mergeable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub merged: bool,
    pub message: String,
}

/// What the merge workflow needs from the pull request API.
pub trait PullRequestApi {
    fn fetch_pull_request(&self, id: &str) -> Result<PullRequestStatus>;

    fn merge_pull_request(&self, id: &str) -> Result<MergeOutcome>;
}

/// Bounded exponential wait for a pull request to become mergeable.
///
/// Attempt `i` sleeps `base_delay * 2^i` before re-checking, so the default
/// policy waits 5s, 10s, 20s and 40s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        WaitPolicy {
            max_attempts: 4,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl WaitPolicy {
    /// No waiting at all
    pub fn none() -> Self {
        WaitPolicy {
            max_attempts: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Poll until the pull request reports mergeable or attempts run out.
pub fn wait_until_mergeable(api: &dyn PullRequestApi, id: &str, policy: &WaitPolicy) -> Result<bool> {
    for attempt in 0..policy.max_attempts {
        let delay = policy.delay_for(attempt);
        debug!("PR #{}: waiting {:?} for mergeability (attempt {})", id, delay, attempt + 1);
        std::thread::sleep(delay);

        if api.fetch_pull_request(id)?.mergeable {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Pull request number from its URL: the last non-empty path segment.
pub fn pull_request_id(url: &str) -> Option<String> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// A finding with an open fix pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCandidate {
    pub package: String,
    pub url: String,
    pub id: String,
}

/// Findings that carry a fix pull request, in ranking order
pub fn merge_candidates(findings: &[Finding]) -> Vec<MergeCandidate> {
    findings
        .iter()
        .filter_map(|f| {
            let url = f.pull_request_url.as_deref()?;
            let id = pull_request_id(url)?;
            Some(MergeCandidate {
                package: f.package_string(),
                url: url.to_string(),
                id,
            })
        })
        .collect()
}

/// Result of handling one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum MergeAction {
    /// Not open any more; left alone
    Skipped { state: PrState },
    /// Merge was attempted
    Attempted {
        waited: bool,
        mergeable: bool,
        outcome: MergeOutcome,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub package: String,
    pub url: String,
    pub id: String,
    pub action: MergeAction,
}

/// Merges the fix pull requests attached to findings.
pub struct MergeWorkflow<'a> {
    api: &'a dyn PullRequestApi,
    policy: WaitPolicy,
}

impl<'a> MergeWorkflow<'a> {
    pub fn new(api: &'a dyn PullRequestApi, policy: WaitPolicy) -> Self {
        MergeWorkflow { api, policy }
    }

    /// Handle one candidate.
    ///
    /// Only open pull requests are touched. An unmergeable one is waited on
    /// under the policy, then the merge is attempted whatever the wait said.
    pub fn merge_one(&self, candidate: &MergeCandidate) -> Result<MergeReport> {
        let status = self.api.fetch_pull_request(&candidate.id)?;

        let action = if status.state != PrState::Open {
            info!("PR #{} for {} is {}, skipping", candidate.id, candidate.package, status.state);
            MergeAction::Skipped { state: status.state }
        } else {
            let mut waited = false;
            let mut mergeable = status.mergeable;
            if !mergeable {
                waited = true;
                mergeable = wait_until_mergeable(self.api, &candidate.id, &self.policy)?;
                if !mergeable {
                    warn!(
                        "PR #{} for {} is still not mergeable, trying anyway",
                        candidate.id, candidate.package
                    );
                }
            }

            let outcome = self.api.merge_pull_request(&candidate.id)?;
            info!("PR #{} for {}: {}", candidate.id, candidate.package, outcome.message);
            MergeAction::Attempted {
                waited,
                mergeable,
                outcome,
            }
        };

        Ok(MergeReport {
            package: candidate.package.clone(),
            url: candidate.url.clone(),
            id: candidate.id.clone(),
            action,
        })
    }

    pub fn run(&self, candidates: &[MergeCandidate]) -> Result<Vec<MergeReport>> {
        candidates.iter().map(|c| self.merge_one(c)).collect()
    }
}
