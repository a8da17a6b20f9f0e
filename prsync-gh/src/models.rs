//! GitHub REST API payloads used by prsync.

use anyhow::{Context, Result};
use prsync_core::pull_request::{PullRequestBase, PullRequestHead, PullRequestRef};
use serde::{Deserialize, Serialize};

/// Represents GitHub authentication credentials
#[derive(Clone)]
pub struct GitHubAuth {
  pub username: String,
  pub token: String,
}

impl std::fmt::Debug for GitHubAuth {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GitHubAuth")
      .field("username", &self.username)
      .field("token", &"<redacted>")
      .finish()
  }
}

/// Represents a GitHub user
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubUser {
  pub login: String,
  pub id: u64,
}

/// Repository as embedded in pull request payloads
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubRepository {
  pub name: String,
  pub full_name: String,
  pub clone_url: String,
  pub owner: GitHubUser,
}

/// Represents a GitHub pull request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubPullRequest {
  pub number: u32,
  pub title: String,
  pub html_url: String,
  pub state: String,
  pub user: GitHubUser,
  pub head: GitHubPRRef,
  pub base: GitHubPRRef,
  pub body: Option<String>,
  pub draft: Option<bool>,
}

/// One side of a pull request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubPRRef {
  pub label: String,
  #[serde(rename = "ref")]
  pub ref_name: String,
  pub sha: String,
  /// `null` when the repository has been deleted.
  pub repo: Option<GitHubRepository>,
}

/// Error body returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubErrorResponse {
  pub message: String,
  #[serde(default)]
  pub errors: Vec<GitHubErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubErrorDetail {
  pub message: Option<String>,
  pub code: Option<String>,
  pub field: Option<String>,
}

impl GitHubErrorResponse {
  /// Top-level message followed by any per-field details.
  pub fn describe(&self) -> String {
    let details: Vec<String> = self
      .errors
      .iter()
      .filter_map(|detail| match (&detail.message, &detail.field, &detail.code) {
        (Some(message), _, _) => Some(message.clone()),
        (None, Some(field), Some(code)) => Some(format!("{field} {code}")),
        _ => None,
      })
      .collect();

    if details.is_empty() {
      self.message.clone()
    } else {
      format!("{}: {}", self.message, details.join("; "))
    }
  }
}

impl TryFrom<&GitHubPullRequest> for PullRequestRef {
  type Error = anyhow::Error;

  fn try_from(pr: &GitHubPullRequest) -> Result<Self> {
    let head_repo = pr
      .head
      .repo
      .as_ref()
      .with_context(|| format!("Head repository of pull request #{} no longer exists", pr.number))?;

    Ok(PullRequestRef {
      number: pr.number,
      title: pr.title.clone(),
      head: PullRequestHead {
        ref_name: pr.head.ref_name.clone(),
        sha: pr.head.sha.clone(),
        clone_url: head_repo.clone_url.clone(),
        owner: head_repo.owner.login.clone(),
      },
      base: PullRequestBase {
        ref_name: pr.base.ref_name.clone(),
        sha: pr.base.sha.clone(),
      },
    })
  }
}
