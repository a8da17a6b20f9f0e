//! Pull request snapshot consumed by the engine.
//!
//! The engine never fetches or mutates pull request metadata; callers obtain
//! it from whatever source they use (the GitHub API, a JSON file, a test
//! fixture) and hand over an immutable [`PullRequestRef`].

use serde::{Deserialize, Serialize};

/// Immutable description of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
  /// Pull request number, the stable identity used by config markers.
  pub number: u32,
  /// Human readable title, used to derive default branch names.
  pub title: String,
  /// Branch the changes come from.
  pub head: PullRequestHead,
  /// Branch the changes are proposed against.
  pub base: PullRequestBase,
}

/// Head side of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestHead {
  /// Branch name on the head repository.
  #[serde(rename = "ref")]
  pub ref_name: String,
  pub sha: String,
  /// Clone URL of the repository that owns the head branch.
  pub clone_url: String,
  /// Login of the head repository owner.
  pub owner: String,
}

/// Base side of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestBase {
  #[serde(rename = "ref")]
  pub ref_name: String,
  pub sha: String,
}

impl PullRequestRef {
  /// Pull request number rendered the way it is stored in config markers.
  pub fn marker_value(&self) -> String {
    self.number.to_string()
  }
}
