//! Branch config markers.
//!
//! A branch checked out for a fork pull request under a synthesized name is
//! tagged with `branch.<name>.ghfvs-pr = <number>` in the repository's local
//! config. The marker is the only durable link between the branch and the
//! pull request; it is never cached and is rescanned on every lookup.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::consts::PULL_REQUEST_SETTING;
use crate::error::Result;
use crate::repository::LocalRepository;

static MARKER_KEY_REGEX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^branch\.(.+)\.ghfvs-pr$").expect("Failed to compile marker key regex"));

/// A `branch.<name>.ghfvs-pr` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchMarker {
  pub branch: String,
  /// Raw config value, normally a decimal pull request number.
  pub value: String,
}

impl BranchMarker {
  /// Pull request number, `None` when the value is not a number.
  pub fn pull_request(&self) -> Option<u32> {
    self.value.trim().parse().ok()
  }
}

/// Config key holding the marker for `branch`.
pub fn marker_key(branch: &str) -> String {
  format!("branch.{branch}.{PULL_REQUEST_SETTING}")
}

/// Branch name encoded in a marker key.
pub fn branch_from_marker_key(key: &str) -> Option<&str> {
  MARKER_KEY_REGEX
    .captures(key)
    .and_then(|captures| captures.get(1))
    .map(|branch| branch.as_str())
}

/// Every marker in the repository's local config.
pub fn scan_markers<R: LocalRepository + ?Sized>(repo: &R) -> Result<Vec<BranchMarker>> {
  let markers: Vec<BranchMarker> = repo
    .config_entries()?
    .into_iter()
    .filter_map(|(key, value)| {
      branch_from_marker_key(&key).map(|branch| BranchMarker {
        branch: branch.to_string(),
        value,
      })
    })
    .collect();

  debug!("Found {} pull request markers", markers.len());
  Ok(markers)
}

/// Record that `branch` was checked out for pull request `number`.
pub fn mark_branch<R: LocalRepository + ?Sized>(repo: &R, branch: &str, number: u32) -> Result<()> {
  repo.set_config(&marker_key(branch), &number.to_string())
}

/// Remove the marker from `branch`. Returns `false` when there was none.
pub fn unmark_branch<R: LocalRepository + ?Sized>(repo: &R, branch: &str) -> Result<bool> {
  repo.unset_config(&marker_key(branch))
}

/// Remove the marker from the checked-out branch, returning its name when a
/// marker was removed.
pub fn unmark_current_branch<R: LocalRepository + ?Sized>(repo: &R) -> Result<Option<String>> {
  let Some(current) = repo.current_branch()? else {
    return Ok(None);
  };

  Ok(unmark_branch(repo, &current.name)?.then_some(current.name))
}

#[cfg(test)]
mod tests {
  use prsync_test_utils::git::{GitRepoTestGuard, create_commit};

  use super::*;
  use crate::repository::GitRepository;

  #[test]
  fn parses_branch_names_with_dots_and_slashes() {
    assert_eq!(branch_from_marker_key("branch.pr/7-fix.ghfvs-pr"), Some("pr/7-fix"));
    assert_eq!(branch_from_marker_key("branch.v1.2.ghfvs-pr"), Some("v1.2"));
    assert_eq!(branch_from_marker_key("branch.main.remote"), None);
    assert_eq!(branch_from_marker_key("remote.origin.ghfvs-pr"), None);
  }

  #[test]
  fn scan_returns_marked_branches() {
    let guard = GitRepoTestGuard::new();
    let repo = GitRepository::discover(guard.path()).unwrap();

    mark_branch(&repo, "pr/7-fix", 7).unwrap();
    mark_branch(&repo, "other", 8).unwrap();
    repo.set_config("branch.bogus.ghfvs-pr", "not-a-number").unwrap();

    let mut markers = scan_markers(&repo).unwrap();
    markers.sort_by(|a, b| a.branch.cmp(&b.branch));

    assert_eq!(markers.len(), 3);
    assert_eq!(markers[0].branch, "bogus");
    assert_eq!(markers[0].pull_request(), None);
    assert_eq!(markers[1].branch, "other");
    assert_eq!(markers[2].pull_request(), Some(7));
  }

  #[test]
  fn unmark_current_branch_clears_only_head() {
    let guard = GitRepoTestGuard::new();
    create_commit(&guard.repo, "base.txt", "base\n", "initial commit").unwrap();
    let repo = GitRepository::discover(guard.path()).unwrap();

    mark_branch(&repo, "main", 3).unwrap();
    mark_branch(&repo, "elsewhere", 3).unwrap();

    assert_eq!(unmark_current_branch(&repo).unwrap().as_deref(), Some("main"));
    assert_eq!(unmark_current_branch(&repo).unwrap(), None);

    let markers = scan_markers(&repo).unwrap();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].branch, "elsewhere");
  }
}
