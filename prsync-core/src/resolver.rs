//! Mapping pull requests to local branches.

use tracing::debug;

use crate::consts::ORIGIN;
use crate::error::Result;
use crate::marker::scan_markers;
use crate::pull_request::PullRequestRef;
use crate::repository::{LocalRepository, RemoteRecord};
use crate::url::same_repository;

/// Whether the pull request's head lives outside the repository `origin`
/// points at. A repository without `origin` treats every pull request as
/// coming from a fork.
pub fn is_from_fork<R: LocalRepository + ?Sized>(repo: &R, pr: &PullRequestRef) -> Result<bool> {
  let fork = match repo.remote_url(ORIGIN)? {
    Some(origin) => !same_repository(&origin, &pr.head.clone_url),
    None => true,
  };
  debug!("Pull request #{} from fork: {fork}", pr.number);
  Ok(fork)
}

/// Local branch names associated with a pull request, without checking that
/// they exist.
///
/// For a same-repository pull request this is exactly the head branch name.
/// For a fork it is every branch carrying a marker for the pull request's
/// number, sorted by name so the first candidate is stable.
pub fn local_branches_for<R: LocalRepository + ?Sized>(repo: &R, pr: &PullRequestRef) -> Result<Vec<String>> {
  if !is_from_fork(repo, pr)? {
    return Ok(vec![pr.head.ref_name.clone()]);
  }

  let wanted = pr.marker_value();
  let mut branches: Vec<String> = scan_markers(repo)?
    .into_iter()
    .filter(|marker| marker.value == wanted)
    .map(|marker| marker.branch)
    .collect();
  branches.sort();
  Ok(branches)
}

/// A configured remote whose URL names the same repository as `clone_url`.
pub fn find_remote_for<R: LocalRepository + ?Sized>(repo: &R, clone_url: &str) -> Result<Option<RemoteRecord>> {
  Ok(
    repo
      .remotes()?
      .into_iter()
      .find(|remote| remote.url.as_deref().is_some_and(|url| same_repository(url, clone_url))),
  )
}

#[cfg(test)]
mod tests {
  use prsync_test_utils::git::{BareRemoteGuard, GitRepoTestGuard};
  use prsync_test_utils::pull_request_json;

  use super::*;
  use crate::marker::mark_branch;
  use crate::repository::GitRepository;

  fn pr(number: u32, head_ref: &str, clone_url: &str) -> PullRequestRef {
    serde_json::from_value(pull_request_json(number, "Title", head_ref, "", clone_url, "contributor")).unwrap()
  }

  #[test]
  fn same_repository_resolves_to_head_ref_only() {
    let origin = BareRemoteGuard::new();
    let local = GitRepoTestGuard::with_origin(&origin);
    let repo = GitRepository::discover(local.path()).unwrap();
    mark_branch(&repo, "unrelated", 5).unwrap();

    let branches = local_branches_for(&repo, &pr(5, "feature/x", &format!("{}.git", origin.url()))).unwrap();

    assert_eq!(branches, vec!["feature/x".to_string()]);
  }

  #[test]
  fn fork_resolves_through_markers() {
    let origin = BareRemoteGuard::new();
    let local = GitRepoTestGuard::with_origin(&origin);
    let repo = GitRepository::discover(local.path()).unwrap();

    mark_branch(&repo, "pr/5-b", 5).unwrap();
    mark_branch(&repo, "pr/5-a", 5).unwrap();
    mark_branch(&repo, "pr/6", 6).unwrap();

    let branches = local_branches_for(&repo, &pr(5, "feature", "https://github.com/contributor/project.git")).unwrap();

    assert_eq!(branches, vec!["pr/5-a".to_string(), "pr/5-b".to_string()]);
  }

  #[test]
  fn fork_without_markers_resolves_to_nothing() {
    let origin = BareRemoteGuard::new();
    let local = GitRepoTestGuard::with_origin(&origin);
    let repo = GitRepository::discover(local.path()).unwrap();

    let branches = local_branches_for(&repo, &pr(9, "feature", "https://github.com/contributor/project.git")).unwrap();

    assert!(branches.is_empty());
  }

  #[test]
  fn missing_origin_means_fork() {
    let local = GitRepoTestGuard::new();
    let repo = GitRepository::discover(local.path()).unwrap();

    assert!(is_from_fork(&repo, &pr(1, "feature", "https://github.com/owner/project.git")).unwrap());
  }

  #[test]
  fn finds_remote_by_equivalent_url() {
    let local = GitRepoTestGuard::new();
    local.repo.remote("contributor", "git@github.com:Contributor/Project.git").unwrap();
    let repo = GitRepository::discover(local.path()).unwrap();

    let found = find_remote_for(&repo, "https://github.com/contributor/project").unwrap();
    assert_eq!(found.map(|remote| remote.name).as_deref(), Some("contributor"));
    assert_eq!(find_remote_for(&repo, "https://github.com/other/project").unwrap(), None);
  }
}
