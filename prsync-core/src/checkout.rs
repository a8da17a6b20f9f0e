//! # Pull Request Checkout
//!
//! Deciding how a pull request maps onto the working copy and carrying that
//! decision out.
//!
//! [`plan_checkout`] is pure with respect to the repository: it reads
//! branches, remotes and markers and returns a [`CheckoutPlan`]. The async
//! workflows then perform the fetches, branch creation, tracking setup and
//! marker writes. Every workflow refuses to start on a dirty working tree, so
//! a precondition failure never leaves partial state behind.

use tracing::{debug, info, instrument};

use crate::consts::ORIGIN;
use crate::error::{Result, SyncError};
use crate::marker::mark_branch;
use crate::naming::default_branch_name;
use crate::pull_request::PullRequestRef;
use crate::repository::{LocalRepository, TrackingRef};
use crate::resolver::{find_remote_for, is_from_fork, local_branches_for};
use crate::transport::{BranchRefspec, RemoteTransport};

/// How a pull request should be brought into the working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutPlan {
  /// The associated branch is already checked out.
  AlreadyCurrent { branch: String },
  /// An associated branch is known; switch to it.
  SwitchToExisting { branch: String },
  /// Same-repository pull request without a local branch; create it from
  /// `origin`.
  CreateFromSameRepository { branch: String },
  /// Fork pull request seen for the first time; create a marked branch.
  CreateFromFork { branch: String },
}

impl CheckoutPlan {
  /// Local branch the plan ends up on.
  pub fn branch(&self) -> &str {
    match self {
      Self::AlreadyCurrent { branch }
      | Self::SwitchToExisting { branch }
      | Self::CreateFromSameRepository { branch }
      | Self::CreateFromFork { branch } => branch,
    }
  }
}

/// Whether a checkout may start right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutState {
  Available,
  /// Tracked files have uncommitted modifications.
  BlockedByChanges,
}

/// What a checkout workflow did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutAction {
  AlreadyCurrent,
  SwitchedToExisting,
  /// Branch created from `refs/remotes/<remote>/<branch>` with tracking.
  CreatedFromRemote { remote: String },
  /// Branch fetched from a fork remote, tracked and marked.
  CreatedFromFork { remote: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutOutcome {
  pub branch: String,
  pub action: CheckoutAction,
}

/// Work out how `pr` maps onto the working copy.
pub fn plan_checkout<R: LocalRepository + ?Sized>(repo: &R, pr: &PullRequestRef) -> Result<CheckoutPlan> {
  let candidates = local_branches_for(repo, pr)?;
  let current = repo.current_branch()?.map(|branch| branch.name);

  if let Some(current) = current
    && candidates.contains(&current)
  {
    return Ok(CheckoutPlan::AlreadyCurrent { branch: current });
  }

  if is_from_fork(repo, pr)? {
    // A marker survives deletion of its branch; switching will then report
    // the missing branch rather than silently creating a second one.
    if let Some(branch) = candidates.into_iter().next() {
      return Ok(CheckoutPlan::SwitchToExisting { branch });
    }

    let existing: Vec<String> = repo.local_branches()?.into_iter().map(|branch| branch.name).collect();
    return Ok(CheckoutPlan::CreateFromFork {
      branch: default_branch_name(pr, &existing),
    });
  }

  let branch = pr.head.ref_name.clone();
  if repo.find_branch(&branch)?.is_some() {
    Ok(CheckoutPlan::SwitchToExisting { branch })
  } else {
    Ok(CheckoutPlan::CreateFromSameRepository { branch })
  }
}

pub fn checkout_state<R: LocalRepository + ?Sized>(repo: &R) -> Result<CheckoutState> {
  Ok(if repo.is_dirty()? {
    CheckoutState::BlockedByChanges
  } else {
    CheckoutState::Available
  })
}

fn ensure_clean<R: LocalRepository + ?Sized>(repo: &R) -> Result<()> {
  match checkout_state(repo)? {
    CheckoutState::Available => Ok(()),
    CheckoutState::BlockedByChanges => Err(SyncError::DirtyWorkingTree),
  }
}

/// Create `branch` from `refs/remotes/<remote>/<branch>` and track it.
/// Returns `false` when the remote-tracking ref does not exist.
fn create_tracking_branch<R: LocalRepository + ?Sized>(repo: &R, remote: &str, branch: &str) -> Result<bool> {
  let Some(tip) = repo.remote_branch_tip(remote, branch)? else {
    return Ok(false);
  };

  repo.create_branch(branch, &tip)?;
  repo.set_tracking(branch, &TrackingRef::new(remote, branch))?;
  Ok(true)
}

/// Bring `pr` into the working copy as `local_branch`.
///
/// An existing local branch is simply checked out. Otherwise the branch is
/// created from `origin` for same-repository pull requests, or fetched from a
/// remote for the fork, tracked and marked.
#[instrument(skip_all, fields(pr = pr.number, branch = local_branch), level = "debug")]
pub async fn checkout_pull_request<R, T>(
  repo: &R,
  transport: &T,
  pr: &PullRequestRef,
  local_branch: &str,
) -> Result<CheckoutOutcome>
where
  R: LocalRepository + ?Sized,
  T: RemoteTransport + ?Sized,
{
  ensure_clean(repo)?;

  if repo.find_branch(local_branch)?.is_some() {
    repo.checkout(local_branch)?;
    info!("Checked out existing branch {local_branch}");
    return Ok(CheckoutOutcome {
      branch: local_branch.to_string(),
      action: CheckoutAction::SwitchedToExisting,
    });
  }

  if !is_from_fork(repo, pr)? {
    transport.fetch(ORIGIN).await?;
    if !create_tracking_branch(repo, ORIGIN, local_branch)? {
      return Err(SyncError::NoAssociatedBranch {
        reference: TrackingRef::new(ORIGIN, local_branch).remote_ref(),
      });
    }
    repo.checkout(local_branch)?;
    info!("Created {local_branch} from {ORIGIN}");
    return Ok(CheckoutOutcome {
      branch: local_branch.to_string(),
      action: CheckoutAction::CreatedFromRemote {
        remote: ORIGIN.to_string(),
      },
    });
  }

  let remote = ensure_fork_remote(repo, transport, pr).await?;
  transport.fetch(&remote).await?;
  transport
    .fetch_refspecs(&remote, &[BranchRefspec::new(&pr.head.ref_name, local_branch)])
    .await?;

  repo.checkout(local_branch)?;
  repo.set_tracking(local_branch, &TrackingRef::new(&remote, &pr.head.ref_name))?;
  mark_branch(repo, local_branch, pr.number)?;

  info!("Created {local_branch} from {remote}/{}", pr.head.ref_name);
  Ok(CheckoutOutcome {
    branch: local_branch.to_string(),
    action: CheckoutAction::CreatedFromFork { remote },
  })
}

/// Remote for the pull request's head repository: an existing remote with an
/// equivalent URL, or one named after the fork owner.
async fn ensure_fork_remote<R, T>(repo: &R, transport: &T, pr: &PullRequestRef) -> Result<String>
where
  R: LocalRepository + ?Sized,
  T: RemoteTransport + ?Sized,
{
  if let Some(remote) = find_remote_for(repo, &pr.head.clone_url)? {
    debug!("Reusing remote {} for {}", remote.name, pr.head.clone_url);
    return Ok(remote.name);
  }

  let name = fork_remote_name(&pr.head.owner);
  transport.set_remote(&name, &pr.head.clone_url).await?;
  Ok(name)
}

/// Remote name for a fork owner. Never `origin`, whose URL must not be
/// repointed at a fork.
fn fork_remote_name(owner: &str) -> String {
  let name: String = owner
    .chars()
    .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
    .collect();

  match name.trim_matches('-') {
    "" => "fork".to_string(),
    ORIGIN => format!("{ORIGIN}-fork"),
    trimmed => trimmed.to_string(),
  }
}

/// Switch to the local branch associated with `pr`.
///
/// `origin` is fetched first. When the branch is missing locally it is created
/// from `refs/remotes/origin/<branch>` with tracking; when that ref is missing
/// too nothing is changed and [`SyncError::NoAssociatedBranch`] is returned.
#[instrument(skip_all, fields(pr = pr.number), level = "debug")]
pub async fn switch_to_branch<R, T>(repo: &R, transport: &T, pr: &PullRequestRef) -> Result<String>
where
  R: LocalRepository + ?Sized,
  T: RemoteTransport + ?Sized,
{
  ensure_clean(repo)?;

  let Some(branch) = local_branches_for(repo, pr)?.into_iter().next() else {
    return Err(SyncError::NoAssociatedBranch {
      reference: format!("pull request #{}", pr.number),
    });
  };

  transport.fetch(ORIGIN).await?;

  if repo.find_branch(&branch)?.is_none() && !create_tracking_branch(repo, ORIGIN, &branch)? {
    return Err(SyncError::NoAssociatedBranch {
      reference: TrackingRef::new(ORIGIN, &branch).remote_ref(),
    });
  }

  repo.checkout(&branch)?;
  info!("Switched to {branch}");
  Ok(branch)
}

/// Plan and execute in one step.
pub async fn sync_pull_request<R, T>(repo: &R, transport: &T, pr: &PullRequestRef) -> Result<CheckoutOutcome>
where
  R: LocalRepository + ?Sized,
  T: RemoteTransport + ?Sized,
{
  match plan_checkout(repo, pr)? {
    CheckoutPlan::AlreadyCurrent { branch } => Ok(CheckoutOutcome {
      branch,
      action: CheckoutAction::AlreadyCurrent,
    }),
    CheckoutPlan::SwitchToExisting { .. } => {
      let branch = switch_to_branch(repo, transport, pr).await?;
      Ok(CheckoutOutcome {
        branch,
        action: CheckoutAction::SwitchedToExisting,
      })
    }
    CheckoutPlan::CreateFromSameRepository { branch } | CheckoutPlan::CreateFromFork { branch } => {
      checkout_pull_request(repo, transport, pr, &branch).await
    }
  }
}

#[cfg(test)]
mod tests {
  use prsync_test_utils::git::{
    BareRemoteGuard, GitRepoTestGuard, checkout_branch, create_branch, create_commit, publish_branch_commit,
  };
  use prsync_test_utils::pull_request_json;

  use super::*;
  use crate::marker::{marker_key, scan_markers};
  use crate::repository::GitRepository;
  use crate::transport::Git2Transport;

  struct Fixture {
    origin: BareRemoteGuard,
    fork: BareRemoteGuard,
    local: GitRepoTestGuard,
    repo: GitRepository,
    transport: Git2Transport,
  }

  impl Fixture {
    fn new() -> Self {
      let origin = BareRemoteGuard::new();
      let fork = BareRemoteGuard::new();
      let local = GitRepoTestGuard::with_origin(&origin);
      let repo = GitRepository::discover(local.path()).unwrap();
      let transport = Git2Transport::new(local.path());
      Self {
        origin,
        fork,
        local,
        repo,
        transport,
      }
    }

    fn fork_pr(&self, number: u32, title: &str, head_ref: &str, sha: &str) -> PullRequestRef {
      serde_json::from_value(pull_request_json(number, title, head_ref, sha, &self.fork.url(), "contributor")).unwrap()
    }

    fn same_repo_pr(&self, number: u32, head_ref: &str, sha: &str) -> PullRequestRef {
      serde_json::from_value(pull_request_json(number, "Same repo", head_ref, sha, &self.origin.url(), "owner")).unwrap()
    }

    fn current(&self) -> String {
      self.repo.current_branch().unwrap().unwrap().name
    }
  }

  #[test]
  fn plan_for_same_repository_without_local_branch() {
    let fx = Fixture::new();
    let pr = fx.same_repo_pr(3, "feature/x", "");

    assert_eq!(
      plan_checkout(&fx.repo, &pr).unwrap(),
      CheckoutPlan::CreateFromSameRepository {
        branch: "feature/x".to_string()
      }
    );
  }

  #[test]
  fn plan_for_same_repository_with_local_branch() {
    let fx = Fixture::new();
    create_branch(&fx.local.repo, "feature/x", None).unwrap();
    let pr = fx.same_repo_pr(3, "feature/x", "");

    assert_eq!(
      plan_checkout(&fx.repo, &pr).unwrap(),
      CheckoutPlan::SwitchToExisting {
        branch: "feature/x".to_string()
      }
    );

    checkout_branch(&fx.local.repo, "feature/x").unwrap();
    assert_eq!(
      plan_checkout(&fx.repo, &pr).unwrap(),
      CheckoutPlan::AlreadyCurrent {
        branch: "feature/x".to_string()
      }
    );
  }

  #[test]
  fn plan_for_new_fork_synthesizes_unique_name() {
    let fx = Fixture::new();
    create_branch(&fx.local.repo, "pr/8-fix-it", None).unwrap();
    let pr = fx.fork_pr(8, "Fix it!", "main", "");

    assert_eq!(
      plan_checkout(&fx.repo, &pr).unwrap(),
      CheckoutPlan::CreateFromFork {
        branch: "pr/8-fix-it-2".to_string()
      }
    );
  }

  #[tokio::test]
  async fn fork_checkout_then_resolve_round_trip() {
    let fx = Fixture::new();
    let sha = publish_branch_commit(&fx.local.repo, &fx.fork.url(), "main", "fork.txt", "fork\n").unwrap();
    let pr = fx.fork_pr(12, "Fork change", "main", &sha);

    let plan = plan_checkout(&fx.repo, &pr).unwrap();
    let outcome = checkout_pull_request(&fx.repo, &fx.transport, &pr, plan.branch())
      .await
      .unwrap();

    assert_eq!(outcome.branch, "pr/12-fork-change");
    assert_eq!(
      outcome.action,
      CheckoutAction::CreatedFromFork {
        remote: "contributor".to_string()
      }
    );
    assert_eq!(fx.current(), "pr/12-fork-change");
    assert_eq!(fx.repo.head_commit().unwrap(), Some(sha));
    assert!(fx.local.path().join("fork.txt").exists());

    let record = fx.repo.find_branch("pr/12-fork-change").unwrap().unwrap();
    assert_eq!(record.upstream, Some(TrackingRef::new("contributor", "main")));
    assert_eq!(
      fx.repo.config_value(&marker_key("pr/12-fork-change")).unwrap().as_deref(),
      Some("12")
    );

    assert_eq!(
      local_branches_for(&fx.repo, &pr).unwrap(),
      vec!["pr/12-fork-change".to_string()]
    );
    assert_eq!(
      plan_checkout(&fx.repo, &pr).unwrap(),
      CheckoutPlan::AlreadyCurrent {
        branch: "pr/12-fork-change".to_string()
      }
    );
  }

  #[tokio::test]
  async fn fork_checkout_reuses_remote_with_equivalent_url() {
    let fx = Fixture::new();
    fx.local.repo.remote("friend", &format!("{}.git", fx.fork.url())).unwrap();
    let sha = publish_branch_commit(&fx.local.repo, &fx.fork.url(), "topic", "topic.txt", "topic\n").unwrap();
    let pr = fx.fork_pr(4, "Topic", "topic", &sha);

    let outcome = sync_pull_request(&fx.repo, &fx.transport, &pr).await.unwrap();

    assert_eq!(
      outcome.action,
      CheckoutAction::CreatedFromFork {
        remote: "friend".to_string()
      }
    );
    assert!(fx.local.repo.find_remote("contributor").is_err());
  }

  #[tokio::test]
  async fn same_repository_checkout_creates_tracking_branch_without_marker() {
    let fx = Fixture::new();
    let sha = publish_branch_commit(&fx.local.repo, &fx.origin.url(), "feature/x", "x.txt", "x\n").unwrap();
    let pr = fx.same_repo_pr(3, "feature/x", &sha);

    let outcome = sync_pull_request(&fx.repo, &fx.transport, &pr).await.unwrap();

    assert_eq!(
      outcome,
      CheckoutOutcome {
        branch: "feature/x".to_string(),
        action: CheckoutAction::CreatedFromRemote {
          remote: "origin".to_string()
        },
      }
    );
    assert_eq!(fx.current(), "feature/x");
    let record = fx.repo.find_branch("feature/x").unwrap().unwrap();
    assert_eq!(record.upstream, Some(TrackingRef::new("origin", "feature/x")));
    assert!(scan_markers(&fx.repo).unwrap().is_empty());
  }

  #[tokio::test]
  async fn same_repository_checkout_of_missing_remote_branch_fails() {
    let fx = Fixture::new();
    let pr = fx.same_repo_pr(3, "does-not-exist", "");

    let err = sync_pull_request(&fx.repo, &fx.transport, &pr).await.unwrap_err();

    assert!(matches!(err, SyncError::NoAssociatedBranch { .. }));
    assert_eq!(fx.current(), "main");
    assert!(fx.repo.find_branch("does-not-exist").unwrap().is_none());
  }

  #[tokio::test]
  async fn dirty_tree_blocks_checkout_before_any_mutation() {
    let fx = Fixture::new();
    let sha = publish_branch_commit(&fx.local.repo, &fx.fork.url(), "main", "fork.txt", "fork\n").unwrap();
    let pr = fx.fork_pr(12, "Fork change", "main", &sha);
    std::fs::write(fx.local.path().join("README.md"), "edited\n").unwrap();

    assert_eq!(checkout_state(&fx.repo).unwrap(), CheckoutState::BlockedByChanges);
    let err = checkout_pull_request(&fx.repo, &fx.transport, &pr, "pr/12-fork-change")
      .await
      .unwrap_err();

    assert!(matches!(err, SyncError::DirtyWorkingTree));
    assert!(fx.local.repo.find_remote("contributor").is_err());
    assert!(fx.repo.find_branch("pr/12-fork-change").unwrap().is_none());
    assert!(scan_markers(&fx.repo).unwrap().is_empty());
  }

  #[tokio::test]
  async fn switch_with_stale_marker_changes_nothing() {
    let fx = Fixture::new();
    let pr = fx.fork_pr(7, "Gone", "gone", "");
    mark_branch(&fx.repo, "pr/7-gone", 7).unwrap();
    let head_before = fx.repo.head_commit().unwrap();
    let config_before = fx.repo.config_entries().unwrap();

    assert_eq!(
      plan_checkout(&fx.repo, &pr).unwrap(),
      CheckoutPlan::SwitchToExisting {
        branch: "pr/7-gone".to_string()
      }
    );
    let err = switch_to_branch(&fx.repo, &fx.transport, &pr).await.unwrap_err();

    assert!(
      matches!(&err, SyncError::NoAssociatedBranch { reference } if reference == "refs/remotes/origin/pr/7-gone")
    );
    assert_eq!(fx.current(), "main");
    assert_eq!(fx.repo.head_commit().unwrap(), head_before);
    assert!(fx.repo.find_branch("pr/7-gone").unwrap().is_none());
    assert_eq!(fx.repo.config_entries().unwrap(), config_before);
  }

  #[tokio::test]
  async fn switch_without_any_association_fails() {
    let fx = Fixture::new();
    let pr = fx.fork_pr(30, "Unknown", "topic", "");

    let err = switch_to_branch(&fx.repo, &fx.transport, &pr).await.unwrap_err();
    assert!(matches!(err, SyncError::NoAssociatedBranch { .. }));
  }

  #[tokio::test]
  async fn switch_returns_to_existing_marked_branch() {
    let fx = Fixture::new();
    let sha = publish_branch_commit(&fx.local.repo, &fx.fork.url(), "main", "fork.txt", "fork\n").unwrap();
    let pr = fx.fork_pr(12, "Fork change", "main", &sha);
    sync_pull_request(&fx.repo, &fx.transport, &pr).await.unwrap();
    checkout_branch(&fx.local.repo, "main").unwrap();

    let outcome = sync_pull_request(&fx.repo, &fx.transport, &pr).await.unwrap();

    assert_eq!(outcome.action, CheckoutAction::SwitchedToExisting);
    assert_eq!(fx.current(), "pr/12-fork-change");
  }

  #[test]
  fn fork_remote_names_are_sanitized() {
    assert_eq!(fork_remote_name("contributor"), "contributor");
    assert_eq!(fork_remote_name("some user"), "some-user");
    assert_eq!(fork_remote_name("origin"), "origin-fork");
    assert_eq!(fork_remote_name("???"), "fork");
  }

  #[test]
  fn committed_changes_do_not_block() {
    let fx = Fixture::new();
    create_commit(&fx.local.repo, "README.md", "updated\n", "update readme").unwrap();
    assert_eq!(checkout_state(&fx.repo).unwrap(), CheckoutState::Available);
  }
}
