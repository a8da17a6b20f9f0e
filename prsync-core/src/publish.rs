//! # Publishing
//!
//! Push a branch and open a pull request for it.
//!
//! The hosting service is reached only through the [`PullRequestCreator`],
//! [`RemoteBranchProbe`] and [`UsageTracker`] traits so the workflow can run
//! against any API client. Between the push and the creation request the
//! workflow waits until the pushed branch is visible remotely; see
//! [`RemoteVisibility`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::consts::ORIGIN;
use crate::error::{Result, SyncError};
use crate::repository::{LocalRepository, TrackingRef};
use crate::transport::RemoteTransport;
use crate::url::GitHubRepo;

/// Everything needed to open a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDraft {
  /// Repository the branch is pushed to.
  pub source_repository: GitHubRepo,
  pub source_branch: String,
  /// Repository the pull request is opened against.
  pub target_repository: GitHubRepo,
  pub target_branch: String,
  pub title: String,
  pub body: String,
}

impl PullRequestDraft {
  /// Head reference in the form the hosting API expects: the bare branch name
  /// for same-repository pull requests, `owner:branch` otherwise.
  pub fn head_reference(&self) -> String {
    if self.source_repository == self.target_repository {
      self.source_branch.clone()
    } else {
      format!("{}:{}", self.source_repository.owner, self.source_branch)
    }
  }
}

/// A pull request the hosting service accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPullRequest {
  pub number: u32,
  pub url: String,
}

#[async_trait]
pub trait PullRequestCreator: Send + Sync {
  async fn create_pull_request(&self, draft: &PullRequestDraft) -> anyhow::Result<CreatedPullRequest>;
}

/// Asks the hosting service whether a branch exists yet.
#[async_trait]
pub trait RemoteBranchProbe: Send + Sync {
  async fn branch_exists(&self, repository: &GitHubRepo, branch: &str) -> anyhow::Result<bool>;
}

/// Records that a pull request was created.
#[async_trait]
pub trait UsageTracker: Send + Sync {
  async fn increment_pull_requests_created(&self) -> anyhow::Result<()>;
}

/// How to wait for a pushed branch to become visible to the hosting API.
pub enum RemoteVisibility<'a> {
  /// Do not wait.
  Skip,
  /// Sleep for a fixed time.
  Delay(Duration),
  /// Ask `probe` every `interval`, at most `max_attempts` times, then proceed
  /// regardless.
  Poll {
    probe: &'a dyn RemoteBranchProbe,
    interval: Duration,
    max_attempts: u32,
  },
}

/// Collaborators of [`push_and_create_pull_request`].
pub struct PublishServices<'a> {
  pub creator: &'a dyn PullRequestCreator,
  pub usage: &'a dyn UsageTracker,
  pub visibility: RemoteVisibility<'a>,
}

/// Push `draft.source_branch` and open a pull request for it.
///
/// The branch is pushed to an HTTP remote for `origin` and given that remote
/// as upstream when it has none. If creation fails the push is not undone.
/// A failure to record usage is logged and otherwise ignored.
#[instrument(skip_all, fields(branch = %draft.source_branch), level = "debug")]
pub async fn push_and_create_pull_request<R, T>(
  repo: &R,
  transport: &T,
  draft: &PullRequestDraft,
  services: &PublishServices<'_>,
) -> Result<CreatedPullRequest>
where
  R: LocalRepository + ?Sized,
  T: RemoteTransport + ?Sized,
{
  let branch = repo
    .find_branch(&draft.source_branch)?
    .ok_or_else(|| SyncError::BranchNotFound(draft.source_branch.clone()))?;

  let remote = transport.resolve_http_remote(ORIGIN).await?;
  transport.push(&branch.name, &remote).await?;

  if branch.upstream.is_none() {
    repo.set_tracking(&branch.name, &TrackingRef::new(&remote, &branch.name))?;
    debug!("Set upstream of {} to {remote}/{}", branch.name, branch.name);
  }

  wait_for_remote_branch(&services.visibility, &draft.source_repository, &draft.source_branch).await;

  let created = services
    .creator
    .create_pull_request(draft)
    .await
    .map_err(SyncError::Creation)?;
  info!("Created pull request #{} at {}", created.number, created.url);

  if let Err(err) = services.usage.increment_pull_requests_created().await {
    warn!("Failed to record pull request creation: {err:#}");
  }

  Ok(created)
}

async fn wait_for_remote_branch(visibility: &RemoteVisibility<'_>, repository: &GitHubRepo, branch: &str) {
  match visibility {
    RemoteVisibility::Skip => {}
    RemoteVisibility::Delay(delay) => tokio::time::sleep(*delay).await,
    RemoteVisibility::Poll {
      probe,
      interval,
      max_attempts,
    } => {
      for attempt in 1..=*max_attempts {
        match probe.branch_exists(repository, branch).await {
          Ok(true) => {
            debug!("{repository}:{branch} visible after {attempt} attempts");
            return;
          }
          Ok(false) => debug!("{repository}:{branch} not visible yet (attempt {attempt})"),
          Err(err) => debug!("Branch probe failed on attempt {attempt}: {err:#}"),
        }
        if attempt < *max_attempts {
          tokio::time::sleep(*interval).await;
        }
      }
      warn!("{repository}:{branch} is not visible yet; creating the pull request anyway");
    }
  }
}
