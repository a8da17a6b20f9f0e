//! Divergence between the checked-out branch and its upstream, and the pull
//! and push actions it gates.

use std::fmt;

use tracing::{info, instrument};

use crate::error::{Result, SyncError};
use crate::repository::{LocalBranchRecord, LocalRepository, TrackingRef};
use crate::transport::RemoteTransport;

/// Commits the local branch has that its upstream lacks, and vice versa.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DivergenceState {
  pub ahead: usize,
  pub behind: usize,
}

/// Why an action is not offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledReason {
  NothingToPull,
  NothingToPush,
  MustPullFirst,
}

impl fmt::Display for DisabledReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::NothingToPull => "No commits to pull",
      Self::NothingToPush => "No commits to push",
      Self::MustPullFirst => "You must pull before you can push",
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
  Enabled,
  Disabled(DisabledReason),
}

impl ActionState {
  pub fn is_enabled(&self) -> bool {
    matches!(self, Self::Enabled)
  }
}

impl DivergenceState {
  pub fn is_up_to_date(&self) -> bool {
    self.ahead == 0 && self.behind == 0
  }

  pub fn pull_state(&self) -> ActionState {
    if self.behind == 0 {
      ActionState::Disabled(DisabledReason::NothingToPull)
    } else {
      ActionState::Enabled
    }
  }

  /// Pushing is blocked while behind, even when there are local commits.
  pub fn push_state(&self) -> ActionState {
    if self.behind > 0 {
      ActionState::Disabled(DisabledReason::MustPullFirst)
    } else if self.ahead == 0 {
      ActionState::Disabled(DisabledReason::NothingToPush)
    } else {
      ActionState::Enabled
    }
  }
}

impl fmt::Display for DivergenceState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ahead, {} behind", self.ahead, self.behind)
  }
}

/// Result of a pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
  UpToDate,
  FastForwarded { commits: usize },
}

fn current_with_upstream<R: LocalRepository + ?Sized>(repo: &R) -> Result<(LocalBranchRecord, TrackingRef)> {
  let branch = repo.require_current_branch()?;
  let upstream = branch
    .upstream
    .clone()
    .ok_or_else(|| SyncError::NoUpstream(branch.name.clone()))?;
  Ok((branch, upstream))
}

async fn refresh<R, T>(repo: &R, transport: &T, branch: &str, upstream: &TrackingRef) -> Result<DivergenceState>
where
  R: LocalRepository + ?Sized,
  T: RemoteTransport + ?Sized,
{
  transport.fetch(&upstream.remote).await?;

  let (ahead, behind) = repo
    .ahead_behind(branch)?
    .ok_or_else(|| SyncError::NoAssociatedBranch {
      reference: upstream.remote_ref(),
    })?;
  Ok(DivergenceState { ahead, behind })
}

/// Fetch the upstream's remote, then count commits ahead and behind.
#[instrument(skip_all, level = "debug")]
pub async fn calculate_divergence<R, T>(repo: &R, transport: &T) -> Result<DivergenceState>
where
  R: LocalRepository + ?Sized,
  T: RemoteTransport + ?Sized,
{
  let (branch, upstream) = current_with_upstream(repo)?;
  refresh(repo, transport, &branch.name, &upstream).await
}

/// Fast-forward the checked-out branch to its upstream.
#[instrument(skip_all, level = "debug")]
pub async fn pull<R, T>(repo: &R, transport: &T) -> Result<PullOutcome>
where
  R: LocalRepository + ?Sized,
  T: RemoteTransport + ?Sized,
{
  let (branch, upstream) = current_with_upstream(repo)?;
  let divergence = refresh(repo, transport, &branch.name, &upstream).await?;

  if divergence.behind == 0 {
    return Ok(PullOutcome::UpToDate);
  }
  if divergence.ahead > 0 {
    return Err(SyncError::NotFastForward { branch: branch.name });
  }
  if repo.is_dirty()? {
    return Err(SyncError::DirtyWorkingTree);
  }

  let target = repo
    .remote_branch_tip(&upstream.remote, &upstream.branch)?
    .ok_or_else(|| SyncError::NoAssociatedBranch {
      reference: upstream.remote_ref(),
    })?;
  repo.fast_forward(&branch.name, &target)?;

  info!("Fast-forwarded {} by {} commits", branch.name, divergence.behind);
  Ok(PullOutcome::FastForwarded {
    commits: divergence.behind,
  })
}

/// Push the checked-out branch to its upstream's remote.
#[instrument(skip_all, level = "debug")]
pub async fn push<R, T>(repo: &R, transport: &T) -> Result<()>
where
  R: LocalRepository + ?Sized,
  T: RemoteTransport + ?Sized,
{
  let (branch, upstream) = current_with_upstream(repo)?;
  transport.push(&branch.name, &upstream.remote).await
}
