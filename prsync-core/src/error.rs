//! Error types surfaced by the synchronization engine.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Convenience alias used throughout the engine.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Failures produced while reconciling a pull request with a local repository.
///
/// Git-mutating failures are surfaced unmodified so callers can report the
/// exact message of the step that failed.
#[derive(Debug, Error)]
pub enum SyncError {
  /// A marker or pull request references a branch that exists neither locally
  /// nor as a remote-tracking ref.
  #[error("No branch associated with this pull request: could not find '{reference}'")]
  NoAssociatedBranch { reference: String },

  #[error("Branch '{0}' not found")]
  BranchNotFound(String),

  #[error("Remote '{0}' not found")]
  RemoteNotFound(String),

  #[error("Branch '{0}' has no upstream tracking branch")]
  NoUpstream(String),

  #[error("HEAD is not on a branch")]
  DetachedHead,

  #[error("Branch '{0}' has no commits yet")]
  UnbornBranch(String),

  #[error("Working tree has uncommitted changes")]
  DirtyWorkingTree,

  #[error("Cannot fast-forward '{branch}' to its upstream; the branches have diverged")]
  NotFastForward { branch: String },

  #[error("Invalid commit id '{0}'")]
  InvalidCommit(String),

  #[error("Not a git repository: {}", .0.display())]
  NotARepository(PathBuf),

  #[error("Failed to fetch from remote '{remote}': {source}")]
  Fetch {
    remote: String,
    #[source]
    source: git2::Error,
  },

  #[error("Failed to push '{branch}' to remote '{remote}': {message}")]
  Push {
    branch: String,
    remote: String,
    message: String,
  },

  #[error("{operation} timed out after {after:?}")]
  Timeout { operation: String, after: Duration },

  #[error("Failed to create pull request: {0:#}")]
  Creation(anyhow::Error),

  #[error(transparent)]
  Git(#[from] git2::Error),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error("Background git task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

impl SyncError {
  /// Whether the error signals a missing branch association rather than an
  /// I/O or transport problem.
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::NoAssociatedBranch { .. } | Self::BranchNotFound(_) | Self::RemoteNotFound(_)
    )
  }
}
