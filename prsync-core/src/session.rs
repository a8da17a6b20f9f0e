//! # Repository Session
//!
//! Entry point that binds a local repository, its transport and the user's
//! settings, and serializes mutating workflows per repository.
//!
//! Two sessions opened on the same working tree share one lock, so a
//! checkout cannot interleave with a pull or a publish in the same process.
//! Read-only queries do not take the lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, PoisonError, Weak};

use tokio::sync::Mutex;

use crate::checkout::{self, CheckoutOutcome, CheckoutPlan, CheckoutState};
use crate::config::SyncSettings;
use crate::divergence::{self, DivergenceState, PullOutcome};
use crate::error::Result;
use crate::extract::{self, DiffFiles};
use crate::marker;
use crate::naming::default_branch_name;
use crate::publish::{self, CreatedPullRequest, PublishServices, PullRequestDraft};
use crate::pull_request::PullRequestRef;
use crate::repository::{GitRepository, LocalRepository};
use crate::resolver;
use crate::transport::{Git2Transport, RemoteTransport};

type RepositoryLock = Arc<Mutex<()>>;

static REPOSITORY_LOCKS: LazyLock<std::sync::Mutex<HashMap<PathBuf, Weak<Mutex<()>>>>> =
  LazyLock::new(|| std::sync::Mutex::new(HashMap::new()));

/// Lock shared by every session on the working tree at `path`.
fn repository_lock(path: &Path) -> RepositoryLock {
  let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
  let mut locks = REPOSITORY_LOCKS.lock().unwrap_or_else(PoisonError::into_inner);
  locks.retain(|_, lock| lock.strong_count() > 0);

  if let Some(lock) = locks.get(&key).and_then(Weak::upgrade) {
    return lock;
  }

  let lock = Arc::new(Mutex::new(()));
  locks.insert(key, Arc::downgrade(&lock));
  lock
}

pub struct RepositorySession<R = GitRepository, T = Git2Transport> {
  repo: R,
  transport: T,
  settings: SyncSettings,
  lock: RepositoryLock,
}

impl RepositorySession {
  /// Open the repository containing `path` with the git2 backends.
  pub fn open(path: impl AsRef<Path>, settings: SyncSettings) -> Result<Self> {
    let repo = GitRepository::discover(path)?;
    let transport = Git2Transport::new(repo.workdir()).with_timeout(settings.network_timeout());
    Ok(Self::new(repo, transport, settings))
  }
}

impl<R: LocalRepository, T: RemoteTransport> RepositorySession<R, T> {
  pub fn new(repo: R, transport: T, settings: SyncSettings) -> Self {
    let lock = repository_lock(repo.workdir());
    Self {
      repo,
      transport,
      settings,
      lock,
    }
  }

  pub fn repository(&self) -> &R {
    &self.repo
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  pub fn settings(&self) -> &SyncSettings {
    &self.settings
  }

  pub fn is_from_fork(&self, pr: &PullRequestRef) -> Result<bool> {
    resolver::is_from_fork(&self.repo, pr)
  }

  pub fn local_branches_for(&self, pr: &PullRequestRef) -> Result<Vec<String>> {
    resolver::local_branches_for(&self.repo, pr)
  }

  /// Name a new branch for `pr` would get in this repository.
  pub fn default_branch_name(&self, pr: &PullRequestRef) -> Result<String> {
    let existing: Vec<String> = self.repo.local_branches()?.into_iter().map(|b| b.name).collect();
    Ok(default_branch_name(pr, &existing))
  }

  pub fn plan_checkout(&self, pr: &PullRequestRef) -> Result<CheckoutPlan> {
    checkout::plan_checkout(&self.repo, pr)
  }

  pub fn checkout_state(&self) -> Result<CheckoutState> {
    checkout::checkout_state(&self.repo)
  }

  pub async fn checkout(&self, pr: &PullRequestRef, local_branch: &str) -> Result<CheckoutOutcome> {
    let _guard = self.lock.lock().await;
    checkout::checkout_pull_request(&self.repo, &self.transport, pr, local_branch).await
  }

  pub async fn switch_to_branch(&self, pr: &PullRequestRef) -> Result<String> {
    let _guard = self.lock.lock().await;
    checkout::switch_to_branch(&self.repo, &self.transport, pr).await
  }

  /// Plan and carry out the checkout of `pr`.
  pub async fn sync(&self, pr: &PullRequestRef) -> Result<CheckoutOutcome> {
    let _guard = self.lock.lock().await;
    checkout::sync_pull_request(&self.repo, &self.transport, pr).await
  }

  pub async fn calculate_divergence(&self) -> Result<DivergenceState> {
    let _guard = self.lock.lock().await;
    divergence::calculate_divergence(&self.repo, &self.transport).await
  }

  pub async fn pull(&self) -> Result<PullOutcome> {
    let _guard = self.lock.lock().await;
    divergence::pull(&self.repo, &self.transport).await
  }

  pub async fn push(&self) -> Result<()> {
    let _guard = self.lock.lock().await;
    divergence::push(&self.repo, &self.transport).await
  }

  pub async fn extract_file(&self, commit: &str, path: &Path) -> Result<Option<Vec<u8>>> {
    let _guard = self.lock.lock().await;
    extract::extract_file(&self.repo, &self.transport, commit, path).await
  }

  /// Extract into the configured directory, or `fallback` when none is set.
  pub async fn extract_file_to_disk(&self, commit: &str, path: &Path, fallback: &Path) -> Result<Option<PathBuf>> {
    let directory = self.settings.extract_dir.as_deref().unwrap_or(fallback);
    let _guard = self.lock.lock().await;
    extract::extract_file_to_disk(&self.repo, &self.transport, commit, path, directory).await
  }

  pub async fn extract_diff_files(&self, pr: &PullRequestRef, path: &Path) -> Result<DiffFiles> {
    let _guard = self.lock.lock().await;
    extract::extract_diff_files(&self.repo, &self.transport, pr, path).await
  }

  pub async fn push_and_create_pull_request(
    &self,
    draft: &PullRequestDraft,
    services: &PublishServices<'_>,
  ) -> Result<CreatedPullRequest> {
    let _guard = self.lock.lock().await;
    publish::push_and_create_pull_request(&self.repo, &self.transport, draft, services).await
  }

  /// Clear the pull request marker of the checked-out branch.
  pub async fn unmark_current_branch(&self) -> Result<Option<String>> {
    let _guard = self.lock.lock().await;
    marker::unmark_current_branch(&self.repo)
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use prsync_test_utils::git::{BareRemoteGuard, GitRepoTestGuard, publish_branch_commit};
  use prsync_test_utils::pull_request_json;

  use super::*;

  #[test]
  fn sessions_on_one_repository_share_a_lock() {
    let origin = BareRemoteGuard::new();
    let local = GitRepoTestGuard::with_origin(&origin);

    let first = RepositorySession::open(local.path(), SyncSettings::default()).unwrap();
    let second = RepositorySession::open(local.path().join("."), SyncSettings::default()).unwrap();

    assert!(Arc::ptr_eq(&first.lock, &second.lock));
  }

  #[tokio::test]
  async fn mutating_workflows_wait_for_the_lock() {
    let origin = BareRemoteGuard::new();
    let local = GitRepoTestGuard::with_origin(&origin);
    let session = RepositorySession::open(local.path(), SyncSettings::default()).unwrap();
    let other = RepositorySession::open(local.path(), SyncSettings::default()).unwrap();

    let held = other.lock.lock().await;
    let blocked = tokio::time::timeout(Duration::from_millis(50), session.unmark_current_branch()).await;
    assert!(blocked.is_err());

    drop(held);
    assert_eq!(session.unmark_current_branch().await.unwrap(), None);
  }

  #[tokio::test]
  async fn sync_checks_out_fork_pull_request_end_to_end() {
    let origin = BareRemoteGuard::new();
    let fork = BareRemoteGuard::new();
    let local = GitRepoTestGuard::with_origin(&origin);
    let sha = publish_branch_commit(&local.repo, &fork.url(), "topic", "topic.txt", "topic\n").unwrap();
    let pr: PullRequestRef =
      serde_json::from_value(pull_request_json(21, "Topic work", "topic", &sha, &fork.url(), "contributor")).unwrap();

    let session = RepositorySession::open(local.path(), SyncSettings::default()).unwrap();
    assert!(session.is_from_fork(&pr).unwrap());
    assert_eq!(session.default_branch_name(&pr).unwrap(), "pr/21-topic-work");

    let outcome = session.sync(&pr).await.unwrap();
    assert_eq!(outcome.branch, "pr/21-topic-work");
    assert_eq!(
      session.plan_checkout(&pr).unwrap(),
      CheckoutPlan::AlreadyCurrent {
        branch: "pr/21-topic-work".to_string()
      }
    );
    assert!(session.calculate_divergence().await.unwrap().is_up_to_date());

    assert_eq!(
      session.unmark_current_branch().await.unwrap().as_deref(),
      Some("pr/21-topic-work")
    );
    assert!(session.local_branches_for(&pr).unwrap().is_empty());
  }
}
