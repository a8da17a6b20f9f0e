//! Local repository abstraction and its git2 implementation.
//!
//! Everything the engine needs to know about the working copy goes through
//! [`LocalRepository`]: branches, remotes, config, working tree status and
//! blob lookups. Nothing here talks to the network; that is the job of
//! [`crate::transport::RemoteTransport`].

use std::fmt;
use std::path::{Path, PathBuf};

use git2::{BranchType, ConfigLevel, ErrorCode, Oid, Repository, StatusOptions};
use tracing::{debug, instrument};

use crate::error::{Result, SyncError};

/// Upstream of a local branch, `refs/remotes/<remote>/<branch>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingRef {
  pub remote: String,
  /// Branch name on the remote, without the `refs/heads/` prefix.
  pub branch: String,
}

impl TrackingRef {
  pub fn new(remote: impl Into<String>, branch: impl Into<String>) -> Self {
    Self {
      remote: remote.into(),
      branch: branch.into(),
    }
  }

  /// Fully qualified remote-tracking reference.
  pub fn remote_ref(&self) -> String {
    format!("refs/remotes/{}/{}", self.remote, self.branch)
  }
}

impl fmt::Display for TrackingRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.remote, self.branch)
  }
}

/// Snapshot of a local branch, read live from the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalBranchRecord {
  pub name: String,
  pub upstream: Option<TrackingRef>,
  /// Tip commit id, `None` for an unborn branch.
  pub head: Option<String>,
}

/// A configured remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
  pub name: String,
  pub url: Option<String>,
}

/// Operations the engine performs against a local working copy.
pub trait LocalRepository: Send + Sync {
  /// Root of the working tree.
  fn workdir(&self) -> &Path;

  fn remotes(&self) -> Result<Vec<RemoteRecord>>;

  /// URL of the named remote, `None` when the remote does not exist.
  fn remote_url(&self, remote: &str) -> Result<Option<String>>;

  fn add_remote(&self, name: &str, url: &str) -> Result<()>;

  fn local_branches(&self) -> Result<Vec<LocalBranchRecord>>;

  fn find_branch(&self, name: &str) -> Result<Option<LocalBranchRecord>>;

  /// Branch HEAD points at, `None` for a detached or unborn HEAD.
  fn current_branch(&self) -> Result<Option<LocalBranchRecord>>;

  /// Name of the branch HEAD points at while that branch has no commits.
  fn unborn_branch(&self) -> Result<Option<String>>;

  /// Like [`LocalRepository::current_branch`], with a detached or unborn HEAD
  /// reported as an error.
  fn require_current_branch(&self) -> Result<LocalBranchRecord> {
    if let Some(branch) = self.current_branch()? {
      return Ok(branch);
    }
    match self.unborn_branch()? {
      Some(name) => Err(SyncError::UnbornBranch(name)),
      None => Err(SyncError::DetachedHead),
    }
  }

  fn head_commit(&self) -> Result<Option<String>>;

  /// Whether tracked files have staged or unstaged modifications. Untracked
  /// files do not count.
  fn is_dirty(&self) -> Result<bool>;

  /// Every `(key, value)` pair of the repository's local config file.
  fn config_entries(&self) -> Result<Vec<(String, String)>>;

  fn config_value(&self, key: &str) -> Result<Option<String>>;

  fn set_config(&self, key: &str, value: &str) -> Result<()>;

  /// Remove a local config key. Returns `false` when the key was absent.
  fn unset_config(&self, key: &str) -> Result<bool>;

  /// Tip of `refs/remotes/<remote>/<branch>`, if that ref exists.
  fn remote_branch_tip(&self, remote: &str, branch: &str) -> Result<Option<String>>;

  fn has_commit(&self, commit: &str) -> Result<bool>;

  fn create_branch(&self, name: &str, commit: &str) -> Result<()>;

  fn set_tracking(&self, branch: &str, upstream: &TrackingRef) -> Result<()>;

  /// Check out an existing local branch, updating index and working tree.
  fn checkout(&self, branch: &str) -> Result<()>;

  /// `(ahead, behind)` of a branch relative to its upstream. `None` when the
  /// branch has no upstream or the remote-tracking ref is missing.
  fn ahead_behind(&self, branch: &str) -> Result<Option<(usize, usize)>>;

  /// Move the checked-out branch forward to `commit`.
  fn fast_forward(&self, branch: &str, commit: &str) -> Result<()>;

  /// Blob content of `path` at `commit`. `None` when the path does not exist
  /// in that commit or names a directory.
  fn read_blob(&self, commit: &str, path: &Path) -> Result<Option<Vec<u8>>>;
}

/// [`LocalRepository`] backed by libgit2.
///
/// The repository is reopened for every operation so that changes made by
/// other handles (the transport, the user's own git) are always observed.
#[derive(Debug, Clone)]
pub struct GitRepository {
  workdir: PathBuf,
}

impl GitRepository {
  /// Discover the repository containing `path`.
  pub fn discover(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let repo = match Repository::discover(path) {
      Ok(repo) => repo,
      Err(err) if err.code() == ErrorCode::NotFound => return Err(SyncError::NotARepository(path.to_path_buf())),
      Err(err) => return Err(err.into()),
    };

    let workdir = repo
      .workdir()
      .ok_or_else(|| SyncError::NotARepository(path.to_path_buf()))?
      .to_path_buf();

    debug!("Discovered repository at {}", workdir.display());
    Ok(Self { workdir })
  }

  fn open(&self) -> Result<Repository> {
    Ok(Repository::open(&self.workdir)?)
  }

  fn branch_record(repo: &Repository, branch: &git2::Branch<'_>) -> Result<Option<LocalBranchRecord>> {
    let Some(name) = branch.name()? else {
      return Ok(None);
    };

    Ok(Some(LocalBranchRecord {
      name: name.to_string(),
      upstream: read_upstream(repo, name)?,
      head: branch.get().target().map(|oid| oid.to_string()),
    }))
  }
}

fn read_upstream(repo: &Repository, branch: &str) -> Result<Option<TrackingRef>> {
  let config = repo.config()?;
  let remote = optional_config_string(&config, &format!("branch.{branch}.remote"))?;
  let merge = optional_config_string(&config, &format!("branch.{branch}.merge"))?;

  Ok(match (remote, merge) {
    (Some(remote), Some(merge)) => {
      let branch = merge.strip_prefix("refs/heads/").unwrap_or(&merge).to_string();
      Some(TrackingRef { remote, branch })
    }
    _ => None,
  })
}

fn optional_config_string(config: &git2::Config, key: &str) -> Result<Option<String>> {
  match config.get_string(key) {
    Ok(value) => Ok(Some(value)),
    Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
    Err(err) => Err(err.into()),
  }
}

fn parse_oid(commit: &str) -> Result<Oid> {
  Oid::from_str(commit).map_err(|_| SyncError::InvalidCommit(commit.to_string()))
}

impl LocalRepository for GitRepository {
  fn workdir(&self) -> &Path {
    &self.workdir
  }

  fn remotes(&self) -> Result<Vec<RemoteRecord>> {
    let repo = self.open()?;
    let names = repo.remotes()?;

    let mut remotes = Vec::new();
    for name in names.iter().flatten() {
      let remote = repo.find_remote(name)?;
      remotes.push(RemoteRecord {
        name: name.to_string(),
        url: remote.url().map(str::to_string),
      });
    }

    Ok(remotes)
  }

  fn remote_url(&self, remote: &str) -> Result<Option<String>> {
    let repo = self.open()?;
    match repo.find_remote(remote) {
      Ok(found) => Ok(found.url().map(str::to_string)),
      Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
      Err(err) => Err(err.into()),
    }
  }

  fn add_remote(&self, name: &str, url: &str) -> Result<()> {
    let repo = self.open()?;
    repo.remote(name, url)?;
    Ok(())
  }

  fn local_branches(&self) -> Result<Vec<LocalBranchRecord>> {
    let repo = self.open()?;
    let mut records = Vec::new();

    for branch in repo.branches(Some(BranchType::Local))? {
      let (branch, _) = branch?;
      if let Some(record) = Self::branch_record(&repo, &branch)? {
        records.push(record);
      }
    }

    Ok(records)
  }

  fn find_branch(&self, name: &str) -> Result<Option<LocalBranchRecord>> {
    let repo = self.open()?;
    match repo.find_branch(name, BranchType::Local) {
      Ok(branch) => Self::branch_record(&repo, &branch),
      Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
      Err(err) => Err(err.into()),
    }
  }

  fn current_branch(&self) -> Result<Option<LocalBranchRecord>> {
    let repo = self.open()?;
    let head = match repo.head() {
      Ok(head) => head,
      Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => return Ok(None),
      Err(err) => return Err(err.into()),
    };

    if !head.is_branch() {
      return Ok(None);
    }

    match head.shorthand() {
      Some(name) => self.find_branch(name),
      None => Ok(None),
    }
  }

  fn unborn_branch(&self) -> Result<Option<String>> {
    let repo = self.open()?;
    match repo.head() {
      Err(err) if err.code() == ErrorCode::UnbornBranch => {}
      Ok(_) => return Ok(None),
      Err(err) if err.code() == ErrorCode::NotFound => return Ok(None),
      Err(err) => return Err(err.into()),
    }

    let head = repo.find_reference("HEAD")?;
    Ok(
      head
        .symbolic_target()
        .and_then(|target| target.strip_prefix("refs/heads/"))
        .map(str::to_string),
    )
  }

  fn head_commit(&self) -> Result<Option<String>> {
    let repo = self.open()?;
    match repo.head() {
      Ok(head) => Ok(Some(head.peel_to_commit()?.id().to_string())),
      Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
      Err(err) => Err(err.into()),
    }
  }

  fn is_dirty(&self) -> Result<bool> {
    let repo = self.open()?;
    let mut options = StatusOptions::new();
    options
      .include_untracked(false)
      .include_ignored(false)
      .exclude_submodules(true);

    let statuses = repo.statuses(Some(&mut options))?;
    Ok(!statuses.is_empty())
  }

  fn config_entries(&self) -> Result<Vec<(String, String)>> {
    let repo = self.open()?;
    let config = repo.config()?.open_level(ConfigLevel::Local)?;

    let mut pairs = Vec::new();
    let mut entries = config.entries(None)?;
    while let Some(entry) = entries.next() {
      let entry = entry?;
      if let (Some(name), Some(value)) = (entry.name(), entry.value()) {
        pairs.push((name.to_string(), value.to_string()));
      }
    }

    Ok(pairs)
  }

  fn config_value(&self, key: &str) -> Result<Option<String>> {
    let repo = self.open()?;
    optional_config_string(&repo.config()?, key)
  }

  #[instrument(skip(self), level = "debug")]
  fn set_config(&self, key: &str, value: &str) -> Result<()> {
    let repo = self.open()?;
    let mut config = repo.config()?.open_level(ConfigLevel::Local)?;
    config.set_str(key, value)?;
    Ok(())
  }

  #[instrument(skip(self), level = "debug")]
  fn unset_config(&self, key: &str) -> Result<bool> {
    let repo = self.open()?;
    let mut config = repo.config()?.open_level(ConfigLevel::Local)?;
    match config.remove(key) {
      Ok(()) => Ok(true),
      Err(err) if err.code() == ErrorCode::NotFound => Ok(false),
      Err(err) => Err(err.into()),
    }
  }

  fn remote_branch_tip(&self, remote: &str, branch: &str) -> Result<Option<String>> {
    let repo = self.open()?;
    match repo.find_reference(&format!("refs/remotes/{remote}/{branch}")) {
      Ok(reference) => Ok(Some(reference.peel_to_commit()?.id().to_string())),
      Err(err) if matches!(err.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec) => Ok(None),
      Err(err) => Err(err.into()),
    }
  }

  fn has_commit(&self, commit: &str) -> Result<bool> {
    let repo = self.open()?;
    match repo.find_commit(parse_oid(commit)?) {
      Ok(_) => Ok(true),
      Err(err) if err.code() == ErrorCode::NotFound => Ok(false),
      Err(err) => Err(err.into()),
    }
  }

  #[instrument(skip(self), level = "debug")]
  fn create_branch(&self, name: &str, commit: &str) -> Result<()> {
    let repo = self.open()?;
    let commit = repo.find_commit(parse_oid(commit)?)?;
    repo.branch(name, &commit, false)?;
    Ok(())
  }

  #[instrument(skip(self), level = "debug")]
  fn set_tracking(&self, branch: &str, upstream: &TrackingRef) -> Result<()> {
    let repo = self.open()?;
    // Written directly rather than through `Branch::set_upstream`, which
    // cannot express remote or branch names containing slashes unambiguously.
    let mut config = repo.config()?.open_level(ConfigLevel::Local)?;
    config.set_str(&format!("branch.{branch}.remote"), &upstream.remote)?;
    config.set_str(
      &format!("branch.{branch}.merge"),
      &format!("refs/heads/{}", upstream.branch),
    )?;
    Ok(())
  }

  #[instrument(skip(self), level = "debug")]
  fn checkout(&self, branch: &str) -> Result<()> {
    let repo = self.open()?;
    let commit = match repo.find_branch(branch, BranchType::Local) {
      Ok(found) => found.into_reference().peel_to_commit()?,
      Err(err) if err.code() == ErrorCode::NotFound => return Err(SyncError::BranchNotFound(branch.to_string())),
      Err(err) => return Err(err.into()),
    };

    // Update index and working tree before moving HEAD so a failed checkout
    // leaves HEAD where it was.
    repo.checkout_tree(commit.as_object(), Some(git2::build::CheckoutBuilder::new().safe()))?;
    repo.set_head(&format!("refs/heads/{branch}"))?;
    Ok(())
  }

  fn ahead_behind(&self, branch: &str) -> Result<Option<(usize, usize)>> {
    let Some(record) = self.find_branch(branch)? else {
      return Err(SyncError::BranchNotFound(branch.to_string()));
    };
    let (Some(upstream), Some(local)) = (record.upstream, record.head) else {
      return Ok(None);
    };
    let Some(remote) = self.remote_branch_tip(&upstream.remote, &upstream.branch)? else {
      return Ok(None);
    };

    let repo = self.open()?;
    let counts = repo.graph_ahead_behind(parse_oid(&local)?, parse_oid(&remote)?)?;
    Ok(Some(counts))
  }

  #[instrument(skip(self), level = "debug")]
  fn fast_forward(&self, branch: &str, commit: &str) -> Result<()> {
    let repo = self.open()?;
    let target = repo.find_commit(parse_oid(commit)?)?;

    repo.checkout_tree(target.as_object(), Some(git2::build::CheckoutBuilder::new().safe()))?;
    repo
      .find_reference(&format!("refs/heads/{branch}"))?
      .set_target(target.id(), "prsync: fast-forward")?;
    Ok(())
  }

  fn read_blob(&self, commit: &str, path: &Path) -> Result<Option<Vec<u8>>> {
    let repo = self.open()?;
    let tree = repo.find_commit(parse_oid(commit)?)?.tree()?;

    let entry = match tree.get_path(path) {
      Ok(entry) => entry,
      Err(err) if err.code() == ErrorCode::NotFound => return Ok(None),
      Err(err) => return Err(err.into()),
    };

    match entry.to_object(&repo)?.into_blob() {
      Ok(blob) => Ok(Some(blob.content().to_vec())),
      Err(_) => Ok(None),
    }
  }
}
