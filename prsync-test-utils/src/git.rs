//! Git repository management for testing
//!
//! Working repositories are created with `main` as the initial branch so tests
//! do not depend on the machine's `init.defaultBranch`. Bare repositories play
//! the part of `origin` and of contributor forks; they are addressed by their
//! filesystem path, which libgit2 fetches from and pushes to directly.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use git2::build::CheckoutBuilder;
use git2::{BranchType, Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

/// A test guard that owns a temporary non-bare git repository.
pub struct GitRepoTestGuard {
  /// The temporary directory containing the git repository
  pub temp_dir: TempDir,
  /// The git repository
  pub repo: Repository,
}

impl GitRepoTestGuard {
  /// Create a new test git repository with `main` as its unborn HEAD
  pub fn new() -> Self {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");

    let mut options = RepositoryInitOptions::new();
    options.initial_head("main");
    let repo = Repository::init_opts(temp_dir.path(), &options).expect("Failed to initialize git repository");

    let mut config = repo.config().expect("Failed to get repository config");
    config
      .set_str("user.name", "Prsync Test User")
      .expect("Failed to set user.name");
    config
      .set_str("user.email", "prsync-test@example.com")
      .expect("Failed to set user.email");

    assert!(
      temp_dir.path().join(".git").exists(),
      "Git repository was not properly initialized"
    );

    Self { temp_dir, repo }
  }

  /// Create a repository with one commit on `main` whose `origin` remote is
  /// `origin`, and push `main` there so `refs/remotes/origin/main` exists.
  pub fn with_origin(origin: &BareRemoteGuard) -> Self {
    let guard = Self::new();
    create_commit(&guard.repo, "README.md", "# project\n", "initial commit").expect("Failed to create commit");
    guard
      .repo
      .remote("origin", &origin.url())
      .expect("Failed to add origin remote");
    push_branch(&guard.repo, "origin", "main", "main").expect("Failed to push main to origin");
    guard
  }

  /// Get the path to the git repository
  pub fn path(&self) -> &Path {
    self.temp_dir.path()
  }
}

impl Default for GitRepoTestGuard {
  fn default() -> Self {
    Self::new()
  }
}

/// A test guard that owns a temporary bare repository.
pub struct BareRemoteGuard {
  pub temp_dir: TempDir,
  pub repo: Repository,
}

impl BareRemoteGuard {
  pub fn new() -> Self {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");

    let mut options = RepositoryInitOptions::new();
    options.bare(true).initial_head("main");
    let repo = Repository::init_opts(temp_dir.path(), &options).expect("Failed to initialize bare repository");

    Self { temp_dir, repo }
  }

  pub fn path(&self) -> &Path {
    self.temp_dir.path()
  }

  /// Clone URL of the bare repository.
  pub fn url(&self) -> String {
    self.temp_dir.path().to_string_lossy().into_owned()
  }

  /// Tip of `refs/heads/<branch>`, if the branch exists.
  pub fn branch_tip(&self, branch: &str) -> Option<String> {
    self
      .repo
      .find_reference(&format!("refs/heads/{branch}"))
      .ok()
      .and_then(|reference| reference.target())
      .map(|oid| oid.to_string())
  }

  /// Delete `refs/heads/<branch>` on the remote.
  pub fn delete_branch(&self, branch: &str) -> Result<()> {
    self
      .repo
      .find_reference(&format!("refs/heads/{branch}"))?
      .delete()
      .with_context(|| format!("Failed to delete '{branch}' from bare remote"))
  }
}

impl Default for BareRemoteGuard {
  fn default() -> Self {
    Self::new()
  }
}

/// Helper function to create a commit in a repository
pub fn create_commit(repo: &Repository, file_name: &str, content: &str, message: &str) -> Result<()> {
  let repo_path = repo.workdir().context("Repository has no working directory")?;
  let file_path = repo_path.join(file_name);
  if let Some(parent) = file_path.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(&file_path, content)?;

  let mut index = repo.index()?;
  index.add_path(Path::new(file_name))?;
  index.write()?;

  let tree_id = index.write_tree()?;
  let tree = repo.find_tree(tree_id)?;

  let signature = Signature::now("Test User", "test@example.com")?;

  match repo.head().ok().and_then(|head| head.peel_to_commit().ok()) {
    Some(parent) => repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])?,
    None => repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &[])?,
  };

  Ok(())
}

/// Helper function to remove a tracked file and commit the deletion
pub fn delete_file_and_commit(repo: &Repository, file_name: &str, message: &str) -> Result<()> {
  let repo_path = repo.workdir().context("Repository has no working directory")?;
  fs::remove_file(repo_path.join(file_name))?;

  let mut index = repo.index()?;
  index.remove_path(Path::new(file_name))?;
  index.write()?;

  let tree = repo.find_tree(index.write_tree()?)?;
  let parent = repo.head()?.peel_to_commit()?;
  let signature = Signature::now("Test User", "test@example.com")?;
  repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])?;
  Ok(())
}

/// Id of the commit HEAD points at
pub fn head_id(repo: &Repository) -> Result<String> {
  Ok(repo.head()?.peel_to_commit()?.id().to_string())
}

/// Helper function to create a branch in a repository
pub fn create_branch(repo: &Repository, branch_name: &str, start_point: Option<&str>) -> Result<()> {
  let head = if let Some(start) = start_point {
    repo
      .find_branch(start, BranchType::Local)?
      .into_reference()
      .peel_to_commit()?
  } else {
    repo.head()?.peel_to_commit()?
  };

  repo.branch(branch_name, &head, false)?;
  Ok(())
}

/// Helper function to checkout a branch
pub fn checkout_branch(repo: &Repository, branch_name: &str) -> Result<()> {
  let obj = repo
    .revparse_single(&format!("refs/heads/{branch_name}"))?
    .peel_to_commit()?;

  repo.checkout_tree(&obj.into_object(), Some(CheckoutBuilder::new().safe()))?;
  repo.set_head(&format!("refs/heads/{branch_name}"))?;

  Ok(())
}

/// Helper function to delete a local branch
pub fn delete_branch(repo: &Repository, branch_name: &str) -> Result<()> {
  repo.find_branch(branch_name, BranchType::Local)?.delete()?;
  Ok(())
}

/// Push `local` to `remote_branch` on the named remote or URL.
///
/// Remote-tracking refs are updated when `remote` is a configured remote.
pub fn push_branch(repo: &Repository, remote: &str, local: &str, remote_branch: &str) -> Result<()> {
  let mut remote = match repo.find_remote(remote) {
    Ok(found) => found,
    Err(_) => repo.remote_anonymous(remote)?,
  };
  let refspec = format!("+refs/heads/{local}:refs/heads/{remote_branch}");
  remote
    .push(&[refspec.as_str()], None)
    .with_context(|| format!("Failed to push '{local}'"))?;
  Ok(())
}

/// Commit `file_name` on a fresh `branch` forked from `main`, push it to the
/// bare repository at `url` and return the pushed commit id. The working
/// repository is left on `main` and the temporary local branch is removed.
pub fn publish_branch_commit(
  repo: &Repository,
  url: &str,
  branch: &str,
  file_name: &str,
  content: &str,
) -> Result<String> {
  let scratch = format!("scratch/{branch}");
  create_branch(repo, &scratch, Some("main"))?;
  checkout_branch(repo, &scratch)?;
  create_commit(repo, file_name, content, &format!("Change {file_name}"))?;
  let id = head_id(repo)?;

  push_branch(repo, url, &scratch, branch)?;
  checkout_branch(repo, "main")?;
  delete_branch(repo, &scratch)?;
  Ok(id)
}
