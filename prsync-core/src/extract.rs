//! Reading file content at specific commits.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, instrument};

use crate::consts::ORIGIN;
use crate::error::{Result, SyncError};
use crate::pull_request::PullRequestRef;
use crate::repository::LocalRepository;
use crate::resolver::find_remote_for;
use crate::transport::RemoteTransport;

/// How a file differs between the base and head of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
  Added,
  Deleted,
  Modified,
  Unchanged,
  /// Present at neither end.
  Absent,
}

/// Content of one path at both ends of a pull request. A side is `None` when
/// the path does not exist in that commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffFiles {
  pub path: PathBuf,
  pub base: Option<Vec<u8>>,
  pub head: Option<Vec<u8>>,
}

impl DiffFiles {
  pub fn change(&self) -> FileChange {
    match (&self.base, &self.head) {
      (None, None) => FileChange::Absent,
      (None, Some(_)) => FileChange::Added,
      (Some(_), None) => FileChange::Deleted,
      (Some(base), Some(head)) if base == head => FileChange::Unchanged,
      (Some(_), Some(_)) => FileChange::Modified,
    }
  }
}

/// Content of `path` at `commit`, fetching `origin` first so commits that only
/// exist remotely are available. `None` when the path does not exist there.
#[instrument(skip(repo, transport), level = "debug")]
pub async fn extract_file<R, T>(repo: &R, transport: &T, commit: &str, path: &Path) -> Result<Option<Vec<u8>>>
where
  R: LocalRepository + ?Sized,
  T: RemoteTransport + ?Sized,
{
  transport.fetch(ORIGIN).await?;
  repo.read_blob(commit, path)
}

/// Like [`extract_file`], but writes the content to
/// `<directory>/<commit>/<path>` and returns where it landed.
pub async fn extract_file_to_disk<R, T>(
  repo: &R,
  transport: &T,
  commit: &str,
  path: &Path,
  directory: &Path,
) -> Result<Option<PathBuf>>
where
  R: LocalRepository + ?Sized,
  T: RemoteTransport + ?Sized,
{
  let Some(content) = extract_file(repo, transport, commit, path).await? else {
    return Ok(None);
  };

  let target = directory.join(commit).join(relative_path(path)?);
  if let Some(parent) = target.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(&target, content)?;

  debug!("Extracted {} to {}", path.display(), target.display());
  Ok(Some(target))
}

/// Content of `path` at the pull request's base and head commits.
///
/// `origin` is fetched once. A head commit that is still unknown afterwards,
/// as for a fork pull request viewed for the first time, is looked for in
/// turn in origin's `refs/pull/<n>/head`, in a configured remote for the head
/// repository, and finally in the head repository's clone URL.
#[instrument(skip_all, fields(pr = pr.number, path = %path.display()), level = "debug")]
pub async fn extract_diff_files<R, T>(repo: &R, transport: &T, pr: &PullRequestRef, path: &Path) -> Result<DiffFiles>
where
  R: LocalRepository + ?Sized,
  T: RemoteTransport + ?Sized,
{
  transport.fetch(ORIGIN).await?;

  if !repo.has_commit(&pr.head.sha)? {
    fetch_head_commit(repo, transport, pr).await?;
  }

  Ok(DiffFiles {
    path: path.to_path_buf(),
    base: repo.read_blob(&pr.base.sha, path)?,
    head: repo.read_blob(&pr.head.sha, path)?,
  })
}

async fn fetch_head_commit<R, T>(repo: &R, transport: &T, pr: &PullRequestRef) -> Result<()>
where
  R: LocalRepository + ?Sized,
  T: RemoteTransport + ?Sized,
{
  let pull_ref = format!("refs/pull/{}/head", pr.number);
  match transport.fetch_reference(ORIGIN, &pull_ref).await {
    Ok(()) if repo.has_commit(&pr.head.sha)? => return Ok(()),
    Ok(()) => debug!("{ORIGIN} {pull_ref} does not contain {}", pr.head.sha),
    Err(err) => debug!("Could not fetch {pull_ref} from {ORIGIN}: {err}"),
  }

  let head_branch = format!("refs/heads/{}", pr.head.ref_name);
  match find_remote_for(repo, &pr.head.clone_url)? {
    Some(remote) if remote.name != ORIGIN => {
      debug!("Fetching {head_branch} from {}", remote.name);
      transport.fetch_reference(&remote.name, &head_branch).await
    }
    _ => {
      debug!("Fetching {head_branch} from {}", pr.head.clone_url);
      transport.fetch_url_reference(&pr.head.clone_url, &head_branch).await
    }
  }
}

/// Repository-relative form of `path`, refusing anything that could escape
/// the extraction directory.
fn relative_path(path: &Path) -> Result<PathBuf> {
  let mut relative = PathBuf::new();
  for component in path.components() {
    match component {
      Component::Normal(part) => relative.push(part),
      Component::CurDir => {}
      _ => {
        return Err(SyncError::Io(std::io::Error::new(
          std::io::ErrorKind::InvalidInput,
          format!("Path '{}' is not relative to the repository root", path.display()),
        )));
      }
    }
  }
  Ok(relative)
}
