//! # Remote Transport
//!
//! Network-facing git operations: fetch, push and remote configuration.
//!
//! libgit2 is blocking, so every operation runs on tokio's blocking pool.
//! When a timeout is configured and elapses, the job is asked to abort through
//! its remote callbacks and the caller receives [`SyncError::Timeout`] only
//! once the job has stopped. The repository is therefore never touched by an
//! abandoned job after the caller's lock is released.
//!
//! Callbacks only run while the server talks. A connection that stalls
//! without sending anything is bounded by libgit2's socket timeouts; see
//! [`set_socket_timeouts`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use git2::{
  CertificateCheckStatus, Cred, CredentialType, ErrorCode, FetchOptions, PushOptions, Remote, RemoteCallbacks,
  Repository,
};
use tracing::{debug, info, instrument, warn};

use crate::consts::HTTP_REMOTE_SUFFIX;
use crate::error::{Result, SyncError};
use crate::url::{GitRemoteScheme, RepositoryUrl};

const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// A fetch refspec mapping a branch on a remote to a local branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRefspec {
  pub source: String,
  pub destination: String,
}

impl BranchRefspec {
  /// `refs/heads/<source>:refs/heads/<destination>`
  pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
    Self {
      source: source.into(),
      destination: destination.into(),
    }
  }
}

impl fmt::Display for BranchRefspec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "refs/heads/{}:refs/heads/{}", self.source, self.destination)
  }
}

/// Network operations against the remotes of one repository.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
  /// Fetch the remote's configured refspecs, updating remote-tracking refs.
  async fn fetch(&self, remote: &str) -> Result<()>;

  /// Fetch explicit branch refspecs from a remote.
  async fn fetch_refspecs(&self, remote: &str, refspecs: &[BranchRefspec]) -> Result<()>;

  /// Download the objects behind a single reference of a configured remote,
  /// such as `refs/pull/<n>/head`, without creating local refs.
  async fn fetch_reference(&self, remote: &str, reference: &str) -> Result<()>;

  /// Like [`RemoteTransport::fetch_reference`], for a repository URL that has
  /// no configured remote.
  async fn fetch_url_reference(&self, url: &str, reference: &str) -> Result<()>;

  /// Push a local branch to the same-named branch on a remote.
  async fn push(&self, branch: &str, remote: &str) -> Result<()>;

  /// Add a remote, or point an existing one at `url`.
  async fn set_remote(&self, name: &str, url: &str) -> Result<()>;

  /// Name of a remote that reaches the same repository as `remote` over HTTP,
  /// creating `<remote>-http` when `remote` uses another protocol.
  async fn resolve_http_remote(&self, remote: &str) -> Result<String>;
}

/// [`RemoteTransport`] backed by libgit2.
#[derive(Debug, Clone)]
pub struct Git2Transport {
  repo_path: PathBuf,
  timeout: Option<Duration>,
}

impl Git2Transport {
  pub fn new(repo_path: impl Into<PathBuf>) -> Self {
    Self {
      repo_path: repo_path.into(),
      timeout: None,
    }
  }

  /// Bound every network operation by `timeout`.
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  async fn run_blocking<T, F>(&self, operation: String, job: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Path, &AtomicBool) -> Result<T> + Send + 'static,
  {
    let path = self.repo_path.clone();
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    let mut task = tokio::task::spawn_blocking(move || job(&path, &flag));

    let Some(limit) = self.timeout else {
      return task.await?;
    };

    match tokio::time::timeout(limit, &mut task).await {
      Ok(joined) => joined?,
      Err(_) => {
        cancelled.store(true, Ordering::Relaxed);
        warn!("{operation} exceeded {limit:?}; waiting for it to stop");

        match task.await? {
          Ok(value) => {
            debug!("{operation} completed after the timeout");
            Ok(value)
          }
          Err(err) => {
            debug!("{operation} stopped: {err}");
            Err(SyncError::Timeout {
              operation,
              after: limit,
            })
          }
        }
      }
    }
  }
}

/// Bound libgit2's socket connects and reads by `limit`, so a server that
/// accepts a connection and never answers cannot hold a job forever.
///
/// # Safety
///
/// Writes a libgit2 global without synchronization. Call it before any
/// thread that may use libgit2 is spawned, e.g. first thing in `main`.
pub unsafe fn set_socket_timeouts(limit: Duration) -> Result<()> {
  let millis = i32::try_from(limit.as_millis()).unwrap_or(i32::MAX);
  // SAFETY: the caller guarantees no other thread is using libgit2 yet.
  unsafe {
    git2::opts::set_server_connect_timeout_in_milliseconds(millis)?;
    git2::opts::set_server_timeout_in_milliseconds(millis)?;
  }
  Ok(())
}

#[async_trait]
impl RemoteTransport for Git2Transport {
  #[instrument(skip(self), level = "debug")]
  async fn fetch(&self, remote: &str) -> Result<()> {
    let name = remote.to_string();
    self
      .run_blocking(format!("Fetch from '{remote}'"), move |path, cancelled| {
        fetch_blocking(path, &name, &[], cancelled)
      })
      .await
  }

  #[instrument(skip(self), level = "debug")]
  async fn fetch_refspecs(&self, remote: &str, refspecs: &[BranchRefspec]) -> Result<()> {
    let name = remote.to_string();
    let refspecs: Vec<String> = refspecs.iter().map(ToString::to_string).collect();
    self
      .run_blocking(format!("Fetch from '{remote}'"), move |path, cancelled| {
        fetch_blocking(path, &name, &refspecs, cancelled)
      })
      .await
  }

  #[instrument(skip(self), level = "debug")]
  async fn fetch_reference(&self, remote: &str, reference: &str) -> Result<()> {
    let name = remote.to_string();
    let refspecs = vec![reference.to_string()];
    self
      .run_blocking(format!("Fetch {reference} from '{remote}'"), move |path, cancelled| {
        fetch_blocking(path, &name, &refspecs, cancelled)
      })
      .await
  }

  #[instrument(skip(self), level = "debug")]
  async fn fetch_url_reference(&self, url: &str, reference: &str) -> Result<()> {
    let url = url.to_string();
    let refspecs = vec![reference.to_string()];
    self
      .run_blocking(format!("Fetch {reference} from {url}"), move |path, cancelled| {
        let repo = Repository::open(path)?;
        let mut remote = repo.remote_anonymous(&url)?;
        fetch_remote(&repo, &mut remote, &url, &refspecs, cancelled)
      })
      .await
  }

  #[instrument(skip(self), level = "debug")]
  async fn push(&self, branch: &str, remote: &str) -> Result<()> {
    let branch = branch.to_string();
    let name = remote.to_string();
    self
      .run_blocking(format!("Push to '{remote}'"), move |path, cancelled| {
        push_blocking(path, &branch, &name, cancelled)
      })
      .await
  }

  #[instrument(skip(self), level = "debug")]
  async fn set_remote(&self, name: &str, url: &str) -> Result<()> {
    let name = name.to_string();
    let url = url.to_string();
    self
      .run_blocking(format!("Configure remote '{name}'"), move |path, _| {
        let repo = Repository::open(path)?;
        set_remote_url(&repo, &name, &url)
      })
      .await
  }

  #[instrument(skip(self), level = "debug")]
  async fn resolve_http_remote(&self, remote: &str) -> Result<String> {
    let name = remote.to_string();
    self
      .run_blocking(format!("Resolve HTTP remote for '{remote}'"), move |path, _| {
        let repo = Repository::open(path)?;
        resolve_http_remote_blocking(&repo, &name)
      })
      .await
  }
}

fn find_remote<'r>(repo: &'r Repository, name: &str) -> Result<Remote<'r>> {
  repo.find_remote(name).map_err(|err| {
    if err.code() == ErrorCode::NotFound {
      SyncError::RemoteNotFound(name.to_string())
    } else {
      err.into()
    }
  })
}

fn cancelled_error() -> git2::Error {
  git2::Error::from_str("operation cancelled")
}

/// Callbacks that authenticate through the SSH agent or git's credential
/// helpers, giving up after a few rejected attempts. Every callback that can
/// fail does so once `cancelled` is set.
fn remote_callbacks<'a>(config: &'a git2::Config, cancelled: &'a AtomicBool) -> RemoteCallbacks<'a> {
  let mut attempts = 0;
  let mut callbacks = RemoteCallbacks::new();
  callbacks.sideband_progress(move |_| !cancelled.load(Ordering::Relaxed));
  callbacks.certificate_check(move |_, _| {
    if cancelled.load(Ordering::Relaxed) {
      Err(cancelled_error())
    } else {
      Ok(CertificateCheckStatus::CertificatePassthrough)
    }
  });
  callbacks.credentials(move |url, username, allowed| {
    attempts += 1;
    if cancelled.load(Ordering::Relaxed) {
      return Err(cancelled_error());
    }
    if attempts > MAX_CREDENTIAL_ATTEMPTS {
      return Err(git2::Error::from_str("authentication failed"));
    }

    if allowed.contains(CredentialType::SSH_KEY)
      && let Some(username) = username
    {
      return Cred::ssh_key_from_agent(username);
    }
    if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
      return Cred::credential_helper(config, url, username);
    }
    Cred::default()
  });
  callbacks
}

fn fetch_blocking(path: &Path, remote_name: &str, refspecs: &[String], cancelled: &AtomicBool) -> Result<()> {
  let repo = Repository::open(path)?;
  let mut remote = find_remote(&repo, remote_name)?;
  fetch_remote(&repo, &mut remote, remote_name, refspecs, cancelled)
}

fn fetch_remote(
  repo: &Repository,
  remote: &mut Remote<'_>,
  remote_name: &str,
  refspecs: &[String],
  cancelled: &AtomicBool,
) -> Result<()> {
  let fetch_error = |source| SyncError::Fetch {
    remote: remote_name.to_string(),
    source,
  };
  if cancelled.load(Ordering::Relaxed) {
    return Err(fetch_error(cancelled_error()));
  }

  let config = repo.config()?;
  let mut callbacks = remote_callbacks(&config, cancelled);
  callbacks.transfer_progress(|_| !cancelled.load(Ordering::Relaxed));

  let mut options = FetchOptions::new();
  options.remote_callbacks(callbacks);

  debug!("Fetching {remote_name} with refspecs {refspecs:?}");
  // An empty refspec list makes libgit2 use the remote's configured ones.
  remote.fetch(refspecs, Some(&mut options), None).map_err(fetch_error)
}

fn push_blocking(path: &Path, branch: &str, remote_name: &str, cancelled: &AtomicBool) -> Result<()> {
  let repo = Repository::open(path)?;
  let config = repo.config()?;
  let mut remote = find_remote(&repo, remote_name)?;
  let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");

  let push_error = |message: String| SyncError::Push {
    branch: branch.to_string(),
    remote: remote_name.to_string(),
    message,
  };

  if cancelled.load(Ordering::Relaxed) {
    return Err(push_error(cancelled_error().message().to_string()));
  }

  let mut rejection = None;
  {
    let mut callbacks = remote_callbacks(&config, cancelled);
    callbacks.push_negotiation(|_| {
      if cancelled.load(Ordering::Relaxed) {
        Err(cancelled_error())
      } else {
        Ok(())
      }
    });
    callbacks.push_update_reference(|reference, status| {
      if let Some(status) = status {
        rejection = Some(format!("{reference} rejected: {status}"));
      }
      Ok(())
    });

    let mut options = PushOptions::new();
    options.remote_callbacks(callbacks);
    remote
      .push(&[refspec.as_str()], Some(&mut options))
      .map_err(|err| push_error(err.message().to_string()))?;
  }

  if let Some(message) = rejection {
    return Err(push_error(message));
  }

  info!("Pushed {branch} to {remote_name}");
  Ok(())
}

fn set_remote_url(repo: &Repository, name: &str, url: &str) -> Result<()> {
  match repo.find_remote(name) {
    Ok(existing) if existing.url() == Some(url) => Ok(()),
    Ok(_) => {
      debug!("Updating remote {name} to {url}");
      repo.remote_set_url(name, url)?;
      Ok(())
    }
    Err(err) if err.code() == ErrorCode::NotFound => {
      debug!("Adding remote {name} at {url}");
      repo.remote(name, url)?;
      Ok(())
    }
    Err(err) => Err(err.into()),
  }
}

fn resolve_http_remote_blocking(repo: &Repository, name: &str) -> Result<String> {
  let url = find_remote(repo, name)?.url().unwrap_or_default().to_string();

  // Local paths and HTTP remotes are pushed to directly.
  let https = match GitRemoteScheme::detect(&url) {
    GitRemoteScheme::Http | GitRemoteScheme::Https | GitRemoteScheme::File => return Ok(name.to_string()),
    GitRemoteScheme::Ssh | GitRemoteScheme::Git => RepositoryUrl::parse(&url).to_https(),
  };
  let Some(https) = https else {
    return Ok(name.to_string());
  };

  let http_name = format!("{name}{HTTP_REMOTE_SUFFIX}");
  set_remote_url(repo, &http_name, &https)?;
  Ok(http_name)
}
