//! # Command Inputs
//!
//! Opens the repository session a command works on and loads the pull
//! request it refers to, either from the GitHub API or from a JSON snapshot.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use prsync_core::consts::ORIGIN;
use prsync_core::{ConfigDirs, GitHubRepo, LocalRepository, PullRequestRef, RepositorySession};
use prsync_gh::create_github_client_from_env;
use tracing::debug;

/// Everything a command needs about its environment.
pub struct CommandContext {
  pub dirs: ConfigDirs,
  pub session: RepositorySession,
}

impl CommandContext {
  /// Open the repository at `repo`, or the one containing the current
  /// directory, with settings from the config file under `dirs`.
  pub fn open_with(dirs: ConfigDirs, repo: Option<&Path>) -> Result<Self> {
    let path = match repo {
      Some(path) => path.to_path_buf(),
      None => env::current_dir().context("Failed to determine current directory")?,
    };

    let settings = dirs.load_settings()?;
    let session = RepositorySession::open(&path, settings)
      .with_context(|| format!("Failed to open repository at {}", path.display()))?;
    debug!("Opened repository at {}", session.repository().workdir().display());

    Ok(Self { dirs, session })
  }

  pub fn workdir(&self) -> &Path {
    self.session.repository().workdir()
  }
}

/// Selects the pull request a command operates on.
#[derive(Args, Debug, Clone)]
pub struct PullRequestArgs {
  /// Pull request number in the repository behind `origin`
  #[arg(required_unless_present = "from_json", conflicts_with = "from_json")]
  pub number: Option<u32>,

  /// Read the pull request from a JSON snapshot instead of GitHub
  #[arg(long = "from-json", value_name = "FILE")]
  pub from_json: Option<PathBuf>,
}

/// GitHub repository behind the `origin` remote.
pub fn origin_repository<R: LocalRepository + ?Sized>(repo: &R) -> Result<GitHubRepo> {
  let url = repo
    .remote_url(ORIGIN)?
    .with_context(|| format!("Remote '{ORIGIN}' is not configured"))?;
  GitHubRepo::parse(&url).with_context(|| format!("Remote '{ORIGIN}' ({url}) is not a GitHub repository"))
}

/// Load a pull request snapshot from a JSON file.
pub fn read_pull_request_json(path: &Path) -> Result<PullRequestRef> {
  let content =
    fs::read_to_string(path).with_context(|| format!("Failed to read pull request from {}", path.display()))?;
  serde_json::from_str(&content).with_context(|| format!("Failed to parse pull request from {}", path.display()))
}

/// Resolve `args` into a pull request snapshot.
pub async fn load_pull_request<R: LocalRepository + ?Sized>(args: &PullRequestArgs, repo: &R) -> Result<PullRequestRef> {
  if let Some(path) = &args.from_json {
    return read_pull_request_json(path);
  }

  let Some(number) = args.number else {
    bail!("A pull request number or --from-json is required");
  };

  let github = origin_repository(repo)?;
  let client = create_github_client_from_env()?;
  let pr = client
    .get_pull_request(&github.owner, &github.repo, number)
    .await
    .with_context(|| format!("Failed to load pull request #{number} from {github}"))?;

  PullRequestRef::try_from(&pr)
}
