//! Clone URL parsing and comparison.
//!
//! Pull requests advertise the head repository by clone URL, while the local
//! repository knows its own URL through the `origin` remote. The two rarely
//! match byte-for-byte (`https` vs `ssh`, trailing `.git`, host casing), so
//! comparisons go through [`RepositoryUrl`], which reduces a URL to a host and
//! repository path.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static GITHUB_REPO_REGEX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"github\.com[/:]([^/]+)/([^/\.]+)").expect("Failed to compile GitHub repo regex"));

/// Git remote URL scheme/protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitRemoteScheme {
  /// SSH protocol (`ssh://` or SCP-style `git@host:path`)
  Ssh,
  Https,
  Http,
  /// Git protocol (`git://`)
  Git,
  /// Local file path or `file://` URL
  File,
}

impl GitRemoteScheme {
  /// Detect the scheme from a remote URL string.
  pub fn detect(url: &str) -> Self {
    if url.starts_with("https://") {
      Self::Https
    } else if url.starts_with("http://") {
      Self::Http
    } else if url.starts_with("git://") {
      Self::Git
    } else if url.starts_with("file://") {
      Self::File
    } else if url.starts_with("ssh://") || Self::is_scp_style(url) {
      Self::Ssh
    } else {
      Self::File
    }
  }

  /// Check if a URL uses SCP-style syntax (user@host:path).
  fn is_scp_style(url: &str) -> bool {
    if let Some(at_pos) = url.find('@')
      && let Some(colon_pos) = url[at_pos..].find(':')
    {
      let after_colon = &url[at_pos + colon_pos + 1..];
      return !after_colon.starts_with("//");
    }
    false
  }

  /// Returns true for the schemes that push over HTTP(S).
  pub fn is_http(&self) -> bool {
    matches!(self, Self::Https | Self::Http)
  }
}

/// Scheme-independent identity of a repository.
///
/// Two URLs naming the same repository over different transports compare
/// equal. Network repositories compare case-insensitively; local paths keep
/// their case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryUrl {
  host: Option<String>,
  path: String,
}

impl RepositoryUrl {
  /// Reduce a clone URL to its repository identity.
  pub fn parse(raw: &str) -> Self {
    let raw = raw.trim();
    match GitRemoteScheme::detect(raw) {
      GitRemoteScheme::File => {
        let path = raw.strip_prefix("file://").unwrap_or(raw);
        Self {
          host: None,
          path: normalize_path(path),
        }
      }
      GitRemoteScheme::Ssh if !raw.starts_with("ssh://") => {
        // SCP-style: [user@]host:owner/repo.git
        let without_user = raw.split_once('@').map_or(raw, |(_, rest)| rest);
        let (host, path) = without_user.split_once(':').unwrap_or((without_user, ""));
        Self {
          host: Some(host.to_ascii_lowercase()),
          path: normalize_network_path(path),
        }
      }
      _ => match Url::parse(raw) {
        Ok(url) => Self {
          host: url.host_str().map(str::to_ascii_lowercase),
          path: normalize_network_path(url.path()),
        },
        Err(_) => Self {
          host: None,
          path: normalize_path(raw),
        },
      },
    }
  }

  /// Host serving the repository, `None` for local paths.
  pub fn host(&self) -> Option<&str> {
    self.host.as_deref()
  }

  /// Repository path without leading slash or `.git` suffix.
  pub fn path(&self) -> &str {
    &self.path
  }

  /// HTTPS clone URL for network repositories.
  pub fn to_https(&self) -> Option<String> {
    self
      .host
      .as_ref()
      .map(|host| format!("https://{host}/{}.git", self.path))
  }
}

impl fmt::Display for RepositoryUrl {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.host {
      Some(host) => write!(f, "{host}/{}", self.path),
      None => f.write_str(&self.path),
    }
  }
}

fn normalize_path(path: &str) -> String {
  let trimmed = path.trim_end_matches('/');
  let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
  trimmed.trim_end_matches('/').to_string()
}

fn normalize_network_path(path: &str) -> String {
  normalize_path(path).trim_start_matches('/').to_ascii_lowercase()
}

/// Whether two clone URLs name the same repository.
pub fn same_repository(left: &str, right: &str) -> bool {
  RepositoryUrl::parse(left) == RepositoryUrl::parse(right)
}

/// Owner and name of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubRepo {
  /// Repository owner (user or organization)
  pub owner: String,
  /// Repository name
  pub repo: String,
}

impl GitHubRepo {
  /// Parse a GitHub URL (HTTPS or SSH) into owner and repository name.
  pub fn parse(url: &str) -> Option<Self> {
    let captures = GITHUB_REPO_REGEX.captures(url)?;
    Some(Self {
      owner: captures.get(1)?.as_str().to_string(),
      repo: captures.get(2)?.as_str().to_string(),
    })
  }

  /// Returns the full repository path as `owner/repo`.
  pub fn full_name(&self) -> String {
    format!("{}/{}", self.owner, self.repo)
  }
}

impl fmt::Display for GitHubRepo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.owner, self.repo)
  }
}
