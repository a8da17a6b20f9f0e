//! Credential discovery for the GitHub client.
//!
//! Credentials come from the environment: `GITHUB_TOKEN` holds a personal
//! access token and the optional `GITHUB_USER` names its owner. GitHub ignores
//! the username for token authentication, so a placeholder is used when it is
//! unset.

use std::env;

use anyhow::{Result, bail};

use crate::client::{GitHubClient, create_github_client};
use crate::models::GitHubAuth;

pub const TOKEN_VAR: &str = "GITHUB_TOKEN";
pub const USER_VAR: &str = "GITHUB_USER";

const DEFAULT_USERNAME: &str = "x-access-token";

/// Build credentials from raw variable values.
pub fn credentials_from(token: Option<String>, username: Option<String>) -> Result<GitHubAuth> {
  let Some(token) = token.filter(|token| !token.trim().is_empty()) else {
    bail!("GitHub credentials not found. Set {TOKEN_VAR} to a personal access token.");
  };

  Ok(GitHubAuth {
    username: username
      .filter(|name| !name.trim().is_empty())
      .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
    token: token.trim().to_string(),
  })
}

/// Load GitHub credentials from the environment.
pub fn get_github_credentials() -> Result<GitHubAuth> {
  credentials_from(env::var(TOKEN_VAR).ok(), env::var(USER_VAR).ok())
}

/// Creates an authenticated GitHub client using credentials from the
/// environment.
pub fn create_github_client_from_env() -> Result<GitHubClient> {
  let auth = get_github_credentials()?;
  Ok(create_github_client(&auth.username, &auth.token))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_missing_token_is_an_error() {
    let err = credentials_from(None, Some("someone".to_string())).unwrap_err();
    assert!(err.to_string().contains(TOKEN_VAR));

    assert!(credentials_from(Some("   ".to_string()), None).is_err());
  }

  #[test]
  fn test_username_defaults_when_unset() {
    let auth = credentials_from(Some("ghp_token\n".to_string()), None).unwrap();
    assert_eq!(auth.username, DEFAULT_USERNAME);
    assert_eq!(auth.token, "ghp_token");

    let auth = credentials_from(Some("ghp_token".to_string()), Some("octocat".to_string())).unwrap();
    assert_eq!(auth.username, "octocat");
  }
}
