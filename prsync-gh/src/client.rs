//! # GitHub HTTP Client
//!
//! HTTP client implementation for GitHub API interactions, handling
//! authentication, request building, and error extraction for GitHub REST API
//! operations.

use anyhow::{Result, anyhow};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};

use crate::consts::{ACCEPT, API_BASE_URL, USER_AGENT};
use crate::models::{GitHubAuth, GitHubErrorResponse};

/// Represents a GitHub API client
pub struct GitHubClient {
  pub(crate) client: Client,
  pub(crate) base_url: String,
  pub(crate) auth: GitHubAuth,
}

impl GitHubClient {
  /// Create a new GitHub client
  pub fn new(auth: GitHubAuth) -> Self {
    Self {
      client: Client::new(),
      base_url: API_BASE_URL.to_string(),
      auth,
    }
  }

  /// Point the client at another API root, such as GitHub Enterprise.
  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into().trim_end_matches('/').to_string();
    self
  }

  /// Request with the headers and credentials every endpoint needs.
  pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
    self
      .client
      .request(method, format!("{}{path}", self.base_url))
      .header("Accept", ACCEPT)
      .header("User-Agent", USER_AGENT)
      .basic_auth(&self.auth.username, Some(&self.auth.token))
  }
}

/// Turn a non-success response into an error carrying GitHub's message.
pub(crate) async fn error_for_response(response: Response, action: &str) -> anyhow::Error {
  let status = response.status();
  let body = response.text().await.unwrap_or_default();
  let message = serde_json::from_str::<GitHubErrorResponse>(&body)
    .map(|error| error.describe())
    .unwrap_or(body);

  match status {
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => anyhow!(
      "Failed to {action}: authentication failed ({message}). Please check your GitHub credentials."
    ),
    _ => anyhow!("Failed to {action}: HTTP {status} - {message}"),
  }
}

/// Create a GitHub client from credentials
pub fn create_github_client(username: &str, token: &str) -> GitHubClient {
  GitHubClient::new(GitHubAuth {
    username: username.to_string(),
    token: token.to_string(),
  })
}
