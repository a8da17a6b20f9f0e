//! # GitHub Branch Endpoints

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};

use crate::client::{GitHubClient, error_for_response};

impl GitHubClient {
  /// Whether `branch` exists in `owner/repo`.
  pub async fn branch_exists(&self, owner: &str, repo: &str, branch: &str) -> Result<bool> {
    let response = self
      .request(Method::GET, &format!("/repos/{owner}/{repo}/branches/{branch}"))
      .send()
      .await
      .context("Failed to query branch")?;

    match response.status() {
      StatusCode::OK => Ok(true),
      StatusCode::NOT_FOUND => Ok(false),
      _ => Err(error_for_response(response, "query branch").await),
    }
  }
}
