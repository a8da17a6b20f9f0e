//! Engine collaborator implementations backed by the GitHub API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use prsync_core::publish::{CreatedPullRequest, PullRequestCreator, PullRequestDraft, RemoteBranchProbe};
use prsync_core::url::GitHubRepo;

use crate::client::GitHubClient;
use crate::endpoints::pulls::CreatePullRequestParams;

impl From<&PullRequestDraft> for CreatePullRequestParams {
  fn from(draft: &PullRequestDraft) -> Self {
    Self {
      title: draft.title.clone(),
      head: draft.head_reference(),
      base: draft.target_branch.clone(),
      body: (!draft.body.is_empty()).then(|| draft.body.clone()),
      draft: false,
    }
  }
}

#[async_trait]
impl PullRequestCreator for GitHubClient {
  async fn create_pull_request(&self, draft: &PullRequestDraft) -> Result<CreatedPullRequest> {
    let target = &draft.target_repository;
    let pr = GitHubClient::create_pull_request(self, &target.owner, &target.repo, &draft.into())
      .await
      .with_context(|| format!("Failed to open pull request against {target}"))?;

    Ok(CreatedPullRequest {
      number: pr.number,
      url: pr.html_url,
    })
  }
}

#[async_trait]
impl RemoteBranchProbe for GitHubClient {
  async fn branch_exists(&self, repository: &GitHubRepo, branch: &str) -> Result<bool> {
    GitHubClient::branch_exists(self, &repository.owner, &repository.repo, branch).await
  }
}
