//! # GitHub API Client
//!
//! GitHub REST API integration for prsync: loading pull request metadata,
//! opening pull requests and checking branch visibility. The client also
//! implements the engine's publish collaborators.

pub mod auth;
pub mod client;
pub mod consts;
pub mod endpoints;
pub mod models;
pub mod services;

pub use auth::{create_github_client_from_env, get_github_credentials};
pub use client::{GitHubClient, create_github_client};
pub use endpoints::pulls::CreatePullRequestParams;
pub use models::{GitHubAuth, GitHubPRRef, GitHubPullRequest, GitHubRepository, GitHubUser};
