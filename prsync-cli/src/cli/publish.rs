//! # Publish Command
//!
//! Pushes a local branch and opens a pull request for it on GitHub.

use anyhow::{Context, Result, bail};
use clap::Args;
use prsync_core::{
  GitHubRepo, LocalRepository, PublishServices, PublishSettings, PullRequestDraft, RemoteBranchProbe,
  RemoteVisibility, read_pull_request_template,
};
use prsync_gh::create_github_client_from_env;

use crate::output::{format_branch, print_info, print_success};
use crate::source::{CommandContext, origin_repository};
use crate::usage::FileUsageTracker;

/// Arguments for the publish command
#[derive(Args, Debug, Clone)]
pub struct PublishArgs {
  /// Pull request title
  #[arg(long, short = 't')]
  pub title: String,

  /// Pull request body; defaults to the repository's pull request template
  #[arg(long)]
  pub body: Option<String>,

  /// Branch to publish; defaults to the current branch
  #[arg(long, short = 'b', value_name = "BRANCH")]
  pub branch: Option<String>,

  /// Branch the pull request is opened against
  #[arg(long, default_value = "main", value_name = "BRANCH")]
  pub base: String,

  /// Repository to open the pull request against, as owner/name; defaults to
  /// the repository behind origin
  #[arg(long, value_name = "OWNER/NAME")]
  pub target: Option<String>,

  /// Create the pull request right after pushing without waiting for the
  /// branch to show up on GitHub
  #[arg(long)]
  pub no_wait: bool,
}

/// Handle the publish command
pub async fn handle_publish_command(context: &CommandContext, args: &PublishArgs) -> Result<()> {
  let session = &context.session;
  let repo = session.repository();

  let source_branch = match &args.branch {
    Some(branch) => branch.clone(),
    None => repo.require_current_branch()?.name,
  };
  let source_repository = origin_repository(repo)?;
  let target_repository = match &args.target {
    Some(target) => parse_repository(target)?,
    None => source_repository.clone(),
  };
  let body = args
    .body
    .clone()
    .or_else(|| read_pull_request_template(context.workdir()))
    .unwrap_or_default();

  let draft = PullRequestDraft {
    source_repository,
    source_branch,
    target_repository,
    target_branch: args.base.clone(),
    title: args.title.clone(),
    body,
  };

  let client = create_github_client_from_env().context("Publishing requires GitHub credentials")?;
  let usage = FileUsageTracker::new(context.dirs.usage_path());
  let services = PublishServices {
    creator: &client,
    usage: &usage,
    visibility: visibility(&session.settings().publish, &client, args.no_wait),
  };

  print_info(&format!(
    "Publishing {} to {}",
    format_branch(&draft.source_branch),
    draft.source_repository
  ));
  let created = session.push_and_create_pull_request(&draft, &services).await?;
  print_success(&format!("Created pull request #{}: {}", created.number, created.url));

  Ok(())
}

fn visibility<'a>(settings: &PublishSettings, probe: &'a dyn RemoteBranchProbe, no_wait: bool) -> RemoteVisibility<'a> {
  if no_wait {
    RemoteVisibility::Skip
  } else if settings.max_poll_attempts == 0 {
    RemoteVisibility::Delay(settings.fallback_delay())
  } else {
    RemoteVisibility::Poll {
      probe,
      interval: settings.poll_interval(),
      max_attempts: settings.max_poll_attempts,
    }
  }
}

fn parse_repository(value: &str) -> Result<GitHubRepo> {
  match value.split_once('/') {
    Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => Ok(GitHubRepo {
      owner: owner.to_string(),
      repo: repo.to_string(),
    }),
    _ => bail!("Invalid repository '{value}', expected OWNER/NAME"),
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use async_trait::async_trait;

  use super::*;

  struct NeverVisible;

  #[async_trait]
  impl RemoteBranchProbe for NeverVisible {
    async fn branch_exists(&self, _repository: &GitHubRepo, _branch: &str) -> anyhow::Result<bool> {
      Ok(false)
    }
  }

  #[test]
  fn test_parse_repository() {
    let repo = parse_repository("upstream/project").unwrap();
    assert_eq!(repo.full_name(), "upstream/project");

    assert!(parse_repository("project").is_err());
    assert!(parse_repository("/project").is_err());
    assert!(parse_repository("a/b/c").is_err());
  }

  #[test]
  fn test_visibility_follows_settings() {
    let probe = NeverVisible;
    let settings = PublishSettings::default();

    assert!(matches!(visibility(&settings, &probe, true), RemoteVisibility::Skip));
    assert!(matches!(
      visibility(&settings, &probe, false),
      RemoteVisibility::Poll { max_attempts: 10, .. }
    ));

    let no_polling = PublishSettings {
      max_poll_attempts: 0,
      ..PublishSettings::default()
    };
    assert!(matches!(
      visibility(&no_polling, &probe, false),
      RemoteVisibility::Delay(delay) if delay == Duration::from_secs(5)
    ));
  }
}
