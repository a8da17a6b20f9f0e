//! # Branch Queries
//!
//! Read-only views of how a pull request maps onto local branches, plus
//! clearing the marker of the current branch.

use anyhow::Result;
use prsync_core::{CheckoutPlan, CheckoutState};

use crate::output::{format_branch, print_header, print_info, print_success, print_warning};
use crate::source::{CommandContext, PullRequestArgs, load_pull_request};

/// Handle the branches command
pub async fn handle_branches_command(context: &CommandContext, args: &PullRequestArgs) -> Result<()> {
  let session = &context.session;
  let pr = load_pull_request(args, session.repository()).await?;

  print_header(&format!("#{} {}", pr.number, pr.title));
  if session.is_from_fork(&pr)? {
    print_info(&format!("From fork {} ({})", pr.head.owner, pr.head.clone_url));
  } else {
    print_info(&format!("From origin branch {}", format_branch(&pr.head.ref_name)));
  }

  let branches = session.local_branches_for(&pr)?;
  if branches.is_empty() {
    print_info("No local branches are associated with this pull request");
  } else {
    for branch in &branches {
      println!("  {}", format_branch(branch));
    }
  }

  let plan = session.plan_checkout(&pr)?;
  print_info(&describe_plan(&plan));

  if plan_mutates(&plan) && session.checkout_state()? == CheckoutState::BlockedByChanges {
    print_warning("Checkout is blocked until uncommitted changes are committed or stashed");
  }

  Ok(())
}

/// Handle the branch-name command
pub async fn handle_branch_name_command(context: &CommandContext, args: &PullRequestArgs) -> Result<()> {
  let pr = load_pull_request(args, context.session.repository()).await?;
  println!("{}", context.session.default_branch_name(&pr)?);
  Ok(())
}

/// Handle the unmark command
pub async fn handle_unmark_command(context: &CommandContext) -> Result<()> {
  match context.session.unmark_current_branch().await? {
    Some(branch) => print_success(&format!("Removed pull request marker from {}", format_branch(&branch))),
    None => print_info("The current branch has no pull request marker"),
  }
  Ok(())
}

fn describe_plan(plan: &CheckoutPlan) -> String {
  match plan {
    CheckoutPlan::AlreadyCurrent { branch } => format!("Already on {}", format_branch(branch)),
    CheckoutPlan::SwitchToExisting { branch } => format!("Checkout would switch to {}", format_branch(branch)),
    CheckoutPlan::CreateFromSameRepository { branch } => {
      format!("Checkout would create {} from origin", format_branch(branch))
    }
    CheckoutPlan::CreateFromFork { branch } => {
      format!("Checkout would create {} from the fork", format_branch(branch))
    }
  }
}

fn plan_mutates(plan: &CheckoutPlan) -> bool {
  !matches!(plan, CheckoutPlan::AlreadyCurrent { .. })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_describe_plan_names_branch_and_source() {
    owo_colors::set_override(false);

    let plan = CheckoutPlan::CreateFromFork {
      branch: "pr/3-docs".to_string(),
    };
    assert_eq!(describe_plan(&plan), "Checkout would create pr/3-docs from the fork");
    assert!(plan_mutates(&plan));

    let current = CheckoutPlan::AlreadyCurrent {
      branch: "topic".to_string(),
    };
    assert_eq!(describe_plan(&current), "Already on topic");
    assert!(!plan_mutates(&current));
  }
}
