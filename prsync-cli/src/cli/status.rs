//! # Status, Pull and Push Commands
//!
//! Divergence between the current branch and its upstream, and the actions
//! it allows.

use anyhow::{Result, bail};
use prsync_core::{ActionState, PullOutcome};

use crate::output::{format_action_state, print_info, print_success};
use crate::source::CommandContext;

/// Handle the status command
pub async fn handle_status_command(context: &CommandContext) -> Result<()> {
  let state = context.session.calculate_divergence().await?;

  if state.is_up_to_date() {
    print_success("Up to date with upstream");
  } else {
    print_info(&state.to_string());
  }
  println!("  pull: {}", format_action_state(&state.pull_state()));
  println!("  push: {}", format_action_state(&state.push_state()));

  Ok(())
}

/// Handle the pull command
pub async fn handle_pull_command(context: &CommandContext) -> Result<()> {
  match context.session.pull().await? {
    PullOutcome::UpToDate => print_info("Already up to date"),
    PullOutcome::FastForwarded { commits } => print_success(&format!("Fast-forwarded {commits} commit(s)")),
  }
  Ok(())
}

/// Handle the push command
pub async fn handle_push_command(context: &CommandContext) -> Result<()> {
  let state = context.session.calculate_divergence().await?;
  if let ActionState::Disabled(reason) = state.push_state() {
    bail!("{reason}");
  }

  context.session.push().await?;
  print_success(&format!("Pushed {} commit(s)", state.ahead));
  Ok(())
}
