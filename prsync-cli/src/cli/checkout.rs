//! # Checkout Command
//!
//! Brings a pull request's branch into the working copy.

use anyhow::{Result, bail};
use clap::Args;
use prsync_core::{CheckoutAction, CheckoutOutcome, CheckoutState};
use tracing::info;

use crate::output::{format_branch, print_info, print_success};
use crate::source::{CommandContext, PullRequestArgs, load_pull_request};

/// Arguments for the checkout command
#[derive(Args, Debug, Clone)]
pub struct CheckoutArgs {
  #[command(flatten)]
  pub pr: PullRequestArgs,

  /// Name of the local branch to create when none is associated yet
  #[arg(long, short = 'b', value_name = "NAME", conflicts_with = "existing")]
  pub branch: Option<String>,

  /// Only switch to an already associated branch; never create one
  #[arg(long)]
  pub existing: bool,
}

/// Handle the checkout command
pub async fn handle_checkout_command(context: &CommandContext, args: &CheckoutArgs) -> Result<()> {
  let session = &context.session;
  let pr = load_pull_request(&args.pr, session.repository()).await?;

  if session.checkout_state()? == CheckoutState::BlockedByChanges {
    bail!("Cannot check out pull request #{}: the working tree has uncommitted changes", pr.number);
  }

  if args.existing {
    let branch = session.switch_to_branch(&pr).await?;
    print_success(&format!("Switched to {}", format_branch(&branch)));
    return Ok(());
  }

  let outcome = match &args.branch {
    Some(branch) => session.checkout(&pr, branch).await?,
    None => session.sync(&pr).await?,
  };
  info!("Checked out pull request #{} as {}", pr.number, outcome.branch);
  report_outcome(&outcome);

  Ok(())
}

fn report_outcome(outcome: &CheckoutOutcome) {
  let branch = format_branch(&outcome.branch);
  match &outcome.action {
    CheckoutAction::AlreadyCurrent => print_info(&format!("Already on {branch}")),
    CheckoutAction::SwitchedToExisting => print_success(&format!("Switched to {branch}")),
    CheckoutAction::CreatedFromRemote { remote } => {
      print_success(&format!("Created {branch} tracking {remote}/{}", outcome.branch));
    }
    CheckoutAction::CreatedFromFork { remote } => {
      print_success(&format!("Created {branch} from fork remote {remote}"));
    }
  }
}
