//! # Command Line Interface
//!
//! Defines the CLI structure and dispatches each subcommand to its handler.

mod branches;
mod checkout;
mod extract;
mod publish;
mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{ArgAction, Parser, Subcommand};
use prsync_core::ConfigDirs;
use tokio::runtime::Runtime;

use crate::output::ColorMode;
use crate::source::{CommandContext, PullRequestArgs};

/// Top-level CLI command for prsync
#[derive(Parser)]
#[command(name = "prsync")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(about = "Work on GitHub pull requests in your local clone")]
#[command(
  long_about = "prsync maps GitHub pull requests onto local branches.\n\n\
        It checks pull requests out (including ones from forks), reports how far\n\
        the current branch has drifted from its upstream, reads files at either end\n\
        of a pull request, and publishes local branches as new pull requests."
)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
#[command(subcommand_required(true))]
#[command(disable_help_subcommand = true)]
#[command(max_term_width = 120)]
#[command(styles = Styles::styled()
    .header(AnsiColor::BrightGreen.on_default().bold().underline())
    .usage(AnsiColor::Green.on_default().bold())
    .literal(AnsiColor::BrightGreen.on_default().bold())
    .placeholder(AnsiColor::BrightWhite.on_default().italic())
    .valid(AnsiColor::Green.on_default())
    .invalid(AnsiColor::BrightRed.on_default().bold())
)]
pub struct Cli {
  /// Sets the level of verbosity (can be used multiple times)
  #[arg(
    short = 'v',
    long = "verbose",
    action = ArgAction::Count,
    global = true,
    long_help = "Sets the level of verbosity for tracing and logging output.\n\n\
             -v: Show info level messages\n\
             -vv: Show debug level messages\n\
             -vvv: Show trace level messages\n\n\
             PRSYNC_VERBOSITY is used when no -v flag is given."
  )]
  pub verbose: u8,

  /// Controls when colored output is used
  #[arg(long, value_enum, ignore_case = true, global = true, default_value_t = ColorMode::Auto)]
  pub colors: ColorMode,

  /// Repository to operate on instead of the current directory
  #[arg(long = "repo", short = 'r', value_name = "PATH", global = true)]
  pub repo: Option<PathBuf>,

  /// Subcommands
  #[command(subcommand)]
  pub command: Commands,
}

/// Subcommands for prsync
#[derive(Subcommand)]
pub enum Commands {
  /// Show the local branches associated with a pull request
  #[command(long_about = "Show how a pull request maps onto this repository.\n\n\
            Lists the local branches associated with the pull request, whether it\n\
            comes from a fork, and what `prsync checkout` would do.")]
  #[command(alias = "br")]
  Branches(PullRequestArgs),

  /// Print the branch name a new checkout of a pull request would use
  #[command(name = "branch-name")]
  BranchName(PullRequestArgs),

  /// Check out a pull request
  #[command(long_about = "Check out the branch of a pull request.\n\n\
            An associated local branch is reused when there is one. Otherwise a branch\n\
            is created from origin, or for fork pull requests from a remote pointing at\n\
            the fork. Fork branches are marked in the local git config so later\n\
            checkouts find them again.")]
  #[command(alias = "co")]
  Checkout(checkout::CheckoutArgs),

  /// Compare the current branch with its upstream
  #[command(alias = "st")]
  Status,

  /// Fast-forward the current branch to its upstream
  Pull,

  /// Push the current branch to its upstream
  Push,

  /// Print a file as it exists at a commit
  #[command(long_about = "Print a file as it exists at a commit.\n\n\
            origin is fetched first so commits that only exist remotely can be read.\n\
            With --save the file is written below the extraction directory instead.")]
  Show(extract::ShowArgs),

  /// Compare a file between the base and head of a pull request
  Diff(extract::DiffArgs),

  /// Push a branch and open a pull request for it
  #[command(long_about = "Push a branch to origin and open a pull request for it.\n\n\
            The branch defaults to the current one. Its upstream is set when it has\n\
            none. The body defaults to the repository's pull request template.\n\
            Requires GITHUB_TOKEN.")]
  Publish(publish::PublishArgs),

  /// Remove the pull request marker from the current branch
  Unmark,
}

/// Handle the parsed command line with settings and state kept under `dirs`
pub fn handle_cli_in(cli: Cli, dirs: ConfigDirs) -> Result<()> {
  cli.colors.apply();

  let rt = Runtime::new().context("Failed to create async runtime")?;
  rt.block_on(run(cli, dirs))
}

async fn run(cli: Cli, dirs: ConfigDirs) -> Result<()> {
  let context = CommandContext::open_with(dirs, cli.repo.as_deref())?;

  match cli.command {
    Commands::Branches(pr) => branches::handle_branches_command(&context, &pr).await,
    Commands::BranchName(pr) => branches::handle_branch_name_command(&context, &pr).await,
    Commands::Checkout(args) => checkout::handle_checkout_command(&context, &args).await,
    Commands::Status => status::handle_status_command(&context).await,
    Commands::Pull => status::handle_pull_command(&context).await,
    Commands::Push => status::handle_push_command(&context).await,
    Commands::Show(args) => extract::handle_show_command(&context, &args).await,
    Commands::Diff(args) => extract::handle_diff_command(&context, &args).await,
    Commands::Publish(args) => publish::handle_publish_command(&context, &args).await,
    Commands::Unmark => branches::handle_unmark_command(&context).await,
  }
}
