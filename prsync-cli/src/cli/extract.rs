//! # Show and Diff Commands
//!
//! Read file content at a commit, or at both ends of a pull request.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::output::{format_commit, format_file_change, print_info, print_success, print_warning};
use crate::source::{CommandContext, PullRequestArgs, load_pull_request};

/// Arguments for the show command
#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
  /// Commit to read from
  pub commit: String,

  /// Path relative to the repository root
  pub path: PathBuf,

  /// Write the file below the extraction directory instead of printing it
  #[arg(long)]
  pub save: bool,
}

/// Arguments for the diff command
#[derive(Args, Debug, Clone)]
pub struct DiffArgs {
  #[command(flatten)]
  pub pr: PullRequestArgs,

  /// Path relative to the repository root
  #[arg(long, short = 'p', value_name = "PATH")]
  pub path: PathBuf,
}

/// Handle the show command
pub async fn handle_show_command(context: &CommandContext, args: &ShowArgs) -> Result<()> {
  let session = &context.session;

  if args.save {
    let fallback = context.dirs.extract_dir();
    match session.extract_file_to_disk(&args.commit, &args.path, &fallback).await? {
      Some(target) => print_success(&format!("Saved {}", target.display())),
      None => print_warning(&missing_message(&args.path, &args.commit)),
    }
    return Ok(());
  }

  match session.extract_file(&args.commit, &args.path).await? {
    Some(content) => io::stdout()
      .write_all(&content)
      .context("Failed to write file content to stdout")?,
    None => print_warning(&missing_message(&args.path, &args.commit)),
  }
  Ok(())
}

/// Handle the diff command
pub async fn handle_diff_command(context: &CommandContext, args: &DiffArgs) -> Result<()> {
  let session = &context.session;
  let pr = load_pull_request(&args.pr, session.repository()).await?;
  let diff = session.extract_diff_files(&pr, &args.path).await?;

  print_info(&format!(
    "{} is {} between {} and {}",
    args.path.display(),
    format_file_change(diff.change()),
    format_commit(&pr.base.sha),
    format_commit(&pr.head.sha)
  ));
  println!("  base: {}", describe_side(diff.base.as_deref()));
  println!("  head: {}", describe_side(diff.head.as_deref()));
  Ok(())
}

fn missing_message(path: &Path, commit: &str) -> String {
  format!("{} does not exist at {}", path.display(), format_commit(commit))
}

fn describe_side(content: Option<&[u8]>) -> String {
  match content {
    Some(bytes) => format!("{} bytes", bytes.len()),
    None => "missing".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_describe_side() {
    assert_eq!(describe_side(Some(b"abc")), "3 bytes");
    assert_eq!(describe_side(None), "missing");
  }
}
