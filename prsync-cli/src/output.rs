//! # Output Formatting
//!
//! Colored helpers for user-facing messages.

use owo_colors::OwoColorize;
use prsync_core::{ActionState, FileChange};

/// Controls when colored output is used
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
  /// Enable colored output
  Always,
  /// Detect from the terminal
  Auto,
  /// Disable colored output
  Never,
}

impl ColorMode {
  pub fn apply(self) {
    match self {
      Self::Always => owo_colors::set_override(true),
      Self::Never => owo_colors::set_override(false),
      Self::Auto => {}
    }
  }
}

/// Print a success message
pub fn print_success(message: &str) {
  println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
  eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
  println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
  println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a section header
pub fn print_header(header: &str) {
  println!("\n{}", header.blue().bold());
}

pub fn format_branch(name: &str) -> String {
  name.bright_cyan().bold().to_string()
}

pub fn format_commit(sha: &str) -> String {
  sha.chars().take(10).collect::<String>().yellow().to_string()
}

pub fn format_action_state(state: &ActionState) -> String {
  match state {
    ActionState::Enabled => "available".green().to_string(),
    ActionState::Disabled(reason) => reason.to_string().bright_black().to_string(),
  }
}

pub fn format_file_change(change: FileChange) -> String {
  match change {
    FileChange::Added => "added".green().to_string(),
    FileChange::Deleted => "deleted".red().to_string(),
    FileChange::Modified => "modified".yellow().to_string(),
    FileChange::Unchanged => "unchanged".to_string(),
    FileChange::Absent => "absent".bright_black().to_string(),
  }
}
