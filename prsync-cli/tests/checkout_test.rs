use std::fs;

use clap::Parser;
use prsync_cli::cli::{Cli, handle_cli_in};
use prsync_core::ConfigDirs;
use prsync_test_utils::git::{BareRemoteGuard, GitRepoTestGuard, head_id, publish_branch_commit};
use prsync_test_utils::pull_request_json;
use tempfile::TempDir;

/// Runs the CLI with settings and state kept under `config_root`.
fn run_in(config_root: &TempDir, args: &[&str]) -> anyhow::Result<()> {
  let mut argv = vec!["prsync", "--colors", "never"];
  argv.extend_from_slice(args);
  handle_cli_in(Cli::try_parse_from(argv)?, ConfigDirs::under(config_root.path()))
}

#[test]
fn test_checkout_from_json_creates_marked_fork_branch() {
  let origin = BareRemoteGuard::new();
  let fork = BareRemoteGuard::new();
  let local = GitRepoTestGuard::with_origin(&origin);
  let sha = publish_branch_commit(&local.repo, &fork.url(), "docs", "docs.md", "docs\n").unwrap();

  let snapshot_dir = TempDir::new().unwrap();
  let snapshot = snapshot_dir.path().join("pr.json");
  let json = pull_request_json(8, "Improve docs", "docs", &sha, &fork.url(), "writer");
  fs::write(&snapshot, json.to_string()).unwrap();

  let config_root = TempDir::new().unwrap();
  let repo = local.path().to_str().unwrap();
  let snapshot = snapshot.to_str().unwrap();

  run_in(&config_root, &["--repo", repo, "checkout", "--from-json", snapshot]).unwrap();

  let head = local.repo.head().unwrap();
  assert_eq!(head.shorthand(), Some("pr/8-improve-docs"));
  assert_eq!(
    local.repo.config().unwrap().get_string("branch.pr/8-improve-docs.ghfvs-pr").unwrap(),
    "8"
  );

  run_in(&config_root, &["--repo", repo, "unmark"]).unwrap();
  assert!(
    local
      .repo
      .config()
      .unwrap()
      .get_string("branch.pr/8-improve-docs.ghfvs-pr")
      .is_err()
  );
}

#[test]
fn test_status_before_first_commit_reports_unborn_branch() {
  let local = GitRepoTestGuard::new();
  let config_root = TempDir::new().unwrap();

  let err = run_in(&config_root, &["--repo", local.path().to_str().unwrap(), "status"]).unwrap_err();
  assert_eq!(err.to_string(), "Branch 'main' has no commits yet");
}

#[test]
fn test_show_save_uses_extract_dir_from_config() {
  let origin = BareRemoteGuard::new();
  let local = GitRepoTestGuard::with_origin(&origin);
  let head = head_id(&local.repo).unwrap();

  let config_root = TempDir::new().unwrap();
  let out = TempDir::new().unwrap();
  let dirs = ConfigDirs::under(config_root.path());
  fs::create_dir_all(dirs.settings_path().parent().unwrap()).unwrap();
  fs::write(
    dirs.settings_path(),
    format!("extract_dir = {:?}\n", out.path().to_str().unwrap()),
  )
  .unwrap();

  let repo = local.path().to_str().unwrap();
  run_in(&config_root, &["--repo", repo, "show", &head, "README.md", "--save"]).unwrap();

  assert!(out.path().join(&head).join("README.md").is_file());
  assert!(!dirs.extract_dir().exists());
}

#[test]
fn test_invalid_config_is_reported() {
  let local = GitRepoTestGuard::new();
  let config_root = TempDir::new().unwrap();
  let dirs = ConfigDirs::under(config_root.path());
  fs::create_dir_all(dirs.settings_path().parent().unwrap()).unwrap();
  fs::write(dirs.settings_path(), "network_timeout_secs = \"soon\"\n").unwrap();

  let err = run_in(&config_root, &["--repo", local.path().to_str().unwrap(), "status"]).unwrap_err();
  assert!(err.to_string().starts_with("Failed to parse settings from"));
}
