//! Pull request description templates.

use std::fs;
use std::path::Path;

use tracing::debug;

/// Locations checked for a template, in order.
pub const TEMPLATE_PATHS: [&str; 4] = [
  ".github/PULL_REQUEST_TEMPLATE.md",
  ".github/pull_request_template.md",
  "PULL_REQUEST_TEMPLATE.md",
  "docs/pull_request_template.md",
];

/// Contents of the first pull request template found in the working tree.
/// Unreadable templates are skipped.
pub fn read_pull_request_template(workdir: &Path) -> Option<String> {
  TEMPLATE_PATHS.iter().find_map(|relative| {
    let path = workdir.join(relative);
    match fs::read_to_string(&path) {
      Ok(content) => {
        debug!("Using pull request template {}", path.display());
        Some(content)
      }
      Err(_) => None,
    }
  })
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  #[test]
  fn no_template_yields_none() {
    let dir = TempDir::new().unwrap();
    assert_eq!(read_pull_request_template(dir.path()), None);
  }

  #[test]
  fn github_directory_takes_precedence() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join(".github")).unwrap();
    fs::create_dir_all(dir.path().join("docs")).unwrap();
    fs::write(dir.path().join("docs/pull_request_template.md"), "docs").unwrap();
    fs::write(dir.path().join(".github/pull_request_template.md"), "github").unwrap();

    assert_eq!(read_pull_request_template(dir.path()).as_deref(), Some("github"));
  }
}
