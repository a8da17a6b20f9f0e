//! Default local branch names for pull requests.

use crate::consts::PULL_REQUEST_BRANCH_PREFIX;
use crate::pull_request::PullRequestRef;

/// Reduce a pull request title to a branch-name segment.
///
/// Characters other than ASCII letters and digits become `-`, runs of `-`
/// collapse to one, leading and trailing `-` are dropped and the result is
/// lowercased. Non-ASCII letters are separators too.
pub fn sanitize_title(title: &str) -> String {
  let mut segment = String::with_capacity(title.len());
  let mut pending_separator = false;

  for c in title.chars() {
    if c.is_ascii_alphanumeric() {
      if pending_separator && !segment.is_empty() {
        segment.push('-');
      }
      pending_separator = false;
      segment.push(c.to_ascii_lowercase());
    } else {
      pending_separator = true;
    }
  }

  segment
}

/// `pr/<number>-<sanitized title>`, suffixed with `-2`, `-3`, ... until it no
/// longer collides with `existing`.
pub fn default_branch_name<S: AsRef<str>>(pr: &PullRequestRef, existing: &[S]) -> String {
  let segment = sanitize_title(&pr.title);
  let base = if segment.is_empty() {
    format!("{PULL_REQUEST_BRANCH_PREFIX}{}", pr.number)
  } else {
    format!("{PULL_REQUEST_BRANCH_PREFIX}{}-{segment}", pr.number)
  };

  let taken = |candidate: &str| existing.iter().any(|name| name.as_ref() == candidate);
  if !taken(&base) {
    return base;
  }

  (2..)
    .map(|suffix| format!("{base}-{suffix}"))
    .find(|candidate| !taken(candidate))
    .unwrap_or(base)
}
