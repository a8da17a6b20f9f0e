//! Pull request snapshots for fixtures.

use serde_json::{Value, json};

/// JSON snapshot of a pull request in the shape `PullRequestRef` deserializes.
///
/// The base side points at `main` with an empty sha; tests that need a base
/// commit overwrite `["base"]["sha"]`.
pub fn pull_request_json(number: u32, title: &str, head_ref: &str, head_sha: &str, clone_url: &str, owner: &str) -> Value {
  json!({
    "number": number,
    "title": title,
    "head": {
      "ref": head_ref,
      "sha": head_sha,
      "clone_url": clone_url,
      "owner": owner,
    },
    "base": {
      "ref": "main",
      "sha": "",
    },
  })
}
