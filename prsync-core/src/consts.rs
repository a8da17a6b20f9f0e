//! Constants shared by the engine.

/// Remote that points at the repository the working copy was cloned from.
pub const ORIGIN: &str = "origin";

/// Branch config variable that records the pull request a branch was checked
/// out for. Persisted in user repositories, so the name must not change.
pub const PULL_REQUEST_SETTING: &str = "ghfvs-pr";

/// Prefix for synthesized pull request branch names.
pub const PULL_REQUEST_BRANCH_PREFIX: &str = "pr/";

/// Suffix appended to a remote name when an HTTP twin of an SSH remote is
/// created for pushing.
pub const HTTP_REMOTE_SUFFIX: &str = "-http";
