//! # prsync core
//!
//! Engine that keeps a local git working copy in step with GitHub pull
//! requests: resolving which local branch belongs to a pull request, checking
//! pull requests out (including from forks), reporting divergence from the
//! upstream, extracting files at specific commits, and pushing a branch to
//! open a new pull request.
//!
//! Most callers go through [`RepositorySession`]. The free functions in each
//! module take any [`LocalRepository`] and [`RemoteTransport`] and are usable
//! on their own.

pub mod checkout;
pub mod config;
pub mod consts;
pub mod divergence;
pub mod error;
pub mod extract;
pub mod marker;
pub mod naming;
pub mod publish;
pub mod pull_request;
pub mod repository;
pub mod resolver;
pub mod session;
pub mod template;
pub mod transport;
pub mod url;

pub use checkout::{CheckoutAction, CheckoutOutcome, CheckoutPlan, CheckoutState};
pub use config::{ConfigDirs, PublishSettings, SyncSettings, get_config_dirs};
pub use divergence::{ActionState, DisabledReason, DivergenceState, PullOutcome};
pub use error::{Result, SyncError};
pub use extract::{DiffFiles, FileChange};
pub use publish::{
  CreatedPullRequest, PublishServices, PullRequestCreator, PullRequestDraft, RemoteBranchProbe, RemoteVisibility,
  UsageTracker,
};
pub use pull_request::{PullRequestBase, PullRequestHead, PullRequestRef};
pub use repository::{GitRepository, LocalBranchRecord, LocalRepository, RemoteRecord, TrackingRef};
pub use session::RepositorySession;
pub use template::read_pull_request_template;
pub use transport::{BranchRefspec, Git2Transport, RemoteTransport};
pub use url::{GitHubRepo, RepositoryUrl, same_repository};
