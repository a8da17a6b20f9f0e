//! Test utilities shared across the prsync workspace
//!
//! This crate provides:
//! - Throwaway working repositories ([`GitRepoTestGuard`])
//! - Bare repositories standing in for `origin` and forks ([`BareRemoteGuard`])
//! - Pull request snapshots for fixtures ([`pull_request_json`])
//!
//! The clippy dead_code lint is disabled for this crate because test utilities
//! may not be used by all tests, and the compiler cannot detect usage across
//! crate boundaries in development dependencies.

#![allow(dead_code)]

pub mod git;
pub mod pull_request;

pub use git::{BareRemoteGuard, GitRepoTestGuard};
pub use pull_request::pull_request_json;
