//! # GitHub API Endpoints
//!
//! Endpoint implementations grouped by resource type.

pub mod branches;
pub mod pulls;
