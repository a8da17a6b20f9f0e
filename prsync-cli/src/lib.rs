//! # prsync CLI
//!
//! Command definitions and handlers behind the `prsync` binary.

pub mod cli;
pub mod output;
pub mod source;
pub mod usage;
