//! # prsync CLI Entry Point
//!
//! The main entry point for the prsync command-line tool, which checks out,
//! compares and publishes GitHub pull requests in a local working copy.

use std::env;

use anyhow::Result;
use clap::Parser;
use prsync_cli::cli::{self, handle_cli_in};
use prsync_core::get_config_dirs;
use prsync_core::transport::set_socket_timeouts;
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable read when `-v` is not given.
const VERBOSITY_VAR: &str = "PRSYNC_VERBOSITY";

fn main() -> Result<()> {
  let cmd = cli::Cli::parse();

  let verbose_count = if cmd.verbose > 0 {
    cmd.verbose
  } else {
    env::var(VERBOSITY_VAR)
      .ok()
      .and_then(|v| v.parse::<u8>().ok())
      .unwrap_or(0)
  };

  let level = match verbose_count {
    0 => tracing::Level::WARN,
    1 => tracing::Level::INFO,
    2 => tracing::Level::DEBUG,
    _ => tracing::Level::TRACE,
  };

  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(EnvFilter::from_default_env().add_directive(level.into()))
    .init();

  debug!("Tracing initialized with level: {}", level);

  let dirs = get_config_dirs()?;
  if let Some(limit) = dirs.load_settings()?.network_timeout() {
    // SAFETY: no thread has been spawned yet; the async runtime is created
    // later by `handle_cli_in`.
    unsafe { set_socket_timeouts(limit)? };
    debug!("libgit2 socket timeouts set to {limit:?}");
  }

  handle_cli_in(cmd, dirs)
}
