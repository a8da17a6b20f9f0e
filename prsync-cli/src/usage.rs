//! # Usage Tracking
//!
//! Local counters kept in `usage.json` under the data directory. Nothing is
//! sent anywhere.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prsync_core::UsageTracker;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageCounters {
  pub pull_requests_created: u64,
  pub last_created_at: Option<DateTime<Utc>>,
}

/// [`UsageTracker`] backed by a JSON file.
pub struct FileUsageTracker {
  path: PathBuf,
  write_lock: Mutex<()>,
}

impl FileUsageTracker {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      write_lock: Mutex::new(()),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Current counters, or zeroes when nothing was recorded yet.
  pub fn load(&self) -> Result<UsageCounters> {
    if !self.path.exists() {
      return Ok(UsageCounters::default());
    }

    let content =
      fs::read_to_string(&self.path).with_context(|| format!("Failed to read usage from {}", self.path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse usage from {}", self.path.display()))
  }

  fn save(&self, counters: &UsageCounters) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent).with_context(|| format!("Failed to create data directory {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(counters).context("Failed to serialize usage counters")?;
    fs::write(&self.path, content).with_context(|| format!("Failed to write usage to {}", self.path.display()))
  }
}

#[async_trait]
impl UsageTracker for FileUsageTracker {
  async fn increment_pull_requests_created(&self) -> Result<()> {
    let _guard = self.write_lock.lock().await;

    let mut counters = self.load()?;
    counters.pull_requests_created += 1;
    counters.last_created_at = Some(Utc::now());
    self.save(&counters)?;

    debug!("Recorded pull request creation #{}", counters.pull_requests_created);
    Ok(())
  }
}
