//! # Configuration Management
//!
//! Application directories and the TOML settings file that tunes network
//! timeouts, file extraction and the publish workflow.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Represents the configuration directories for the prsync application
#[derive(Debug, Clone)]
pub struct ConfigDirs {
  pub config_dir: PathBuf,
  pub data_dir: PathBuf,
  pub cache_dir: PathBuf,
}

impl ConfigDirs {
  /// Create a new ConfigDirs instance
  pub fn new() -> Result<Self> {
    let proj_dirs = ProjectDirs::from("", "", "prsync").context("Failed to determine project directories")?;

    Ok(Self {
      config_dir: proj_dirs.config_dir().to_path_buf(),
      data_dir: proj_dirs.data_dir().to_path_buf(),
      cache_dir: proj_dirs.cache_dir().to_path_buf(),
    })
  }

  /// Directories rooted under `root`, for tests and portable installs.
  pub fn under(root: &Path) -> Self {
    Self {
      config_dir: root.join("config"),
      data_dir: root.join("data"),
      cache_dir: root.join("cache"),
    }
  }

  /// Initialize the configuration directories
  pub fn init(&self) -> Result<()> {
    fs::create_dir_all(&self.config_dir).context("Failed to create config directory")?;
    fs::create_dir_all(&self.data_dir).context("Failed to create data directory")?;
    fs::create_dir_all(&self.cache_dir).context("Failed to create cache directory")?;
    Ok(())
  }

  pub fn settings_path(&self) -> PathBuf {
    self.config_dir.join("config.toml")
  }

  /// Local usage counters.
  pub fn usage_path(&self) -> PathBuf {
    self.data_dir.join("usage.json")
  }

  /// Default root for files extracted at specific commits.
  pub fn extract_dir(&self) -> PathBuf {
    self.cache_dir.join("extracted")
  }

  /// Load settings from `config.toml`, or defaults when the file is absent.
  pub fn load_settings(&self) -> Result<SyncSettings> {
    let path = self.settings_path();
    if !path.exists() {
      return Ok(SyncSettings::default());
    }

    let content =
      fs::read_to_string(&path).with_context(|| format!("Failed to read settings from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse settings from {}", path.display()))
  }

  pub fn save_settings(&self, settings: &SyncSettings) -> Result<()> {
    let path = self.settings_path();
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }

    let content = toml::to_string_pretty(settings).context("Failed to serialize settings to TOML")?;
    fs::write(&path, content).with_context(|| format!("Failed to write settings to {}", path.display()))?;
    Ok(())
  }
}

/// User-tunable engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
  /// Upper bound for each fetch or push, in seconds. `0` disables the bound.
  pub network_timeout_secs: u64,
  /// Where extracted files are written. Defaults to the cache directory.
  pub extract_dir: Option<PathBuf>,
  pub publish: PublishSettings,
}

impl Default for SyncSettings {
  fn default() -> Self {
    Self {
      network_timeout_secs: 120,
      extract_dir: None,
      publish: PublishSettings::default(),
    }
  }
}

impl SyncSettings {
  pub fn network_timeout(&self) -> Option<Duration> {
    (self.network_timeout_secs > 0).then(|| Duration::from_secs(self.network_timeout_secs))
  }
}

/// How the publish workflow waits for a pushed branch to become visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
  pub poll_interval_ms: u64,
  /// Probes before giving up and creating the pull request anyway.
  pub max_poll_attempts: u32,
  /// Fixed wait used when no branch probe is available.
  pub fallback_delay_secs: u64,
}

impl Default for PublishSettings {
  fn default() -> Self {
    Self {
      poll_interval_ms: 1000,
      max_poll_attempts: 10,
      fallback_delay_secs: 5,
    }
  }
}

impl PublishSettings {
  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }

  pub fn fallback_delay(&self) -> Duration {
    Duration::from_secs(self.fallback_delay_secs)
  }
}

/// Get the configuration directories
pub fn get_config_dirs() -> Result<ConfigDirs> {
  ConfigDirs::new()
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  #[test]
  fn test_paths_live_under_their_directories() {
    let temp_dir = TempDir::new().unwrap();
    let dirs = ConfigDirs::under(temp_dir.path());

    assert!(dirs.settings_path().starts_with(&dirs.config_dir));
    assert!(dirs.usage_path().ends_with("usage.json"));
    assert!(dirs.extract_dir().starts_with(&dirs.cache_dir));
  }

  #[test]
  fn test_init_creates_directories() {
    let temp_dir = TempDir::new().unwrap();
    let dirs = ConfigDirs::under(temp_dir.path());
    dirs.init().unwrap();

    assert!(dirs.config_dir.exists());
    assert!(dirs.data_dir.exists());
    assert!(dirs.cache_dir.exists());
  }

  #[test]
  fn test_missing_settings_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let settings = ConfigDirs::under(temp_dir.path()).load_settings().unwrap();

    assert_eq!(settings, SyncSettings::default());
    assert_eq!(settings.network_timeout(), Some(Duration::from_secs(120)));
  }

  #[test]
  fn test_partial_settings_fill_in_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let dirs = ConfigDirs::under(temp_dir.path());
    dirs.init().unwrap();
    fs::write(
      dirs.settings_path(),
      "network_timeout_secs = 0\n\n[publish]\nmax_poll_attempts = 3\n",
    )
    .unwrap();

    let settings = dirs.load_settings().unwrap();

    assert_eq!(settings.network_timeout(), None);
    assert_eq!(settings.publish.max_poll_attempts, 3);
    assert_eq!(settings.publish.poll_interval(), Duration::from_secs(1));
  }

  #[test]
  fn test_save_then_load() {
    let temp_dir = TempDir::new().unwrap();
    let dirs = ConfigDirs::under(temp_dir.path());
    let settings = SyncSettings {
      extract_dir: Some(temp_dir.path().join("out")),
      ..SyncSettings::default()
    };

    dirs.save_settings(&settings).unwrap();
    assert_eq!(dirs.load_settings().unwrap(), settings);
  }

  #[test]
  fn test_invalid_settings_report_path() {
    let temp_dir = TempDir::new().unwrap();
    let dirs = ConfigDirs::under(temp_dir.path());
    dirs.init().unwrap();
    fs::write(dirs.settings_path(), "network_timeout_secs = \"soon\"").unwrap();

    let err = dirs.load_settings().unwrap_err();
    assert!(err.to_string().contains("config.toml"));
  }
}
