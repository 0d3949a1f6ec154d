//! Per-project sync configuration.
//!
//! Every projection call receives an explicit [`ProjectSyncConfig`] value —
//! there is no ambient or singleton configuration, so tests inject fakes
//! without touching global state. A missing config file means every sink is
//! disabled, which turns the whole projection layer into a no-op.

#![allow(clippy::module_name_repetitions)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default per-call HTTP timeout for sink requests.
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bounded parallelism for bulk fan-out.
const fn default_bulk_workers() -> usize {
    4
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_SINK_TIMEOUT.as_secs()
}

fn default_vote_field_key() -> String {
    "votes".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSyncConfig {
    #[serde(default)]
    pub issue_tracker: IssueTrackerConfig,
    #[serde(default)]
    pub task_tracker: TaskTrackerConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Upper bound on parallel sink calls during bulk operations.
    #[serde(default = "default_bulk_workers")]
    pub bulk_workers: usize,
    /// Per-call HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProjectSyncConfig {
    fn default() -> Self {
        Self {
            issue_tracker: IssueTrackerConfig::default(),
            task_tracker: TaskTrackerConfig::default(),
            notifications: NotificationConfig::default(),
            bulk_workers: default_bulk_workers(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueTrackerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTrackerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    /// Key of the numeric custom field that mirrors the vote count.
    #[serde(default = "default_vote_field_key")]
    pub vote_field_key: String,
}

impl Default for TaskTrackerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            token: None,
            vote_field_key: default_vote_field_key(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: String,
    /// Optional link to the channel, recorded as the remote ref url.
    #[serde(default)]
    pub channel_url: Option<String>,
}

impl ProjectSyncConfig {
    /// Load configuration from a TOML file. A missing file yields the
    /// default configuration (all sinks disabled).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read sync config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parse sync config {}", path.display()))
    }

    /// Per-call HTTP timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_disables_every_sink() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = ProjectSyncConfig::load_from(&dir.path().join("sync.toml")).expect("load");
        assert!(!cfg.issue_tracker.enabled);
        assert!(!cfg.task_tracker.enabled);
        assert!(!cfg.notifications.enabled);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sync.toml");
        std::fs::write(
            &path,
            "[issue_tracker]\nenabled = true\nbase_url = \"https://issues.example\"\n",
        )
        .expect("write config");

        let cfg = ProjectSyncConfig::load_from(&path).expect("load");
        assert!(cfg.issue_tracker.enabled);
        assert_eq!(cfg.issue_tracker.base_url, "https://issues.example");
        assert!(!cfg.task_tracker.enabled);
        assert_eq!(cfg.task_tracker.vote_field_key, "votes");
        assert_eq!(cfg.bulk_workers, 4);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sync.toml");
        std::fs::write(&path, "issue_tracker = 3").expect("write config");
        assert!(ProjectSyncConfig::load_from(&path).is_err());
    }
}
