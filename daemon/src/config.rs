use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::backup::PartialCopyPolicy;
use crate::error::RunError;
use crate::event::DaemonEvent;
use crate::runner::{RunRequest, RunnerOptions};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
/// Lower bound so a typo cannot turn the checkpoint into a busy loop.
pub const MIN_POLL_INTERVAL_MS: u64 = 10;

/// Root configuration structure. Deserialized from `config.toml`.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(rename = "TASKS", default)]
    pub tasks: TaskConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// The four run parameters, stored under `[TASKS]`.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct TaskConfig {
    /// Directory whose expired files are purged.
    #[serde(rename = "Directory", default)]
    pub directory: String,
    /// Files older than this many days are deleted.
    #[serde(rename = "ExpirationDays", default, skip_serializing_if = "Option::is_none")]
    pub expiration_days: Option<u32>,
    /// Tree copied by the backup stage.
    #[serde(rename = "BackupSource", default)]
    pub backup_source: String,
    /// Directory under which `backup_<timestamp>` directories are created.
    #[serde(rename = "BackupTarget", default)]
    pub backup_target: String,
}

impl TaskConfig {
    /// Validates the four fields into a [`RunRequest`].
    pub fn to_run_request(&self) -> Result<RunRequest, RunError> {
        let days = self
            .expiration_days
            .ok_or_else(|| RunError::Config("ExpirationDays is not set".to_string()))?;
        RunRequest::new(
            self.directory.trim(),
            days,
            self.backup_source.trim(),
            self.backup_target.trim(),
        )
    }

    /// Updates one field by its config key (case-insensitive).
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), RunError> {
        match key.to_ascii_lowercase().as_str() {
            "directory" => self.directory = value.to_string(),
            "expirationdays" => {
                let days = value.trim().parse::<u32>().map_err(|_| {
                    RunError::Config(format!(
                        "ExpirationDays must be a non-negative integer, got '{value}'"
                    ))
                })?;
                self.expiration_days = Some(days);
            }
            "backupsource" => self.backup_source = value.to_string(),
            "backuptarget" => self.backup_target = value.to_string(),
            _ => return Err(RunError::Config(format!("unknown key '{key}'"))),
        }
        Ok(())
    }
}

/// Runner tunables, stored under `[runner]`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// How often a paused run re-checks its signals. Clamped to at least 10 ms.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// `"keep"` or `"remove"` a partially written backup after a copy failure.
    #[serde(default)]
    pub partial_copy: PartialCopyPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            partial_copy: PartialCopyPolicy::default(),
        }
    }
}

impl RunnerConfig {
    pub fn options(&self) -> RunnerOptions {
        RunnerOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS)),
            partial_copy: self.partial_copy,
        }
    }
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Writes `config` back to `path`, creating the parent directory if needed.
pub fn save(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}

/// Spawns a file watcher on the parent directory of `path`.  Whenever the config
/// file is created or modified, reloads it and sends a `ConfigReloaded` event.
pub async fn watch_config(path: PathBuf, tx: mpsc::UnboundedSender<DaemonEvent>) {
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Event>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = watch_tx.blocking_send(event);
            }
        },
        NotifyConfig::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            error!(error = %e, "config: failed to create file watcher");
            return;
        }
    };

    // Watch the parent directory rather than the file directly so we catch
    // editor-style atomic saves (write-new + rename).
    let watch_dir = match path.parent() {
        Some(d) => d.to_path_buf(),
        None => {
            error!(path = %path.display(), "config: path has no parent directory");
            return;
        }
    };

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        error!(error = %e, "config: failed to watch config directory");
        return;
    }

    while let Some(event) = watch_rx.recv().await {
        let affects_config = event.paths.iter().any(|p| p.file_name() == path.file_name());
        let is_write = matches!(
            event.kind,
            notify::EventKind::Create(_) | notify::EventKind::Modify(_)
        );

        if affects_config && is_write {
            match load_or_default(&path) {
                Ok(config) => {
                    if tx.send(DaemonEvent::ConfigReloaded(config)).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("config: failed to reload: {e:#}"),
            }
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
