//! Configuration management for WebMonitor
//!
//! Defaults can be overridden by a TOML file, then by `WEBMONITOR_*`
//! environment variables, then by command-line flags.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::EventKind;
use crate::error::MonitorError;

/// Global configuration for WebMonitor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub watcher: WatcherConfig,
    pub filter: FilterConfig,
    pub ui: UiConfig,
}

/// Which notify backend delivers raw notifications
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchBackend {
    /// inotify / FSEvents / ReadDirectoryChangesW
    #[default]
    Native,
    /// Periodic directory scans
    Polling,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Watch subdirectories as well as the root
    pub recursive: bool,
    pub backend: WatchBackend,
    /// Scan interval for the polling backend, in milliseconds
    pub poll_interval_ms: u64,
    /// Delay before the subscription is wired on start, in milliseconds
    pub subscribe_delay_ms: u64,
    /// How long a rename-from waits for its rename-to before it is logged
    /// as a delete, in milliseconds
    pub rename_window_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Kinds that are logged when a session starts
    pub kinds: Vec<EventKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Elapsed timer period in milliseconds
    pub tick_ms: u64,
    /// Maximum number of records the presentation layer keeps on screen
    pub max_display_records: usize,
    pub no_color: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            backend: WatchBackend::Native,
            poll_interval_ms: 1000,
            subscribe_delay_ms: 100,
            rename_window_ms: 500,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            kinds: EventKind::ALL.to_vec(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            max_display_records: 10_000,
            no_color: false,
        }
    }
}

impl WatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn subscribe_delay(&self) -> Duration {
        Duration::from_millis(self.subscribe_delay_ms)
    }

    pub fn rename_window(&self) -> Duration {
        Duration::from_millis(self.rename_window_ms)
    }
}

impl UiConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl MonitorConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use defaults; environment
    /// overrides apply in both cases
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Defaults with environment overrides
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("WEBMONITOR_RECURSIVE") {
            if let Ok(recursive) = val.parse::<bool>() {
                self.watcher.recursive = recursive;
            }
        }

        if let Ok(val) = std::env::var("WEBMONITOR_POLL_INTERVAL_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                self.watcher.poll_interval_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("WEBMONITOR_SUBSCRIBE_DELAY_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                self.watcher.subscribe_delay_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("WEBMONITOR_KINDS") {
            let kinds: Result<Vec<EventKind>, _> = val
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse)
                .collect();
            match kinds {
                Ok(kinds) => self.filter.kinds = kinds,
                Err(err) => tracing::warn!("Ignoring WEBMONITOR_KINDS: {}", err),
            }
        }

        if let Ok(val) = std::env::var("WEBMONITOR_TICK_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                self.ui.tick_ms = ms;
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), MonitorError> {
        if self.watcher.poll_interval_ms == 0 {
            return Err(MonitorError::Config("poll_interval_ms must be greater than 0".into()));
        }

        if self.ui.tick_ms == 0 {
            return Err(MonitorError::Config("tick_ms must be greater than 0".into()));
        }

        if self.ui.max_display_records == 0 {
            return Err(MonitorError::Config("max_display_records must be greater than 0".into()));
        }

        if self.filter.kinds.contains(&EventKind::Unknown) {
            return Err(MonitorError::Config("unknown is not a filterable kind".into()));
        }

        Ok(())
    }
}
