use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, ValueEnum};

use crate::config::{MonitorConfig, WatchBackend};
use crate::core::EventKind;

#[derive(Parser, Debug)]
#[command(name = "webmonitor")]
#[command(version)]
#[command(about = "Watch a directory tree and log file changes as they happen")]
#[command(long_about = "WebMonitor watches a site root (or any directory) for created, deleted, modified and renamed files and keeps a numbered, filterable log of every change.")]
pub struct Cli {
    /// Directory to watch
    #[arg(value_name = "PATH", help = "Directory to watch (the TUI lets you type one in)")]
    pub path: Option<PathBuf>,

    /// Only watch the top-level directory
    #[arg(long, help = "Do not watch subdirectories")]
    pub no_recursive: bool,

    /// Kinds to log
    #[arg(long, value_delimiter = ',', help = "Kinds to log (created,deleted,modified,renamed)")]
    pub kinds: Option<Vec<EventKind>>,

    /// Output format
    #[arg(long, default_value = "tui", help = "Output format")]
    pub output: OutputFormat,

    /// Notification backend
    #[arg(short, long, help = "File watching mode")]
    pub mode: Option<WatchMode>,

    /// Polling interval in milliseconds (for polling mode)
    #[arg(long, help = "Polling interval in ms")]
    pub poll_interval: Option<u64>,

    /// Configuration file
    #[arg(short, long, value_name = "FILE", help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Disable colors in output
    #[arg(long, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WatchMode {
    /// Use native file system events
    Native,
    /// Use polling-based watching
    Polling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Terminal user interface (default)
    Tui,
    /// JSON output for scripting
    Json,
    /// Plain text output
    Text,
    /// Compact single-line format
    Compact,
}

impl Cli {
    pub fn watch_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the configuration file (or defaults), then apply flags on top.
    pub fn resolve_config(&self) -> Result<MonitorConfig> {
        let mut config = MonitorConfig::load_or_default(self.config.as_deref())?;

        if self.no_recursive {
            config.watcher.recursive = false;
        }
        if let Some(kinds) = &self.kinds {
            config.filter.kinds = kinds.clone();
        }
        match self.mode {
            Some(WatchMode::Native) => config.watcher.backend = WatchBackend::Native,
            Some(WatchMode::Polling) => config.watcher.backend = WatchBackend::Polling,
            None => {}
        }
        if let Some(ms) = self.poll_interval {
            config.watcher.poll_interval_ms = ms;
        }
        if self.no_color {
            config.ui.no_color = true;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }

    pub fn validate(&self) -> Result<(), String> {
        match self.watch_path() {
            Some(path) => {
                if !path.exists() {
                    return Err(format!("Path does not exist: {}", path.display()));
                }
                if !path.is_dir() {
                    return Err(format!("Path is not a directory: {}", path.display()));
                }
            }
            None if self.output != OutputFormat::Tui => {
                return Err("A directory to watch is required for non-TUI output".to_string());
            }
            None => {}
        }

        if self.poll_interval == Some(0) {
            return Err("Poll interval must be greater than 0".to_string());
        }

        Ok(())
    }
}
