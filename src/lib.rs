pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod ui;

pub use crate::core::*;
pub use config::{MonitorConfig, WatchBackend};
pub use error::{MonitorError, Result};
