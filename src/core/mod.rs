//! Core functionality module
//!
//! Contains the watch controller, the notification pipeline, the change log
//! and the elapsed timer

pub mod events;
pub mod filter;
pub mod log;
pub mod pipeline;
pub mod rename;
pub mod reveal;
pub mod timer;
pub mod watcher;

// Re-export main types
pub use events::{AppEvent, Candidate, ChangeRecord, EventKind, KindColor, RawNotification};
pub use filter::FilterState;
pub use log::ChangeLog;
pub use pipeline::{NotificationSink, Pipeline};
pub use reveal::{can_reveal, reveal, reveal_selection};
pub use timer::{format_elapsed, ElapsedTimer};
pub use watcher::{RenameTracker, WatchController, WatchSession};
