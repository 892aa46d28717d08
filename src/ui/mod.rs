//! User interface module
//!
//! Terminal presentation of the change log

pub mod tui;

// Re-export main types
pub use tui::{restore_terminal, setup_terminal, AppState, TuiApp};
