//! Error types reported by the watch pipeline and its boundary actions.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// The requested root is empty, missing, or not a directory.
    #[error("invalid watch target: {0}")]
    InvalidTarget(String),

    #[error("already watching {}", .0.display())]
    AlreadyWatching(PathBuf),

    #[error("no watch is active")]
    NotWatching,

    /// The notification source refused to watch the root.
    #[error("failed to subscribe to {}: {source}", path.display())]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("path does not exist: {}", .0.display())]
    MissingPath(PathBuf),

    /// The platform file manager could not be launched.
    #[error("file manager unavailable: {0}")]
    ShellUnavailable(#[source] std::io::Error),

    #[error("exactly one record must be selected, found {0}")]
    SelectionRequired(usize),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_path() {
        let err = MonitorError::MissingPath(PathBuf::from("/srv/site/a.txt"));
        assert_eq!(err.to_string(), "path does not exist: /srv/site/a.txt");

        let err = MonitorError::SelectionRequired(3);
        assert!(err.to_string().contains('3'));
    }
}
