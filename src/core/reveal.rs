//! Open the platform file manager on a logged file.

use std::io;
use std::path::Path;
use std::process::Command;

use super::events::ChangeRecord;
use crate::error::{MonitorError, Result};

/// Reveal needs exactly one selected record.
pub fn can_reveal(selected: &[&ChangeRecord]) -> bool {
    selected.len() == 1
}

/// Reveal the single selected record's file.
pub fn reveal_selection(selected: &[&ChangeRecord]) -> Result<()> {
    match selected {
        [record] => reveal(&record.full_path),
        _ => Err(MonitorError::SelectionRequired(selected.len())),
    }
}

/// Open the folder containing `path` with `path` selected where the platform
/// supports it.
pub fn reveal(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(MonitorError::MissingPath(path.to_path_buf()));
    }
    tracing::debug!("Revealing {}", path.display());
    run_shell(reveal_command(path))
}

/// Run the file manager to completion so the child is reaped.
fn run_shell(mut command: Command) -> Result<()> {
    let status = command
        .spawn()
        .and_then(|mut child| child.wait())
        .map_err(MonitorError::ShellUnavailable)?;

    // explorer.exe exits with 1 even after selecting the file
    if status.success() || cfg!(target_os = "windows") {
        return Ok(());
    }
    Err(MonitorError::ShellUnavailable(io::Error::new(
        io::ErrorKind::Other,
        format!("{:?} exited with {}", command.get_program(), status),
    )))
}

#[cfg(target_os = "windows")]
fn reveal_command(path: &Path) -> Command {
    let mut command = Command::new("explorer.exe");
    command.arg("/select,").arg(path);
    command
}

#[cfg(target_os = "macos")]
fn reveal_command(path: &Path) -> Command {
    let mut command = Command::new("open");
    command.arg("-R").arg(path);
    command
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn reveal_command(path: &Path) -> Command {
    // xdg-open cannot select a file, open its folder instead
    let folder = if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or(path)
    };
    let mut command = Command::new("xdg-open");
    command.arg(folder);
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::EventKind;
    use chrono::Local;
    use std::path::PathBuf;

    fn record(path: &str) -> ChangeRecord {
        ChangeRecord {
            sequence: 1,
            file_name: "a.txt".to_string(),
            full_path: PathBuf::from(path),
            kind: EventKind::Created,
            label: EventKind::Created.label().to_string(),
            occurred_at: Local::now(),
        }
    }

    #[test]
    fn test_can_reveal_needs_single_selection() {
        let a = record("/srv/site/a.txt");
        let b = record("/srv/site/b.txt");

        assert!(!can_reveal(&[]));
        assert!(can_reveal(&[&a]));
        assert!(!can_reveal(&[&a, &b]));
    }

    #[test]
    fn test_reveal_selection_rejects_multiple() {
        let a = record("/srv/site/a.txt");
        let b = record("/srv/site/b.txt");

        assert!(matches!(reveal_selection(&[]), Err(MonitorError::SelectionRequired(0))));
        assert!(matches!(
            reveal_selection(&[&a, &b]),
            Err(MonitorError::SelectionRequired(2))
        ));
    }

    #[test]
    fn test_reveal_missing_path() {
        let missing = record("/nonexistent/webmonitor/a.txt");
        assert!(matches!(reveal_selection(&[&missing]), Err(MonitorError::MissingPath(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_is_waited_for() {
        assert!(run_shell(Command::new("true")).is_ok());

        let mut command = Command::new("sh");
        command.args(["-c", "exit 3"]);
        match run_shell(command) {
            Err(MonitorError::ShellUnavailable(err)) => {
                assert!(err.to_string().contains("exit"));
            }
            other => panic!("expected ShellUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_shell_is_unavailable() {
        let command = Command::new("/nonexistent/webmonitor/file-manager");
        assert!(matches!(run_shell(command), Err(MonitorError::ShellUnavailable(_))));
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_windows_select_is_its_own_argument() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("with space.txt");
        std::fs::write(&file, "").unwrap();

        let command = reveal_command(&file);
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, vec![std::ffi::OsStr::new("/select,"), file.as_os_str()]);
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    #[test]
    fn test_linux_command_opens_parent_folder() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "").unwrap();

        let command = reveal_command(&file);
        assert_eq!(command.get_program(), "xdg-open");
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, vec![dir.path().as_os_str()]);
    }
}
