use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local, SubsecRound};
use notify::event::{MetadataKind, ModifyKind};
use serde::{Deserialize, Serialize};

/// Normalized classification of a file-system change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Created,
    Deleted,
    Modified,
    Renamed,
    Unknown,
}

/// Display color hint for a kind, resolved by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindColor {
    Green,
    Red,
    Orange,
    Default,
    Gray,
}

impl EventKind {
    /// The four kinds a record can carry.
    pub const ALL: [EventKind; 4] = [
        EventKind::Created,
        EventKind::Deleted,
        EventKind::Modified,
        EventKind::Renamed,
    ];

    /// Map a raw notify kind onto a normalized kind.
    ///
    /// Access events and metadata changes other than write-time updates have
    /// no counterpart and come back as `Unknown`.
    pub fn classify(raw: &notify::EventKind) -> EventKind {
        match raw {
            notify::EventKind::Create(_) => EventKind::Created,
            notify::EventKind::Remove(_) => EventKind::Deleted,
            notify::EventKind::Modify(ModifyKind::Name(_)) => EventKind::Renamed,
            notify::EventKind::Modify(ModifyKind::Metadata(
                MetadataKind::WriteTime | MetadataKind::Any,
            )) => EventKind::Modified,
            notify::EventKind::Modify(ModifyKind::Metadata(_)) => EventKind::Unknown,
            notify::EventKind::Modify(_) => EventKind::Modified,
            notify::EventKind::Access(_) | notify::EventKind::Any | notify::EventKind::Other => {
                EventKind::Unknown
            }
        }
    }

    /// Localized label shown next to each record.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Created => "创建",
            EventKind::Deleted => "删除",
            EventKind::Modified => "修改",
            EventKind::Renamed => "重命名",
            EventKind::Unknown => "未知",
        }
    }

    /// Stable ASCII identifier, used by the CLI and JSON output.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Deleted => "deleted",
            EventKind::Modified => "modified",
            EventKind::Renamed => "renamed",
            EventKind::Unknown => "unknown",
        }
    }

    pub fn color(&self) -> KindColor {
        match self {
            EventKind::Created => KindColor::Green,
            EventKind::Deleted => KindColor::Red,
            EventKind::Modified => KindColor::Orange,
            EventKind::Renamed => KindColor::Default,
            EventKind::Unknown => KindColor::Gray,
        }
    }

    /// One-letter code for compact output.
    pub fn code(&self) -> char {
        match self {
            EventKind::Created => 'C',
            EventKind::Deleted => 'D',
            EventKind::Modified => 'M',
            EventKind::Renamed => 'R',
            EventKind::Unknown => '?',
        }
    }

    pub(crate) fn bit(&self) -> u8 {
        match self {
            EventKind::Created => 0b0001,
            EventKind::Deleted => 0b0010,
            EventKind::Modified => 0b0100,
            EventKind::Renamed => 0b1000,
            EventKind::Unknown => 0,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s) || kind.label() == s)
            .ok_or_else(|| {
                format!("unknown event kind '{}' (expected created, deleted, modified or renamed)", s)
            })
    }
}

/// A raw notification after it has been classified, one case per kind the
/// pipeline accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawNotification {
    Created(PathBuf),
    Deleted(PathBuf),
    Modified(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

impl RawNotification {
    pub fn kind(&self) -> EventKind {
        match self {
            RawNotification::Created(_) => EventKind::Created,
            RawNotification::Deleted(_) => EventKind::Deleted,
            RawNotification::Modified(_) => EventKind::Modified,
            RawNotification::Renamed { .. } => EventKind::Renamed,
        }
    }

    /// The path a record points at: the new name for renames.
    pub fn path(&self) -> &Path {
        match self {
            RawNotification::Created(path)
            | RawNotification::Deleted(path)
            | RawNotification::Modified(path) => path,
            RawNotification::Renamed { to, .. } => to,
        }
    }
}

/// One entry of the change log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub sequence: u64,
    pub file_name: String,
    pub full_path: PathBuf,
    pub kind: EventKind,
    pub label: String,
    pub occurred_at: DateTime<Local>,
}

impl ChangeRecord {
    pub(crate) fn new(sequence: u64, candidate: Candidate) -> Self {
        Self {
            sequence,
            file_name: candidate.file_name,
            full_path: candidate.full_path,
            kind: candidate.kind,
            label: candidate.kind.label().to_string(),
            occurred_at: Local::now().trunc_subsecs(0),
        }
    }

    /// `YYYY-MM-DD HH:MM:SS`
    pub fn display_time(&self) -> String {
        self.occurred_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// A normalized notification that has not been sequenced yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub kind: EventKind,
    pub file_name: String,
    pub full_path: PathBuf,
}

/// Messages drained by the presentation thread, in publication order.
#[derive(Debug, Clone)]
pub enum AppEvent {
    RecordAppended(ChangeRecord),
    LogCleared,
    WatchStarted { root: PathBuf, recursive: bool },
    WatchStopped { root: PathBuf },
    Tick(u64),
    Quit,
}
