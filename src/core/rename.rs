//! Turns raw notifications into display-ready candidates.
//!
//! Renames collapse into a single `old→new` entry; every other kind keeps the
//! last segment of its own name.

use super::events::{Candidate, RawNotification};

const RENAME_ARROW: char = '→';

/// Last non-empty segment of `name`, splitting on both `/` and `\`.
///
/// A name with no separators is returned whole; a name made only of
/// separators yields an empty string.
pub fn base_name(name: &str) -> &str {
    name.rsplit(|c: char| c == '/' || c == '\\')
        .find(|segment| !segment.is_empty())
        .unwrap_or("")
}

/// `"<old base name>→<new base name>"`
pub fn pair_names(old: &str, new: &str) -> String {
    format!("{}{}{}", base_name(old), RENAME_ARROW, base_name(new))
}

pub fn normalize(raw: RawNotification) -> Candidate {
    let kind = raw.kind();
    match raw {
        RawNotification::Renamed { from, to } => Candidate {
            kind,
            file_name: pair_names(&from.to_string_lossy(), &to.to_string_lossy()),
            full_path: to,
        },
        RawNotification::Created(path)
        | RawNotification::Deleted(path)
        | RawNotification::Modified(path) => Candidate {
            kind,
            file_name: base_name(&path.to_string_lossy()).to_string(),
            full_path: path,
        },
    }
}
