use std::sync::atomic::{AtomicU8, Ordering};

use super::events::EventKind;

/// The set of kinds the user wants logged.
///
/// Stored as a bitmask so a toggle racing a notification is observed either
/// wholly before or wholly after, never half-applied.
#[derive(Debug)]
pub struct FilterState {
    mask: AtomicU8,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::all()
    }
}

impl FilterState {
    pub fn all() -> Self {
        Self::from_kinds(EventKind::ALL)
    }

    pub fn none() -> Self {
        Self {
            mask: AtomicU8::new(0),
        }
    }

    pub fn from_kinds<I: IntoIterator<Item = EventKind>>(kinds: I) -> Self {
        let mask = kinds.into_iter().fold(0, |mask, kind| mask | kind.bit());
        Self {
            mask: AtomicU8::new(mask),
        }
    }

    /// True iff `kind` is currently enabled. `Unknown` is never admitted.
    pub fn admit(&self, kind: EventKind) -> bool {
        let bit = kind.bit();
        bit != 0 && self.mask.load(Ordering::Acquire) & bit != 0
    }

    pub fn is_enabled(&self, kind: EventKind) -> bool {
        self.admit(kind)
    }

    pub fn enable(&self, kind: EventKind) {
        self.mask.fetch_or(kind.bit(), Ordering::AcqRel);
    }

    pub fn disable(&self, kind: EventKind) {
        self.mask.fetch_and(!kind.bit(), Ordering::AcqRel);
    }

    pub fn set_enabled(&self, kind: EventKind, enabled: bool) {
        if enabled {
            self.enable(kind);
        } else {
            self.disable(kind);
        }
    }

    /// Flip `kind` and return whether it is now enabled.
    pub fn toggle(&self, kind: EventKind) -> bool {
        let previous = self.mask.fetch_xor(kind.bit(), Ordering::AcqRel);
        kind.bit() != 0 && previous & kind.bit() == 0
    }

    /// Replace the whole set in one step.
    pub fn replace<I: IntoIterator<Item = EventKind>>(&self, kinds: I) {
        let mask = kinds.into_iter().fold(0, |mask, kind| mask | kind.bit());
        self.mask.store(mask, Ordering::Release);
    }

    pub fn enabled_kinds(&self) -> Vec<EventKind> {
        let mask = self.mask.load(Ordering::Acquire);
        EventKind::ALL
            .into_iter()
            .filter(|kind| mask & kind.bit() != 0)
            .collect()
    }
}
