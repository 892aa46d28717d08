use std::sync::Arc;

use parking_lot::RwLock;

use super::events::{ChangeRecord, RawNotification};
use super::filter::FilterState;
use super::log::ChangeLog;
use super::rename;

/// Normalize → filter → sequence. Safe to call from any number of threads.
#[derive(Clone)]
pub struct Pipeline {
    filter: Arc<FilterState>,
    log: Arc<ChangeLog>,
}

impl Pipeline {
    pub fn new(filter: Arc<FilterState>, log: Arc<ChangeLog>) -> Self {
        Self { filter, log }
    }

    /// Returns the appended record, or `None` when the filter rejected it.
    /// Rejected notifications do not consume a sequence number.
    pub fn process(&self, raw: RawNotification) -> Option<ChangeRecord> {
        let candidate = rename::normalize(raw);
        if !self.filter.admit(candidate.kind) {
            tracing::debug!("Filtered out {} {}", candidate.kind, candidate.full_path.display());
            return None;
        }
        Some(self.log.append(candidate))
    }

    pub fn filter(&self) -> &Arc<FilterState> {
        &self.filter
    }

    pub fn log(&self) -> &Arc<ChangeLog> {
        &self.log
    }
}

/// Entry point of one watch session into the pipeline.
///
/// Closing waits for deliveries already inside the pipeline; afterwards every
/// delivery is dropped, so a torn-down watcher that still fires cannot append.
#[derive(Clone)]
pub struct NotificationSink {
    open: Arc<RwLock<bool>>,
    pipeline: Pipeline,
}

impl NotificationSink {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            open: Arc::new(RwLock::new(true)),
            pipeline,
        }
    }

    pub(crate) fn closed(pipeline: Pipeline) -> Self {
        Self {
            open: Arc::new(RwLock::new(false)),
            pipeline,
        }
    }

    pub fn deliver(&self, raw: RawNotification) -> Option<ChangeRecord> {
        let open = self.open.read();
        if !*open {
            tracing::debug!("Dropping late notification for {}", raw.path().display());
            return None;
        }
        self.pipeline.process(raw)
    }

    pub fn is_open(&self) -> bool {
        *self.open.read()
    }

    pub(crate) fn open(&self) {
        *self.open.write() = true;
    }

    pub(crate) fn close(&self) {
        *self.open.write() = false;
    }
}
