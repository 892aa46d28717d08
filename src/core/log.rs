//! Sequenced, append-only change log.
//!
//! `append` is the single serialization point of the pipeline: the sequence
//! number is assigned, the record stored and subscribers notified under one
//! lock, so subscribers always see records in sequence order.

use std::sync::mpsc::{self, Receiver, Sender};

use parking_lot::Mutex;

use super::events::{AppEvent, Candidate, ChangeRecord};

#[derive(Default)]
struct LogInner {
    records: Vec<ChangeRecord>,
    last_sequence: u64,
    subscribers: Vec<Sender<AppEvent>>,
}

impl LogInner {
    fn publish(&mut self, event: AppEvent) {
        // Receivers that went away are dropped on the next publish
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[derive(Default)]
pub struct ChangeLog {
    inner: Mutex<LogInner>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence, timestamp and store `candidate`.
    pub fn append(&self, candidate: Candidate) -> ChangeRecord {
        let mut inner = self.inner.lock();
        inner.last_sequence += 1;
        let record = ChangeRecord::new(inner.last_sequence, candidate);
        inner.records.push(record.clone());
        inner.publish(AppEvent::RecordAppended(record.clone()));
        record
    }

    /// Drop every record and restart numbering at 1.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.records.clear();
        inner.last_sequence = 0;
        inner.publish(AppEvent::LogCleared);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }

    pub fn last_sequence(&self) -> u64 {
        self.inner.lock().last_sequence
    }

    /// Copy of the records in sequence order.
    pub fn snapshot(&self) -> Vec<ChangeRecord> {
        self.inner.lock().records.clone()
    }

    pub fn get(&self, sequence: u64) -> Option<ChangeRecord> {
        let inner = self.inner.lock();
        // Sequences are contiguous from 1 within a session
        let index = usize::try_from(sequence.checked_sub(1)?).ok()?;
        inner.records.get(index).cloned()
    }

    /// Register a sender that receives `RecordAppended` and `LogCleared`.
    pub fn subscribe(&self, tx: Sender<AppEvent>) {
        self.inner.lock().subscribers.push(tx);
    }

    pub fn subscribe_channel(&self) -> Receiver<AppEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribe(tx);
        rx
    }

    /// Forward a non-record event to the same subscribers, ordered with appends.
    pub(crate) fn publish(&self, event: AppEvent) {
        self.inner.lock().publish(event);
    }
}
