use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chorus_core::MessageId;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::record::FinishedCommand;

/// A record behind its own async lock, held across edit and undo work.
pub type RecordHandle = Arc<tokio::sync::Mutex<FinishedCommand>>;

struct Entry {
    created: Instant,
    record: RecordHandle,
}

/// Records keyed by the identity of their triggering message.
#[derive(Default)]
pub struct TrackerTable {
    entries: Mutex<HashMap<MessageId, Entry>>,
}

impl TrackerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `record` unless `id` is tracked already.  Returns whether it was added.
    pub fn insert_if_absent(&self, id: MessageId, record: RecordHandle) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(
            id,
            Entry {
                created: Instant::now(),
                record,
            },
        );
        true
    }

    pub fn get(&self, id: &MessageId) -> Option<RecordHandle> {
        self.entries.lock().get(id).map(|e| Arc::clone(&e.record))
    }

    pub fn remove(&self, id: &MessageId) -> Option<RecordHandle> {
        self.entries.lock().remove(id).map(|e| e.record)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drops every record created at least `retention` before `now`.
    /// Returns how many were dropped.
    pub fn sweep(&self, now: Instant, retention: Duration) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| now.saturating_duration_since(e.created) < retention);
        before - entries.len()
    }
}
