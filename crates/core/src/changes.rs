//! Change accumulator for a unit of work
//!
//! Collects the records modified while a transaction (or a transaction-like
//! session scope) runs, so they can be written back together. Membership is
//! deduplicated by handle identity or by key equality.
//!
//! A `Changes` value is not meant for concurrent use.

use crate::key::Key;
use crate::record::Record;
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared handle to a record tracked by a `Changes` set
pub type RecordHandle = Arc<Mutex<Record>>;

/// Wrap a record into a shareable handle
pub fn record_handle(record: Record) -> RecordHandle {
    Arc::new(Mutex::new(record))
}

/// Ordered set of records flagged as changed
#[derive(Debug, Default)]
pub struct Changes {
    records: Vec<RecordHandle>,
}

impl Changes {
    /// Empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `record` as changed and add it to the set
    ///
    /// No-op when the same handle, or a record with an equal key, is already
    /// tracked.
    pub fn flag_as_changed(&mut self, record: &RecordHandle) {
        if self.contains(record) {
            return;
        }
        record.lock().mark_as_changed();
        self.records.push(Arc::clone(record));
    }

    fn contains(&self, record: &RecordHandle) -> bool {
        if self.records.iter().any(|r| Arc::ptr_eq(r, record)) {
            return true;
        }
        let key = record.lock().key().clone();
        self.records.iter().any(|r| r.lock().key() == &key)
    }

    /// True when a tracked record with this key still reports a change
    pub fn is_changed(&self, key: &Key) -> bool {
        self.records.iter().any(|r| {
            let r = r.lock();
            r.key() == key && r.has_changed()
        })
    }

    /// Copy of the tracked handles, in insertion order
    pub fn records(&self) -> Vec<RecordHandle> {
        self.records.clone()
    }

    /// True when at least one tracked record still reports a change
    ///
    /// A record may be tracked and later have its flag cleared, so this
    /// scans the flags instead of checking the length.
    pub fn has_changes(&self) -> bool {
        self.records.iter().any(|r| r.lock().has_changed())
    }

    /// Tracked records that still report a change
    pub fn changed_records(&self) -> Vec<RecordHandle> {
        self.records
            .iter()
            .filter(|r| r.lock().has_changed())
            .cloned()
            .collect()
    }

    /// Number of tracked records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
