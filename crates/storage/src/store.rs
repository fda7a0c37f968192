//! MemoryStore: ordered record storage with version management
//!
//! - `BTreeMap<String, StoredRecord>` keyed by key path, so scans come out in
//!   path order
//! - `parking_lot::RwLock` for thread-safe access
//! - `AtomicU64` for monotonically increasing commit versions
//!
//! Only the latest version of a record is kept. A missing record reads as
//! version 0, which is what optimistic validation compares against.

use crate::validation::{validate_read_set, ReadSet};
use chrono::{DateTime, Utc};
use dal_core::{DalError, DalResult, Key};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// A record as kept by the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Record key
    pub key: Key,
    /// Record data, a JSON object
    pub data: serde_json::Value,
    /// Commit version that last wrote the record
    pub version: u64,
    /// Commit time of that version
    pub update_time: DateTime<Utc>,
}

/// Buffered write of a transaction
#[derive(Debug, Clone)]
pub enum PendingWrite {
    /// Create or replace the record
    Put {
        /// Record key
        key: Key,
        /// Record data
        data: serde_json::Value,
    },
    /// Remove the record if present
    Delete,
}

/// In-memory record store
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, StoredRecord>>,
    version: AtomicU64,
}

impl MemoryStore {
    /// Empty store; the first commit gets version 1
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest committed version of the record at `path`
    pub fn get(&self, path: &str) -> Option<StoredRecord> {
        self.data.read().get(path).cloned()
    }

    /// Version of the record at `path`; 0 when missing
    pub fn current_version(&self, path: &str) -> u64 {
        self.data.read().get(path).map_or(0, |r| r.version)
    }

    /// Every committed record, in path order
    pub fn scan(&self) -> Vec<StoredRecord> {
        self.data.read().values().cloned().collect()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Version of the last commit
    pub fn last_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Validate `read_set` and apply `writes` atomically
    ///
    /// Returns the commit version, or `Conflict` when a record that was read
    /// has changed since. Nothing is written on conflict.
    pub fn commit(
        &self,
        read_set: &ReadSet,
        writes: BTreeMap<String, PendingWrite>,
    ) -> DalResult<u64> {
        let mut data = self.data.write();
        let validation = validate_read_set(read_set, &data);
        if !validation.is_valid() {
            return Err(DalError::conflict(validation.to_string()));
        }
        if writes.is_empty() {
            return Ok(self.last_version());
        }
        let version = self.next_version();
        let now = Utc::now();
        let count = writes.len();
        for (path, write) in writes {
            match write {
                PendingWrite::Put { key, data: value } => {
                    data.insert(
                        path,
                        StoredRecord {
                            key,
                            data: value,
                            version,
                            update_time: now,
                        },
                    );
                }
                PendingWrite::Delete => {
                    data.remove(&path);
                }
            }
        }
        debug!(target: "dal::storage", version, writes = count, "committed");
        Ok(version)
    }
}
