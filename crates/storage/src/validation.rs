//! Commit-time validation for optimistic transactions
//!
//! - First-committer-wins based on the READ-SET, not the write-set
//! - Blind writes (write without read) do not conflict
//! - A read of a missing record is recorded as version 0, so a concurrent
//!   insert of that record is a conflict

use crate::store::StoredRecord;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Paths read by a transaction with the version seen
pub type ReadSet = HashMap<String, u64>;

/// A record read by the transaction changed before it committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadWriteConflict {
    /// Path of the record
    pub path: String,
    /// Version recorded when read
    pub read_version: u64,
    /// Version found at validation time
    pub current_version: u64,
}

/// Result of validating a transaction
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// All conflicts detected
    pub conflicts: Vec<ReadWriteConflict>,
}

impl ValidationResult {
    /// True when the transaction may commit
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Number of conflicts
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflicts.is_empty() {
            return f.write_str("no conflicts");
        }
        write!(f, "{} record(s) changed since read:", self.conflicts.len())?;
        for c in &self.conflicts {
            write!(
                f,
                " {} (read v{}, now v{})",
                c.path, c.read_version, c.current_version
            )?;
        }
        Ok(())
    }
}

/// Compare every read version with the stored one
///
/// Conflicts are reported in path order.
pub fn validate_read_set(
    read_set: &ReadSet,
    data: &BTreeMap<String, StoredRecord>,
) -> ValidationResult {
    let mut conflicts: Vec<ReadWriteConflict> = read_set
        .iter()
        .filter_map(|(path, &read_version)| {
            let current_version = data.get(path).map_or(0, |r| r.version);
            (current_version != read_version).then(|| ReadWriteConflict {
                path: path.clone(),
                read_version,
                current_version,
            })
        })
        .collect();
    conflicts.sort_by(|a, b| a.path.cmp(&b.path));
    ValidationResult { conflicts }
}
