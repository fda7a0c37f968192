//! Mutation preconditions
//!
//! Preconditions are folded into a `Preconditions` bag that adapters check
//! before applying an update. A precondition that does not hold is reported
//! by the adapter as `PreconditionFailed`.

use chrono::{DateTime, Utc};

/// Constraint asserted at mutation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// The record must exist
    Exists,
    /// The record's last update time must equal the given instant
    LastUpdateTime(DateTime<Utc>),
}

impl Precondition {
    /// Fold this precondition into `bag`
    pub fn apply(&self, bag: &mut Preconditions) {
        match self {
            Precondition::Exists => bag.exists = true,
            Precondition::LastUpdateTime(t) => bag.last_update_time = Some(*t),
        }
    }
}

/// Folded set of preconditions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Preconditions {
    exists: bool,
    last_update_time: Option<DateTime<Utc>>,
}

impl Preconditions {
    /// True when the record must exist
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Required last update time, if any
    pub fn last_update_time(&self) -> Option<DateTime<Utc>> {
        self.last_update_time
    }

    /// True when nothing is asserted
    pub fn is_empty(&self) -> bool {
        !self.exists && self.last_update_time.is_none()
    }
}

/// The record must exist
pub fn with_exists_precondition() -> Precondition {
    Precondition::Exists
}

/// The record's last update time must equal `t`
pub fn with_last_update_time_precondition(t: DateTime<Utc>) -> Precondition {
    Precondition::LastUpdateTime(t)
}

/// Fold preconditions; later ones override earlier ones of the same kind
pub fn get_preconditions(items: &[Precondition]) -> Preconditions {
    let mut bag = Preconditions::default();
    for item in items {
        item.apply(&mut bag);
    }
    bag
}
