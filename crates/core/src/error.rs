//! Error types for the data access layer
//!
//! This module defines the single error enum used throughout the workspace.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Classification
//!
//! Errors are frequently wrapped with context on their way up the stack.
//! Classification helpers (`is_not_found`, `is_conflict`, ...) walk the whole
//! cause chain, so a not-found wrapped three times is still a not-found.

use crate::key::Key;
use std::io;
use thiserror::Error;

/// Result type alias for DAL operations
pub type DalResult<T> = std::result::Result<T, DalError>;

/// Error types for the data access layer
#[derive(Debug, Error)]
pub enum DalError {
    /// Record does not exist
    #[error("record not found")]
    RecordNotFound,

    /// Record does not exist, with the key that was looked up
    #[error("record not found by key={key}")]
    NotFoundByKey {
        /// Key of the missing record
        key: Key,
        /// Backend error that reported the miss, if any
        #[source]
        cause: Option<Box<DalError>>,
    },

    /// Operation is not supported by the adapter
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Normal end of a record stream
    #[error("no more records")]
    NoMoreRecords,

    /// A record hook (BeforeSave/AfterLoad) returned an error
    #[error("hook {hook} failed: {source}")]
    HookFailed {
        /// Name of the hook
        hook: &'static str,
        /// Error returned by the hook
        #[source]
        source: Box<DalError>,
    },

    /// A bounded retry loop ran out of attempts
    #[error("exceeds max number of attempts: {attempts}")]
    ExceedsMaxNumberOfAttempts {
        /// Number of attempts made
        attempts: u32,
    },

    /// Reader was used after `close()`
    #[error("reader is closed")]
    ReaderClosed,

    /// Reader state was queried before the first `next()`
    #[error("reader not started")]
    ReaderNotStarted,

    /// Mutation precondition does not hold
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Key, update or user data failed validation
    #[error("validation error: {0}")]
    Validation(String),

    /// Caller passed an argument the operation cannot accept
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Rollback failed after the worker returned an error
    #[error("failed to rollback: {rollback}; original error: {original}")]
    Rollback {
        /// Error returned by the transaction worker
        #[source]
        original: Box<DalError>,
        /// Error returned by the rollback itself
        rollback: Box<DalError>,
    },

    /// Transaction contention reported by the adapter (retryable)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Context was cancelled
    #[error("context cancelled")]
    Cancelled,

    /// Context deadline passed
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error with added context
    #[error("{context}: {source}")]
    Wrapped {
        /// Description of what was being done
        context: String,
        /// Underlying error
        #[source]
        source: Box<DalError>,
    },

    /// Internal invariant violated
    #[error("internal error: {0}")]
    Internal(String),
}

impl DalError {
    /// Not-found error carrying the key that was looked up
    pub fn not_found_by_key(key: Key) -> Self {
        DalError::NotFoundByKey { key, cause: None }
    }

    /// Not-found error carrying the key and the backend error that reported it
    pub fn not_found_by_key_with_cause(key: Key, cause: DalError) -> Self {
        DalError::NotFoundByKey {
            key,
            cause: Some(Box::new(cause)),
        }
    }

    /// Not-supported error
    pub fn not_supported(what: impl Into<String>) -> Self {
        DalError::NotSupported(what.into())
    }

    /// Validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        DalError::Validation(msg.into())
    }

    /// Invalid-argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        DalError::InvalidArgument(msg.into())
    }

    /// Precondition-failed error
    pub fn precondition_failed(msg: impl Into<String>) -> Self {
        DalError::PreconditionFailed(msg.into())
    }

    /// Conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        DalError::Conflict(msg.into())
    }

    /// Internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        DalError::Internal(msg.into())
    }

    /// Wrap this error with a description of what was being done
    pub fn context(self, context: impl Into<String>) -> Self {
        DalError::Wrapped {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Wrap a hook failure
    pub fn hook_failed(hook: &'static str, source: DalError) -> Self {
        DalError::HookFailed {
            hook,
            source: Box::new(source),
        }
    }

    /// Iterate over this error and every error it wraps, outermost first
    pub fn chain(&self) -> Chain<'_> {
        Chain { next: Some(self) }
    }

    /// The innermost error of the chain
    pub fn root_cause(&self) -> &DalError {
        self.chain().last().unwrap_or(self)
    }

    /// True when this error (or any error it wraps) reports a missing record
    pub fn is_not_found(&self) -> bool {
        self.chain().any(|e| {
            matches!(
                e,
                DalError::RecordNotFound | DalError::NotFoundByKey { .. }
            )
        })
    }

    /// True when the adapter declined the operation
    pub fn is_not_supported(&self) -> bool {
        self.chain().any(|e| matches!(e, DalError::NotSupported(_)))
    }

    /// True for the end-of-stream sentinel
    pub fn is_no_more_records(&self) -> bool {
        self.chain().any(|e| matches!(e, DalError::NoMoreRecords))
    }

    /// True when the transaction should be retried
    pub fn is_conflict(&self) -> bool {
        self.chain().any(|e| matches!(e, DalError::Conflict(_)))
    }

    /// True for context cancellation or deadline expiry
    pub fn is_cancelled(&self) -> bool {
        self.chain()
            .any(|e| matches!(e, DalError::Cancelled | DalError::DeadlineExceeded))
    }

    /// True when a record hook failed
    pub fn is_hook_failed(&self) -> bool {
        self.chain().any(|e| matches!(e, DalError::HookFailed { .. }))
    }

    /// True when a precondition did not hold
    pub fn is_precondition_failed(&self) -> bool {
        self.chain()
            .any(|e| matches!(e, DalError::PreconditionFailed(_)))
    }

    /// True when a bounded retry loop gave up
    pub fn is_exceeds_max_number_of_attempts(&self) -> bool {
        self.chain()
            .any(|e| matches!(e, DalError::ExceedsMaxNumberOfAttempts { .. }))
    }

    /// True for reader-state misuse (closed or not started)
    pub fn is_reader_state(&self) -> bool {
        self.chain().any(|e| {
            matches!(e, DalError::ReaderClosed | DalError::ReaderNotStarted)
        })
    }
}

/// Iterator over an error and the errors it wraps
pub struct Chain<'a> {
    next: Option<&'a DalError>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a DalError;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = match current {
            DalError::Wrapped { source, .. } => Some(source.as_ref()),
            DalError::HookFailed { source, .. } => Some(source.as_ref()),
            DalError::Rollback { original, .. } => Some(original.as_ref()),
            DalError::NotFoundByKey {
                cause: Some(cause), ..
            } => Some(cause.as_ref()),
            _ => None,
        };
        Some(current)
    }
}

/// Returns true if `err` reports a missing record
pub fn is_not_found(err: &DalError) -> bool {
    err.is_not_found()
}

impl From<serde_json::Error> for DalError {
    fn from(e: serde_json::Error) -> Self {
        DalError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for DalError {
    fn from(e: toml::de::Error) -> Self {
        DalError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for DalError {
    fn from(e: toml::ser::Error) -> Self {
        DalError::Config(e.to_string())
    }
}
