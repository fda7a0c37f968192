//! Insert with a generated id
//!
//! An id generator assigns a candidate id to the record key, an existence
//! probe checks whether it is taken, and the loop repeats until a free id is
//! found or the attempt budget is spent. On every failure path the key id is
//! cleared so that a half-generated id never leaks to the caller.

use dal_core::idgen::{self, TimeAccuracy};
use dal_core::{Context, DalConfig, DalError, DalResult, Key, Record};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Assigns a candidate id to the record key
pub type IdGenerator = Arc<dyn Fn(&Context, &mut Record) -> DalResult<()> + Send + Sync>;

/// Options of `WriteSession::insert`
#[derive(Clone, Default)]
pub struct InsertOptions {
    id_generator: Option<IdGenerator>,
    max_attempts: Option<u32>,
}

impl InsertOptions {
    /// Insert with the key as given
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the key id with `generator`
    pub fn with_id_generator(mut self, generator: IdGenerator) -> Self {
        self.id_generator = Some(generator);
        self
    }

    /// Cap the number of generated candidates
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Configured generator, if any
    pub fn id_generator(&self) -> Option<&IdGenerator> {
        self.id_generator.as_ref()
    }

    /// Candidate cap; the configured default when not set
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
            .unwrap_or_else(|| DalConfig::current().insert_max_attempts)
    }
}

impl fmt::Debug for InsertOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsertOptions")
            .field("id_generator", &self.id_generator.is_some())
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

/// Insert `record` under a freshly generated id
///
/// `exists` answers `Ok(())` when the candidate id is taken and a not-found
/// error when it is free; `insert` is called once, with the free id in place.
///
/// # Errors
///
/// - generator or probe failure: the error, wrapped, with the key id cleared
/// - no free id after `max_attempts`: `ExceedsMaxNumberOfAttempts`, with the
///   key id cleared
pub fn insert_with_random_id<E, I>(
    ctx: &Context,
    record: &mut Record,
    generate: &IdGenerator,
    max_attempts: u32,
    mut exists: E,
    insert: I,
) -> DalResult<()>
where
    E: FnMut(&Key) -> DalResult<()>,
    I: FnOnce(&mut Record) -> DalResult<()>,
{
    for attempt in 1..=max_attempts {
        if let Err(e) = ctx.check().and_then(|()| generate(ctx, record)) {
            record.key_mut().clear_id();
            return Err(e.context("failed to generate record id"));
        }
        match exists(record.key()) {
            Ok(()) => {
                debug!(target: "dal::insert", key = %record.key(), attempt, "generated id is taken");
            }
            Err(e) if e.is_not_found() => {
                debug!(target: "dal::insert", key = %record.key(), attempt, "generated id is free");
                return insert(record);
            }
            Err(e) => {
                let key = record.key().to_string();
                record.key_mut().clear_id();
                return Err(e.context(format!("failed to check if record exists by key={}", key)));
            }
        }
    }
    record.key_mut().clear_id();
    Err(DalError::ExceedsMaxNumberOfAttempts {
        attempts: max_attempts,
    })
}

/// Random alphanumeric ids of `length` characters
pub fn random_string_generator(length: usize) -> IdGenerator {
    random_string_generator_with_prefix("", length)
}

/// Random ids of the configured default length
pub fn default_random_string_generator() -> IdGenerator {
    Arc::new(|_ctx, record| {
        let length = idgen::default_random_string_id_length();
        record.key_mut().set_id(idgen::random_string(length));
        Ok(())
    })
}

/// Random alphanumeric ids of `length` characters after `prefix`
pub fn random_string_generator_with_prefix(prefix: impl Into<String>, length: usize) -> IdGenerator {
    let prefix = prefix.into();
    Arc::new(move |_ctx, record| {
        record
            .key_mut()
            .set_id(idgen::random_string_with_prefix(&prefix, length));
        Ok(())
    })
}

/// Random ids prefixed with the current Unix time in seconds
pub fn unix_time_prefixed_generator(length: usize) -> IdGenerator {
    Arc::new(move |_ctx, record| {
        record
            .key_mut()
            .set_id(idgen::unix_time_prefixed_random_string(Utc::now(), length));
        Ok(())
    })
}

/// Current time at `accuracy`, encoded in `base` (2..=62)
pub fn timestamp_generator(accuracy: TimeAccuracy, base: u32) -> IdGenerator {
    timestamp_generator_with_clock(accuracy, base, Utc::now)
}

/// Like [`timestamp_generator`] with an injected clock
pub fn timestamp_generator_with_clock<C>(accuracy: TimeAccuracy, base: u32, clock: C) -> IdGenerator
where
    C: Fn() -> DateTime<Utc> + Send + Sync + 'static,
{
    Arc::new(move |_ctx, record| {
        let id = idgen::timestamp_string(clock(), accuracy, base)?;
        record.key_mut().set_id(id);
        Ok(())
    })
}
