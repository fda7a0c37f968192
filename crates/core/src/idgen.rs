//! Random and time-based ID primitives
//!
//! These are the building blocks behind random-string key options and the
//! ID generators used by insert-with-generated-ID.
//!
//! The only process-wide mutable state in the DAL lives here: the default
//! random string ID length. Set it once at start-up (see `DalConfig::apply`).

use crate::error::{DalError, DalResult};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Initial value of the default random string ID length
pub const DEFAULT_RANDOM_STRING_ID_LENGTH: usize = 16;

/// Digits used for random IDs and for base-N encoding (bases up to 62)
pub const ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

static RANDOM_STRING_ID_LENGTH: AtomicUsize = AtomicUsize::new(DEFAULT_RANDOM_STRING_ID_LENGTH);

/// Current default length of random string IDs
pub fn default_random_string_id_length() -> usize {
    RANDOM_STRING_ID_LENGTH.load(Ordering::Relaxed)
}

/// Override the default length of random string IDs
///
/// Intended for start-up configuration, not per-request tuning.
pub fn set_default_random_string_id_length(length: usize) -> DalResult<()> {
    if length == 0 {
        return Err(DalError::invalid_argument(
            "random string ID length must be greater than zero",
        ));
    }
    RANDOM_STRING_ID_LENGTH.store(length, Ordering::Relaxed);
    Ok(())
}

/// Random alphanumeric string of the given length
pub fn random_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Random alphanumeric string of the given length after a fixed prefix
pub fn random_string_with_prefix(prefix: &str, length: usize) -> String {
    let mut id = String::with_capacity(prefix.len() + length);
    id.push_str(prefix);
    id.push_str(&random_string(length));
    id
}

/// Random string prefixed with the Unix time (seconds) of `at`
pub fn unix_time_prefixed_random_string(at: DateTime<Utc>, length: usize) -> String {
    format!("{}{}", at.timestamp(), random_string(length))
}

/// Granularity of timestamp-based IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeAccuracy {
    /// Nanoseconds since the Unix epoch
    Nano,
    /// Microseconds since the Unix epoch
    Micro,
    /// Milliseconds since the Unix epoch
    Milli,
    /// Seconds since the Unix epoch
    Second,
    /// Minutes since the Unix epoch
    Minute,
    /// Hours since the Unix epoch
    Hour,
    /// Days since the Unix epoch
    Day,
}

impl TimeAccuracy {
    /// Number of whole ticks of this accuracy between the epoch and `at`
    pub fn ticks(&self, at: DateTime<Utc>) -> DalResult<u128> {
        let secs = at.timestamp();
        if secs < 0 {
            return Err(DalError::invalid_argument(format!(
                "time {} is before the Unix epoch",
                at
            )));
        }
        let secs = secs as u128;
        let nanos = at.timestamp_subsec_nanos() as u128;
        Ok(match self {
            TimeAccuracy::Nano => secs * 1_000_000_000 + nanos,
            TimeAccuracy::Micro => secs * 1_000_000 + nanos / 1_000,
            TimeAccuracy::Milli => secs * 1_000 + nanos / 1_000_000,
            TimeAccuracy::Second => secs,
            TimeAccuracy::Minute => secs / 60,
            TimeAccuracy::Hour => secs / 3_600,
            TimeAccuracy::Day => secs / 86_400,
        })
    }
}

/// Encode `value` in the given base using `ID_ALPHABET` digits
pub fn encode_base(mut value: u128, base: u32) -> DalResult<String> {
    if !(2..=ID_ALPHABET.len() as u32).contains(&base) {
        return Err(DalError::invalid_argument(format!(
            "base must be between 2 and {}, got {}",
            ID_ALPHABET.len(),
            base
        )));
    }
    if value == 0 {
        return Ok("0".to_string());
    }
    let base = base as u128;
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ID_ALPHABET[(value % base) as usize]);
        value /= base;
    }
    digits.reverse();
    Ok(digits.into_iter().map(char::from).collect())
}

/// Timestamp of `at` at the given accuracy, encoded in `base`
pub fn timestamp_string(at: DateTime<Utc>, accuracy: TimeAccuracy, base: u32) -> DalResult<String> {
    encode_base(accuracy.ticks(at)?, base)
}
