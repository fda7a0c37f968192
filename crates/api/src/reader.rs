//! Record readers and the helpers that drain them
//!
//! A [`Reader`] is pull-based: `next_record` yields records until it reports
//! `NoMoreRecords`. The `select_*` helpers drain a reader into a `Vec`,
//! honor offset/limit options, poll the context between records and always
//! close the reader.

use dal_core::{Context, DalError, DalResult, KeyId, Record};
use tracing::debug;

/// Pull-based stream of records
pub trait Reader: Send {
    /// Next record, or `NoMoreRecords` at the end
    fn next_record(&mut self) -> DalResult<Record>;

    /// Continuation token for resuming after the last record read
    ///
    /// `NotSupported` when the backend has no cursors; `ReaderNotStarted` or
    /// `ReaderClosed` when the reader state does not allow one.
    fn cursor(&self) -> DalResult<String>;

    /// Release the stream; calling it again is a no-op
    fn close(&mut self) -> DalResult<()>;
}

impl std::fmt::Debug for dyn Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader").finish_non_exhaustive()
    }
}

/// Option of the `select_*` helpers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderOption {
    /// Discard this many records first
    Offset(usize),
    /// Return at most this many records; 0 means all
    Limit(usize),
}

/// Discard `offset` records before collecting
pub fn with_offset(offset: usize) -> ReaderOption {
    ReaderOption::Offset(offset)
}

/// Collect at most `limit` records; 0 means all
pub fn with_limit(limit: usize) -> ReaderOption {
    ReaderOption::Limit(limit)
}

/// Folded reader options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Records to skip
    pub offset: usize,
    /// Maximum records; 0 means unlimited
    pub limit: usize,
}

impl ReaderOptions {
    /// Fold options; later ones override earlier ones
    pub fn from_options(options: &[ReaderOption]) -> Self {
        let mut folded = Self::default();
        for option in options {
            match *option {
                ReaderOption::Offset(n) => folded.offset = n,
                ReaderOption::Limit(n) => folded.limit = n,
            }
        }
        folded
    }
}

/// Drain `reader`, projecting each record
///
/// Records come back in reader order. The end-of-stream sentinel is the only
/// error swallowed: if it comes while skipping the offset the result is
/// empty. A cancelled context aborts with the context error. The reader is
/// closed in every case; a close failure is reported only when reading
/// succeeded.
pub fn select_all<T, F>(
    ctx: &Context,
    reader: &mut dyn Reader,
    mut project: F,
    options: &[ReaderOption],
) -> DalResult<Vec<T>>
where
    F: FnMut(Record) -> T,
{
    let options = ReaderOptions::from_options(options);
    let result = read_items(ctx, reader, &mut project, options);
    let closed = reader.close();
    let items = result?;
    closed.map_err(|e| e.context("failed to close reader"))?;
    debug!(
        target: "dal::reader",
        offset = options.offset,
        limit = options.limit,
        count = items.len(),
        "selected records"
    );
    Ok(items)
}

fn read_items<T>(
    ctx: &Context,
    reader: &mut dyn Reader,
    project: &mut dyn FnMut(Record) -> T,
    options: ReaderOptions,
) -> DalResult<Vec<T>> {
    for skipped in 0..options.offset {
        ctx.check()?;
        match reader.next_record() {
            Ok(_) => {}
            Err(e) if e.is_no_more_records() => {
                debug!(target: "dal::reader", skipped, offset = options.offset, "stream ended while skipping");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        }
    }
    let mut items = Vec::new();
    while options.limit == 0 || items.len() < options.limit {
        ctx.check()?;
        match reader.next_record() {
            Ok(record) => items.push(project(record)),
            Err(e) if e.is_no_more_records() => break,
            Err(e) => return Err(e),
        }
    }
    Ok(items)
}

/// Drain `reader` into the records themselves
pub fn read_all_to_records(
    ctx: &Context,
    reader: &mut dyn Reader,
    options: &[ReaderOption],
) -> DalResult<Vec<Record>> {
    select_all(ctx, reader, |r| r, options)
}

/// Key id type that `select_all_ids` can extract
pub trait FromKeyId: Sized {
    /// Convert a key id, failing when the kinds don't match
    fn from_key_id(id: &KeyId) -> DalResult<Self>;
}

impl FromKeyId for KeyId {
    fn from_key_id(id: &KeyId) -> DalResult<Self> {
        Ok(id.clone())
    }
}

impl FromKeyId for String {
    fn from_key_id(id: &KeyId) -> DalResult<Self> {
        match id {
            KeyId::None => Err(DalError::invalid_argument("record key has no id")),
            other => Ok(other.to_string()),
        }
    }
}

impl FromKeyId for i64 {
    fn from_key_id(id: &KeyId) -> DalResult<Self> {
        id.as_int()
            .ok_or_else(|| DalError::invalid_argument(format!("key id {:?} is not an integer", id)))
    }
}

/// Drain `reader` into the ids of the record keys
pub fn select_all_ids<T: FromKeyId>(
    ctx: &Context,
    reader: &mut dyn Reader,
    options: &[ReaderOption],
) -> DalResult<Vec<T>> {
    select_all(ctx, reader, |r| T::from_key_id(r.key().id()), options)?
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    NotStarted,
    Reading,
    Closed,
}

/// Reader over records already in memory
///
/// The cursor is the number of records consumed so far.
#[derive(Debug)]
pub struct RecordsReader {
    records: std::vec::IntoIter<Record>,
    position: usize,
    state: ReaderState,
}

impl RecordsReader {
    /// Reader yielding `records` in order
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: records.into_iter(),
            position: 0,
            state: ReaderState::NotStarted,
        }
    }
}

impl Reader for RecordsReader {
    fn next_record(&mut self) -> DalResult<Record> {
        if self.state == ReaderState::Closed {
            return Err(DalError::ReaderClosed);
        }
        self.state = ReaderState::Reading;
        match self.records.next() {
            Some(record) => {
                self.position += 1;
                Ok(record)
            }
            None => Err(DalError::NoMoreRecords),
        }
    }

    fn cursor(&self) -> DalResult<String> {
        match self.state {
            ReaderState::NotStarted => Err(DalError::ReaderNotStarted),
            ReaderState::Closed => Err(DalError::ReaderClosed),
            ReaderState::Reading => Ok(self.position.to_string()),
        }
    }

    fn close(&mut self) -> DalResult<()> {
        self.state = ReaderState::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dal_core::Key;
    use proptest::prelude::*;

    fn record(id: i64) -> Record {
        let mut r = Record::new(Key::with_id("Items", id));
        r.set_error(None);
        r
    }

    fn reader(n: i64) -> RecordsReader {
        RecordsReader::new((1..=n).map(record).collect())
    }

    fn ids(ctx: &Context, reader: &mut dyn Reader, options: &[ReaderOption]) -> Vec<i64> {
        select_all_ids::<i64>(ctx, reader, options).unwrap()
    }

    /// Reader that fails on a given call and counts closes
    struct Failing {
        calls: usize,
        fail_at: usize,
        closes: usize,
        close_error: bool,
    }

    impl Reader for Failing {
        fn next_record(&mut self) -> DalResult<Record> {
            self.calls += 1;
            if self.calls == self.fail_at {
                return Err(DalError::internal("backend went away"));
            }
            Ok(record(self.calls as i64))
        }

        fn cursor(&self) -> DalResult<String> {
            Err(DalError::not_supported("cursor"))
        }

        fn close(&mut self) -> DalResult<()> {
            self.closes += 1;
            if self.close_error {
                Err(DalError::internal("close failed"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn offset_and_limit() {
        let ctx = Context::background();
        assert_eq!(ids(&ctx, &mut reader(4), &[]), vec![1, 2, 3, 4]);
        assert_eq!(ids(&ctx, &mut reader(4), &[with_offset(2)]), vec![3, 4]);
        assert_eq!(
            ids(&ctx, &mut reader(4), &[with_offset(1), with_limit(2)]),
            vec![2, 3]
        );
        assert!(ids(&ctx, &mut reader(4), &[with_offset(10)]).is_empty());
    }

    #[test]
    fn cancelled_context_returns_context_error() {
        let (ctx, cancel) = Context::background().with_cancel();
        cancel.cancel();
        let mut r = reader(3);
        let err = read_all_to_records(&ctx, &mut r, &[]).unwrap_err();
        assert!(err.is_cancelled());
        // Closed even on failure
        assert!(matches!(r.next_record(), Err(DalError::ReaderClosed)));
    }

    #[test]
    fn error_during_skip_is_returned() {
        let ctx = Context::background();
        let mut r = Failing {
            calls: 0,
            fail_at: 2,
            closes: 0,
            close_error: false,
        };
        let err = read_all_to_records(&ctx, &mut r, &[with_offset(3)]).unwrap_err();
        assert!(matches!(err, DalError::Internal(_)));
        assert_eq!(r.closes, 1);
    }

    #[test]
    fn close_error_surfaces_only_without_prior_error() {
        let ctx = Context::background();
        let mut ok_then_close_fails = Failing {
            calls: 0,
            fail_at: usize::MAX,
            closes: 0,
            close_error: true,
        };
        let err = read_all_to_records(&ctx, &mut ok_then_close_fails, &[with_limit(2)]).unwrap_err();
        assert!(err.to_string().contains("failed to close reader"));

        let mut both_fail = Failing {
            calls: 0,
            fail_at: 1,
            closes: 0,
            close_error: true,
        };
        let err = read_all_to_records(&ctx, &mut both_fail, &[]).unwrap_err();
        assert_eq!(err.to_string(), DalError::internal("backend went away").to_string());
    }

    #[test]
    fn records_reader_states() {
        let mut r = reader(2);
        assert!(matches!(r.cursor(), Err(DalError::ReaderNotStarted)));
        r.next_record().unwrap();
        assert_eq!(r.cursor().unwrap(), "1");
        r.next_record().unwrap();
        assert!(r.next_record().unwrap_err().is_no_more_records());
        r.close().unwrap();
        r.close().unwrap();
        assert!(matches!(r.cursor(), Err(DalError::ReaderClosed)));
    }

    #[test]
    fn string_ids() {
        let ctx = Context::background();
        let mut r = RecordsReader::new(vec![Record::new(Key::with_id("Users", "u1"))]);
        let ids: Vec<String> = select_all_ids(&ctx, &mut r, &[]).unwrap();
        assert_eq!(ids, vec!["u1".to_string()]);
    }

    #[test]
    fn int_ids_reject_string_keys() {
        let ctx = Context::background();
        let mut r = RecordsReader::new(vec![Record::new(Key::with_id("Users", "u1"))]);
        assert!(select_all_ids::<i64>(&ctx, &mut r, &[]).is_err());
    }

    proptest! {
        #[test]
        fn offset_limit_arithmetic(n in 0i64..30, offset in 0usize..40, limit in 0usize..40) {
            let ctx = Context::background();
            let got = ids(&ctx, &mut reader(n), &[with_offset(offset), with_limit(limit)]);
            let expected: Vec<i64> = (1..=n)
                .skip(offset)
                .take(if limit == 0 { usize::MAX } else { limit })
                .collect();
            prop_assert_eq!(got, expected);
        }
    }
}
