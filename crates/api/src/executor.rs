//! Query executor backed by an adapter-supplied reader provider

use crate::reader::Reader;
use dal_core::{Context, DalResult, Record};
use dal_query::Query;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Opens a reader over the results of a query
pub type ReaderProvider =
    Arc<dyn Fn(&Context, &Query) -> DalResult<Box<dyn Reader>> + Send + Sync>;

/// Runs structured queries through a [`ReaderProvider`]
#[derive(Clone)]
pub struct QueryExecutor {
    provider: ReaderProvider,
}

impl QueryExecutor {
    /// Executor delegating to `provider`
    pub fn new<F>(provider: F) -> Self
    where
        F: Fn(&Context, &Query) -> DalResult<Box<dyn Reader>> + Send + Sync + 'static,
    {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// Executor sharing an existing provider
    pub fn with_provider(provider: ReaderProvider) -> Self {
        Self { provider }
    }

    /// Open a reader over the results of `query`
    pub fn query_reader(&self, ctx: &Context, query: &Query) -> DalResult<Box<dyn Reader>> {
        ctx.check()?;
        (self.provider)(ctx, query)
    }

    /// Read every result of `query`
    ///
    /// Reads until `NoMoreRecords`; any other error aborts and is returned.
    /// The reader is closed either way.
    pub fn query_all_records(&self, ctx: &Context, query: &Query) -> DalResult<Vec<Record>> {
        let mut reader = self.query_reader(ctx, query)?;
        let mut records = Vec::new();
        let result = loop {
            match reader.next_record() {
                Ok(record) => records.push(record),
                Err(e) if e.is_no_more_records() => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        let closed = reader.close();
        result?;
        closed.map_err(|e| e.context("failed to close reader"))?;
        debug!(target: "dal::reader", count = records.len(), "query executed");
        Ok(records)
    }
}

impl fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryExecutor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::RecordsReader;
    use dal_core::{DalError, IdKind, Key};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn users_query() -> Query {
        dal_query::from("Users").new_query().select_keys_only(IdKind::Int)
    }

    #[test]
    fn query_all_records_reads_to_end() {
        let executor = QueryExecutor::new(|_ctx, _query| {
            let records = (1..=3)
                .map(|i| Record::new(Key::with_id("Users", i as i64)))
                .collect();
            Ok(Box::new(RecordsReader::new(records)) as Box<dyn Reader>)
        });
        let records = executor
            .query_all_records(&Context::background(), &users_query())
            .unwrap();
        let ids: Vec<i64> = records.iter().filter_map(|r| r.key().id().as_int()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn provider_sees_the_query() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let executor = QueryExecutor::new(move |_ctx, query| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert_eq!(query.collection(), Some("Users"));
            Ok(Box::new(RecordsReader::new(Vec::new())) as Box<dyn Reader>)
        });
        let cloned = executor.clone();
        cloned
            .query_reader(&Context::background(), &users_query())
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn provider_error_is_returned() {
        let executor =
            QueryExecutor::new(|_ctx, _query| Err(DalError::not_supported("queries")));
        let err = executor
            .query_all_records(&Context::background(), &users_query())
            .unwrap_err();
        assert!(err.is_not_supported());
    }

    #[test]
    fn cancelled_context_skips_provider() {
        let (ctx, cancel) = Context::background().with_cancel();
        cancel.cancel();
        let executor = QueryExecutor::new(|_ctx, _query| -> DalResult<Box<dyn Reader>> {
            panic!("provider must not be called")
        });
        assert!(executor.query_reader(&ctx, &users_query()).err().unwrap().is_cancelled());
    }
}
