//! In-memory database: transaction coordinator over a shared `MemoryStore`

use crate::store::MemoryStore;
use crate::transaction::MemoryTransaction;
use dal_api::{
    get_non_transactional_context, run_transaction, Adapter, Database, InsertOptions, ReadSession,
    ReadTransaction, ReadonlyWorker, Reader, ReadwriteTransaction, ReadwriteWorker, Transaction,
    TransactionCoordinator, TransactionHandle, TransactionLifecycle, TxOption, TxOptions,
    WriteSession,
};
use dal_core::{Context, DalError, DalResult, Key, Precondition, Record, Update};
use dal_query::Query;
use dal_recordset::{RecordsetOptions, RecordsetReader};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Adapter name reported by [`MemoryDatabase::adapter`]
pub const ADAPTER_NAME: &str = "memory";

/// Database held entirely in process memory
///
/// Cloning is cheap; clones share the same store.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    id: String,
    store: Arc<MemoryStore>,
    next_tx_id: Arc<AtomicU64>,
}

impl MemoryDatabase {
    /// Empty database
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_store(id, Arc::new(MemoryStore::new()))
    }

    /// Database over an existing store
    pub fn with_store(id: impl Into<String>, store: Arc<MemoryStore>) -> Self {
        let id = id.into();
        info!(target: "dal::storage", db = %id, "memory database opened");
        Self {
            id,
            store,
            next_tx_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    fn readonly(&self, ctx: &Context) -> DalResult<Arc<MemoryTransaction>> {
        self.begin(ctx, &TxOptions::default().into_readonly())
    }

    /// Run a single write in its own read-write transaction
    fn autocommit(
        &self,
        ctx: &Context,
        write: &mut dyn FnMut(&Context, &MemoryTransaction) -> DalResult<()>,
    ) -> DalResult<()> {
        let ctx = get_non_transactional_context(ctx).unwrap_or_else(|| ctx.clone());
        let options = TxOptions::default();
        run_transaction(&ctx, self, &options, &mut |tx_ctx, tx| write(tx_ctx, &**tx))
    }
}

impl TransactionLifecycle for MemoryDatabase {
    type Tx = Arc<MemoryTransaction>;

    fn begin(&self, ctx: &Context, options: &TxOptions) -> DalResult<Self::Tx> {
        ctx.check()?;
        let id = self.next_tx_id.fetch_add(1, Ordering::Relaxed);
        debug!(target: "dal::storage", db = %self.id, tx_id = id, "begin");
        Ok(Arc::new(MemoryTransaction::new(
            id,
            Arc::clone(&self.store),
            options.clone(),
        )))
    }

    fn handle(&self, tx: &Self::Tx) -> TransactionHandle {
        if tx.options().is_readonly() {
            TransactionHandle::Readonly(Arc::clone(tx) as Arc<dyn ReadTransaction>)
        } else {
            TransactionHandle::Readwrite(Arc::clone(tx) as Arc<dyn ReadwriteTransaction>)
        }
    }

    fn commit(&self, _ctx: &Context, tx: &Self::Tx) -> DalResult<()> {
        let version = tx.commit()?;
        debug!(target: "dal::storage", db = %self.id, tx_id = tx.id(), version, "commit");
        Ok(())
    }

    fn rollback(&self, _ctx: &Context, tx: &Self::Tx) -> DalResult<()> {
        debug!(target: "dal::storage", db = %self.id, tx_id = tx.id(), "rollback");
        tx.rollback()
    }
}

impl TransactionCoordinator for MemoryDatabase {
    fn run_readonly_transaction(
        &self,
        ctx: &Context,
        worker: &mut ReadonlyWorker<'_>,
        options: &[TxOption],
    ) -> DalResult<()> {
        let options = TxOptions::new(options)?.into_readonly();
        run_transaction(ctx, self, &options, &mut |tx_ctx, tx| {
            worker(tx_ctx, &**tx)
        })
    }

    fn run_readwrite_transaction(
        &self,
        ctx: &Context,
        worker: &mut ReadwriteWorker<'_>,
        options: &[TxOption],
    ) -> DalResult<()> {
        let options = TxOptions::new(options)?;
        if options.is_readonly() {
            return Err(DalError::invalid_argument(
                "read-write transaction requested with the Readonly option",
            ));
        }
        run_transaction(ctx, self, &options, &mut |tx_ctx, tx| {
            worker(tx_ctx, &**tx)
        })
    }
}

impl ReadSession for MemoryDatabase {
    fn get(&self, ctx: &Context, record: &mut Record) -> DalResult<()> {
        self.readonly(ctx)?.get(ctx, record)
    }

    fn get_multi(&self, ctx: &Context, records: &mut [Record]) -> DalResult<()> {
        self.readonly(ctx)?.get_multi(ctx, records)
    }

    fn exists(&self, ctx: &Context, key: &Key) -> DalResult<bool> {
        self.readonly(ctx)?.exists(ctx, key)
    }

    fn execute_query_to_records_reader(
        &self,
        ctx: &Context,
        query: &Query,
    ) -> DalResult<Box<dyn Reader>> {
        self.readonly(ctx)?.execute_query_to_records_reader(ctx, query)
    }

    fn execute_query_to_recordset_reader(
        &self,
        ctx: &Context,
        query: &Query,
        options: RecordsetOptions,
    ) -> DalResult<Box<dyn RecordsetReader>> {
        self.readonly(ctx)?
            .execute_query_to_recordset_reader(ctx, query, options)
    }
}

impl WriteSession for MemoryDatabase {
    fn set(&self, ctx: &Context, record: &mut Record) -> DalResult<()> {
        self.autocommit(ctx, &mut |ctx, tx| tx.set(ctx, record))
    }

    fn set_multi(&self, ctx: &Context, records: &mut [Record]) -> DalResult<()> {
        self.autocommit(ctx, &mut |ctx, tx| tx.set_multi(ctx, records))
    }

    fn insert(&self, ctx: &Context, record: &mut Record, options: InsertOptions) -> DalResult<()> {
        self.autocommit(ctx, &mut |ctx, tx| tx.insert(ctx, record, options.clone()))
    }

    fn insert_multi(
        &self,
        ctx: &Context,
        records: &mut [Record],
        options: InsertOptions,
    ) -> DalResult<()> {
        self.autocommit(ctx, &mut |ctx, tx| {
            tx.insert_multi(ctx, records, options.clone())
        })
    }

    fn update(
        &self,
        ctx: &Context,
        key: &Key,
        updates: &[Update],
        preconditions: &[Precondition],
    ) -> DalResult<()> {
        self.autocommit(ctx, &mut |ctx, tx| tx.update(ctx, key, updates, preconditions))
    }

    fn update_record(
        &self,
        ctx: &Context,
        record: &mut Record,
        updates: &[Update],
        preconditions: &[Precondition],
    ) -> DalResult<()> {
        self.autocommit(ctx, &mut |ctx, tx| {
            tx.update_record(ctx, record, updates, preconditions)
        })
    }

    fn update_multi(
        &self,
        ctx: &Context,
        keys: &[Key],
        updates: &[Update],
        preconditions: &[Precondition],
    ) -> DalResult<()> {
        self.autocommit(ctx, &mut |ctx, tx| {
            tx.update_multi(ctx, keys, updates, preconditions)
        })
    }

    fn delete(&self, ctx: &Context, key: &Key) -> DalResult<()> {
        self.autocommit(ctx, &mut |ctx, tx| tx.delete(ctx, key))
    }

    fn delete_multi(&self, ctx: &Context, keys: &[Key]) -> DalResult<()> {
        self.autocommit(ctx, &mut |ctx, tx| tx.delete_multi(ctx, keys))
    }
}

impl Database for MemoryDatabase {
    fn id(&self) -> &str {
        &self.id
    }

    fn adapter(&self) -> Adapter {
        Adapter::new(ADAPTER_NAME, env!("CARGO_PKG_VERSION"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dal_api::{get_transaction, IsolationLevel};
    use dal_core::JsonMap;
    use parking_lot::Mutex;
    use serde_json::json;

    fn user(id: &str, name: &str) -> Record {
        let mut data = JsonMap::new();
        data.insert("name".into(), json!(name));
        Record::with_data(Key::with_id("Users", id), data)
    }

    #[test]
    fn autocommit_writes_are_visible() {
        let ctx = Context::background();
        let db = MemoryDatabase::new("test");
        db.set(&ctx, &mut user("u1", "Ann")).unwrap();
        assert!(db.exists(&ctx, &Key::with_id("Users", "u1")).unwrap());
        db.delete(&ctx, &Key::with_id("Users", "u1")).unwrap();
        assert!(!db.exists(&ctx, &Key::with_id("Users", "u1")).unwrap());
    }

    #[test]
    fn adapter_and_id() {
        let db = MemoryDatabase::new("main");
        assert_eq!(db.id(), "main");
        assert_eq!(db.adapter().name, "memory");
    }

    #[test]
    fn readonly_worker_gets_readonly_context() {
        let ctx = Context::background();
        let db = MemoryDatabase::new("test");
        db.run_readonly_transaction(
            &ctx,
            &mut |tx_ctx, tx| {
                assert!(tx.options().is_readonly());
                let handle = get_transaction(tx_ctx).unwrap();
                assert!(handle.as_readwrite().is_none());
                Ok(())
            },
            &[],
        )
        .unwrap();
    }

    #[test]
    fn readwrite_rejects_readonly_option() {
        let ctx = Context::background();
        let db = MemoryDatabase::new("test");
        let err = db
            .run_readwrite_transaction(&ctx, &mut |_, _| Ok(()), &[TxOption::Readonly])
            .unwrap_err();
        assert!(matches!(err, DalError::InvalidArgument(_)));
    }

    #[test]
    fn repeated_isolation_level_is_rejected() {
        let ctx = Context::background();
        let db = MemoryDatabase::new("test");
        let options = [
            TxOption::IsolationLevel(IsolationLevel::Serializable),
            TxOption::IsolationLevel(IsolationLevel::Snapshot),
        ];
        assert!(db
            .run_readwrite_transaction(&ctx, &mut |_, _| Ok(()), &options)
            .is_err());
    }

    #[test]
    fn worker_error_discards_writes() {
        let ctx = Context::background();
        let db = MemoryDatabase::new("test");
        let err = db
            .run_readwrite_transaction(
                &ctx,
                &mut |ctx, tx| {
                    tx.set(ctx, &mut user("u1", "Ann"))?;
                    Err(DalError::validation("nope"))
                },
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, DalError::Validation(_)));
        assert!(db.store().is_empty());
    }

    #[test]
    fn conflicting_commit_is_retried() {
        let ctx = Context::background();
        let db = MemoryDatabase::new("test");
        db.set(&ctx, &mut user("u1", "Ann")).unwrap();

        let calls = Mutex::new(0u32);
        db.run_readwrite_transaction(
            &ctx,
            &mut |tx_ctx, tx| {
                let mut record = user("u1", "");
                tx.get(tx_ctx, &mut record)?;
                let mut calls = calls.lock();
                *calls += 1;
                if *calls == 1 {
                    // A writer outside this transaction races us
                    db.update(
                        &Context::background(),
                        &Key::with_id("Users", "u1"),
                        &[Update::by_field_name("name", "Bob")],
                        &[],
                    )?;
                }
                tx.update(tx_ctx, record.key(), &[Update::by_field_name("name", "Cid")], &[])
            },
            &[TxOption::Attempts(3)],
        )
        .unwrap();
        assert_eq!(*calls.lock(), 2);
        assert_eq!(db.store().get("Users/u1").unwrap().data["name"], "Cid");
    }
}
