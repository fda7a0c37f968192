//! Optimistic transactions over a `MemoryStore`
//!
//! Reads go to the latest committed state and record the version they saw
//! in the read set. Writes are buffered and become visible to the
//! transaction's own reads immediately, and to everyone else at commit.
//! Commit validates the read set (first committer wins) and applies the
//! buffered writes atomically.
//!
//! # Isolation
//!
//! Every level runs as serializable-on-read-set: write skew through records
//! that were never read is possible, as with any read-set validation.

use crate::eval;
use crate::mutation::{apply_updates, check_preconditions};
use crate::reader::{MemoryReader, MemoryRecordsetReader};
use crate::store::{MemoryStore, PendingWrite, StoredRecord};
use crate::validation::ReadSet;
use chrono::Utc;
use dal_api::{
    insert_with_random_id, IdGenerator, InsertOptions, ReadSession, ReadTransaction,
    ReadwriteTransaction, Reader, Transaction, TxOptions, WriteSession,
};
use dal_core::entity::before_save;
use dal_core::{
    get_preconditions, Context, DalError, DalResult, IdKind, Key, KeyId, Precondition,
    Record, Update,
};
use dal_query::Query;
use dal_recordset::{dense, ColumnarRecordset, RecordsetOptions, RecordsetReader};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Active,
    Committed,
    RolledBack,
}

#[derive(Debug)]
struct TxState {
    read_set: ReadSet,
    writes: BTreeMap<String, PendingWrite>,
    status: Status,
}

/// Transaction of the in-memory adapter
#[derive(Debug)]
pub struct MemoryTransaction {
    id: u64,
    store: Arc<MemoryStore>,
    options: TxOptions,
    state: Mutex<TxState>,
}

impl MemoryTransaction {
    /// Start a transaction on `store`
    pub fn new(id: u64, store: Arc<MemoryStore>, options: TxOptions) -> Self {
        Self {
            id,
            store,
            options,
            state: Mutex::new(TxState {
                read_set: ReadSet::new(),
                writes: BTreeMap::new(),
                status: Status::Active,
            }),
        }
    }

    /// Transaction id, unique per database
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of buffered writes
    pub fn pending_writes(&self) -> usize {
        self.state.lock().writes.len()
    }

    /// Validate and apply the buffered writes
    pub fn commit(&self) -> DalResult<u64> {
        let mut state = self.state.lock();
        ensure_active(&state)?;
        let writes = std::mem::take(&mut state.writes);
        let result = self.store.commit(&state.read_set, writes);
        // A failed commit leaves nothing to roll back
        state.status = if result.is_ok() {
            Status::Committed
        } else {
            Status::RolledBack
        };
        result
    }

    /// Discard the buffered writes
    pub fn rollback(&self) -> DalResult<()> {
        let mut state = self.state.lock();
        match state.status {
            Status::Committed => Err(DalError::internal(format!(
                "transaction {} is already committed",
                self.id
            ))),
            Status::RolledBack => Ok(()),
            Status::Active => {
                state.writes.clear();
                state.read_set.clear();
                state.status = Status::RolledBack;
                Ok(())
            }
        }
    }

    fn ensure_writable(&self) -> DalResult<()> {
        if self.options.is_readonly() {
            return Err(DalError::not_supported("write in a read-only transaction"));
        }
        Ok(())
    }

    /// Read `key` as this transaction sees it
    fn read(&self, key: &Key) -> DalResult<Option<StoredRecord>> {
        let path = key.path();
        let mut state = self.state.lock();
        ensure_active(&state)?;
        match state.writes.get(&path) {
            Some(PendingWrite::Put { key, data }) => {
                let committed = self.store.get(&path);
                return Ok(Some(StoredRecord {
                    key: key.clone(),
                    data: data.clone(),
                    version: committed.as_ref().map_or(0, |r| r.version),
                    update_time: committed.map_or_else(Utc::now, |r| r.update_time),
                }));
            }
            Some(PendingWrite::Delete) => return Ok(None),
            None => {}
        }
        let stored = self.store.get(&path);
        state
            .read_set
            .entry(path)
            .or_insert_with(|| stored.as_ref().map_or(0, |r| r.version));
        Ok(stored)
    }

    fn write(&self, path: String, write: PendingWrite) -> DalResult<()> {
        let mut state = self.state.lock();
        ensure_active(&state)?;
        state.writes.insert(path, write);
        Ok(())
    }

    /// Committed records in scope, overlaid with this transaction's writes,
    /// in path order
    ///
    /// Only records whose key passes `in_scope` are returned and recorded in
    /// the read set.
    fn visible_records(
        &self,
        in_scope: &dyn Fn(&Key) -> DalResult<bool>,
    ) -> DalResult<Vec<StoredRecord>> {
        let mut state = self.state.lock();
        ensure_active(&state)?;
        let mut visible = BTreeMap::new();
        for record in self.store.scan() {
            if in_scope(&record.key)? {
                visible.insert(record.key.path(), record);
            }
        }
        for (path, write) in &state.writes {
            match write {
                PendingWrite::Put { key, data } => {
                    if !in_scope(key)? {
                        continue;
                    }
                    let entry = visible.entry(path.clone()).or_insert_with(|| StoredRecord {
                        key: key.clone(),
                        data: data.clone(),
                        version: 0,
                        update_time: Utc::now(),
                    });
                    entry.data = data.clone();
                }
                PendingWrite::Delete => {
                    visible.remove(path);
                }
            }
        }
        let TxState {
            read_set, writes, ..
        } = &mut *state;
        for (path, record) in &visible {
            if !writes.contains_key(path) {
                read_set.entry(path.clone()).or_insert(record.version);
            }
        }
        Ok(visible.into_values().collect())
    }

    fn put_record(&self, ctx: &Context, record: &mut Record) -> DalResult<()> {
        let key = record.key().clone();
        if !key.is_complete() {
            return Err(DalError::invalid_argument(format!(
                "record key {} has no id",
                key
            )));
        }
        key.validate()?;
        before_save(ctx, record)?;
        let data = record.data_mut().to_json()?;
        self.write(key.path(), PendingWrite::Put { key, data })?;
        record.set_error(None);
        Ok(())
    }

    fn insert_new(&self, ctx: &Context, record: &mut Record) -> DalResult<()> {
        if self.read(record.key())?.is_some() {
            return Err(DalError::precondition_failed(format!(
                "record {} already exists",
                record.key()
            )));
        }
        self.put_record(ctx, record)
    }

    fn next_int_id(&self, key: &Key) -> DalResult<i64> {
        let collection_path = key.collection_path();
        let max = self
            .visible_records(&|k: &Key| Ok(k.collection_path() == collection_path))?
            .iter()
            .filter_map(|r| r.key.id().as_int())
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    fn update_stored(
        &self,
        key: &Key,
        updates: &[Update],
        preconditions: &[Precondition],
    ) -> DalResult<serde_json::Value> {
        self.ensure_writable()?;
        for update in updates {
            update.validate()?;
        }
        let existing = self.read(key)?;
        check_preconditions(key, existing.as_ref(), &get_preconditions(preconditions))?;
        let mut data = match existing {
            Some(record) => record.data,
            None => return Err(DalError::not_found_by_key(key.clone())),
        };
        apply_updates(&mut data, updates, Utc::now())?;
        self.write(
            key.path(),
            PendingWrite::Put {
                key: key.clone(),
                data: data.clone(),
            },
        )?;
        Ok(data)
    }
}

fn ensure_active(state: &TxState) -> DalResult<()> {
    match state.status {
        Status::Active => Ok(()),
        Status::Committed => Err(DalError::internal("transaction is already committed")),
        Status::RolledBack => Err(DalError::internal("transaction is rolled back")),
    }
}

impl Transaction for MemoryTransaction {
    fn options(&self) -> &TxOptions {
        &self.options
    }
}

impl ReadSession for MemoryTransaction {
    fn get(&self, ctx: &Context, record: &mut Record) -> DalResult<()> {
        ctx.check()?;
        match self.read(record.key())? {
            Some(stored) => {
                record.data_mut().load_json(stored.data)?;
                dal_core::entity::after_load(ctx, record)?;
                record.set_error(None);
            }
            None => {
                let key = record.key().clone();
                record.set_error(Some(DalError::not_found_by_key(key)));
            }
        }
        Ok(())
    }

    fn get_multi(&self, ctx: &Context, records: &mut [Record]) -> DalResult<()> {
        for record in records.iter_mut() {
            ctx.check()?;
            if let Err(e) = self.get(ctx, record) {
                record.set_error(Some(e));
            }
        }
        Ok(())
    }

    fn exists(&self, ctx: &Context, key: &Key) -> DalResult<bool> {
        ctx.check()?;
        Ok(self.read(key)?.is_some())
    }

    fn execute_query_to_records_reader(
        &self,
        ctx: &Context,
        query: &Query,
    ) -> DalResult<Box<dyn Reader>> {
        ctx.check()?;
        let source = match query.from_source() {
            Some(source) if !eval::is_aggregate(query) => source,
            _ => {
                return Err(DalError::not_supported(
                    "records reader over a query without rows; use a recordset reader",
                ))
            }
        };
        let in_scope = |key: &Key| eval::matches_source(source, key);
        let rows = eval::select_rows(query, self.visible_records(&in_scope)?)?;
        let records = rows
            .iter()
            .map(|row| eval::to_record(ctx, query, row))
            .collect::<DalResult<Vec<Record>>>()?;
        debug!(target: "dal::storage", tx = self.id, count = records.len(), query = %query, "query executed");
        Ok(Box::new(MemoryReader::new(records)))
    }

    fn execute_query_to_recordset_reader(
        &self,
        ctx: &Context,
        query: &Query,
        options: RecordsetOptions,
    ) -> DalResult<Box<dyn RecordsetReader>> {
        ctx.check()?;
        let rows = match query.from_source() {
            Some(source) => {
                let in_scope = |key: &Key| eval::matches_source(source, key);
                eval::select_rows(query, self.visible_records(&in_scope)?)?
            }
            None => Vec::new(),
        };
        let projected = eval::project(query, &rows)?;
        let recordset = if options.has_columns() {
            options.new_recordset()?
        } else {
            derive_recordset(&projected)?
        };
        let aggregate = eval::is_aggregate(query) || query.from_source().is_none();
        let rows = projected
            .into_iter()
            .enumerate()
            .map(|(i, values)| {
                let path = if aggregate {
                    None
                } else {
                    rows.get(i).map(|r| r.key.path())
                };
                (path, values)
            })
            .collect();
        Ok(Box::new(MemoryRecordsetReader::new(recordset, rows)))
    }
}

/// One untyped dense column per projected name, in name order
fn derive_recordset(rows: &[eval::ProjectedRow]) -> DalResult<ColumnarRecordset> {
    let names = match rows.first() {
        Some(row) => row.keys().cloned().collect::<Vec<_>>(),
        None => Vec::new(),
    };
    ColumnarRecordset::new(
        names
            .into_iter()
            .map(|name| dense(name, dal_core::Value::Null))
            .collect(),
    )
}

impl WriteSession for MemoryTransaction {
    fn set(&self, ctx: &Context, record: &mut Record) -> DalResult<()> {
        ctx.check()?;
        self.ensure_writable()?;
        self.put_record(ctx, record)
    }

    fn set_multi(&self, ctx: &Context, records: &mut [Record]) -> DalResult<()> {
        for record in records.iter_mut() {
            self.set(ctx, record)?;
        }
        Ok(())
    }

    fn insert(&self, ctx: &Context, record: &mut Record, options: InsertOptions) -> DalResult<()> {
        ctx.check()?;
        self.ensure_writable()?;
        let generator: Option<IdGenerator> = match options.id_generator() {
            Some(generator) => Some(generator.clone()),
            None if record.key().is_complete() => None,
            None if record.key().id_kind() == IdKind::Int => {
                let id = self.next_int_id(record.key())?;
                record.key_mut().set_id(KeyId::Int(id));
                None
            }
            None => Some(dal_api::default_random_string_generator()),
        };
        match generator {
            None => self.insert_new(ctx, record),
            Some(generator) => insert_with_random_id(
                ctx,
                record,
                &generator,
                options.max_attempts(),
                |key| match self.read(key)? {
                    Some(_) => Ok(()),
                    None => Err(DalError::not_found_by_key(key.clone())),
                },
                |record| self.put_record(ctx, record),
            ),
        }
    }

    fn insert_multi(
        &self,
        ctx: &Context,
        records: &mut [Record],
        options: InsertOptions,
    ) -> DalResult<()> {
        for record in records.iter_mut() {
            self.insert(ctx, record, options.clone())?;
        }
        Ok(())
    }

    fn update(
        &self,
        ctx: &Context,
        key: &Key,
        updates: &[Update],
        preconditions: &[Precondition],
    ) -> DalResult<()> {
        ctx.check()?;
        self.update_stored(key, updates, preconditions).map(|_| ())
    }

    fn update_record(
        &self,
        ctx: &Context,
        record: &mut Record,
        updates: &[Update],
        preconditions: &[Precondition],
    ) -> DalResult<()> {
        ctx.check()?;
        let data = self.update_stored(record.key(), updates, preconditions)?;
        record.data_mut().load_json(data)?;
        record.set_error(None);
        Ok(())
    }

    fn update_multi(
        &self,
        ctx: &Context,
        keys: &[Key],
        updates: &[Update],
        preconditions: &[Precondition],
    ) -> DalResult<()> {
        for key in keys {
            self.update(ctx, key, updates, preconditions)?;
        }
        Ok(())
    }

    fn delete(&self, ctx: &Context, key: &Key) -> DalResult<()> {
        ctx.check()?;
        self.ensure_writable()?;
        self.write(key.path(), PendingWrite::Delete)
    }

    fn delete_multi(&self, ctx: &Context, keys: &[Key]) -> DalResult<()> {
        for key in keys {
            self.delete(ctx, key)?;
        }
        Ok(())
    }
}

impl ReadTransaction for MemoryTransaction {}

impl ReadwriteTransaction for MemoryTransaction {
    fn as_read_transaction(&self) -> &dyn ReadTransaction {
        self
    }
}
