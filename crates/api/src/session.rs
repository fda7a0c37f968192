//! Session capability traits
//!
//! Adapters implement the capabilities they can fulfil. Reading and writing
//! are separate traits; [`ReadwriteSession`] is implemented automatically for
//! anything that does both. Operations an adapter cannot serve return
//! `DalError::NotSupported`.

use crate::insert::InsertOptions;
use crate::reader::{read_all_to_records, Reader, ReaderOption};
use dal_core::{Context, DalError, DalResult, Key, Precondition, Record, Update};
use dal_query::Query;
use dal_recordset::{RecordsetOptions, RecordsetReader};

/// Read capability
pub trait ReadSession: Send + Sync {
    /// Load a record
    ///
    /// On success the stored value is written through the record's data and
    /// the record is marked as existing. A missing record is not an error at
    /// this level: the record carries a not-found status and `exists()`
    /// reads `false`.
    fn get(&self, ctx: &Context, record: &mut Record) -> DalResult<()>;

    /// Load several records
    ///
    /// Per-record outcomes are attached to the records; the returned error
    /// reports adapter-level failures only.
    fn get_multi(&self, ctx: &Context, records: &mut [Record]) -> DalResult<()>;

    /// True when a record with `key` exists
    fn exists(&self, ctx: &Context, key: &Key) -> DalResult<bool>;

    /// Stream the results of `query` as records
    fn execute_query_to_records_reader(
        &self,
        _ctx: &Context,
        _query: &Query,
    ) -> DalResult<Box<dyn Reader>> {
        Err(DalError::not_supported("execute_query_to_records_reader"))
    }

    /// Stream the results of `query` into a columnar recordset
    fn execute_query_to_recordset_reader(
        &self,
        _ctx: &Context,
        _query: &Query,
        _options: RecordsetOptions,
    ) -> DalResult<Box<dyn RecordsetReader>> {
        Err(DalError::not_supported("execute_query_to_recordset_reader"))
    }

    /// Run `query` and collect every record
    fn query_all_records(
        &self,
        ctx: &Context,
        query: &Query,
        options: &[ReaderOption],
    ) -> DalResult<Vec<Record>> {
        let mut reader = self.execute_query_to_records_reader(ctx, query)?;
        read_all_to_records(ctx, reader.as_mut(), options)
    }
}

/// Write capability
pub trait WriteSession: Send + Sync {
    /// Create or overwrite a record
    fn set(&self, ctx: &Context, record: &mut Record) -> DalResult<()>;

    /// Create or overwrite several records
    fn set_multi(&self, ctx: &Context, records: &mut [Record]) -> DalResult<()>;

    /// Create a record that must not exist yet
    ///
    /// With an id generator in `options` the key id is generated, see
    /// `insert::insert_with_random_id`.
    fn insert(&self, ctx: &Context, record: &mut Record, options: InsertOptions) -> DalResult<()>;

    /// Insert several records with the same options
    fn insert_multi(
        &self,
        ctx: &Context,
        records: &mut [Record],
        options: InsertOptions,
    ) -> DalResult<()>;

    /// Apply field updates to the record stored under `key`
    ///
    /// A precondition that does not hold fails with `PreconditionFailed`
    /// and leaves the record untouched.
    fn update(
        &self,
        ctx: &Context,
        key: &Key,
        updates: &[Update],
        preconditions: &[Precondition],
    ) -> DalResult<()>;

    /// Apply field updates to `record` and refresh its data
    fn update_record(
        &self,
        ctx: &Context,
        record: &mut Record,
        updates: &[Update],
        preconditions: &[Precondition],
    ) -> DalResult<()>;

    /// Apply the same updates to several records
    fn update_multi(
        &self,
        ctx: &Context,
        keys: &[Key],
        updates: &[Update],
        preconditions: &[Precondition],
    ) -> DalResult<()>;

    /// Delete a record; deleting a missing record succeeds
    fn delete(&self, ctx: &Context, key: &Key) -> DalResult<()>;

    /// Delete several records
    fn delete_multi(&self, ctx: &Context, keys: &[Key]) -> DalResult<()>;
}

/// Read and write capability
pub trait ReadwriteSession: ReadSession + WriteSession {}

impl<T: ReadSession + WriteSession + ?Sized> ReadwriteSession for T {}
