//! Public API layer of the DAL
//!
//! This crate is the contract between application code and adapters:
//! - **Sessions**: `ReadSession` / `WriteSession` capability traits
//! - **Transactions**: options, handles, context plumbing and the
//!   coordinator loop adapters build on
//! - **Readers**: pull-based record streams and the `select_*` helpers
//! - **Executor**: `QueryExecutor` over an adapter-supplied reader provider
//! - **Insert**: insert-with-generated-id protocol and id generators
//!
//! ## Quick Start
//!
//! ```ignore
//! use dal_api::{select_all_ids, TransactionCoordinator, TxOption};
//!
//! db.run_readwrite_transaction(&ctx, &mut |ctx, tx| {
//!     let mut user = Record::with_data(Key::with_id("Users", "u1"), user);
//!     tx.set(ctx, &mut user)
//! }, &[TxOption::Attempts(3)])?;
//!
//! let mut reader = db.execute_query_to_records_reader(&ctx, &query)?;
//! let ids: Vec<String> = select_all_ids(&ctx, reader.as_mut(), &[with_limit(10)])?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod executor;
pub mod insert;
pub mod reader;
pub mod session;
pub mod transaction;

pub use executor::{QueryExecutor, ReaderProvider};
pub use insert::{
    default_random_string_generator, insert_with_random_id, random_string_generator,
    random_string_generator_with_prefix, timestamp_generator, timestamp_generator_with_clock,
    unix_time_prefixed_generator, IdGenerator, InsertOptions,
};
pub use reader::{
    read_all_to_records, select_all, select_all_ids, with_limit, with_offset, FromKeyId, Reader,
    ReaderOption, ReaderOptions, RecordsReader,
};
pub use session::{ReadSession, ReadwriteSession, WriteSession};
pub use transaction::{
    get_non_transactional_context, get_transaction, new_context_with_transaction,
    run_transaction, Adapter, Database, IsolationLevel, ReadTransaction, ReadonlyWorker,
    ReadwriteTransaction, ReadwriteWorker, Transaction, TransactionCoordinator,
    TransactionHandle, TransactionLifecycle, TxOption, TxOptions,
};
