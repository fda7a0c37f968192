//! Transactions: options, handles, context plumbing and the coordinator loop
//!
//! ## Model
//!
//! A coordinator runs a worker callback inside a transaction. The worker gets
//! a transaction-bound context and the transaction handle; returning `Ok`
//! commits, returning `Err` rolls back.
//!
//! ## Retries
//!
//! The worker is invoked up to `attempts` times. Only contention reported by
//! the adapter (`DalError::Conflict`) is retried, with exponential back-off
//! taken from `DalConfig`.
//!
//! ## Context plumbing
//!
//! The transaction handle and the context the transaction was started from
//! are stored in the derived context under private types, so user values
//! can never collide with them.

use crate::session::{ReadSession, WriteSession};
use dal_core::{Context, DalConfig, DalError, DalResult};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Isolation level requested for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IsolationLevel {
    /// Adapter default
    #[default]
    Unspecified,
    /// No guarantees
    Chaos,
    /// Read committed
    ReadCommitted,
    /// Read uncommitted
    ReadUncommitted,
    /// Repeatable read
    RepeatableRead,
    /// Serializable
    Serializable,
    /// Snapshot isolation
    Snapshot,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IsolationLevel::Unspecified => "Unspecified",
            IsolationLevel::Chaos => "Chaos",
            IsolationLevel::ReadCommitted => "ReadCommitted",
            IsolationLevel::ReadUncommitted => "ReadUncommitted",
            IsolationLevel::RepeatableRead => "RepeatableRead",
            IsolationLevel::Serializable => "Serializable",
            IsolationLevel::Snapshot => "Snapshot",
        };
        f.write_str(s)
    }
}

/// One transaction option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOption {
    /// Name for logs and diagnostics
    Name(String),
    /// Requested isolation level; may be given once
    IsolationLevel(IsolationLevel),
    /// Read-only transaction
    Readonly,
    /// Transaction spans multiple entity groups
    CrossGroup,
    /// Maximum worker invocations
    Attempts(u32),
}

/// Folded transaction options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxOptions {
    name: Option<String>,
    isolation_level: IsolationLevel,
    readonly: bool,
    cross_group: bool,
    attempts: Option<u32>,
}

impl TxOptions {
    /// Fold options
    ///
    /// Setting an isolation level when one is already set is an error, as
    /// is `Attempts(0)`.
    pub fn new(options: &[TxOption]) -> DalResult<Self> {
        let mut folded = TxOptions::default();
        for option in options {
            match option {
                TxOption::Name(name) => folded.name = Some(name.clone()),
                TxOption::IsolationLevel(level) => {
                    if folded.isolation_level != IsolationLevel::Unspecified {
                        return Err(DalError::invalid_argument(format!(
                            "isolation level already set to {}, cannot set {}",
                            folded.isolation_level, level
                        )));
                    }
                    folded.isolation_level = *level;
                }
                TxOption::Readonly => folded.readonly = true,
                TxOption::CrossGroup => folded.cross_group = true,
                TxOption::Attempts(0) => {
                    return Err(DalError::invalid_argument(
                        "transaction attempts must be greater than zero",
                    ))
                }
                TxOption::Attempts(n) => folded.attempts = Some(*n),
            }
        }
        Ok(folded)
    }

    /// Transaction name, if given
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Requested isolation level
    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    /// True for read-only transactions
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// True when the transaction spans entity groups
    pub fn is_cross_group(&self) -> bool {
        self.cross_group
    }

    /// Worker invocations allowed; the configured default when not given
    pub fn attempts(&self) -> u32 {
        self.attempts
            .unwrap_or_else(|| DalConfig::current().transaction_attempts)
    }

    /// Same options marked read-only
    pub fn into_readonly(mut self) -> Self {
        self.readonly = true;
        self
    }
}

/// Common surface of every transaction handle
pub trait Transaction: Send + Sync {
    /// Options the transaction was started with
    fn options(&self) -> &TxOptions;
}

/// Transaction that can only read
pub trait ReadTransaction: Transaction + ReadSession {}

/// Transaction that can read and write
pub trait ReadwriteTransaction: ReadTransaction + WriteSession {
    /// View as a read transaction
    fn as_read_transaction(&self) -> &dyn ReadTransaction;
}

/// Transaction handle as stored in a context
#[derive(Clone)]
pub enum TransactionHandle {
    /// Read-only transaction
    Readonly(Arc<dyn ReadTransaction>),
    /// Read-write transaction
    Readwrite(Arc<dyn ReadwriteTransaction>),
}

impl TransactionHandle {
    /// Options the transaction was started with
    pub fn options(&self) -> &TxOptions {
        match self {
            TransactionHandle::Readonly(tx) => tx.options(),
            TransactionHandle::Readwrite(tx) => tx.options(),
        }
    }

    /// Read view of the transaction
    pub fn as_read(&self) -> &dyn ReadTransaction {
        match self {
            TransactionHandle::Readonly(tx) => tx.as_ref(),
            TransactionHandle::Readwrite(tx) => tx.as_read_transaction(),
        }
    }

    /// Read-write view, if the transaction can write
    pub fn as_readwrite(&self) -> Option<&dyn ReadwriteTransaction> {
        match self {
            TransactionHandle::Readonly(_) => None,
            TransactionHandle::Readwrite(tx) => Some(tx.as_ref()),
        }
    }

    /// True when both handles point at the same transaction
    pub fn same_as(&self, other: &TransactionHandle) -> bool {
        let a = self.as_read() as *const _ as *const ();
        let b = other.as_read() as *const _ as *const ();
        std::ptr::eq(a, b)
    }
}

impl fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            TransactionHandle::Readonly(_) => "Readonly",
            TransactionHandle::Readwrite(_) => "Readwrite",
        };
        f.debug_struct("TransactionHandle")
            .field("kind", &kind)
            .field("options", self.options())
            .finish()
    }
}

struct TransactionValue(TransactionHandle);

struct NonTransactionalContext(Context);

/// Derive a context carrying `tx` and remembering `ctx` as the
/// non-transactional parent
pub fn new_context_with_transaction(ctx: &Context, tx: TransactionHandle) -> Context {
    ctx.with_value(NonTransactionalContext(ctx.clone()))
        .with_value(TransactionValue(tx))
}

/// Transaction carried by `ctx`, if any
pub fn get_transaction(ctx: &Context) -> Option<TransactionHandle> {
    ctx.value::<TransactionValue>().map(|v| v.0.clone())
}

/// Context the current transaction was started from; `None` outside
/// transactions
pub fn get_non_transactional_context(ctx: &Context) -> Option<Context> {
    ctx.value::<NonTransactionalContext>().map(|v| v.0.clone())
}

/// Worker of a read-only transaction
pub type ReadonlyWorker<'a> = dyn FnMut(&Context, &dyn ReadTransaction) -> DalResult<()> + 'a;

/// Worker of a read-write transaction
pub type ReadwriteWorker<'a> = dyn FnMut(&Context, &dyn ReadwriteTransaction) -> DalResult<()> + 'a;

/// Runs workers inside transactions
pub trait TransactionCoordinator: Send + Sync {
    /// Run `worker` in a read-only transaction
    fn run_readonly_transaction(
        &self,
        ctx: &Context,
        worker: &mut ReadonlyWorker<'_>,
        options: &[TxOption],
    ) -> DalResult<()>;

    /// Run `worker` in a read-write transaction
    fn run_readwrite_transaction(
        &self,
        ctx: &Context,
        worker: &mut ReadwriteWorker<'_>,
        options: &[TxOption],
    ) -> DalResult<()>;
}

/// Name and version of an adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adapter {
    /// Adapter name
    pub name: String,
    /// Adapter version
    pub version: String,
}

impl Adapter {
    /// Describe an adapter
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A database: a transaction coordinator that can also read directly
pub trait Database: TransactionCoordinator + ReadSession {
    /// Database instance id
    fn id(&self) -> &str;

    /// Adapter serving this database
    fn adapter(&self) -> Adapter;
}

/// Begin/commit/rollback of an adapter, driven by [`run_transaction`]
pub trait TransactionLifecycle {
    /// Adapter transaction type
    type Tx;

    /// Start a transaction
    fn begin(&self, ctx: &Context, options: &TxOptions) -> DalResult<Self::Tx>;

    /// Context-storable handle to `tx`
    fn handle(&self, tx: &Self::Tx) -> TransactionHandle;

    /// Make the transaction's writes visible; `Conflict` when it lost a race
    fn commit(&self, ctx: &Context, tx: &Self::Tx) -> DalResult<()>;

    /// Discard the transaction's writes
    fn rollback(&self, ctx: &Context, tx: &Self::Tx) -> DalResult<()>;
}

/// Coordinator loop shared by adapters
///
/// Begins a transaction, runs `worker` with a transaction-bound context and
/// commits. A worker or commit error triggers a rollback; if that fails too
/// the result is `DalError::Rollback` carrying both errors. Conflicts, from
/// the worker or from commit, start a new attempt until `options.attempts()`
/// is used up; the last conflict is then returned.
pub fn run_transaction<L: TransactionLifecycle>(
    ctx: &Context,
    lifecycle: &L,
    options: &TxOptions,
    worker: &mut dyn FnMut(&Context, &L::Tx) -> DalResult<()>,
) -> DalResult<()> {
    if get_transaction(ctx).is_some() {
        return Err(DalError::not_supported(
            "nested transactions: the context already carries a transaction",
        ));
    }
    let attempts = options.attempts();
    let config = DalConfig::current();
    let name = options.name().unwrap_or("");

    let mut attempt = 0;
    loop {
        attempt += 1;
        ctx.check()?;
        let tx = lifecycle.begin(ctx, options)?;
        let tx_ctx = new_context_with_transaction(ctx, lifecycle.handle(&tx));
        debug!(target: "dal::txn", tx = name, attempt, readonly = options.is_readonly(), "transaction started");

        let error = match worker(&tx_ctx, &tx).and_then(|()| lifecycle.commit(ctx, &tx)) {
            Ok(()) => {
                debug!(target: "dal::txn", tx = name, attempt, "transaction committed");
                return Ok(());
            }
            Err(e) => e,
        };
        if let Err(rollback) = lifecycle.rollback(ctx, &tx) {
            warn!(target: "dal::txn", tx = name, attempt, error = %rollback, "rollback failed");
            return Err(DalError::Rollback {
                original: Box::new(error),
                rollback: Box::new(rollback),
            });
        }
        debug!(target: "dal::txn", tx = name, attempt, error = %error, "transaction rolled back");

        if !error.is_conflict() {
            return Err(error);
        }
        if attempt >= attempts {
            return Err(error.context(format!("transaction failed after {} attempts", attempts)));
        }
        let delay = config.retry_delay(attempt - 1);
        warn!(target: "dal::txn", tx = name, attempt, attempts, ?delay, "transaction conflict, retrying");
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}
