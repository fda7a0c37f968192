//! Request context
//!
//! Every boundary operation takes a `&Context`. A context is an immutable,
//! cheaply cloneable chain of nodes; deriving a child never mutates the
//! parent. It carries:
//!
//! - cancellation (`with_cancel` returns a `CancelHandle`)
//! - an optional deadline (`with_deadline` / `with_timeout`)
//! - typed values keyed by their Rust type (`with_value` / `value`)
//!
//! Modules that store values define a private wrapper type as the key, so
//! two modules can never collide.

use crate::error::{DalError, DalResult};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Request-scoped context
#[derive(Clone, Default)]
pub struct Context {
    node: Option<Arc<Node>>,
}

struct Node {
    parent: Context,
    kind: NodeKind,
}

enum NodeKind {
    Value {
        type_id: TypeId,
        value: Box<dyn Any + Send + Sync>,
    },
    Cancel(Arc<AtomicBool>),
    Deadline(Instant),
}

/// Cancels the context returned alongside it by `Context::with_cancel`
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Cancel the associated context and every context derived from it
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

impl Context {
    /// Empty root context: never cancelled, no deadline, no values
    pub fn background() -> Self {
        Self::default()
    }

    fn child(&self, kind: NodeKind) -> Self {
        Self {
            node: Some(Arc::new(Node {
                parent: self.clone(),
                kind,
            })),
        }
    }

    /// Derive a context carrying `value`, retrievable by its type
    pub fn with_value<T>(&self, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.child(NodeKind::Value {
            type_id: TypeId::of::<T>(),
            value: Box::new(value),
        })
    }

    /// Nearest value of type `T` in the chain
    pub fn value<T>(&self) -> Option<&T>
    where
        T: Any + Send + Sync,
    {
        let wanted = TypeId::of::<T>();
        let mut current = self.node.as_deref();
        while let Some(node) = current {
            if let NodeKind::Value { type_id, value } = &node.kind {
                if *type_id == wanted {
                    return (**value).downcast_ref::<T>();
                }
            }
            current = node.parent.node.as_deref();
        }
        None
    }

    /// Derive a cancellable context
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = self.child(NodeKind::Cancel(Arc::clone(&flag)));
        (ctx, CancelHandle { flag })
    }

    /// Derive a context that expires at `deadline`
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.child(NodeKind::Deadline(deadline))
    }

    /// Derive a context that expires after `timeout`
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Earliest deadline in the chain
    pub fn deadline(&self) -> Option<Instant> {
        let mut earliest: Option<Instant> = None;
        let mut current = self.node.as_deref();
        while let Some(node) = current {
            if let NodeKind::Deadline(d) = node.kind {
                earliest = Some(earliest.map_or(d, |e| e.min(d)));
            }
            current = node.parent.node.as_deref();
        }
        earliest
    }

    /// `Cancelled` or `DeadlineExceeded` once the context is done
    pub fn err(&self) -> Option<DalError> {
        let now = Instant::now();
        let mut current = self.node.as_deref();
        while let Some(node) = current {
            match &node.kind {
                NodeKind::Cancel(flag) if flag.load(Ordering::Acquire) => {
                    return Some(DalError::Cancelled)
                }
                NodeKind::Deadline(d) if *d <= now => return Some(DalError::DeadlineExceeded),
                _ => {}
            }
            current = node.parent.node.as_deref();
        }
        None
    }

    /// True once the context is cancelled or past its deadline
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// `Err` once the context is done
    pub fn check(&self) -> DalResult<()> {
        match self.err() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// True when both handles refer to the same context node
    pub fn same_as(&self, other: &Context) -> bool {
        match (&self.node, &other.node) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0;
        let mut current = self.node.as_deref();
        while let Some(node) = current {
            depth += 1;
            current = node.parent.node.as_deref();
        }
        f.debug_struct("Context")
            .field("depth", &depth)
            .field("done", &self.is_done())
            .finish()
    }
}
