//! # AsyncState
//!
//! Predicate-based waiting on an object's execution state.
//!
//! Every `ExecutionStateful` object owns a [`StateCell`]. The model writer is
//! the only one that calls [`StateCell::set`] and [`StateCell::invalidate`];
//! everybody else waits through an [`AsyncState`]:
//!
//! ```rust
//! use tether_core::async_state::StateCell;
//! use tether_core::types::{ExecutionState, TargetPath};
//!
//! # let runtime = tokio::runtime::Runtime::new().unwrap();
//! # runtime.block_on(async {
//! let cell = StateCell::new(TargetPath::root().child("Processes").index(1), Some(ExecutionState::Stopped));
//! let state = cell.async_state().wait_until(ExecutionState::is_stopped).await.unwrap();
//! assert_eq!(state, ExecutionState::Stopped);
//! # });
//! ```
//!
//! ## Guarantees
//!
//! - A wait whose predicate already holds resolves without any notification.
//! - Otherwise the first satisfying `set` resolves it. Waiters satisfied by the
//!   same notification resolve in registration order.
//! - Each waiter is resolved or failed exactly once; cancelled waiters are
//!   dropped at the next notification.
//! - Once the cell is invalidated (object removed or detached) every pending
//!   and every future wait fails with `ObjectGone`.
//!
//! Predicates run while the cell is locked. They must not call back into the
//! same cell.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::capability::ExecutionStateful;
use crate::error::ModelError;
use crate::operation::{operation, Completer, Operation};
use crate::types::{ExecutionState, TargetPath};

type Predicate = Box<dyn Fn(ExecutionState) -> bool + Send>;

struct Waiter
{
    predicate: Predicate,
    completer: Completer<ExecutionState>,
}

#[derive(Default)]
struct CellInner
{
    state: Option<ExecutionState>,
    waiters: Vec<Waiter>,
    gone: bool,
}

/// Shared execution-state cell of one object.
#[derive(Clone)]
pub struct StateCell
{
    path: Arc<TargetPath>,
    inner: Arc<Mutex<CellInner>>,
}

impl StateCell
{
    #[must_use]
    pub fn new(path: TargetPath, initial: Option<ExecutionState>) -> Self
    {
        Self {
            path: Arc::new(path),
            inner: Arc::new(Mutex::new(CellInner {
                state: initial,
                ..CellInner::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CellInner>
    {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Path of the owning object.
    #[must_use]
    pub fn path(&self) -> &TargetPath
    {
        &self.path
    }

    /// Last observed state.
    #[must_use]
    pub fn get(&self) -> Option<ExecutionState>
    {
        self.lock().state
    }

    /// Whether the owning object is gone.
    #[must_use]
    pub fn is_gone(&self) -> bool
    {
        self.lock().gone
    }

    /// Number of waiters still registered.
    #[must_use]
    pub fn pending_waiters(&self) -> usize
    {
        self.lock().waiters.len()
    }

    #[must_use]
    pub fn async_state(&self) -> AsyncState
    {
        AsyncState { cell: self.clone() }
    }

    /// Record a new state and resolve every waiter it satisfies.
    ///
    /// Returns the number of waiters resolved. Ignored once the cell is gone.
    pub(crate) fn set(&self, state: ExecutionState) -> usize
    {
        let mut inner = self.lock();
        if inner.gone {
            return 0;
        }
        inner.state = Some(state);

        let mut resolved = 0;
        let mut pending = Vec::with_capacity(inner.waiters.len());
        for waiter in inner.waiters.drain(..) {
            if waiter.completer.is_cancelled() {
                continue;
            }
            if (waiter.predicate)(state) {
                if waiter.completer.complete(state) {
                    resolved += 1;
                }
            } else {
                pending.push(waiter);
            }
        }
        inner.waiters = pending;
        trace!(path = %self.path, %state, resolved, pending = inner.waiters.len(), "state cell updated");
        resolved
    }

    /// Mark the cell gone and fail every pending waiter with `ObjectGone`.
    pub(crate) fn invalidate(&self)
    {
        let mut inner = self.lock();
        if inner.gone {
            return;
        }
        inner.gone = true;
        let waiters = std::mem::take(&mut inner.waiters);
        drop(inner);

        trace!(path = %self.path, failed = waiters.len(), "state cell invalidated");
        for waiter in waiters {
            waiter.completer.fail(ModelError::ObjectGone((*self.path).clone()));
        }
    }

    fn register(&self, predicate: Predicate) -> Operation<ExecutionState>
    {
        let mut inner = self.lock();
        if inner.gone {
            return Operation::failed(ModelError::ObjectGone((*self.path).clone()));
        }
        if let Some(state) = inner.state.filter(|state| predicate(*state)) {
            return Operation::ready(state);
        }

        inner.waiters.retain(|waiter| !waiter.completer.is_cancelled());
        let (completer, op) = operation();
        inner.waiters.push(Waiter { predicate, completer });
        trace!(path = %self.path, pending = inner.waiters.len(), "registered state waiter");
        op
    }
}

impl ExecutionStateful for StateCell
{
    fn execution_state(&self) -> Option<ExecutionState>
    {
        self.get()
    }

    fn async_state(&self) -> AsyncState
    {
        StateCell::async_state(self)
    }
}

impl fmt::Debug for StateCell
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let inner = self.lock();
        f.debug_struct("StateCell")
            .field("path", &self.path.to_string())
            .field("state", &inner.state)
            .field("waiters", &inner.waiters.len())
            .field("gone", &inner.gone)
            .finish()
    }
}

/// Wait handle over a [`StateCell`].
#[derive(Clone, Debug)]
pub struct AsyncState
{
    cell: StateCell,
}

impl AsyncState
{
    /// Last observed state.
    #[must_use]
    pub fn state(&self) -> Option<ExecutionState>
    {
        self.cell.get()
    }

    #[must_use]
    pub fn path(&self) -> &TargetPath
    {
        self.cell.path()
    }

    /// Wait until `predicate` holds for the observed state.
    ///
    /// Resolves with the satisfying state. Fails with `ObjectGone` if the
    /// object disappears first, or `Cancelled` if the returned operation is
    /// cancelled.
    #[must_use]
    pub fn wait_until<P>(&self, predicate: P) -> Operation<ExecutionState>
    where
        P: Fn(ExecutionState) -> bool + Send + 'static,
    {
        self.cell.register(Box::new(predicate))
    }

    /// Wait for one exact state.
    #[must_use]
    pub fn wait_for(&self, state: ExecutionState) -> Operation<ExecutionState>
    {
        self.wait_until(move |observed| observed == state)
    }
}
