//! # Operations
//!
//! An [`Operation`] is the caller's handle to an in-flight backend call; the
//! matching [`Completer`] is handed to whoever finishes it (a backend driver,
//! an AsyncState waiter list, the model's object waiters).
//!
//! ## Lifecycle
//!
//! ```text
//!            complete(v)            fail(e)               cancel()
//! Pending ──────────────▶ Completed ───▶ Failed   Pending ────────▶ Cancelled
//! ```
//!
//! Exactly one terminal transition happens: the status is settled with a
//! compare-and-swap, so a completion racing a cancellation has a single
//! winner. If cancellation wins, the awaiting side fails with
//! [`ModelError::Cancelled`] immediately and whatever the backend produces
//! later is discarded.
//!
//! ## Cancellation propagation
//!
//! Both halves share a `CancellationToken`. Drivers select on
//! [`Completer::cancelled`] (or pass [`Completer::cancellation_token`] further
//! down) to abort the native call when the caller gives up.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ModelError, ModelResult};

/// Boxed, sendable future used where operations need type erasure.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Observable state of an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus
{
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl OperationStatus
{
    const fn encode(self) -> u8
    {
        match self {
            Self::Pending => 0,
            Self::Completed => 1,
            Self::Failed => 2,
            Self::Cancelled => 3,
        }
    }

    const fn decode(raw: u8) -> Self
    {
        match raw {
            0 => Self::Pending,
            1 => Self::Completed,
            2 => Self::Failed,
            _ => Self::Cancelled,
        }
    }

    /// Whether this is a terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool
    {
        self != Self::Pending
    }
}

#[derive(Debug)]
struct Shared
{
    status: AtomicU8,
    token: CancellationToken,
}

impl Shared
{
    fn new() -> Arc<Self>
    {
        Arc::new(Self {
            status: AtomicU8::new(OperationStatus::Pending.encode()),
            token: CancellationToken::new(),
        })
    }

    fn status(&self) -> OperationStatus
    {
        OperationStatus::decode(self.status.load(Ordering::Acquire))
    }

    /// Move from `Pending` to `to`. Returns `false` if already settled.
    fn settle(&self, to: OperationStatus) -> bool
    {
        self.status
            .compare_exchange(
                OperationStatus::Pending.encode(),
                to.encode(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn cancel(&self) -> bool
    {
        let won = self.settle(OperationStatus::Cancelled);
        if won {
            self.token.cancel();
        }
        won
    }
}

/// Create a pending operation and its completer.
#[must_use]
pub fn operation<T: Send + 'static>() -> (Completer<T>, Operation<T>)
{
    let (tx, rx) = oneshot::channel();
    let shared = Shared::new();
    let future: BoxFuture<ModelResult<T>> = Box::pin(async move {
        rx.await
            .unwrap_or_else(|_| Err(ModelError::backend("operation abandoned before completion")))
    });
    (
        Completer {
            tx: Some(tx),
            shared: shared.clone(),
        },
        Operation { future, shared },
    )
}

/// Handle to an asynchronous backend operation
///
/// Await it directly (`op.await`) or through [`Operation::wait`]. Dropping an
/// operation does not cancel it; call [`Operation::cancel`] for that.
///
/// ## Example
///
/// ```rust
/// use tether_core::operation::operation;
///
/// # let runtime = tokio::runtime::Runtime::new().unwrap();
/// # runtime.block_on(async {
/// let (completer, op) = operation::<u32>();
/// completer.complete(7);
/// assert_eq!(op.await.unwrap(), 7);
/// # });
/// ```
pub struct Operation<T>
{
    future: BoxFuture<ModelResult<T>>,
    shared: Arc<Shared>,
}

impl<T: Send + 'static> Operation<T>
{
    /// An operation that has already completed with `value`.
    #[must_use]
    pub fn ready(value: T) -> Self
    {
        let (completer, op) = operation();
        completer.complete(value);
        op
    }

    /// An operation that has already failed with `error`.
    #[must_use]
    pub fn failed(error: ModelError) -> Self
    {
        let (completer, op) = operation();
        completer.fail(error);
        op
    }

    /// Current status. Racy by nature; use it for reporting, not control flow.
    #[must_use]
    pub fn status(&self) -> OperationStatus
    {
        self.shared.status()
    }

    /// Request cancellation.
    ///
    /// Returns `true` if this call moved the operation to `Cancelled`, `false`
    /// if it had already settled.
    pub fn cancel(&self) -> bool
    {
        self.shared.cancel()
    }

    /// Detached handle that can cancel this operation from elsewhere.
    #[must_use]
    pub fn canceller(&self) -> Canceller
    {
        Canceller {
            shared: self.shared.clone(),
        }
    }

    /// Transform the eventual value. Status and cancellation are shared with
    /// the source operation.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> Operation<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let Operation { future, shared } = self;
        Operation {
            future: Box::pin(async move { future.await.map(f) }),
            shared,
        }
    }

    /// Wait for the terminal state.
    ///
    /// ## Errors
    ///
    /// The backend's failure, or `Cancelled` as soon as cancellation is
    /// requested.
    pub async fn wait(self) -> ModelResult<T>
    {
        let Operation { future, shared } = self;
        let result = tokio::select! {
            biased;
            result = future => result,
            () = shared.token.cancelled() => Err(ModelError::Cancelled),
        };
        // A completer that lost the race drops its sender; report the cancel,
        // not the abandoned channel.
        if shared.status() == OperationStatus::Cancelled {
            return Err(ModelError::Cancelled);
        }
        result
    }
}

impl<T: Send + 'static> IntoFuture for Operation<T>
{
    type Output = ModelResult<T>;
    type IntoFuture = BoxFuture<ModelResult<T>>;

    fn into_future(self) -> Self::IntoFuture
    {
        Box::pin(self.wait())
    }
}

impl<T> fmt::Debug for Operation<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Operation").field("status", &self.shared.status()).finish_non_exhaustive()
    }
}

/// Cloneable cancellation handle for an [`Operation`].
#[derive(Debug, Clone)]
pub struct Canceller
{
    shared: Arc<Shared>,
}

impl Canceller
{
    /// See [`Operation::cancel`].
    pub fn cancel(&self) -> bool
    {
        self.shared.cancel()
    }

    #[must_use]
    pub fn status(&self) -> OperationStatus
    {
        self.shared.status()
    }
}

/// Completing side of an [`Operation`]
///
/// Consumed by [`complete`](Completer::complete) or
/// [`fail`](Completer::fail). Dropping it unsettled fails the operation with a
/// `BackendFailure`, so a driver bug can never leave a caller waiting forever.
pub struct Completer<T>
{
    tx: Option<oneshot::Sender<ModelResult<T>>>,
    shared: Arc<Shared>,
}

impl<T> Completer<T>
{
    /// Complete successfully. Returns `false` if the operation had already
    /// been cancelled and the value was discarded.
    pub fn complete(self, value: T) -> bool
    {
        self.settle(Ok(value))
    }

    /// Fail the operation. `ModelError::Cancelled` settles it as cancelled.
    pub fn fail(self, error: ModelError) -> bool
    {
        self.settle(Err(error))
    }

    /// Settle with an arbitrary result.
    pub fn settle(mut self, result: ModelResult<T>) -> bool
    {
        let status = match &result {
            Ok(_) => OperationStatus::Completed,
            Err(err) if err.is_cancellation() => OperationStatus::Cancelled,
            Err(_) => OperationStatus::Failed,
        };
        if !self.shared.settle(status) {
            debug!("discarding result of an operation that already settled as {:?}", self.shared.status());
            self.tx = None;
            return false;
        }
        if let Some(tx) = self.tx.take() {
            // A dropped receiver just means nobody is waiting any more.
            let _ = tx.send(result);
        }
        true
    }

    /// Whether the caller has requested cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool
    {
        self.shared.token.is_cancelled()
    }

    /// Resolves when the caller requests cancellation.
    pub async fn cancelled(&self)
    {
        self.shared.token.cancelled().await;
    }

    /// Token to hand further down into a native call.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken
    {
        self.shared.token.clone()
    }
}

impl<T> Drop for Completer<T>
{
    fn drop(&mut self)
    {
        if self.tx.take().is_some() && self.shared.settle(OperationStatus::Failed) {
            debug!("completer dropped without settling its operation");
        }
    }
}

impl<T> fmt::Debug for Completer<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Completer").field("status", &self.shared.status()).finish_non_exhaustive()
    }
}
