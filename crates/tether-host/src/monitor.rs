//! # Task Monitor
//!
//! The host's view of one running task: progress, a status line and two
//! distinct ways to stop it.
//!
//! - **Cancel** is a request to abandon the work. It is ignored unless the
//!   task was submitted as cancelable; when honoured it fires every cancelled
//!   listener exactly once. Background commands use a listener to cancel their
//!   operation, which propagates down to the backend driver.
//! - **Interrupt** only stops the *waiting*: whoever awaits the task gives up
//!   with `Interrupted`, while the operation itself keeps running.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Flags a task is submitted with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFlags
{
    /// The user may cancel the task
    pub cancelable: bool,
    /// The task reports progress through its monitor
    pub has_progress: bool,
    /// The host should block other interaction while the task runs
    pub modal: bool,
}

impl TaskFlags
{
    /// Cancelable, with progress, not modal: the usual flags for a debugger
    /// command.
    #[must_use]
    pub const fn command() -> Self
    {
        Self {
            cancelable: true,
            has_progress: true,
            modal: false,
        }
    }

    #[must_use]
    pub const fn with_modal(mut self, modal: bool) -> Self
    {
        self.modal = modal;
        self
    }
}

/// Snapshot of a monitor's progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress
{
    pub value: u64,
    /// Known amount of work, if any
    pub maximum: Option<u64>,
    pub message: Option<String>,
}

type Listener = Box<dyn FnOnce() + Send>;

struct MonitorInner
{
    cancelable: bool,
    cancelled: CancellationToken,
    interrupted: CancellationToken,
    progress: Mutex<Progress>,
    listeners: Mutex<Vec<Listener>>,
}

/// Progress and cancellation handle shared by a task and its host.
#[derive(Clone)]
pub struct TaskMonitor
{
    inner: Arc<MonitorInner>,
}

impl TaskMonitor
{
    #[must_use]
    pub fn new(flags: TaskFlags) -> Self
    {
        Self {
            inner: Arc::new(MonitorInner {
                cancelable: flags.cancelable,
                cancelled: CancellationToken::new(),
                interrupted: CancellationToken::new(),
                progress: Mutex::new(Progress::default()),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    fn progress_lock(&self) -> MutexGuard<'_, Progress>
    {
        self.inner.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Listener>>
    {
        self.inner.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start counting towards `maximum`.
    pub fn initialize(&self, maximum: u64)
    {
        let mut progress = self.progress_lock();
        progress.maximum = Some(maximum);
        progress.value = 0;
    }

    /// Set absolute progress, clamped to the maximum when one is known.
    pub fn set_progress(&self, value: u64)
    {
        let mut progress = self.progress_lock();
        progress.value = progress.maximum.map_or(value, |maximum| value.min(maximum));
    }

    pub fn increment(&self, delta: u64)
    {
        let mut progress = self.progress_lock();
        let value = progress.value.saturating_add(delta);
        progress.value = progress.maximum.map_or(value, |maximum| value.min(maximum));
    }

    /// Set or clear the status line.
    pub fn set_message(&self, message: Option<String>)
    {
        self.progress_lock().message = message;
    }

    #[must_use]
    pub fn message(&self) -> Option<String>
    {
        self.progress_lock().message.clone()
    }

    #[must_use]
    pub fn progress(&self) -> Progress
    {
        self.progress_lock().clone()
    }

    #[must_use]
    pub fn is_cancelable(&self) -> bool
    {
        self.inner.cancelable
    }

    /// Run `listener` when the task is cancelled, or right away if it already
    /// was.
    pub fn add_cancelled_listener(&self, listener: impl FnOnce() + Send + 'static)
    {
        let mut listeners = self.listeners();
        if self.inner.cancelled.is_cancelled() {
            drop(listeners);
            listener();
            return;
        }
        listeners.push(Box::new(listener));
    }

    /// Request cancellation.
    ///
    /// Returns `true` if this call cancelled the task; `false` if it was
    /// already cancelled or is not cancelable.
    pub fn cancel(&self) -> bool
    {
        if !self.inner.cancelable {
            debug!("ignoring cancel of a non-cancelable task");
            return false;
        }
        let listeners = {
            let mut listeners = self.listeners();
            if self.inner.cancelled.is_cancelled() {
                return false;
            }
            self.inner.cancelled.cancel();
            std::mem::take(&mut *listeners)
        };
        trace!(listeners = listeners.len(), "task cancelled");
        for listener in listeners {
            listener();
        }
        true
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool
    {
        self.inner.cancelled.is_cancelled()
    }

    /// Resolves once the task is cancelled.
    pub async fn cancelled(&self)
    {
        self.inner.cancelled.cancelled().await;
    }

    /// Stop whoever is waiting on the task, without cancelling the work.
    pub fn interrupt(&self)
    {
        self.inner.interrupted.cancel();
    }

    #[must_use]
    pub fn is_interrupted(&self) -> bool
    {
        self.inner.interrupted.is_cancelled()
    }

    /// Resolves once the task is interrupted.
    pub async fn interrupted(&self)
    {
        self.inner.interrupted.cancelled().await;
    }
}

impl fmt::Debug for TaskMonitor
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("TaskMonitor")
            .field("cancelable", &self.inner.cancelable)
            .field("cancelled", &self.is_cancelled())
            .field("interrupted", &self.is_interrupted())
            .field("progress", &self.progress())
            .finish()
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_progress_is_clamped()
    {
        let monitor = TaskMonitor::new(TaskFlags::command());
        monitor.initialize(10);
        monitor.set_progress(4);
        monitor.increment(20);
        assert_eq!(monitor.progress().value, 10);
        assert_eq!(monitor.progress().maximum, Some(10));
    }

    #[test]
    fn test_listeners_fire_once()
    {
        let monitor = TaskMonitor::new(TaskFlags::command());
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        monitor.add_cancelled_listener(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(monitor.cancel());
        assert!(!monitor.cancel());
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let late = fired.clone();
        monitor.add_cancelled_listener(move || {
            late.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_non_cancelable_task_ignores_cancel()
    {
        let monitor = TaskMonitor::new(TaskFlags::default());
        assert!(!monitor.cancel());
        assert!(!monitor.is_cancelled());
    }

    #[test]
    fn test_interrupt_does_not_cancel()
    {
        let monitor = TaskMonitor::new(TaskFlags::command());
        monitor.interrupt();
        assert!(monitor.is_interrupted());
        assert!(!monitor.is_cancelled());
    }
}
