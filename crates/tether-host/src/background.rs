//! # Background Commands
//!
//! [`BackgroundCommand`] turns an operation-producing closure into a host
//! task. Running it calls the producer with the host's domain object and the
//! task monitor, hooks the monitor's cancel into the operation, and waits.
//!
//! | operation outcome | `apply_to` result | status |
//! |---|---|---|
//! | completed | `Ok(true)` | none |
//! | waiting interrupted | `Ok(false)` | `"Interrupted"` |
//! | failed with `Cancelled` | `Ok(false)` | `"Cancelled"` |
//! | failed otherwise | `Err(cause)` | the cause's message |
//!
//! Interrupting stops the wait only; the operation keeps running. A command
//! runs once: a second `apply_to` is rejected.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tether_core::error::{ModelError, ModelResult};
use tether_core::operation::Operation;
use tracing::{debug, warn};

use crate::monitor::{TaskFlags, TaskMonitor};
use crate::scheduler::{HostTask, TaskScheduler};

pub const STATUS_INTERRUPTED: &str = "Interrupted";
pub const STATUS_CANCELLED: &str = "Cancelled";

type Producer<D> = Box<dyn FnOnce(Arc<D>, TaskMonitor) -> Operation<()> + Send>;

/// One invocation of an asynchronous command, runnable as a host task.
pub struct BackgroundCommand<D>
{
    name: String,
    flags: TaskFlags,
    producer: Mutex<Option<Producer<D>>>,
    status: Mutex<Option<String>>,
}

impl<D: Send + Sync + 'static> BackgroundCommand<D>
{
    pub fn new<F>(name: impl Into<String>, flags: TaskFlags, producer: F) -> Self
    where
        F: FnOnce(Arc<D>, TaskMonitor) -> Operation<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            flags,
            producer: Mutex::new(Some(Box::new(producer))),
            status: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str
    {
        &self.name
    }

    #[must_use]
    pub fn flags(&self) -> TaskFlags
    {
        self.flags
    }

    /// Final status line, `None` on success or while running.
    #[must_use]
    pub fn status(&self) -> Option<String>
    {
        self.status_lock().clone()
    }

    fn status_lock(&self) -> MutexGuard<'_, Option<String>>
    {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, monitor: &TaskMonitor, status: Option<&str>)
    {
        let status = status.map(str::to_string);
        monitor.set_message(status.clone());
        *self.status_lock() = status;
    }

    /// Run the command against `domain`.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if the command already ran; otherwise the
    /// operation's failure, unless it was a cancellation.
    pub async fn apply_to(&self, domain: Arc<D>, monitor: &TaskMonitor) -> ModelResult<bool>
    {
        let producer = self
            .producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| ModelError::InvalidArgument(format!("command '{}' has already run", self.name)))?;

        let operation = producer(domain, monitor.clone());
        let canceller = operation.canceller();
        monitor.add_cancelled_listener(move || {
            canceller.cancel();
        });

        let result = tokio::select! {
            biased;
            () = monitor.interrupted() => Err(ModelError::Interrupted),
            result = operation.wait() => result,
        };

        match result {
            Ok(()) => {
                self.finish(monitor, None);
                Ok(true)
            }
            Err(ModelError::Interrupted) => {
                debug!(command = %self.name, "wait interrupted");
                self.finish(monitor, Some(STATUS_INTERRUPTED));
                Ok(false)
            }
            Err(err) if err.is_cancellation() => {
                debug!(command = %self.name, "command cancelled");
                self.finish(monitor, Some(STATUS_CANCELLED));
                Ok(false)
            }
            Err(err) => {
                warn!(command = %self.name, error = %err, "command failed");
                self.finish(monitor, Some(&err.to_string()));
                Err(err)
            }
        }
    }
}

impl<D> fmt::Debug for BackgroundCommand<D>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("BackgroundCommand")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("status", &*self.status.lock().unwrap_or_else(PoisonError::into_inner))
            .finish_non_exhaustive()
    }
}

/// Build a command and submit it to `scheduler` with the scheduler's default
/// delay.
///
/// Returns the command (for its status) and the monitor (to cancel or
/// interrupt it).
///
/// ## Errors
///
/// The scheduler rejected the task.
pub fn run_async<D, F>(
    scheduler: &dyn TaskScheduler,
    domain: Arc<D>,
    name: impl Into<String>,
    flags: TaskFlags,
    producer: F,
) -> ModelResult<(Arc<BackgroundCommand<D>>, TaskMonitor)>
where
    D: Send + Sync + 'static,
    F: FnOnce(Arc<D>, TaskMonitor) -> Operation<()> + Send + 'static,
{
    let command = Arc::new(BackgroundCommand::new(name, flags, producer));
    let runner = command.clone();
    let task = HostTask::new(command.name(), flags, move |monitor| async move {
        runner.apply_to(domain, &monitor).await
    });
    let monitor = scheduler.submit(task, scheduler.default_delay())?;
    Ok((command, monitor))
}
