//! # Host Scheduler
//!
//! [`TaskScheduler`] is the narrow interface this crate needs from whatever
//! runs work in the host: accept a named, monitored task and start it after
//! an optional delay. [`TokioScheduler`] is the implementation backed by a
//! tokio runtime; it reports finished tasks on a bounded channel and logs
//! failures, which is where errors re-raised by background commands surface.
//! A full report channel drops the report; the task still finishes.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tether_core::error::{ModelError, ModelResult};
use tether_core::operation::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::config::HostConfig;
use crate::monitor::{TaskFlags, TaskMonitor};

type TaskWork = Box<dyn FnOnce(TaskMonitor) -> BoxFuture<ModelResult<bool>> + Send>;

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome
{
    Completed,
    /// Stopped early without an error (cancelled or interrupted)
    NotCompleted,
    Failed(ModelError),
}

/// Published by [`TokioScheduler`] for every finished task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport
{
    pub name: String,
    pub outcome: TaskOutcome,
    /// Final status line of the task's monitor
    pub message: Option<String>,
}

/// A named unit of work with its monitor.
///
/// The work returns `Ok(true)` when it completed, `Ok(false)` when it stopped
/// early, and an error the host should see otherwise.
pub struct HostTask
{
    name: String,
    flags: TaskFlags,
    monitor: TaskMonitor,
    work: TaskWork,
}

impl HostTask
{
    pub fn new<F, Fut>(name: impl Into<String>, flags: TaskFlags, work: F) -> Self
    where
        F: FnOnce(TaskMonitor) -> Fut + Send + 'static,
        Fut: Future<Output = ModelResult<bool>> + Send + 'static,
    {
        Self {
            name: name.into(),
            flags,
            monitor: TaskMonitor::new(flags),
            work: Box::new(move |monitor| Box::pin(work(monitor))),
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

    /// Handle on the monitor the work will receive.
    #[must_use]
    pub fn monitor(&self) -> TaskMonitor
    {
        self.monitor.clone()
    }

    /// Run the work to the end on the current task.
    pub async fn run(self) -> TaskReport
    {
        let HostTask { name, monitor, work, .. } = self;
        debug!(task = %name, "task started");
        let outcome = match work(monitor.clone()).await {
            Ok(true) => TaskOutcome::Completed,
            Ok(false) => TaskOutcome::NotCompleted,
            Err(err) => TaskOutcome::Failed(err),
        };
        TaskReport {
            name,
            outcome,
            message: monitor.message(),
        }
    }
}

impl fmt::Debug for HostTask
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("HostTask")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

/// Host task executor.
pub trait TaskScheduler: Send + Sync
{
    /// Start `task` after `delay`.
    ///
    /// ## Errors
    ///
    /// The scheduler no longer accepts work.
    fn submit(&self, task: HostTask, delay: Duration) -> ModelResult<TaskMonitor>;

    /// Delay used when the caller does not pick one.
    fn default_delay(&self) -> Duration
    {
        Duration::ZERO
    }
}

/// [`TaskScheduler`] on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler
{
    handle: Handle,
    reports: mpsc::Sender<TaskReport>,
    config: HostConfig,
}

impl TokioScheduler
{
    /// Scheduler on `handle`, with the receiving end of its task reports.
    #[must_use]
    pub fn new(handle: Handle, config: HostConfig) -> (Self, mpsc::Receiver<TaskReport>)
    {
        let (reports, receiver) = mpsc::channel(config.report_capacity.max(1));
        (Self { handle, reports, config }, receiver)
    }

    /// Scheduler on the runtime of the caller.
    ///
    /// ## Errors
    ///
    /// `Unsupported` outside a tokio runtime.
    pub fn current(config: HostConfig) -> ModelResult<(Self, mpsc::Receiver<TaskReport>)>
    {
        let handle = Handle::try_current().map_err(|err| ModelError::Unsupported(format!("no tokio runtime: {err}")))?;
        Ok(Self::new(handle, config))
    }
}

impl TaskScheduler for TokioScheduler
{
    fn submit(&self, task: HostTask, delay: Duration) -> ModelResult<TaskMonitor>
    {
        let monitor = task.monitor();
        let reports = self.reports.clone();
        debug!(task = %task.name(), ?delay, flags = ?task.flags(), "task submitted");
        self.handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let report = task.run().await;
            match &report.outcome {
                TaskOutcome::Failed(err) => error!(task = %report.name, error = %err, "task failed"),
                outcome => info!(task = %report.name, ?outcome, message = ?report.message, "task finished"),
            }
            match reports.try_send(report) {
                Ok(()) => {}
                Err(TrySendError::Full(report)) => {
                    warn!(task = %report.name, "task report dropped: report channel is full");
                }
                Err(TrySendError::Closed(report)) => {
                    debug!(task = %report.name, "task report dropped: host stopped listening");
                }
            }
        });
        Ok(monitor)
    }

    fn default_delay(&self) -> Duration
    {
        self.config.task_delay
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[tokio::test]
    async fn test_reports_each_outcome()
    {
        let (scheduler, mut reports) = TokioScheduler::current(HostConfig::default()).unwrap();
        scheduler
            .submit(HostTask::new("ok", TaskFlags::command(), |_| async { Ok::<_, ModelError>(true) }), Duration::ZERO)
            .unwrap();
        let report = reports.recv().await.unwrap();
        assert_eq!(report.name, "ok");
        assert_eq!(report.outcome, TaskOutcome::Completed);

        scheduler
            .submit(
                HostTask::new("bad", TaskFlags::command(), |monitor| async move {
                    monitor.set_message(Some("boom".to_string()));
                    Err::<bool, _>(ModelError::backend("boom"))
                }),
                Duration::ZERO,
            )
            .unwrap();
        let report = reports.recv().await.unwrap();
        assert_eq!(report.outcome, TaskOutcome::Failed(ModelError::backend("boom")));
        assert_eq!(report.message.as_deref(), Some("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_honoured()
    {
        let (scheduler, mut reports) = TokioScheduler::current(HostConfig::default()).unwrap();
        let start = tokio::time::Instant::now();
        scheduler
            .submit(HostTask::new("late", TaskFlags::default(), |_| async { Ok::<_, ModelError>(true) }), Duration::from_millis(500))
            .unwrap();
        reports.recv().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_undrained_reports_do_not_hold_tasks_back()
    {
        let config = HostConfig {
            report_capacity: 1,
            ..HostConfig::default()
        };
        let (scheduler, mut reports) = TokioScheduler::current(config).unwrap();

        let mut finished = Vec::new();
        for n in 0..3 {
            let (tx, rx) = tokio::sync::oneshot::channel();
            scheduler
                .submit(
                    HostTask::new(format!("task {n}"), TaskFlags::default(), move |_| async move {
                        let _ = tx.send(());
                        Ok::<_, ModelError>(true)
                    }),
                    Duration::ZERO,
                )
                .unwrap();
            finished.push(rx);
        }
        for rx in finished {
            rx.await.unwrap();
        }

        let first = reports.recv().await.unwrap();
        assert_eq!(first.outcome, TaskOutcome::Completed);
        tokio::task::yield_now().await;
        assert!(reports.try_recv().is_err());
    }
}
