//! Executor adapter over a [`TaskScheduler`].
//!
//! Components that only know how to "execute a future somewhere" get a
//! [`HostExecutor`]. Every piece of work becomes a named, monitored host task.
//! The host scheduler owns the lifecycle, so the shutdown family fails with
//! `Unsupported` and logs an error.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tether_core::error::{ModelError, ModelResult};
use tracing::error;

use crate::monitor::{TaskFlags, TaskMonitor};
use crate::scheduler::{HostTask, TaskScheduler};

pub struct HostExecutor
{
    scheduler: Arc<dyn TaskScheduler>,
    name: String,
    flags: TaskFlags,
    delay: Duration,
    submitted: AtomicU64,
}

impl HostExecutor
{
    /// Executor whose tasks are named `"{name} #n"`, submitted with `flags`
    /// after the scheduler's default delay.
    pub fn new(scheduler: Arc<dyn TaskScheduler>, name: impl Into<String>, flags: TaskFlags) -> Self
    {
        let delay = scheduler.default_delay();
        Self {
            scheduler,
            name: name.into(),
            flags,
            delay,
            submitted: AtomicU64::new(0),
        }
    }

    /// Submit every task after `delay` instead.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self
    {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn flags(&self) -> TaskFlags
    {
        self.flags
    }

    #[must_use]
    pub fn delay(&self) -> Duration
    {
        self.delay
    }

    /// Enqueue `work` as a host task.
    ///
    /// ## Errors
    ///
    /// The scheduler rejected the task.
    pub fn execute<F>(&self, work: F) -> ModelResult<TaskMonitor>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let number = self.submitted.fetch_add(1, Ordering::Relaxed) + 1;
        let task = HostTask::new(format!("{} #{number}", self.name), self.flags, move |_| async move {
            work.await;
            Ok::<_, ModelError>(true)
        });
        self.scheduler.submit(task, self.delay)
    }

    fn unsupported(&self, call: &str) -> ModelError
    {
        error!(executor = %self.name, call, "executor lifecycle is owned by the host scheduler");
        ModelError::Unsupported(format!("{call} on executor '{}'", self.name))
    }

    /// ## Errors
    ///
    /// Always `Unsupported`.
    pub fn shutdown(&self) -> ModelResult<()>
    {
        Err(self.unsupported("shutdown"))
    }

    /// ## Errors
    ///
    /// Always `Unsupported`.
    pub fn shutdown_now(&self) -> ModelResult<Vec<HostTask>>
    {
        Err(self.unsupported("shutdown_now"))
    }

    /// ## Errors
    ///
    /// Always `Unsupported`.
    pub fn await_termination(&self, _timeout: Duration) -> ModelResult<bool>
    {
        Err(self.unsupported("await_termination"))
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool
    {
        false
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool
    {
        false
    }
}

impl std::fmt::Debug for HostExecutor
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("HostExecutor")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("delay", &self.delay)
            .field("submitted", &self.submitted.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::{Mutex, PoisonError};

    use super::*;

    #[derive(Default)]
    struct Recorder
    {
        submitted: Mutex<Vec<(String, TaskFlags, Duration)>>,
    }

    impl TaskScheduler for Recorder
    {
        fn submit(&self, task: HostTask, delay: Duration) -> ModelResult<TaskMonitor>
        {
            let monitor = task.monitor();
            self.submitted
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((task.name().to_string(), task.flags(), delay));
            Ok(monitor)
        }

        fn default_delay(&self) -> Duration
        {
            Duration::from_millis(250)
        }
    }

    #[test]
    fn test_tasks_carry_the_executor_flags()
    {
        let recorder = Arc::new(Recorder::default());
        let flags = TaskFlags::command().with_modal(true);
        let executor = HostExecutor::new(recorder.clone(), "refresh", flags);

        let monitor = executor.execute(async {}).unwrap();
        assert!(monitor.is_cancelable());
        assert!(monitor.cancel());

        let submitted = recorder.submitted.lock().unwrap();
        assert_eq!(submitted.as_slice(), &[("refresh #1".to_string(), flags, Duration::from_millis(250))]);
    }

    #[test]
    fn test_explicit_delay_overrides_the_scheduler()
    {
        let recorder = Arc::new(Recorder::default());
        let executor = HostExecutor::new(recorder.clone(), "poll", TaskFlags::default()).with_delay(Duration::ZERO);
        assert_eq!(executor.delay(), Duration::ZERO);

        let monitor = executor.execute(async {}).unwrap();
        assert!(!monitor.is_cancelable());
        assert!(!monitor.cancel());
        assert_eq!(recorder.submitted.lock().unwrap()[0].2, Duration::ZERO);
    }
}
