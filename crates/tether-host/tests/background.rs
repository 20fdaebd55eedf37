//! Background command outcomes as the host sees them

use std::sync::Arc;
use std::time::Duration;

use tether_core::backends::loopback::LoopbackDriver;
use tether_core::backends::BackendKind;
use tether_core::config::ModelConfig;
use tether_core::error::ModelError;
use tether_core::operation::{operation, Operation};
use tether_core::params::Arguments;
use tether_core::session::DebuggerSession;
use tether_core::types::{ExecutionState, TargetPath};
use tether_host::{
    run_async, BackgroundCommand, HostConfig, HostExecutor, TaskFlags, TaskMonitor, TaskOutcome, TokioScheduler,
    STATUS_CANCELLED, STATUS_INTERRUPTED,
};

#[tokio::test]
async fn test_failure_sets_status_and_reraises()
{
    let command = BackgroundCommand::<()>::new("boom", TaskFlags::command(), |_, _| {
        Operation::failed(ModelError::backend("boom"))
    });
    let monitor = TaskMonitor::new(command.flags());

    let result = command.apply_to(Arc::new(()), &monitor).await;
    assert_eq!(result, Err(ModelError::backend("boom")));
    assert_eq!(command.status().as_deref(), Some("boom"));
    assert_eq!(monitor.message().as_deref(), Some("boom"));
}

#[tokio::test]
async fn test_cancellation_cause_is_not_an_error()
{
    let command = BackgroundCommand::<()>::new("cancelled", TaskFlags::command(), |_, _| {
        Operation::failed(ModelError::Cancelled)
    });
    let monitor = TaskMonitor::new(command.flags());

    assert_eq!(command.apply_to(Arc::new(()), &monitor).await, Ok(false));
    assert_eq!(command.status().as_deref(), Some(STATUS_CANCELLED));
}

#[tokio::test]
async fn test_interrupt_stops_waiting_but_not_the_operation()
{
    let (completer, op) = operation::<()>();
    let command = Arc::new(BackgroundCommand::<()>::new("slow", TaskFlags::command(), move |_, _| op));
    let monitor = TaskMonitor::new(command.flags());

    let runner = command.clone();
    let waiting = monitor.clone();
    let task = tokio::spawn(async move { runner.apply_to(Arc::new(()), &waiting).await });
    tokio::task::yield_now().await;
    monitor.interrupt();

    assert_eq!(task.await.unwrap(), Ok(false));
    assert_eq!(command.status().as_deref(), Some(STATUS_INTERRUPTED));
    assert!(!completer.is_cancelled());
}

#[tokio::test]
async fn test_run_async_reports_through_the_scheduler()
{
    let (scheduler, mut reports) = TokioScheduler::current(HostConfig::default()).unwrap();
    let (command, _monitor) = run_async(&scheduler, Arc::new(()), "fails", TaskFlags::command(), |_, _| {
        Operation::failed(ModelError::backend("target vanished"))
    })
    .unwrap();

    let report = reports.recv().await.unwrap();
    assert_eq!(report.name, "fails");
    assert_eq!(report.outcome, TaskOutcome::Failed(ModelError::backend("target vanished")));
    assert_eq!(report.message.as_deref(), Some("target vanished"));
    assert_eq!(command.status().as_deref(), Some("target vanished"));
}

#[tokio::test]
async fn test_cancel_through_the_monitor_reaches_the_driver()
{
    let driver = Arc::new(LoopbackDriver::new());
    let session = Arc::new(DebuggerSession::open(BackendKind::Lldb, driver.clone(), ModelConfig::default()).unwrap());
    driver.stall_next();

    let (scheduler, mut reports) = TokioScheduler::current(HostConfig::default()).unwrap();
    let (command, monitor) = run_async(&scheduler, session, "launch", TaskFlags::command(), |session, _| {
        let mut arguments = Arguments::new();
        arguments.insert("args".to_string(), "sleep 10".into());
        session
            .protocol()
            .launch(&TargetPath::root(), arguments)
            .map_or_else(Operation::failed, |launch| launch.map(|_| ()))
    })
    .unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(monitor.cancel());

    let report = reports.recv().await.unwrap();
    assert_eq!(report.outcome, TaskOutcome::NotCompleted);
    assert_eq!(command.status().as_deref(), Some(STATUS_CANCELLED));
}

#[tokio::test]
async fn test_resume_as_a_background_command()
{
    let driver = Arc::new(LoopbackDriver::new());
    let session = Arc::new(DebuggerSession::open(BackendKind::Gdb, driver, ModelConfig::default()).unwrap());
    let mut arguments = Arguments::new();
    arguments.insert("args".to_string(), "echo hi".into());
    session.protocol().launch(&TargetPath::root(), arguments).unwrap().await.unwrap();

    let process_path = TargetPath::parse("Inferiors[4242]").unwrap();
    let process = session.model().wait_for_object(&process_path).await.unwrap();
    let state = process.async_state().unwrap();
    state.wait_for(ExecutionState::Stopped).await.unwrap();
    let running = state.wait_for(ExecutionState::Running);

    let (scheduler, mut reports) = TokioScheduler::current(HostConfig::default()).unwrap();
    let path = process_path.clone();
    run_async(&scheduler, session, "resume", TaskFlags::command(), move |session, _| {
        session.protocol().resume(&path).unwrap_or_else(Operation::failed)
    })
    .unwrap();

    assert_eq!(reports.recv().await.unwrap().outcome, TaskOutcome::Completed);
    assert_eq!(running.await.unwrap(), ExecutionState::Running);
}

#[tokio::test]
async fn test_executor_runs_work_and_refuses_lifecycle_calls()
{
    let (scheduler, mut reports) = TokioScheduler::current(HostConfig::default()).unwrap();
    let executor = HostExecutor::new(Arc::new(scheduler), "model-events", TaskFlags::default());

    let (tx, rx) = tokio::sync::oneshot::channel();
    executor
        .execute(async move {
            let _ = tx.send(7);
        })
        .unwrap();
    assert_eq!(rx.await.unwrap(), 7);
    assert_eq!(reports.recv().await.unwrap().name, "model-events #1");

    assert!(matches!(executor.shutdown(), Err(ModelError::Unsupported(_))));
    assert!(matches!(executor.shutdown_now(), Err(ModelError::Unsupported(_))));
    assert!(matches!(executor.await_termination(Duration::from_secs(1)), Err(ModelError::Unsupported(_))));
    assert!(!executor.is_shutdown());
    assert!(!executor.is_terminated());
}
