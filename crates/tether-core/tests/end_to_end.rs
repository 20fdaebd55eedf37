//! Session tests driving each backend layout through the loopback driver

use std::sync::Arc;

use tether_core::backends::loopback::{LoopbackDriver, FIRST_PID};
use tether_core::backends::BackendKind;
use tether_core::breakpoints::{BreakpointBuilder, BreakpointId, BreakpointKind};
use tether_core::capability::Environment;
use tether_core::config::ModelConfig;
use tether_core::error::ModelError;
use tether_core::events::ModelEvent;
use tether_core::params::Arguments;
use tether_core::session::DebuggerSession;
use tether_core::types::{Address, ExecutionState, ProcessId, TargetPath};

fn open(kind: BackendKind, driver: &Arc<LoopbackDriver>) -> DebuggerSession
{
    DebuggerSession::open(kind, driver.clone(), ModelConfig::default()).unwrap()
}

fn command_line(line: &str) -> Arguments
{
    let mut arguments = Arguments::new();
    arguments.insert("args".to_string(), line.into());
    arguments
}

fn process_path(kind: BackendKind) -> TargetPath
{
    let text = match kind {
        BackendKind::Lldb => "Sessions[0].Processes[4242]",
        BackendKind::Gdb => "Inferiors[4242]",
        BackendKind::Frida => "Processes[4242]",
    };
    TargetPath::parse(text).unwrap()
}

/// Launch `echo hi` and wait until the new process reports STOPPED.
async fn launch_stopped(session: &DebuggerSession) -> TargetPath
{
    let launcher = TargetPath::root();
    session.protocol().launch(&launcher, command_line("echo hi")).unwrap().await.unwrap();

    let path = process_path(session.kind());
    let process = session.model().wait_for_object(&path).await.unwrap();
    let state = process
        .async_state()
        .unwrap()
        .wait_until(ExecutionState::is_stopped)
        .await
        .unwrap();
    assert_eq!(state, ExecutionState::Stopped);
    path
}

#[tokio::test]
async fn test_launch_resume_under_every_backend()
{
    for kind in [BackendKind::Lldb, BackendKind::Gdb, BackendKind::Frida] {
        let driver = Arc::new(LoopbackDriver::new());
        let session = open(kind, &driver);
        let path = launch_stopped(&session).await;

        let process = session.model().resolve(&path).unwrap();
        assert!(process.execution_state().unwrap().is_alive());
        assert_eq!(process.attribute("pid").as_deref(), Some("4242"));
        assert_eq!(process.display(), "echo hi");

        let running = process.async_state().unwrap().wait_for(ExecutionState::Running);
        session.protocol().resume(&path).unwrap().await.unwrap();
        assert_eq!(running.await.unwrap(), ExecutionState::Running, "{kind}");
        assert_eq!(driver.process_state(ProcessId(FIRST_PID)), Some(ExecutionState::Running));

        session.disconnect().await.unwrap();
    }
}

#[tokio::test]
async fn test_resume_until_exit_reaches_terminated()
{
    let driver = Arc::new(LoopbackDriver::new().with_exit_on_resume(true));
    let session = open(BackendKind::Lldb, &driver);
    let path = launch_stopped(&session).await;

    let process = session.model().resolve(&path).unwrap();
    let finished = process.async_state().unwrap().wait_until(|state| !state.is_alive());
    session.protocol().resume(&path).unwrap().await.unwrap();

    assert_eq!(finished.await.unwrap(), ExecutionState::Terminated);
    assert_eq!(process.attribute("exit_code").as_deref(), Some("0"));
}

#[tokio::test]
async fn test_commands_from_a_thread_path_reach_the_process()
{
    let driver = Arc::new(LoopbackDriver::new());
    let session = open(BackendKind::Lldb, &driver);
    let path = launch_stopped(&session).await;
    let thread = path.child("Threads").index(1);
    session.model().wait_for_object(&thread).await.unwrap();

    let process = session.model().resolve(&path).unwrap();
    let running = process.async_state().unwrap().wait_for(ExecutionState::Running);
    session.protocol().resume(&thread).unwrap().await.unwrap();
    running.await.unwrap();

    let stopped = process.async_state().unwrap().wait_for(ExecutionState::Stopped);
    session.protocol().interrupt(&thread).unwrap().await.unwrap();
    stopped.await.unwrap();
}

#[tokio::test]
async fn test_detach_fails_pending_wait_with_object_gone()
{
    let driver = Arc::new(LoopbackDriver::new());
    let session = open(BackendKind::Gdb, &driver);
    let path = launch_stopped(&session).await;

    let process = session.model().resolve(&path).unwrap();
    let never = process.async_state().unwrap().wait_for(ExecutionState::Running);
    session.protocol().detach(&path).unwrap().await.unwrap();

    assert_eq!(never.await, Err(ModelError::ObjectGone(path.clone())));
    assert!(session.model().get(&path).is_none());
}

#[tokio::test]
async fn test_launch_rejects_missing_command_line()
{
    let driver = Arc::new(LoopbackDriver::new());
    let session = open(BackendKind::Frida, &driver);

    let error = session.protocol().launch(&TargetPath::root(), Arguments::new()).unwrap_err();
    assert!(matches!(error, ModelError::InvalidArgument(_)));

    let empty = session.protocol().launch(&TargetPath::root(), command_line("   ")).unwrap_err();
    assert!(matches!(empty, ModelError::InvalidArgument(_)));

    let unterminated = session.protocol().launch(&TargetPath::root(), command_line("echo \"oops")).unwrap_err();
    assert!(matches!(unterminated, ModelError::InvalidArgument(_)));
    assert_eq!(driver.process_state(ProcessId(FIRST_PID)), None);
}

#[tokio::test]
async fn test_launch_resolves_with_the_new_pid()
{
    let driver = Arc::new(LoopbackDriver::new());
    let session = open(BackendKind::Gdb, &driver);

    let pid = session.protocol().launch(&TargetPath::root(), command_line("echo hi")).unwrap().await.unwrap();
    assert_eq!(pid, ProcessId(FIRST_PID));
    let process = session.model().wait_for_object(&BackendKind::Gdb.process_path(pid)).await.unwrap();
    assert_eq!(process.path(), &TargetPath::parse("Inferiors[4242]").unwrap());
}

#[tokio::test]
async fn test_backend_failure_message_is_preserved()
{
    let driver = Arc::new(LoopbackDriver::new());
    let session = open(BackendKind::Lldb, &driver);
    driver.fail_next("process launch failed: no such file");

    let op = session.protocol().launch(&TargetPath::root(), command_line("missing")).unwrap();
    let error = op.await.unwrap_err();
    assert_eq!(error.to_string(), "process launch failed: no such file");
}

#[tokio::test]
async fn test_cancelling_a_stalled_launch()
{
    let driver = Arc::new(LoopbackDriver::new());
    let session = open(BackendKind::Lldb, &driver);
    driver.stall_next();

    let op = session.protocol().launch(&TargetPath::root(), command_line("sleep 10")).unwrap();
    assert!(op.cancel());
    assert_eq!(op.await, Err(ModelError::Cancelled));
    assert!(session.model().get(&process_path(BackendKind::Lldb)).is_none());
}

#[tokio::test]
async fn test_frida_environment()
{
    let driver = Arc::new(LoopbackDriver::new());
    let session = open(BackendKind::Frida, &driver);

    let environment = session.model().suitable::<dyn Environment>(&TargetPath::root()).unwrap().environment();
    assert!(environment.debugger.contains("frida"));
    if cfg!(target_arch = "x86_64") {
        assert_eq!(environment.architecture, "x64");
    }

    let node = session.model().resolve(&TargetPath::parse("Environment").unwrap()).unwrap();
    assert_eq!(node.attribute("arch"), Some(environment.architecture.clone()));
}

#[tokio::test]
async fn test_gdb_breakpoints_live_on_the_session()
{
    let driver = Arc::new(LoopbackDriver::new());
    let session = open(BackendKind::Gdb, &driver);
    let path = launch_stopped(&session).await;

    let mut events = session.model().subscribe();
    let info = session
        .protocol()
        .insert_breakpoint(&path, BreakpointBuilder::at("*0x401000"))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(info.location.kind, BreakpointKind::Execution);
    assert_eq!(info.location.address, Address::from(0x40_1000));

    let node = TargetPath::parse("Breakpoints").unwrap().index(info.id);
    let object = session.model().wait_for_object(&node).await.unwrap();
    assert_eq!(object.attribute("enabled").as_deref(), Some("true"));

    driver.hit(ProcessId(FIRST_PID), Address::from(0x40_1000)).unwrap();
    loop {
        if let ModelEvent::BreakpointHit { address } = events.recv().await.unwrap() {
            assert_eq!(address, Address::from(0x40_1000));
            break;
        }
    }
    assert_eq!(session.model().breakpoints().info(info.id).unwrap().hit_count, 1);

    let rejected = session.protocol().insert_breakpoint(&path, BreakpointBuilder::at("0x401000").with_length(2));
    assert!(matches!(rejected, Err(ModelError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_watchpoint_kind_is_forwarded()
{
    let driver = Arc::new(LoopbackDriver::new());
    let session = open(BackendKind::Lldb, &driver);
    let path = launch_stopped(&session).await;

    let info = session
        .protocol()
        .insert_breakpoint(&path, BreakpointBuilder::at("0x601000").with_length(4).with_kind(BreakpointKind::Write))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(info.location.kind, BreakpointKind::Write);
    assert_eq!(info.location.length, 4);
}

#[tokio::test]
async fn test_unknown_breakpoint_fails_its_operation()
{
    let driver = Arc::new(LoopbackDriver::new());
    let session = open(BackendKind::Lldb, &driver);
    let path = launch_stopped(&session).await;

    let missing = BreakpointId::from_raw(99);
    let op = session.protocol().remove_breakpoint(&path, missing).unwrap();
    assert!(matches!(op.await, Err(ModelError::NotFound(_))));
}

#[tokio::test]
async fn test_fresh_breakpoint_id_is_usable_immediately()
{
    let driver = Arc::new(LoopbackDriver::new());
    let session = open(BackendKind::Lldb, &driver);
    let path = launch_stopped(&session).await;
    let mut events = session.model().subscribe();

    let info = session
        .protocol()
        .insert_breakpoint(&path, BreakpointBuilder::at("0x401000"))
        .unwrap()
        .await
        .unwrap();
    session.protocol().set_breakpoint_enabled(&path, info.id, false).unwrap().await.unwrap();
    session.protocol().remove_breakpoint(&path, info.id).unwrap().await.unwrap();

    let node = TargetPath::parse("Sessions[0].Breakpoints").unwrap().index(info.id);
    loop {
        if let ModelEvent::ObjectRemoved { path } = events.recv().await.unwrap() {
            if path == node {
                break;
            }
        }
    }
    assert!(session.model().breakpoints().info(info.id).is_none());
    assert!(session.model().get(&node).is_none());
}

#[tokio::test]
async fn test_relocation_keeps_breakpoint_identity()
{
    let driver = Arc::new(LoopbackDriver::new());
    let session = open(BackendKind::Lldb, &driver);
    let path = launch_stopped(&session).await;

    let info = session
        .protocol()
        .insert_breakpoint(&path, BreakpointBuilder::at("0x401000"))
        .unwrap()
        .await
        .unwrap();
    let node = TargetPath::parse("Sessions[0].Breakpoints").unwrap().index(info.id);
    let object = session.model().wait_for_object(&node).await.unwrap();
    assert_eq!(object.attribute("address"), Some(Address::from(0x40_1000).to_string()));

    let mut events = session.model().subscribe();
    let moved_to = Address::from(0x40_2000);
    driver.relocate(info.id, moved_to).unwrap();

    let mut updated = None;
    let mut address_changed = false;
    while updated.is_none() || !address_changed {
        match events.recv().await.unwrap() {
            ModelEvent::BreakpointUpdated(update) if update.id == info.id => updated = Some(update),
            ModelEvent::AttributeChanged { path, name, .. } if path == node && name == "address" => {
                address_changed = true;
            }
            _ => {}
        }
    }
    assert_eq!(updated.map(|update| update.location.address), Some(moved_to));

    let stored = session.model().breakpoints().info(info.id).unwrap();
    assert_eq!(stored.id, info.id);
    assert_eq!(stored.location.address, moved_to);
    assert_eq!(stored.requested_at, info.requested_at);
    assert_eq!(session.model().breakpoints().list().len(), 1);

    let after = session.model().resolve(&node).unwrap();
    assert!(Arc::ptr_eq(&object, &after));
    assert_eq!(after.attribute("address"), Some(moved_to.to_string()));
}
