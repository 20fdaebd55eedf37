//! # Loopback Driver
//!
//! An in-process simulated debugger. It keeps a small table of fake
//! processes, answers every command immediately and reports the resulting
//! lifecycle through the usual [`DriverEvent`] channel, so tests and dry runs
//! exercise the same path as a real backend.
//!
//! Lifecycle of a launched process:
//!
//! ```text
//! launch ──▶ ProcessStarted, ThreadStarted, Stopped
//! resume ──▶ Running            (then ProcessExited if exit_on_resume)
//! interrupt ──▶ Stopped
//! kill ──▶ ProcessExited(-9)    detach ──▶ Detached
//! ```
//!
//! Commands complete *before* their events are sent, like a real debugger
//! acknowledging a request and reporting its effect later.
//!
//! Fault injection: [`fail_next`](LoopbackDriver::fail_next) makes the next
//! command fail with a backend message; [`stall_next`](LoopbackDriver::stall_next)
//! makes it hang until the caller cancels, which is observed through the
//! completer's cancellation token. Stalling needs a tokio runtime.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::backends::{BackendDriver, DriverEvent, DriverEventSender};
use crate::breakpoints::{BreakpointId, BreakpointInfo, BreakpointKind, BreakpointLocation};
use crate::error::{ModelError, ModelResult};
use crate::operation::{operation, Completer, Operation};
use crate::types::{Address, ExecutionState, ProcessId, ThreadId};

/// First pid handed out by a fresh driver.
pub const FIRST_PID: u64 = 4242;

#[derive(Debug)]
enum Fault
{
    Fail(String),
    Stall,
}

#[derive(Debug)]
struct SimProcess
{
    threads: Vec<ThreadId>,
    state: ExecutionState,
}

#[derive(Debug)]
struct LoopbackState
{
    events: Option<DriverEventSender>,
    next_pid: u64,
    next_tid: u64,
    next_breakpoint: u64,
    processes: BTreeMap<ProcessId, SimProcess>,
    breakpoints: BTreeMap<BreakpointId, BreakpointInfo>,
    fault: Option<Fault>,
    exit_on_resume: bool,
}

impl LoopbackState
{
    fn emit(&self, event: DriverEvent)
    {
        match &self.events {
            Some(events) => {
                if events.send(event).is_err() {
                    warn!("loopback event dropped: receiver closed");
                }
            }
            None => warn!(event = %event.describe(), "loopback event dropped: not connected"),
        }
    }

    fn start_process(&mut self, pid: ProcessId, command: Vec<String>)
    {
        let tid = ThreadId(self.next_tid);
        self.next_tid += 1;
        self.processes.insert(
            pid,
            SimProcess {
                threads: vec![tid],
                state: ExecutionState::Stopped,
            },
        );
        self.emit(DriverEvent::ProcessStarted { pid, command });
        self.emit(DriverEvent::ThreadStarted { pid, tid });
        self.emit(DriverEvent::Stopped {
            pid,
            tid: Some(tid),
            pc: None,
        });
    }

    fn process(&mut self, pid: ProcessId) -> ModelResult<&mut SimProcess>
    {
        self.processes
            .get_mut(&pid)
            .ok_or_else(|| ModelError::backend(format!("no such process: {pid}")))
    }
}

/// Simulated [`BackendDriver`].
#[derive(Debug)]
pub struct LoopbackDriver
{
    state: Mutex<LoopbackState>,
}

impl Default for LoopbackDriver
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl LoopbackDriver
{
    #[must_use]
    pub fn new() -> Self
    {
        Self {
            state: Mutex::new(LoopbackState {
                events: None,
                next_pid: FIRST_PID,
                next_tid: 1,
                next_breakpoint: 1,
                processes: BTreeMap::new(),
                breakpoints: BTreeMap::new(),
                fault: None,
                exit_on_resume: false,
            }),
        }
    }

    /// Make processes exit as soon as they are resumed, like a short command.
    #[must_use]
    pub fn with_exit_on_resume(self, exit: bool) -> Self
    {
        self.lock().exit_on_resume = exit;
        self
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState>
    {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next command with `message`.
    pub fn fail_next(&self, message: impl Into<String>)
    {
        self.lock().fault = Some(Fault::Fail(message.into()));
    }

    /// Leave the next command pending until its caller cancels it.
    pub fn stall_next(&self)
    {
        self.lock().fault = Some(Fault::Stall);
    }

    /// Simulated state of `pid`.
    #[must_use]
    pub fn process_state(&self, pid: ProcessId) -> Option<ExecutionState>
    {
        self.lock().processes.get(&pid).map(|process| process.state)
    }

    /// Move breakpoint `id` to `address`, as a backend does when code is
    /// relocated.
    ///
    /// ## Errors
    ///
    /// `NotFound` for an unknown id.
    pub fn relocate(&self, id: BreakpointId, address: Address) -> ModelResult<BreakpointInfo>
    {
        let mut state = self.lock();
        let info = state
            .breakpoints
            .get_mut(&id)
            .ok_or_else(|| ModelError::NotFound(format!("no breakpoint {id}")))?;
        info.relocate(address);
        let info = info.clone();
        state.emit(DriverEvent::BreakpointChanged(info.clone()));
        Ok(info)
    }

    /// Stop `pid` at `address`, as if a breakpoint there was hit.
    ///
    /// ## Errors
    ///
    /// `BackendFailure` for an unknown process.
    pub fn hit(&self, pid: ProcessId, address: Address) -> ModelResult<()>
    {
        let mut state = self.lock();
        let process = state.process(pid)?;
        process.state = ExecutionState::Stopped;
        let tid = process.threads.first().copied();
        state.emit(DriverEvent::Stopped {
            pid,
            tid,
            pc: Some(address),
        });
        Ok(())
    }

    /// Terminate `pid` with `code`.
    ///
    /// ## Errors
    ///
    /// `BackendFailure` for an unknown process.
    pub fn exit(&self, pid: ProcessId, code: i32) -> ModelResult<()>
    {
        let mut state = self.lock();
        state.process(pid)?;
        state.processes.remove(&pid);
        state.emit(DriverEvent::ProcessExited { pid, code });
        Ok(())
    }

    /// Emit console output for `pid`.
    pub fn output(&self, pid: Option<ProcessId>, text: impl Into<String>)
    {
        self.lock().emit(DriverEvent::Output { pid, text: text.into() });
    }

    /// Drop the event channel, as if the debugger went away.
    pub fn disconnect(&self)
    {
        self.lock().events = None;
    }

    /// Run `command` against the state unless a fault is armed.
    fn command<T, F>(&self, name: &'static str, command: F) -> Operation<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut LoopbackState, Completer<T>),
    {
        let mut state = self.lock();
        let (completer, op) = operation();
        match state.fault.take() {
            Some(Fault::Fail(message)) => {
                debug!(name, %message, "loopback injected failure");
                completer.fail(ModelError::BackendFailure(message));
            }
            Some(Fault::Stall) => {
                debug!(name, "loopback stalling command");
                tokio::spawn(async move {
                    completer.cancelled().await;
                    completer.fail(ModelError::Cancelled);
                });
            }
            None => command(&mut *state, completer),
        }
        op
    }

    fn set_state(&self, name: &'static str, pid: ProcessId, to: ExecutionState, event: DriverEvent) -> Operation<()>
    {
        self.command(name, move |state, completer| match state.process(pid) {
            Ok(process) => {
                process.state = to;
                completer.complete(());
                state.emit(event);
            }
            Err(err) => {
                completer.fail(err);
            }
        })
    }
}

impl BackendDriver for LoopbackDriver
{
    fn name(&self) -> &str
    {
        "loopback"
    }

    fn connect(&self, events: DriverEventSender) -> ModelResult<()>
    {
        let mut state = self.lock();
        if state.events.as_ref().is_some_and(|sender| !sender.is_closed()) {
            return Err(ModelError::backend("loopback driver is already connected"));
        }
        state.events = Some(events);
        Ok(())
    }

    fn launch(&self, argv: Vec<String>) -> Operation<ProcessId>
    {
        self.command("launch", move |state, completer| {
            if argv.is_empty() {
                completer.fail(ModelError::InvalidArgument("empty command line".to_string()));
                return;
            }
            let pid = ProcessId(state.next_pid);
            state.next_pid += 1;
            debug!(%pid, command = %argv.join(" "), "loopback launch");
            completer.complete(pid);
            state.start_process(pid, argv);
        })
    }

    fn attach(&self, pid: ProcessId) -> Operation<()>
    {
        self.command("attach", move |state, completer| {
            if state.processes.contains_key(&pid) {
                completer.fail(ModelError::backend(format!("already attached to {pid}")));
                return;
            }
            completer.complete(());
            state.start_process(pid, Vec::new());
        })
    }

    fn resume(&self, pid: ProcessId) -> Operation<()>
    {
        self.command("resume", move |state, completer| {
            let exit = state.exit_on_resume;
            match state.process(pid) {
                Ok(process) => process.state = ExecutionState::Running,
                Err(err) => {
                    completer.fail(err);
                    return;
                }
            }
            completer.complete(());
            state.emit(DriverEvent::Running { pid });
            if exit {
                state.processes.remove(&pid);
                state.emit(DriverEvent::ProcessExited { pid, code: 0 });
            }
        })
    }

    fn interrupt(&self, pid: ProcessId) -> Operation<()>
    {
        let event = DriverEvent::Stopped { pid, tid: None, pc: None };
        self.set_state("interrupt", pid, ExecutionState::Stopped, event)
    }

    fn kill(&self, pid: ProcessId) -> Operation<()>
    {
        self.command("kill", move |state, completer| {
            if state.processes.remove(&pid).is_none() {
                completer.fail(ModelError::backend(format!("no such process: {pid}")));
                return;
            }
            completer.complete(());
            state.emit(DriverEvent::ProcessExited { pid, code: -9 });
        })
    }

    fn detach(&self, pid: ProcessId) -> Operation<()>
    {
        self.command("detach", move |state, completer| {
            if state.processes.remove(&pid).is_none() {
                completer.fail(ModelError::backend(format!("no such process: {pid}")));
                return;
            }
            completer.complete(());
            state.emit(DriverEvent::Detached { pid });
        })
    }

    fn insert_breakpoint(&self, address: Address, length: u64, kind: BreakpointKind) -> Operation<BreakpointInfo>
    {
        self.command("insert_breakpoint", move |state, completer| {
            let id = BreakpointId::from_raw(state.next_breakpoint);
            state.next_breakpoint += 1;
            let info = BreakpointInfo::new(id, BreakpointLocation::new(address, length, kind));
            state.breakpoints.insert(id, info.clone());
            completer.complete(info.clone());
            state.emit(DriverEvent::BreakpointChanged(info));
        })
    }

    fn remove_breakpoint(&self, id: BreakpointId) -> Operation<()>
    {
        self.command("remove_breakpoint", move |state, completer| {
            if state.breakpoints.remove(&id).is_none() {
                completer.fail(ModelError::NotFound(format!("no breakpoint {id}")));
                return;
            }
            completer.complete(());
            state.emit(DriverEvent::BreakpointDeleted(id));
        })
    }

    fn set_breakpoint_enabled(&self, id: BreakpointId, enabled: bool) -> Operation<()>
    {
        self.command("set_breakpoint_enabled", move |state, completer| {
            let Some(info) = state.breakpoints.get_mut(&id) else {
                completer.fail(ModelError::NotFound(format!("no breakpoint {id}")));
                return;
            };
            info.enabled = enabled;
            let info = info.clone();
            completer.complete(());
            state.emit(DriverEvent::BreakpointChanged(info));
        })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::backends::event_channel;

    #[tokio::test]
    async fn test_launch_completes_before_events()
    {
        let driver = LoopbackDriver::new();
        let (tx, mut rx) = event_channel();
        driver.connect(tx).unwrap();

        let pid = driver.launch(vec!["echo".into(), "hi".into()]).await.unwrap();
        assert_eq!(pid, ProcessId(FIRST_PID));
        assert!(matches!(rx.recv().await, Some(DriverEvent::ProcessStarted { command, .. }) if command == ["echo", "hi"]));
        assert!(matches!(rx.recv().await, Some(DriverEvent::ThreadStarted { .. })));
        assert!(matches!(rx.recv().await, Some(DriverEvent::Stopped { .. })));
        assert_eq!(driver.process_state(pid), Some(ExecutionState::Stopped));
    }

    #[tokio::test]
    async fn test_injected_failure_hits_next_command_only()
    {
        let driver = LoopbackDriver::new();
        driver.fail_next("boom");
        assert_eq!(driver.launch(vec!["ls".into()]).await, Err(ModelError::backend("boom")));
        assert!(driver.launch(vec!["ls".into()]).await.is_ok());
    }

    #[tokio::test]
    async fn test_stalled_command_observes_cancellation()
    {
        let driver = LoopbackDriver::new();
        driver.stall_next();
        let op = driver.resume(ProcessId(1));
        let canceller = op.canceller();
        let waiter = tokio::spawn(op.wait());
        canceller.cancel();
        assert_eq!(waiter.await.unwrap(), Err(ModelError::Cancelled));
    }

    #[tokio::test]
    async fn test_unknown_process_fails()
    {
        let driver = LoopbackDriver::new();
        assert!(matches!(driver.kill(ProcessId(7)).await, Err(ModelError::BackendFailure(_))));
        assert!(matches!(
            driver.remove_breakpoint(BreakpointId::from_raw(3)).await,
            Err(ModelError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_relocate_keeps_id()
    {
        let driver = LoopbackDriver::new();
        let info = driver
            .insert_breakpoint(Address::from(0x40_1000), 1, BreakpointKind::Execution)
            .await
            .unwrap();
        let moved = driver.relocate(info.id, Address::from(0x7000)).unwrap();
        assert_eq!(moved.id, info.id);
        assert_eq!(moved.location.address, Address::from(0x7000));
    }
}
