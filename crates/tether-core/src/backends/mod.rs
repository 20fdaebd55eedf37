//! # Backends
//!
//! A backend is two pieces:
//!
//! - a [`BackendDriver`] that speaks the debugger's native protocol. It takes
//!   uniform commands, returns [`Operation`]s, and reports what happens on the
//!   target as [`DriverEvent`]s;
//! - a [`BackendAdapter`] that knows how that debugger's objects are laid out
//!   and turns driver events into [`ModelEvent`]s for the model writer.
//!
//! The adapters for the three supported debugger families share one
//! translator ([`tree::Translator`]) and differ in their [`tree::Layout`]:
//! where processes live, which capabilities they carry, what address notation
//! and watchpoint lengths the debugger accepts.
//!
//! ## Example
//!
//! ```rust
//! use tether_core::backends::BackendKind;
//!
//! let kind: BackendKind = "gdb".parse()?;
//! let adapter = kind.adapter();
//! assert_eq!(adapter.kind(), BackendKind::Gdb);
//! # Ok::<(), tether_core::error::ModelError>(())
//! ```

pub mod frida;
pub mod gdb;
pub mod handles;
pub mod lldb;
pub mod loopback;
pub mod tree;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::breakpoints::{BreakpointId, BreakpointInfo, BreakpointKind, BreakpointView};
use crate::error::{ModelError, ModelResult};
use crate::events::ModelEvent;
use crate::operation::Operation;
use crate::types::{Address, ProcessId, TargetPath, ThreadId};

use self::tree::Layout;

/// Something the driver observed on the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent
{
    ProcessStarted
    {
        pid: ProcessId,
        /// Command line, empty for attached processes
        command: Vec<String>,
    },
    ThreadStarted
    {
        pid: ProcessId,
        tid: ThreadId,
    },
    /// The process stopped; `pc` is the stop address when known.
    Stopped
    {
        pid: ProcessId,
        tid: Option<ThreadId>,
        pc: Option<Address>,
    },
    Running
    {
        pid: ProcessId
    },
    ThreadExited
    {
        pid: ProcessId,
        tid: ThreadId,
    },
    ProcessExited
    {
        pid: ProcessId,
        code: i32,
    },
    /// The debugger let go of the process; it keeps running untraced.
    Detached
    {
        pid: ProcessId
    },
    /// Breakpoint created, toggled or relocated.
    BreakpointChanged(BreakpointInfo),
    BreakpointDeleted(BreakpointId),
    /// Console output from the target (`pid`) or the debugger itself.
    Output
    {
        pid: Option<ProcessId>,
        text: String,
    },
}

impl DriverEvent
{
    /// Human-readable description of the event.
    #[must_use]
    pub fn describe(&self) -> String
    {
        match self {
            Self::ProcessStarted { pid, command } if command.is_empty() => format!("Process {pid} attached"),
            Self::ProcessStarted { pid, command } => format!("Process {pid} started: {}", command.join(" ")),
            Self::ThreadStarted { pid, tid } => format!("Thread {tid} started in process {pid}"),
            Self::Stopped { pid, tid, pc } => {
                let mut description = format!("Process {pid} stopped");
                if let Some(tid) = tid {
                    description.push_str(&format!(" (thread {tid})"));
                }
                if let Some(pc) = pc {
                    description.push_str(&format!(" at {pc}"));
                }
                description
            }
            Self::Running { pid } => format!("Process {pid} running"),
            Self::ThreadExited { pid, tid } => format!("Thread {tid} of process {pid} exited"),
            Self::ProcessExited { pid, code } => format!("Process {pid} exited with code: {code}"),
            Self::Detached { pid } => format!("Detached from process {pid}"),
            Self::BreakpointChanged(info) => format!("Breakpoint {} at {}", info.id, info.location.address),
            Self::BreakpointDeleted(id) => format!("Breakpoint {id} deleted"),
            Self::Output { text, .. } => format!("Output: {}", text.trim_end()),
        }
    }
}

/// Sender side of the driver event channel.
pub type DriverEventSender = mpsc::UnboundedSender<DriverEvent>;
/// Receiver side of the driver event channel.
pub type DriverEventReceiver = mpsc::UnboundedReceiver<DriverEvent>;

/// Create a new driver event channel.
#[must_use]
pub fn event_channel() -> (DriverEventSender, DriverEventReceiver)
{
    mpsc::unbounded_channel()
}

/// Native debugger protocol, as seen by the model.
///
/// Implementations must not block: every command returns an [`Operation`]
/// straight away and settles it when the debugger answers. A driver should
/// watch the completer's cancellation token and abort the native call when
/// the caller cancels.
pub trait BackendDriver: Send + Sync
{
    /// Short name for logs, e.g. `"lldb"`.
    fn name(&self) -> &str;

    /// Start reporting events on `events`.
    ///
    /// ## Errors
    ///
    /// The driver cannot reach its debugger, or is already connected.
    fn connect(&self, events: DriverEventSender) -> ModelResult<()>;

    /// Launch `argv[0]` with the remaining arguments.
    fn launch(&self, argv: Vec<String>) -> Operation<ProcessId>;

    fn attach(&self, pid: ProcessId) -> Operation<()>;

    fn resume(&self, pid: ProcessId) -> Operation<()>;

    fn interrupt(&self, pid: ProcessId) -> Operation<()>;

    fn kill(&self, pid: ProcessId) -> Operation<()>;

    fn detach(&self, pid: ProcessId) -> Operation<()>;

    fn insert_breakpoint(&self, address: Address, length: u64, kind: BreakpointKind) -> Operation<BreakpointInfo>;

    fn remove_breakpoint(&self, id: BreakpointId) -> Operation<()>;

    fn set_breakpoint_enabled(&self, id: BreakpointId, enabled: bool) -> Operation<()>;
}

/// What an adapter needs to build capability handles.
#[derive(Clone)]
pub struct AdapterContext
{
    pub driver: Arc<dyn BackendDriver>,
    pub breakpoints: BreakpointView,
}

impl fmt::Debug for AdapterContext
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("AdapterContext").field("driver", &self.driver.name()).finish_non_exhaustive()
    }
}

/// Per-backend translation of driver events into model events.
pub trait BackendAdapter: Send
{
    fn kind(&self) -> BackendKind;

    /// Objects that exist before the driver reports anything (launcher,
    /// environment, empty collections).
    fn seed(&mut self, context: &AdapterContext) -> Vec<ModelEvent>;

    /// Model changes implied by one driver event, in application order.
    fn translate(&mut self, event: DriverEvent, context: &AdapterContext) -> Vec<ModelEvent>;
}

/// Supported debugger families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind
{
    /// LLVM debugger: sessions hold processes
    Lldb,
    /// GNU debugger: root holds inferiors and a global breakpoint table
    Gdb,
    /// Dynamic instrumentation: root holds processes, no interrupt
    Frida,
}

impl BackendKind
{
    /// Adapter for this backend family.
    #[must_use]
    pub fn adapter(self) -> Box<dyn BackendAdapter>
    {
        match self {
            Self::Lldb => Box::new(tree::Translator::new(lldb::LldbLayout)),
            Self::Gdb => Box::new(tree::Translator::new(gdb::GdbLayout)),
            Self::Frida => Box::new(tree::Translator::new(frida::FridaLayout)),
        }
    }

    /// Where process `pid` appears in this backend's tree.
    #[must_use]
    pub fn process_path(self, pid: ProcessId) -> TargetPath
    {
        let processes = match self {
            Self::Lldb => lldb::LldbLayout.processes(),
            Self::Gdb => gdb::GdbLayout.processes(),
            Self::Frida => frida::FridaLayout.processes(),
        };
        processes.index(pid)
    }
}

impl fmt::Display for BackendKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let name = match self {
            Self::Lldb => "lldb",
            Self::Gdb => "gdb",
            Self::Frida => "frida",
        };
        f.write_str(name)
    }
}

impl FromStr for BackendKind
{
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_ascii_lowercase().as_str() {
            "lldb" => Ok(Self::Lldb),
            "gdb" => Ok(Self::Gdb),
            "frida" => Ok(Self::Frida),
            other => Err(ModelError::InvalidArgument(format!(
                "unknown backend '{other}' (expected lldb, gdb or frida)"
            ))),
        }
    }
}
