//! Shared driver-event translation.
//!
//! [`Translator`] keeps track of the processes, threads and breakpoints the
//! driver has reported and emits model events in an order that keeps waiters
//! consistent: threads change state before their process, and a process is
//! marked `Terminated` before it is removed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::warn;

use crate::backends::handles::{BreakpointHandle, LauncherHandle, LocationRules, ProcessHandle, ARGS_PARAMETER};
use crate::backends::{AdapterContext, BackendAdapter, BackendKind, DriverEvent};
use crate::breakpoints::{BreakpointId, BreakpointInfo};
use crate::capability::{Capabilities, CapabilityKind};
use crate::events::{ModelEvent, ObjectSpec};
use crate::params::{ParameterDescription, ParameterMap, ParameterType};
use crate::types::{Endian, ExecutionState, ProcessId, TargetEnvironment, TargetPath, ThreadId};

/// Object layout and rules of one debugger family.
pub trait Layout: Send + 'static
{
    fn kind(&self) -> BackendKind;

    fn environment(&self) -> TargetEnvironment;

    /// Object carrying `Launchable`, `Attachable` and `Environment`.
    fn launcher(&self) -> TargetPath;

    /// Type name of the launcher object.
    fn launcher_type(&self) -> &'static str
    {
        "Session"
    }

    /// Launch schema. Every backend takes at least the command line.
    fn parameters(&self) -> ParameterMap
    {
        ParameterMap::of([ParameterDescription::create(
            ParameterType::String,
            ARGS_PARAMETER,
            true,
            "",
            "Command Line",
            "space-separated command-line arguments",
        )])
    }

    /// Collection holding process objects.
    fn processes(&self) -> TargetPath;

    fn process_type(&self) -> &'static str
    {
        "Process"
    }

    /// Capabilities installed on each process besides `ExecutionStateful`.
    fn process_capabilities(&self) -> &'static [CapabilityKind];

    /// Collection holding breakpoint objects.
    fn breakpoints(&self) -> TargetPath;

    /// Whether the launcher and the breakpoint collection act as the
    /// breakpoint container (instead of each process).
    fn session_breakpoints(&self) -> bool
    {
        false
    }

    fn rules(&self) -> Arc<dyn LocationRules>;
}

#[derive(Debug, Default)]
struct ProcessEntry
{
    threads: BTreeSet<ThreadId>,
}

/// [`BackendAdapter`] driven by a [`Layout`].
#[derive(Debug)]
pub struct Translator<L>
{
    layout: L,
    processes: BTreeMap<ProcessId, ProcessEntry>,
    breakpoints: BTreeSet<BreakpointId>,
}

impl<L: Layout> Translator<L>
{
    #[must_use]
    pub fn new(layout: L) -> Self
    {
        Self {
            layout,
            processes: BTreeMap::new(),
            breakpoints: BTreeSet::new(),
        }
    }

    fn process_path(&self, pid: ProcessId) -> TargetPath
    {
        self.layout.processes().index(pid)
    }

    fn thread_path(&self, pid: ProcessId, tid: ThreadId) -> TargetPath
    {
        self.process_path(pid).child("Threads").index(tid)
    }

    fn breakpoint_container(&self, context: &AdapterContext) -> Arc<BreakpointHandle>
    {
        Arc::new(BreakpointHandle::new(
            context.driver.clone(),
            self.layout.rules(),
            context.breakpoints.clone(),
        ))
    }

    fn process_capabilities(&self, pid: ProcessId, context: &AdapterContext) -> Capabilities
    {
        let handle = Arc::new(ProcessHandle::new(context.driver.clone(), pid));
        let mut capabilities = Capabilities::new();
        for kind in self.layout.process_capabilities() {
            capabilities = match kind {
                CapabilityKind::Resumable => capabilities.with_resumable(handle.clone()),
                CapabilityKind::Interruptible => capabilities.with_interruptible(handle.clone()),
                CapabilityKind::Killable => capabilities.with_killable(handle.clone()),
                CapabilityKind::Detachable => capabilities.with_detachable(handle.clone()),
                CapabilityKind::BreakpointContainer => {
                    capabilities.with_breakpoint_container(self.breakpoint_container(context))
                }
                other => {
                    warn!(kind = %other, "capability cannot be installed on a process");
                    capabilities
                }
            };
        }
        capabilities
    }

    /// State changes for every thread of `pid`, then the process itself.
    fn state_events(&self, pid: ProcessId, state: ExecutionState) -> Vec<ModelEvent>
    {
        let Some(entry) = self.processes.get(&pid) else {
            warn!(%pid, %state, "dropping state change for an unknown process");
            return Vec::new();
        };
        entry
            .threads
            .iter()
            .map(|tid| self.thread_path(pid, *tid))
            .chain(std::iter::once(self.process_path(pid)))
            .map(|path| ModelEvent::StateChanged { path, state })
            .collect()
    }

    fn breakpoint_events(&mut self, info: BreakpointInfo) -> Vec<ModelEvent>
    {
        let path = self.layout.breakpoints().index(info.id);
        let mut events = vec![ModelEvent::BreakpointUpdated(info.clone())];
        if self.breakpoints.insert(info.id) {
            events.push(ModelEvent::ObjectAdded(
                ObjectSpec::new(path, "Breakpoint")
                    .with_attribute("address", info.location.address)
                    .with_attribute("length", info.location.length)
                    .with_attribute("kind", info.location.kind)
                    .with_attribute("enabled", info.enabled),
            ));
        } else {
            events.push(ModelEvent::AttributeChanged {
                path: path.clone(),
                name: "address".to_string(),
                value: info.location.address.to_string(),
            });
            events.push(ModelEvent::AttributeChanged {
                path,
                name: "enabled".to_string(),
                value: info.enabled.to_string(),
            });
        }
        events
    }
}

fn endian_name(endian: Endian) -> &'static str
{
    match endian {
        Endian::Little => "little",
        Endian::Big => "big",
    }
}

impl<L: Layout> BackendAdapter for Translator<L>
{
    fn kind(&self) -> BackendKind
    {
        self.layout.kind()
    }

    fn seed(&mut self, context: &AdapterContext) -> Vec<ModelEvent>
    {
        let launcher = self.layout.launcher();
        let environment = self.layout.environment();
        let handle = Arc::new(LauncherHandle::new(context.driver.clone(), self.layout.parameters()));

        let mut events: Vec<ModelEvent> = launcher
            .ancestors()
            .skip(1)
            .filter(|ancestor| !ancestor.is_root())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .map(|ancestor| {
                let type_name = ancestor.last().map(|segment| segment.as_str().to_string()).unwrap_or_default();
                ModelEvent::ObjectAdded(ObjectSpec::new(ancestor, type_name))
            })
            .collect();

        let mut launcher_capabilities = Capabilities::new()
            .with_launchable(handle.clone())
            .with_attachable(handle)
            .with_environment(Arc::new(environment.clone()));
        let mut breakpoint_capabilities = Capabilities::new();
        if self.layout.session_breakpoints() {
            let container = self.breakpoint_container(context);
            launcher_capabilities = launcher_capabilities.with_breakpoint_container(container.clone());
            breakpoint_capabilities = breakpoint_capabilities.with_breakpoint_container(container);
        }

        events.push(ModelEvent::ObjectAdded(
            ObjectSpec::new(launcher.clone(), self.layout.launcher_type())
                .with_capabilities(launcher_capabilities)
                .with_attribute("display", self.layout.kind()),
        ));
        events.push(ModelEvent::ObjectAdded(
            ObjectSpec::new(launcher.child("Environment"), "Environment")
                .with_capabilities(Capabilities::new().with_environment(Arc::new(environment.clone())))
                .with_attribute("arch", &environment.architecture)
                .with_attribute("debugger", &environment.debugger)
                .with_attribute("os", &environment.operating_system)
                .with_attribute("endian", endian_name(environment.endian)),
        ));
        events.push(ModelEvent::ObjectAdded(ObjectSpec::new(self.layout.processes(), "Processes")));
        events.push(ModelEvent::ObjectAdded(
            ObjectSpec::new(self.layout.breakpoints(), "Breakpoints").with_capabilities(breakpoint_capabilities),
        ));
        events
    }

    fn translate(&mut self, event: DriverEvent, context: &AdapterContext) -> Vec<ModelEvent>
    {
        match event {
            DriverEvent::ProcessStarted { pid, command } => {
                if self.processes.contains_key(&pid) {
                    warn!(%pid, "process reported twice");
                    return Vec::new();
                }
                self.processes.insert(pid, ProcessEntry::default());
                let path = self.process_path(pid);
                let display = if command.is_empty() { format!("{} {pid}", self.layout.process_type()) } else { command.join(" ") };
                vec![
                    ModelEvent::ObjectAdded(
                        ObjectSpec::new(path.clone(), self.layout.process_type())
                            .with_capabilities(self.process_capabilities(pid, context))
                            .stateful(ExecutionState::Alive)
                            .with_attribute("pid", pid)
                            .with_attribute("display", display),
                    ),
                    ModelEvent::ObjectAdded(ObjectSpec::new(path.child("Threads"), "Threads")),
                ]
            }
            DriverEvent::ThreadStarted { pid, tid } => {
                let Some(entry) = self.processes.get_mut(&pid) else {
                    warn!(%pid, %tid, "dropping thread of an unknown process");
                    return Vec::new();
                };
                entry.threads.insert(tid);
                vec![ModelEvent::ObjectAdded(
                    ObjectSpec::new(self.thread_path(pid, tid), "Thread")
                        .stateful(ExecutionState::Alive)
                        .with_attribute("tid", tid),
                )]
            }
            DriverEvent::Stopped { pid, tid, pc } => {
                let mut events = Vec::new();
                if let Some(address) = pc {
                    events.push(ModelEvent::BreakpointHit { address });
                    events.push(ModelEvent::AttributeChanged {
                        path: self.process_path(pid),
                        name: "pc".to_string(),
                        value: address.to_string(),
                    });
                }
                if let Some(tid) = tid {
                    events.push(ModelEvent::AttributeChanged {
                        path: self.process_path(pid),
                        name: "stopped_thread".to_string(),
                        value: tid.to_string(),
                    });
                }
                let states = self.state_events(pid, ExecutionState::Stopped);
                if states.is_empty() {
                    return Vec::new();
                }
                events.extend(states);
                events
            }
            DriverEvent::Running { pid } => self.state_events(pid, ExecutionState::Running),
            DriverEvent::ThreadExited { pid, tid } => {
                let known = self
                    .processes
                    .get_mut(&pid)
                    .is_some_and(|entry| entry.threads.remove(&tid));
                if !known {
                    warn!(%pid, %tid, "exit of an unknown thread");
                    return Vec::new();
                }
                vec![ModelEvent::ObjectRemoved {
                    path: self.thread_path(pid, tid),
                }]
            }
            DriverEvent::ProcessExited { pid, code } => {
                let mut events = self.state_events(pid, ExecutionState::Terminated);
                if events.is_empty() {
                    return events;
                }
                self.processes.remove(&pid);
                let path = self.process_path(pid);
                events.insert(
                    0,
                    ModelEvent::AttributeChanged {
                        path: path.clone(),
                        name: "exit_code".to_string(),
                        value: code.to_string(),
                    },
                );
                events.push(ModelEvent::ObjectRemoved { path });
                events
            }
            DriverEvent::Detached { pid } => {
                if self.processes.remove(&pid).is_none() {
                    warn!(%pid, "detach from an unknown process");
                    return Vec::new();
                }
                vec![ModelEvent::ObjectRemoved {
                    path: self.process_path(pid),
                }]
            }
            DriverEvent::BreakpointChanged(info) => self.breakpoint_events(info),
            DriverEvent::BreakpointDeleted(id) => {
                let mut events = vec![ModelEvent::BreakpointDeleted(id)];
                if self.breakpoints.remove(&id) {
                    events.push(ModelEvent::ObjectRemoved {
                        path: self.layout.breakpoints().index(id),
                    });
                }
                events
            }
            DriverEvent::Output { pid, text } => {
                let path = match pid {
                    Some(pid) if self.processes.contains_key(&pid) => self.process_path(pid),
                    _ => self.layout.launcher(),
                };
                vec![ModelEvent::Output { path, text }]
            }
        }
    }
}
