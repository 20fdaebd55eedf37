//! # Capabilities
//!
//! A target object advertises what can be done with it through a set of
//! independent capability contracts. Backends implement only the contracts
//! they support and install the handles in the object's [`Capabilities`].
//!
//! Lookup is typed and never downcasts:
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use tether_core::capability::{Capabilities, Environment};
//! use tether_core::types::TargetEnvironment;
//!
//! let caps = Capabilities::new().with_environment(Arc::new(TargetEnvironment::host("lldb")));
//! let env = caps.get::<dyn Environment>().unwrap();
//! assert_eq!(env.environment().debugger, "lldb");
//! ```
//!
//! Every command method returns an [`Operation`]. Rejections that can be
//! decided without the backend (bad arguments, illegal lengths) are made by the
//! [`CommandProtocol`](crate::protocol::CommandProtocol) before these methods
//! are reached.

use std::fmt;
use std::sync::Arc;

use crate::async_state::AsyncState;
use crate::breakpoints::{BreakpointId, BreakpointInfo, BreakpointKind};
use crate::error::ModelResult;
use crate::operation::Operation;
use crate::params::{Arguments, ParameterMap};
use crate::types::{Address, ExecutionState, ProcessId, TargetEnvironment};

/// Names of the capability contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityKind
{
    Launchable,
    Attachable,
    Resumable,
    Interruptible,
    Killable,
    Detachable,
    ExecutionStateful,
    BreakpointContainer,
    Environment,
}

impl CapabilityKind
{
    /// Every capability, in declaration order.
    pub const ALL: [CapabilityKind; 9] = [
        Self::Launchable,
        Self::Attachable,
        Self::Resumable,
        Self::Interruptible,
        Self::Killable,
        Self::Detachable,
        Self::ExecutionStateful,
        Self::BreakpointContainer,
        Self::Environment,
    ];
}

impl fmt::Display for CapabilityKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::Debug::fmt(self, f)
    }
}

/// Start a new process from a parameterised command line.
pub trait Launchable: Send + Sync
{
    /// Schema the launch arguments are validated against.
    fn parameters(&self) -> &ParameterMap;

    /// Turn validated arguments into the command line handed to the backend.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if the arguments do not describe a runnable command.
    fn prepare(&self, arguments: &Arguments) -> ModelResult<Vec<String>>;

    /// Launch a prepared command line.
    ///
    /// Resolves with the backend's id for the new process once the backend
    /// accepted the launch. The process object shows up in the model
    /// asynchronously.
    fn launch(&self, argv: Vec<String>) -> Operation<ProcessId>;
}

/// Attach to a running process.
pub trait Attachable: Send + Sync
{
    fn attach(&self, pid: ProcessId) -> Operation<()>;
}

pub trait Resumable: Send + Sync
{
    fn resume(&self) -> Operation<()>;
}

pub trait Interruptible: Send + Sync
{
    fn interrupt(&self) -> Operation<()>;
}

pub trait Killable: Send + Sync
{
    fn kill(&self) -> Operation<()>;
}

pub trait Detachable: Send + Sync
{
    fn detach(&self) -> Operation<()>;
}

/// Object with an observable execution state.
pub trait ExecutionStateful: Send + Sync
{
    /// Last state reported by the backend, `None` before the first report.
    fn execution_state(&self) -> Option<ExecutionState>;

    /// Wait primitive over this object's state.
    fn async_state(&self) -> AsyncState;
}

/// Object that accepts breakpoints and watchpoints.
///
/// [`insert_breakpoint`](BreakpointContainer::insert_breakpoint) is the one
/// canonical insertion call; the convenience forms in
/// [`breakpoints::builder`](crate::breakpoints::builder) all end up here.
pub trait BreakpointContainer: Send + Sync
{
    /// Insert a breakpoint of `length` bytes at `address`.
    fn insert_breakpoint(&self, address: Address, length: u64, kind: BreakpointKind) -> Operation<BreakpointInfo>;

    /// Whether this backend can honour `length` for `kind`.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` describing the rejected combination.
    fn check_location(&self, length: u64, kind: BreakpointKind) -> ModelResult<()>;

    /// Parse a location in this backend's address notation.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if `text` is not in the accepted notation.
    fn parse_location(&self, text: &str) -> ModelResult<Address>;

    fn remove_breakpoint(&self, id: BreakpointId) -> Operation<()>;

    fn set_breakpoint_enabled(&self, id: BreakpointId, enabled: bool) -> Operation<()>;

    /// Breakpoints currently known to the model.
    fn breakpoints(&self) -> Vec<BreakpointInfo>;
}

/// Description of the debugging environment.
pub trait Environment: Send + Sync
{
    fn environment(&self) -> TargetEnvironment;
}

impl Environment for TargetEnvironment
{
    fn environment(&self) -> TargetEnvironment
    {
        self.clone()
    }
}

/// Capability handles installed on one object.
#[derive(Clone, Default)]
pub struct Capabilities
{
    launchable: Option<Arc<dyn Launchable>>,
    attachable: Option<Arc<dyn Attachable>>,
    resumable: Option<Arc<dyn Resumable>>,
    interruptible: Option<Arc<dyn Interruptible>>,
    killable: Option<Arc<dyn Killable>>,
    detachable: Option<Arc<dyn Detachable>>,
    execution_stateful: Option<Arc<dyn ExecutionStateful>>,
    breakpoint_container: Option<Arc<dyn BreakpointContainer>>,
    environment: Option<Arc<dyn Environment>>,
}

impl Capabilities
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Typed lookup, e.g. `caps.get::<dyn Resumable>()`.
    #[must_use]
    pub fn get<C: Capability + ?Sized>(&self) -> Option<Arc<C>>
    {
        C::extract(self)
    }

    /// Whether the capability is installed.
    #[must_use]
    pub fn supports(&self, kind: CapabilityKind) -> bool
    {
        match kind {
            CapabilityKind::Launchable => self.launchable.is_some(),
            CapabilityKind::Attachable => self.attachable.is_some(),
            CapabilityKind::Resumable => self.resumable.is_some(),
            CapabilityKind::Interruptible => self.interruptible.is_some(),
            CapabilityKind::Killable => self.killable.is_some(),
            CapabilityKind::Detachable => self.detachable.is_some(),
            CapabilityKind::ExecutionStateful => self.execution_stateful.is_some(),
            CapabilityKind::BreakpointContainer => self.breakpoint_container.is_some(),
            CapabilityKind::Environment => self.environment.is_some(),
        }
    }

    /// Installed capabilities in declaration order.
    #[must_use]
    pub fn kinds(&self) -> Vec<CapabilityKind>
    {
        CapabilityKind::ALL.into_iter().filter(|kind| self.supports(*kind)).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.kinds().is_empty()
    }

    #[must_use]
    pub fn with_launchable(mut self, handle: Arc<dyn Launchable>) -> Self
    {
        self.launchable = Some(handle);
        self
    }

    #[must_use]
    pub fn with_attachable(mut self, handle: Arc<dyn Attachable>) -> Self
    {
        self.attachable = Some(handle);
        self
    }

    #[must_use]
    pub fn with_resumable(mut self, handle: Arc<dyn Resumable>) -> Self
    {
        self.resumable = Some(handle);
        self
    }

    #[must_use]
    pub fn with_interruptible(mut self, handle: Arc<dyn Interruptible>) -> Self
    {
        self.interruptible = Some(handle);
        self
    }

    #[must_use]
    pub fn with_killable(mut self, handle: Arc<dyn Killable>) -> Self
    {
        self.killable = Some(handle);
        self
    }

    #[must_use]
    pub fn with_detachable(mut self, handle: Arc<dyn Detachable>) -> Self
    {
        self.detachable = Some(handle);
        self
    }

    #[must_use]
    pub fn with_execution_stateful(mut self, handle: Arc<dyn ExecutionStateful>) -> Self
    {
        self.execution_stateful = Some(handle);
        self
    }

    #[must_use]
    pub fn with_breakpoint_container(mut self, handle: Arc<dyn BreakpointContainer>) -> Self
    {
        self.breakpoint_container = Some(handle);
        self
    }

    #[must_use]
    pub fn with_environment(mut self, handle: Arc<dyn Environment>) -> Self
    {
        self.environment = Some(handle);
        self
    }
}

impl fmt::Debug for Capabilities
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_set().entries(self.kinds()).finish()
    }
}

/// A capability contract that can be looked up in [`Capabilities`].
///
/// Implemented for the trait objects (`dyn Resumable`, ...), which is what
/// makes `object.capability::<dyn Resumable>()` work.
pub trait Capability: Send + Sync
{
    const KIND: CapabilityKind;

    fn extract(capabilities: &Capabilities) -> Option<Arc<Self>>;
}

macro_rules! capability {
    ($contract:ident, $field:ident) => {
        impl Capability for dyn $contract
        {
            const KIND: CapabilityKind = CapabilityKind::$contract;

            fn extract(capabilities: &Capabilities) -> Option<Arc<Self>>
            {
                capabilities.$field.clone()
            }
        }
    };
}

capability!(Launchable, launchable);
capability!(Attachable, attachable);
capability!(Resumable, resumable);
capability!(Interruptible, interruptible);
capability!(Killable, killable);
capability!(Detachable, detachable);
capability!(ExecutionStateful, execution_stateful);
capability!(BreakpointContainer, breakpoint_container);
capability!(Environment, environment);

#[cfg(test)]
mod tests
{
    use super::*;

    struct Stub;

    impl Resumable for Stub
    {
        fn resume(&self) -> Operation<()>
        {
            Operation::ready(())
        }
    }

    impl Killable for Stub
    {
        fn kill(&self) -> Operation<()>
        {
            Operation::ready(())
        }
    }

    #[test]
    fn test_supports_reflects_installed_handles()
    {
        let stub = Arc::new(Stub);
        let caps = Capabilities::new().with_resumable(stub.clone()).with_killable(stub);
        assert!(caps.supports(CapabilityKind::Resumable));
        assert!(caps.supports(CapabilityKind::Killable));
        assert!(!caps.supports(CapabilityKind::Interruptible));
        assert_eq!(caps.kinds(), vec![CapabilityKind::Resumable, CapabilityKind::Killable]);
    }

    #[test]
    fn test_typed_lookup()
    {
        let caps = Capabilities::new().with_resumable(Arc::new(Stub));
        assert!(caps.get::<dyn Resumable>().is_some());
        assert!(caps.get::<dyn Detachable>().is_none());
        assert_eq!(<dyn Resumable as Capability>::KIND, CapabilityKind::Resumable);
    }

    #[test]
    fn test_debug_lists_kinds()
    {
        let caps = Capabilities::new().with_environment(Arc::new(TargetEnvironment::host("gdb")));
        assert_eq!(format!("{caps:?}"), "{Environment}");
        assert!(Capabilities::new().is_empty());
    }
}
