//! # Command Protocol
//!
//! Path-addressed command dispatch.
//!
//! Every command follows the same steps:
//!
//! 1. find the nearest object in scope of the path that has the required
//!    capability ([`ObjectModel::suitable`]);
//! 2. validate arguments (launch schema, breakpoint notation and length);
//! 3. invoke the capability and hand back its [`Operation`].
//!
//! Steps 1 and 2 fail synchronously with `NotFound` / `InvalidArgument`; no
//! backend call is made and no operation exists. Everything after that is
//! asynchronous: a completed launch does not mean the new process is in the
//! model yet. Wait with [`ObjectModel::wait_for_object`] or an
//! [`AsyncState`](crate::async_state::AsyncState) for that.

use tracing::debug;

use crate::breakpoints::builder::BreakpointBuilder;
use crate::breakpoints::{BreakpointId, BreakpointInfo};
use crate::capability::{
    Attachable, BreakpointContainer, Detachable, Interruptible, Killable, Launchable, Resumable,
};
use crate::error::ModelResult;
use crate::model::ObjectModel;
use crate::operation::Operation;
use crate::params::Arguments;
use crate::types::{ProcessId, TargetPath};

/// Dispatches commands against an [`ObjectModel`].
#[derive(Clone, Debug)]
pub struct CommandProtocol
{
    model: ObjectModel,
}

impl CommandProtocol
{
    #[must_use]
    pub fn new(model: ObjectModel) -> Self
    {
        Self { model }
    }

    #[must_use]
    pub fn model(&self) -> &ObjectModel
    {
        &self.model
    }

    /// Launch a process with `arguments` validated against the launcher's
    /// schema.
    ///
    /// ## Errors
    ///
    /// `NotFound` without a launcher in scope; `InvalidArgument` when the
    /// arguments do not match the schema or do not form a command line.
    pub fn launch(&self, path: &TargetPath, arguments: Arguments) -> ModelResult<Operation<ProcessId>>
    {
        let launcher = self.model.suitable::<dyn Launchable>(path)?;
        let arguments = launcher.parameters().validate(&arguments)?;
        let argv = launcher.prepare(&arguments)?;
        debug!(%path, ?argv, "launch");
        Ok(launcher.launch(argv))
    }

    /// ## Errors
    ///
    /// `NotFound` without an attacher in scope.
    pub fn attach(&self, path: &TargetPath, pid: ProcessId) -> ModelResult<Operation<()>>
    {
        let attacher = self.model.suitable::<dyn Attachable>(path)?;
        debug!(%path, %pid, "attach");
        Ok(attacher.attach(pid))
    }

    /// ## Errors
    ///
    /// `NotFound` without a resumable object in scope.
    pub fn resume(&self, path: &TargetPath) -> ModelResult<Operation<()>>
    {
        let target = self.model.suitable::<dyn Resumable>(path)?;
        debug!(%path, "resume");
        Ok(target.resume())
    }

    /// ## Errors
    ///
    /// `NotFound` without an interruptible object in scope.
    pub fn interrupt(&self, path: &TargetPath) -> ModelResult<Operation<()>>
    {
        let target = self.model.suitable::<dyn Interruptible>(path)?;
        debug!(%path, "interrupt");
        Ok(target.interrupt())
    }

    /// ## Errors
    ///
    /// `NotFound` without a killable object in scope.
    pub fn kill(&self, path: &TargetPath) -> ModelResult<Operation<()>>
    {
        let target = self.model.suitable::<dyn Killable>(path)?;
        debug!(%path, "kill");
        Ok(target.kill())
    }

    /// ## Errors
    ///
    /// `NotFound` without a detachable object in scope.
    pub fn detach(&self, path: &TargetPath) -> ModelResult<Operation<()>>
    {
        let target = self.model.suitable::<dyn Detachable>(path)?;
        debug!(%path, "detach");
        Ok(target.detach())
    }

    /// Insert a breakpoint through the nearest container.
    ///
    /// ## Errors
    ///
    /// `NotFound` without a container in scope; `InvalidArgument` for a
    /// location outside the container's notation or an illegal length.
    pub fn insert_breakpoint(&self, path: &TargetPath, request: BreakpointBuilder) -> ModelResult<Operation<BreakpointInfo>>
    {
        let container = self.model.suitable::<dyn BreakpointContainer>(path)?;
        request.insert(&*container)
    }

    /// The id is the backend's: an unknown id fails the returned operation.
    ///
    /// ## Errors
    ///
    /// `NotFound` without a container in scope.
    pub fn remove_breakpoint(&self, path: &TargetPath, id: BreakpointId) -> ModelResult<Operation<()>>
    {
        let container = self.model.suitable::<dyn BreakpointContainer>(path)?;
        debug!(%path, %id, "remove breakpoint");
        Ok(container.remove_breakpoint(id))
    }

    /// ## Errors
    ///
    /// `NotFound` without a container in scope.
    pub fn set_breakpoint_enabled(&self, path: &TargetPath, id: BreakpointId, enabled: bool) -> ModelResult<Operation<()>>
    {
        let container = self.model.suitable::<dyn BreakpointContainer>(path)?;
        debug!(%path, %id, enabled, "toggle breakpoint");
        Ok(container.set_breakpoint_enabled(id, enabled))
    }
}
