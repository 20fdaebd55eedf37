//! Capability handles shared by the backend adapters.
//!
//! Each handle forwards to the [`BackendDriver`]; a layout decides which of
//! their capabilities an object actually gets.

use std::sync::Arc;

use tracing::debug;

use crate::backends::BackendDriver;
use crate::breakpoints::{BreakpointId, BreakpointInfo, BreakpointKind, BreakpointView};
use crate::capability::{
    Attachable, BreakpointContainer, Detachable, Interruptible, Killable, Launchable, Resumable,
};
use crate::error::{ModelError, ModelResult};
use crate::operation::Operation;
use crate::params::{split_command_line, Arguments, ParameterMap};
use crate::types::{Address, ProcessId};

/// Name of the command-line parameter every launcher accepts.
pub const ARGS_PARAMETER: &str = "args";

/// Address notation and length rules of one debugger.
pub trait LocationRules: Send + Sync
{
    /// ## Errors
    ///
    /// `InvalidArgument` if `text` is not in the debugger's notation.
    fn parse(&self, text: &str) -> ModelResult<Address>;

    /// ## Errors
    ///
    /// `InvalidArgument` if the debugger cannot honour `length` for `kind`.
    fn check(&self, length: u64, kind: BreakpointKind) -> ModelResult<()>;
}

/// Rejects anything but length 1 for execution breakpoints.
pub(crate) fn check_execution_length(length: u64, kind: BreakpointKind) -> ModelResult<()>
{
    if kind == BreakpointKind::Execution && length != 1 {
        return Err(ModelError::InvalidArgument(format!(
            "execution breakpoints cover exactly 1 byte, got {length}"
        )));
    }
    Ok(())
}

/// Launchable and Attachable handle of a session.
pub struct LauncherHandle
{
    driver: Arc<dyn BackendDriver>,
    parameters: ParameterMap,
}

impl LauncherHandle
{
    #[must_use]
    pub fn new(driver: Arc<dyn BackendDriver>, parameters: ParameterMap) -> Self
    {
        Self { driver, parameters }
    }
}

impl Launchable for LauncherHandle
{
    fn parameters(&self) -> &ParameterMap
    {
        &self.parameters
    }

    fn prepare(&self, arguments: &Arguments) -> ModelResult<Vec<String>>
    {
        let line = arguments
            .get(ARGS_PARAMETER)
            .and_then(|value| value.as_str())
            .unwrap_or_default();
        let argv = split_command_line(line)?;
        if argv.is_empty() {
            return Err(ModelError::InvalidArgument("empty command line".to_string()));
        }
        Ok(argv)
    }

    fn launch(&self, argv: Vec<String>) -> Operation<ProcessId>
    {
        let driver = self.driver.name().to_string();
        self.driver.launch(argv).map(move |pid| {
            debug!(driver, %pid, "launch accepted");
            pid
        })
    }
}

impl Attachable for LauncherHandle
{
    fn attach(&self, pid: ProcessId) -> Operation<()>
    {
        self.driver.attach(pid)
    }
}

/// Execution-control handle of one process.
pub struct ProcessHandle
{
    driver: Arc<dyn BackendDriver>,
    pid: ProcessId,
}

impl ProcessHandle
{
    #[must_use]
    pub fn new(driver: Arc<dyn BackendDriver>, pid: ProcessId) -> Self
    {
        Self { driver, pid }
    }

    #[must_use]
    pub fn pid(&self) -> ProcessId
    {
        self.pid
    }
}

impl Resumable for ProcessHandle
{
    fn resume(&self) -> Operation<()>
    {
        self.driver.resume(self.pid)
    }
}

impl Interruptible for ProcessHandle
{
    fn interrupt(&self) -> Operation<()>
    {
        self.driver.interrupt(self.pid)
    }
}

impl Killable for ProcessHandle
{
    fn kill(&self) -> Operation<()>
    {
        self.driver.kill(self.pid)
    }
}

impl Detachable for ProcessHandle
{
    fn detach(&self) -> Operation<()>
    {
        self.driver.detach(self.pid)
    }
}

/// Breakpoint container backed by the driver and the session's store.
pub struct BreakpointHandle
{
    driver: Arc<dyn BackendDriver>,
    rules: Arc<dyn LocationRules>,
    view: BreakpointView,
}

impl BreakpointHandle
{
    #[must_use]
    pub fn new(driver: Arc<dyn BackendDriver>, rules: Arc<dyn LocationRules>, view: BreakpointView) -> Self
    {
        Self { driver, rules, view }
    }
}

impl BreakpointContainer for BreakpointHandle
{
    fn insert_breakpoint(&self, address: Address, length: u64, kind: BreakpointKind) -> Operation<BreakpointInfo>
    {
        // Callers that skip the builder still never reach the driver with an
        // illegal length.
        if let Err(err) = self.rules.check(length, kind) {
            return Operation::failed(err);
        }
        self.driver.insert_breakpoint(address, length, kind)
    }

    fn check_location(&self, length: u64, kind: BreakpointKind) -> ModelResult<()>
    {
        self.rules.check(length, kind)
    }

    fn parse_location(&self, text: &str) -> ModelResult<Address>
    {
        self.rules.parse(text)
    }

    fn remove_breakpoint(&self, id: BreakpointId) -> Operation<()>
    {
        self.driver.remove_breakpoint(id)
    }

    fn set_breakpoint_enabled(&self, id: BreakpointId, enabled: bool) -> Operation<()>
    {
        self.driver.set_breakpoint_enabled(id, enabled)
    }

    fn breakpoints(&self) -> Vec<BreakpointInfo>
    {
        self.view.list()
    }
}
