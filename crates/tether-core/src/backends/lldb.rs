//! LLVM debugger layout.
//!
//! ```text
//! Sessions
//! └── [0]                          Session: Launchable, Attachable, Environment
//!     ├── Environment
//!     ├── Breakpoints
//!     │   └── [id]                 Breakpoint
//!     └── Processes
//!         └── [pid]                Process: Resumable, Interruptible, Killable,
//!             │                             Detachable, BreakpointContainer,
//!             │                             ExecutionStateful
//!             └── Threads
//!                 └── [tid]        Thread: ExecutionStateful
//! ```
//!
//! Locations are hexadecimal addresses with or without `0x`. Watchpoints
//! cover 1, 2, 4 or 8 bytes.

use std::sync::Arc;

use crate::backends::handles::{check_execution_length, LocationRules};
use crate::backends::tree::Layout;
use crate::backends::BackendKind;
use crate::breakpoints::BreakpointKind;
use crate::capability::CapabilityKind;
use crate::error::{ModelError, ModelResult};
use crate::types::{Address, TargetEnvironment, TargetPath};

const WATCH_LENGTHS: [u64; 4] = [1, 2, 4, 8];

#[derive(Debug, Clone, Copy, Default)]
pub struct LldbRules;

impl LocationRules for LldbRules
{
    fn parse(&self, text: &str) -> ModelResult<Address>
    {
        Address::parse_hex(text)
    }

    fn check(&self, length: u64, kind: BreakpointKind) -> ModelResult<()>
    {
        check_execution_length(length, kind)?;
        if kind.is_watchpoint() && !WATCH_LENGTHS.contains(&length) {
            return Err(ModelError::InvalidArgument(format!(
                "lldb watchpoints cover 1, 2, 4 or 8 bytes, got {length}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LldbLayout;

impl LldbLayout
{
    fn session() -> TargetPath
    {
        TargetPath::root().child("Sessions").index(0)
    }
}

impl Layout for LldbLayout
{
    fn kind(&self) -> BackendKind
    {
        BackendKind::Lldb
    }

    fn environment(&self) -> TargetEnvironment
    {
        TargetEnvironment::host("lldb")
    }

    fn launcher(&self) -> TargetPath
    {
        Self::session()
    }

    fn processes(&self) -> TargetPath
    {
        Self::session().child("Processes")
    }

    fn process_capabilities(&self) -> &'static [CapabilityKind]
    {
        &[
            CapabilityKind::Resumable,
            CapabilityKind::Interruptible,
            CapabilityKind::Killable,
            CapabilityKind::Detachable,
            CapabilityKind::BreakpointContainer,
        ]
    }

    fn breakpoints(&self) -> TargetPath
    {
        Self::session().child("Breakpoints")
    }

    fn rules(&self) -> Arc<dyn LocationRules>
    {
        Arc::new(LldbRules)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_notation()
    {
        assert_eq!(LldbRules.parse("0x401000").unwrap(), Address::from(0x40_1000));
        assert_eq!(LldbRules.parse("401000").unwrap(), Address::from(0x40_1000));
        assert!(LldbRules.parse("*0x401000").is_err());
    }

    #[test]
    fn test_lengths()
    {
        assert!(LldbRules.check(1, BreakpointKind::Execution).is_ok());
        assert!(LldbRules.check(4, BreakpointKind::Execution).is_err());
        assert!(LldbRules.check(8, BreakpointKind::Write).is_ok());
        assert!(LldbRules.check(3, BreakpointKind::Read).is_err());
        assert!(LldbRules.check(16, BreakpointKind::Access).is_err());
    }
}
