//! GNU debugger layout.
//!
//! The root is the session. Processes are inferiors, and breakpoints live in
//! one global table, so the root and the `Breakpoints` collection are the
//! breakpoint containers.
//!
//! ```text
//! (root)                           Session: Launchable, Attachable, Environment,
//! │                                         BreakpointContainer
//! ├── Environment
//! ├── Breakpoints                  BreakpointContainer
//! │   └── [id]
//! └── Inferiors
//!     └── [n]                      Inferior: Resumable, Interruptible, Killable,
//!         │                                  Detachable, ExecutionStateful
//!         └── Threads
//!             └── [tid]
//! ```
//!
//! Locations are `*0x…` or `0x…`. Watchpoints cover 1 to 8 bytes.

use std::sync::Arc;

use crate::backends::handles::{check_execution_length, LocationRules};
use crate::backends::tree::Layout;
use crate::backends::BackendKind;
use crate::breakpoints::BreakpointKind;
use crate::capability::CapabilityKind;
use crate::error::{ModelError, ModelResult};
use crate::types::{Address, TargetEnvironment, TargetPath};

#[derive(Debug, Clone, Copy, Default)]
pub struct GdbRules;

impl LocationRules for GdbRules
{
    fn parse(&self, text: &str) -> ModelResult<Address>
    {
        let trimmed = text.trim();
        let expression = trimmed.strip_prefix('*').unwrap_or(trimmed).trim_start();
        if !(expression.starts_with("0x") || expression.starts_with("0X")) {
            return Err(ModelError::InvalidArgument(format!(
                "gdb locations are '*0x…' or '0x…', got {text:?}"
            )));
        }
        Address::parse_hex(expression)
    }

    fn check(&self, length: u64, kind: BreakpointKind) -> ModelResult<()>
    {
        check_execution_length(length, kind)?;
        if kind.is_watchpoint() && !(1..=8).contains(&length) {
            return Err(ModelError::InvalidArgument(format!(
                "gdb watchpoints cover 1 to 8 bytes, got {length}"
            )));
        }
        Ok(())
    }
}

/// Architecture name the way gdb reports it.
fn gdb_architecture() -> String
{
    match std::env::consts::ARCH {
        "x86_64" => "i386:x86-64".to_string(),
        "x86" => "i386".to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GdbLayout;

impl Layout for GdbLayout
{
    fn kind(&self) -> BackendKind
    {
        BackendKind::Gdb
    }

    fn environment(&self) -> TargetEnvironment
    {
        TargetEnvironment {
            architecture: gdb_architecture(),
            ..TargetEnvironment::host("gdb")
        }
    }

    fn launcher(&self) -> TargetPath
    {
        TargetPath::root()
    }

    fn processes(&self) -> TargetPath
    {
        TargetPath::root().child("Inferiors")
    }

    fn process_type(&self) -> &'static str
    {
        "Inferior"
    }

    fn process_capabilities(&self) -> &'static [CapabilityKind]
    {
        &[
            CapabilityKind::Resumable,
            CapabilityKind::Interruptible,
            CapabilityKind::Killable,
            CapabilityKind::Detachable,
        ]
    }

    fn breakpoints(&self) -> TargetPath
    {
        TargetPath::root().child("Breakpoints")
    }

    fn session_breakpoints(&self) -> bool
    {
        true
    }

    fn rules(&self) -> Arc<dyn LocationRules>
    {
        Arc::new(GdbRules)
    }
}
