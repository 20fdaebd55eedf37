//! Dynamic-instrumentation layout.
//!
//! The root launches and attaches. Instrumented processes cannot be
//! interrupted from outside, so processes carry no `Interruptible`.
//!
//! ```text
//! (root)                           Session: Launchable, Attachable, Environment
//! ├── Environment
//! ├── Breakpoints
//! └── Processes
//!     └── [pid]                    Process: Resumable, Killable, Detachable,
//!         │                                 BreakpointContainer, ExecutionStateful
//!         └── Threads
//! ```
//!
//! Locations are hexadecimal with or without `0x`; watchpoints may cover any
//! number of bytes.

use std::sync::Arc;

use crate::backends::handles::{check_execution_length, LocationRules};
use crate::backends::tree::Layout;
use crate::backends::BackendKind;
use crate::breakpoints::BreakpointKind;
use crate::capability::CapabilityKind;
use crate::error::{ModelError, ModelResult};
use crate::types::{Address, TargetEnvironment, TargetPath};

#[derive(Debug, Clone, Copy, Default)]
pub struct FridaRules;

impl LocationRules for FridaRules
{
    fn parse(&self, text: &str) -> ModelResult<Address>
    {
        Address::parse_hex(text)
    }

    fn check(&self, length: u64, kind: BreakpointKind) -> ModelResult<()>
    {
        if length == 0 {
            return Err(ModelError::InvalidArgument("breakpoint length must be at least 1".to_string()));
        }
        check_execution_length(length, kind)
    }
}

/// Architecture name the way the instrumentation engine reports it.
fn frida_architecture() -> String
{
    match std::env::consts::ARCH {
        "x86_64" => "x64",
        "x86" => "ia32",
        "aarch64" => "arm64",
        other => other,
    }
    .to_string()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FridaLayout;

impl Layout for FridaLayout
{
    fn kind(&self) -> BackendKind
    {
        BackendKind::Frida
    }

    fn environment(&self) -> TargetEnvironment
    {
        TargetEnvironment {
            architecture: frida_architecture(),
            ..TargetEnvironment::host("frida")
        }
    }

    fn launcher(&self) -> TargetPath
    {
        TargetPath::root()
    }

    fn processes(&self) -> TargetPath
    {
        TargetPath::root().child("Processes")
    }

    fn process_capabilities(&self) -> &'static [CapabilityKind]
    {
        &[
            CapabilityKind::Resumable,
            CapabilityKind::Killable,
            CapabilityKind::Detachable,
            CapabilityKind::BreakpointContainer,
        ]
    }

    fn breakpoints(&self) -> TargetPath
    {
        TargetPath::root().child("Breakpoints")
    }

    fn rules(&self) -> Arc<dyn LocationRules>
    {
        Arc::new(FridaRules)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::backends::handles::ARGS_PARAMETER;
    use crate::params::ParameterType;

    #[test]
    fn test_launcher_schema()
    {
        let parameters = FridaLayout.parameters();
        let args = parameters.get(ARGS_PARAMETER).unwrap();
        assert_eq!(args.parameter_type, ParameterType::String);
        assert!(args.required);
        assert_eq!(args.display, "Command Line");
        assert_eq!(args.description, "space-separated command-line arguments");
        assert!(FridaLayout.launcher().is_root());
    }

    #[test]
    fn test_any_watch_length()
    {
        assert!(FridaRules.check(4096, BreakpointKind::Access).is_ok());
        assert!(FridaRules.check(0, BreakpointKind::Access).is_err());
        assert!(!FridaLayout.process_capabilities().contains(&CapabilityKind::Interruptible));
    }
}
