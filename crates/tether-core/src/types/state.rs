//! Execution state and environment descriptions.

use std::fmt;

/// Observed execution state of a target object
///
/// ## State Transitions
///
/// - `Inactive` → `Alive`/`Stopped`: a process was created (launch or attach)
/// - `Stopped` → `Running`: resumed
/// - `Running` → `Stopped`: breakpoint, signal or interrupt
/// - any alive state → `Terminated`: the process exited or was killed
///
/// `Alive` is used when the backend knows the target exists but cannot say
/// whether it is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionState
{
    /// Not yet started, or nothing to execute
    Inactive,
    /// Exists, run state unknown
    Alive,
    /// Exists and is suspended
    Stopped,
    /// Exists and is executing
    Running,
    /// Has exited or been killed
    Terminated,
}

impl ExecutionState
{
    /// `Alive`, `Stopped` or `Running`.
    #[must_use]
    pub fn is_alive(self) -> bool
    {
        matches!(self, Self::Alive | Self::Stopped | Self::Running)
    }

    #[must_use]
    pub fn is_running(self) -> bool
    {
        self == Self::Running
    }

    #[must_use]
    pub fn is_stopped(self) -> bool
    {
        self == Self::Stopped
    }
}

impl fmt::Display for ExecutionState
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let name = match self {
            Self::Inactive => "INACTIVE",
            Self::Alive => "ALIVE",
            Self::Stopped => "STOPPED",
            Self::Running => "RUNNING",
            Self::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}

/// Byte order of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian
{
    Little,
    Big,
}

/// Description of the debugging environment a backend reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEnvironment
{
    /// Target architecture, e.g. `x86_64` or `aarch64`
    pub architecture: String,
    /// Backend debugger name and version
    pub debugger: String,
    /// Target operating system
    pub operating_system: String,
    pub endian: Endian,
}

impl TargetEnvironment
{
    /// Environment of the host running this process, attributed to `debugger`.
    #[must_use]
    pub fn host(debugger: impl Into<String>) -> Self
    {
        Self {
            architecture: std::env::consts::ARCH.to_string(),
            debugger: debugger.into(),
            operating_system: std::env::consts::OS.to_string(),
            endian: if cfg!(target_endian = "big") { Endian::Big } else { Endian::Little },
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_alive_states()
    {
        assert!(ExecutionState::Stopped.is_alive());
        assert!(ExecutionState::Running.is_alive());
        assert!(ExecutionState::Alive.is_alive());
        assert!(!ExecutionState::Inactive.is_alive());
        assert!(!ExecutionState::Terminated.is_alive());
    }

    #[test]
    fn test_state_display()
    {
        assert_eq!(ExecutionState::Stopped.to_string(), "STOPPED");
        assert_eq!(ExecutionState::Running.to_string(), "RUNNING");
    }
}
