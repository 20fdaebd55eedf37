//! Common module for library exports

pub use crate::async_state::AsyncState;
pub use crate::backends::{BackendDriver, BackendKind};
pub use crate::breakpoints::{BreakpointBuilder, BreakpointId, BreakpointInfo, BreakpointKind};
pub use crate::capability::{Capability, CapabilityKind};
pub use crate::config::ModelConfig;
pub use crate::error::{ModelError, ModelResult};
pub use crate::events::ModelEvent;
pub use crate::model::{ObjectModel, TargetObject};
pub use crate::operation::Operation;
pub use crate::params::{Arguments, ParameterValue};
pub use crate::protocol::CommandProtocol;
pub use crate::session::DebuggerSession;
pub use crate::types::{Address, ExecutionState, ProcessId, TargetPath, ThreadId};
