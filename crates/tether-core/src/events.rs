//! Model events and helpers.
//!
//! Backend adapters translate what their driver reports into [`ModelEvent`]s;
//! the model writer applies them in order and then republishes each one to
//! subscribers of [`ObjectModel::subscribe`](crate::model::ObjectModel::subscribe).
//! This is the single state-change notification path: collaborators react to
//! tree and state changes without polling.

use std::collections::BTreeMap;

use tokio::sync::broadcast;

use crate::breakpoints::{BreakpointId, BreakpointInfo};
use crate::capability::Capabilities;
use crate::types::{Address, ExecutionState, TargetPath};

/// Everything needed to create one object.
#[derive(Debug, Clone)]
pub struct ObjectSpec
{
    pub path: TargetPath,
    /// Kind of entity: `Session`, `Process`, `Thread`, `Breakpoint`, ...
    pub type_name: String,
    pub capabilities: Capabilities,
    /// Initial state; `Some` makes the object `ExecutionStateful`
    pub state: Option<ExecutionState>,
    pub attributes: BTreeMap<String, String>,
}

impl ObjectSpec
{
    pub fn new(path: TargetPath, type_name: impl Into<String>) -> Self
    {
        Self {
            path,
            type_name: type_name.into(),
            capabilities: Capabilities::new(),
            state: None,
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self
    {
        self.capabilities = capabilities;
        self
    }

    /// Make the object stateful, starting in `state`.
    #[must_use]
    pub fn stateful(mut self, state: ExecutionState) -> Self
    {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl ToString) -> Self
    {
        self.attributes.insert(name.into(), value.to_string());
        self
    }
}

/// Change to apply to the model.
#[derive(Debug, Clone)]
pub enum ModelEvent
{
    /// Add an object. If the path already exists only its attributes are
    /// updated, so object identity is never replaced.
    ObjectAdded(ObjectSpec),
    /// Remove an object and its whole subtree.
    ObjectRemoved
    {
        path: TargetPath
    },
    /// New execution state of a stateful object.
    StateChanged
    {
        path: TargetPath,
        state: ExecutionState,
    },
    AttributeChanged
    {
        path: TargetPath,
        name: String,
        value: String,
    },
    /// Breakpoint created or modified (including relocation).
    BreakpointUpdated(BreakpointInfo),
    BreakpointDeleted(BreakpointId),
    /// Execution stopped at an address that may carry breakpoints.
    BreakpointHit
    {
        address: Address
    },
    /// Console output from the target or the backend.
    Output
    {
        path: TargetPath,
        text: String,
    },
}

impl ModelEvent
{
    /// Path of the object the event concerns, if any.
    #[must_use]
    pub fn path(&self) -> Option<&TargetPath>
    {
        match self {
            Self::ObjectAdded(spec) => Some(&spec.path),
            Self::ObjectRemoved { path }
            | Self::StateChanged { path, .. }
            | Self::AttributeChanged { path, .. }
            | Self::Output { path, .. } => Some(path),
            Self::BreakpointUpdated(_) | Self::BreakpointDeleted(_) | Self::BreakpointHit { .. } => None,
        }
    }

    /// Human-readable description of the event.
    #[must_use]
    pub fn describe(&self) -> String
    {
        match self {
            Self::ObjectAdded(spec) => format!("{} added at '{}'", spec.type_name, spec.path),
            Self::ObjectRemoved { path } => format!("'{path}' removed"),
            Self::StateChanged { path, state } => format!("'{path}' is {state}"),
            Self::AttributeChanged { path, name, value } => format!("'{path}'.{name} = {value}"),
            Self::BreakpointUpdated(info) => format!(
                "breakpoint {} ({}) at {}{}",
                info.id,
                info.location.kind,
                info.location.address,
                if info.enabled { "" } else { " [disabled]" }
            ),
            Self::BreakpointDeleted(id) => format!("breakpoint {id} deleted"),
            Self::BreakpointHit { address } => format!("hit at {address}"),
            Self::Output { path, text } => format!("'{path}': {}", text.trim_end()),
        }
    }
}

/// Receiver of applied model events.
///
/// Lagging receivers lose the oldest events (see [`broadcast`]); the model
/// itself is always current.
pub type ModelEventReceiver = broadcast::Receiver<ModelEvent>;

/// Create the notification channel used by the model writer.
#[must_use]
pub fn notification_channel(capacity: usize) -> broadcast::Sender<ModelEvent>
{
    let (sender, _) = broadcast::channel(capacity.max(1));
    sender
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::breakpoints::{BreakpointKind, BreakpointLocation};

    #[test]
    fn test_describe()
    {
        let path = TargetPath::parse("Processes[3]").unwrap();
        let added = ModelEvent::ObjectAdded(ObjectSpec::new(path.clone(), "Process").stateful(ExecutionState::Alive));
        assert_eq!(added.describe(), "Process added at 'Processes[3]'");

        let state = ModelEvent::StateChanged {
            path: path.clone(),
            state: ExecutionState::Stopped,
        };
        assert_eq!(state.describe(), "'Processes[3]' is STOPPED");
        assert_eq!(state.path(), Some(&path));

        let mut info = BreakpointInfo::new(
            BreakpointId::from_raw(2),
            BreakpointLocation::new(Address::from(0x40), 1, BreakpointKind::Execution),
        );
        info.enabled = false;
        assert_eq!(
            ModelEvent::BreakpointUpdated(info).describe(),
            "breakpoint 2 (execute) at 0x0000000000000040 [disabled]"
        );
    }

    #[test]
    fn test_spec_builder()
    {
        let spec = ObjectSpec::new(TargetPath::root(), "Session")
            .with_attribute("display", "lldb")
            .with_attribute("pid", 7);
        assert_eq!(spec.attributes.get("pid").map(String::as_str), Some("7"));
        assert!(spec.state.is_none());
    }
}
