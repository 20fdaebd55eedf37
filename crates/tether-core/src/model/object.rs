//! Target objects.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::async_state::{AsyncState, StateCell};
use crate::capability::{Capabilities, Capability, CapabilityKind};
use crate::events::ObjectSpec;
use crate::types::{ExecutionState, TargetPath};

/// One node of the target model: a session, process, thread, breakpoint...
///
/// Objects are created by the model writer and handed out as
/// `Arc<TargetObject>`. The path, type and capability set are fixed for the
/// object's lifetime; attributes and execution state change as the backend
/// reports.
pub struct TargetObject
{
    path: TargetPath,
    type_name: String,
    capabilities: Capabilities,
    state: Option<StateCell>,
    attributes: RwLock<BTreeMap<String, String>>,
}

impl TargetObject
{
    pub(crate) fn from_spec(spec: ObjectSpec) -> Self
    {
        let ObjectSpec {
            path,
            type_name,
            mut capabilities,
            state,
            attributes,
        } = spec;

        let state = state.map(|initial| StateCell::new(path.clone(), Some(initial)));
        if let Some(cell) = &state {
            capabilities = capabilities.with_execution_stateful(Arc::new(cell.clone()));
        }

        Self {
            path,
            type_name,
            capabilities,
            state,
            attributes: RwLock::new(attributes),
        }
    }

    #[must_use]
    pub fn path(&self) -> &TargetPath
    {
        &self.path
    }

    #[must_use]
    pub fn type_name(&self) -> &str
    {
        &self.type_name
    }

    #[must_use]
    pub fn capabilities(&self) -> &Capabilities
    {
        &self.capabilities
    }

    #[must_use]
    pub fn supports(&self, kind: CapabilityKind) -> bool
    {
        self.capabilities.supports(kind)
    }

    /// Typed capability lookup: `object.capability::<dyn Resumable>()`.
    #[must_use]
    pub fn capability<C: Capability + ?Sized>(&self) -> Option<Arc<C>>
    {
        self.capabilities.get::<C>()
    }

    /// Last observed execution state, if the object is stateful.
    #[must_use]
    pub fn execution_state(&self) -> Option<ExecutionState>
    {
        self.capability::<dyn crate::capability::ExecutionStateful>()
            .and_then(|stateful| stateful.execution_state())
    }

    /// Wait handle over the execution state, if the object is stateful.
    #[must_use]
    pub fn async_state(&self) -> Option<AsyncState>
    {
        self.capability::<dyn crate::capability::ExecutionStateful>()
            .map(|stateful| stateful.async_state())
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String>
    {
        self.attributes.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    /// Snapshot of all attributes.
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<String, String>
    {
        self.attributes.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The `display` attribute, or the last path segment.
    #[must_use]
    pub fn display(&self) -> String
    {
        self.attribute("display")
            .or_else(|| self.path.last().map(ToString::to_string))
            .unwrap_or_default()
    }

    pub(crate) fn set_attribute(&self, name: String, value: String)
    {
        self.attributes.write().unwrap_or_else(PoisonError::into_inner).insert(name, value);
    }

    pub(crate) fn merge_attributes(&self, attributes: BTreeMap<String, String>)
    {
        self.attributes.write().unwrap_or_else(PoisonError::into_inner).extend(attributes);
    }

    pub(crate) fn state_cell(&self) -> Option<&StateCell>
    {
        self.state.as_ref()
    }
}

impl fmt::Debug for TargetObject
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("TargetObject")
            .field("path", &self.path.to_string())
            .field("type_name", &self.type_name)
            .field("capabilities", &self.capabilities)
            .field("state", &self.state.as_ref().and_then(StateCell::get))
            .finish_non_exhaustive()
    }
}
