//! # Breakpoint Builder
//!
//! Convenience forms for inserting breakpoints.
//!
//! Everything here funnels into the one canonical call,
//! [`BreakpointContainer::insert_breakpoint`]`(address, length, kind)`. The
//! builder adds what the canonical call cannot do synchronously: it parses
//! textual locations in the container's notation and checks the length/kind
//! combination, so both kinds of mistakes surface as `InvalidArgument` before
//! any backend call is made.
//!
//! ## Defaults
//!
//! - Length is 1 unless set.
//! - Kind is [`BreakpointKind::Execution`] only when the caller gives none.
//!   A kind the caller supplies is always forwarded unchanged.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tether_core::breakpoints::builder::BreakpointBuilder;
//! use tether_core::breakpoints::BreakpointKind;
//! # use tether_core::capability::BreakpointContainer;
//!
//! # async fn demo(container: &dyn BreakpointContainer) -> tether_core::error::ModelResult<()> {
//! let info = BreakpointBuilder::at("0x401000")
//!     .with_length(4)
//!     .with_kind(BreakpointKind::Write)
//!     .insert(container)?
//!     .await?;
//! println!("watchpoint {} armed", info.id);
//! # Ok(())
//! # }
//! ```

use std::fmt;

use tracing::debug;

use crate::breakpoints::{BreakpointInfo, BreakpointKind, BreakpointLocation};
use crate::capability::BreakpointContainer;
use crate::error::ModelResult;
use crate::operation::Operation;
use crate::types::Address;

#[derive(Clone, PartialEq, Eq)]
enum Target
{
    Text(String),
    Address(Address),
}

/// Breakpoint request that has not been sent yet.
#[derive(Clone, PartialEq, Eq)]
pub struct BreakpointBuilder
{
    target: Target,
    length: u64,
    kind: Option<BreakpointKind>,
}

impl fmt::Debug for BreakpointBuilder
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let target = match &self.target {
            Target::Text(text) => text.clone(),
            Target::Address(address) => address.to_string(),
        };
        f.debug_struct("BreakpointBuilder")
            .field("target", &target)
            .field("length", &self.length)
            .field("kind", &self.kind)
            .finish()
    }
}

impl BreakpointBuilder
{
    /// Breakpoint at a textual location, parsed by the container.
    pub fn at(location: impl Into<String>) -> Self
    {
        Self {
            target: Target::Text(location.into()),
            length: 1,
            kind: None,
        }
    }

    /// Breakpoint at a numeric address.
    pub fn address(address: Address) -> Self
    {
        Self {
            target: Target::Address(address),
            length: 1,
            kind: None,
        }
    }

    /// Number of bytes to cover. Anything above 1 makes a watchpoint.
    #[must_use]
    pub fn with_length(mut self, length: u64) -> Self
    {
        self.length = length;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: BreakpointKind) -> Self
    {
        self.kind = Some(kind);
        self
    }

    /// Set the kind only if one was given.
    #[must_use]
    pub fn with_optional_kind(mut self, kind: Option<BreakpointKind>) -> Self
    {
        if kind.is_some() {
            self.kind = kind;
        }
        self
    }

    /// Kind that will be sent: the caller's, or `Execution`.
    #[must_use]
    pub fn kind(&self) -> BreakpointKind
    {
        self.kind.unwrap_or(BreakpointKind::Execution)
    }

    #[must_use]
    pub fn length(&self) -> u64
    {
        self.length
    }

    /// Resolve the request against `container` without sending it.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if the location is not in the container's notation
    /// or the container cannot honour the length for the kind.
    pub fn resolve(&self, container: &dyn BreakpointContainer) -> ModelResult<BreakpointLocation>
    {
        let address = match &self.target {
            Target::Text(text) => container.parse_location(text)?,
            Target::Address(address) => *address,
        };
        let kind = self.kind();
        container.check_location(self.length, kind)?;
        Ok(BreakpointLocation::new(address, self.length, kind))
    }

    /// Validate and send the request through the canonical insertion call.
    ///
    /// ## Errors
    ///
    /// See [`resolve`](Self::resolve). Backend failures arrive through the
    /// returned operation.
    pub fn insert(self, container: &dyn BreakpointContainer) -> ModelResult<Operation<BreakpointInfo>>
    {
        let location = self.resolve(container)?;
        debug!(address = %location.address, length = location.length, kind = %location.kind, "inserting breakpoint");
        Ok(container.insert_breakpoint(location.address, location.length, location.kind))
    }
}

/// Insert at a textual location. `kind` defaults to `Execution` when `None`.
///
/// ## Errors
///
/// `InvalidArgument` for an unparseable location or illegal length.
pub fn insert_breakpoint_at(
    container: &dyn BreakpointContainer,
    location: &str,
    kind: Option<BreakpointKind>,
) -> ModelResult<Operation<BreakpointInfo>>
{
    BreakpointBuilder::at(location).with_optional_kind(kind).insert(container)
}

/// Insert a one-byte execution breakpoint at `address`.
///
/// ## Errors
///
/// `InvalidArgument` if the container rejects execution breakpoints.
pub fn insert_breakpoint_addr(container: &dyn BreakpointContainer, address: Address) -> ModelResult<Operation<BreakpointInfo>>
{
    BreakpointBuilder::address(address).insert(container)
}

#[cfg(test)]
mod tests
{
    use std::sync::Mutex;

    use super::*;
    use crate::breakpoints::BreakpointId;
    use crate::error::ModelError;

    /// Records canonical calls; accepts hex locations and lengths up to 8.
    #[derive(Default)]
    struct Recorder
    {
        calls: Mutex<Vec<(Address, u64, BreakpointKind)>>,
    }

    impl BreakpointContainer for Recorder
    {
        fn insert_breakpoint(&self, address: Address, length: u64, kind: BreakpointKind) -> Operation<BreakpointInfo>
        {
            self.calls.lock().unwrap().push((address, length, kind));
            Operation::ready(BreakpointInfo::new(
                BreakpointId::from_raw(1),
                BreakpointLocation::new(address, length, kind),
            ))
        }

        fn check_location(&self, length: u64, kind: BreakpointKind) -> ModelResult<()>
        {
            if (1..=8).contains(&length) && (kind.is_watchpoint() || length == 1) {
                Ok(())
            } else {
                Err(ModelError::InvalidArgument(format!("length {length} for {kind}")))
            }
        }

        fn parse_location(&self, text: &str) -> ModelResult<Address>
        {
            Address::parse_hex(text)
        }

        fn remove_breakpoint(&self, _id: BreakpointId) -> Operation<()>
        {
            Operation::ready(())
        }

        fn set_breakpoint_enabled(&self, _id: BreakpointId, _enabled: bool) -> Operation<()>
        {
            Operation::ready(())
        }

        fn breakpoints(&self) -> Vec<BreakpointInfo>
        {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn test_caller_kind_is_forwarded()
    {
        let recorder = Recorder::default();
        insert_breakpoint_at(&recorder, "0x401000", Some(BreakpointKind::Read))
            .unwrap()
            .await
            .unwrap();
        insert_breakpoint_at(&recorder, "401000", None).unwrap().await.unwrap();
        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec![
                (Address::from(0x40_1000), 1, BreakpointKind::Read),
                (Address::from(0x40_1000), 1, BreakpointKind::Execution),
            ]
        );
    }

    #[tokio::test]
    async fn test_numeric_form_uses_defaults()
    {
        let recorder = Recorder::default();
        let info = insert_breakpoint_addr(&recorder, Address::from(0x10)).unwrap().await.unwrap();
        assert_eq!(info.location, BreakpointLocation::new(Address::from(0x10), 1, BreakpointKind::Execution));
    }

    #[test]
    fn test_rejections_happen_before_dispatch()
    {
        let recorder = Recorder::default();
        let bad_text = BreakpointBuilder::at("main+4").insert(&recorder).unwrap_err();
        assert!(matches!(bad_text, ModelError::InvalidArgument(_)));

        let too_long = BreakpointBuilder::at("0x10")
            .with_length(16)
            .with_kind(BreakpointKind::Write)
            .insert(&recorder)
            .unwrap_err();
        assert!(matches!(too_long, ModelError::InvalidArgument(_)));
        assert!(recorder.calls.lock().unwrap().is_empty());
    }
}
