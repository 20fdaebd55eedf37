//! Breakpoint and watchpoint bookkeeping.
//!
//! Backends own the actual traps; this module tracks what they report so the
//! model can answer `breakpoints()` without a round trip. Identity belongs to
//! the backend: a [`BreakpointId`] is assigned once and never changes, even
//! when the backend relocates the breakpoint (a module loads at a different
//! base, a pending location resolves). Relocation rewrites the location and
//! resolved addresses of the existing entry in place.
//!
//! The store is written only by the model writer and read through
//! [`BreakpointView`], which takes a short read lock per call.

pub mod builder;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use smallvec::SmallVec;

use crate::types::Address;

pub use builder::{insert_breakpoint_addr, insert_breakpoint_at, BreakpointBuilder};

/// Backend-assigned breakpoint identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakpointId(u64);

impl BreakpointId
{
    #[must_use]
    pub const fn from_raw(value: u64) -> Self
    {
        Self(value)
    }

    /// Raw numeric value (also the index segment of the breakpoint's path).
    #[must_use]
    pub const fn raw(self) -> u64
    {
        self.0
    }
}

impl fmt::Display for BreakpointId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// What triggers the breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakpointKind
{
    /// Instruction fetch at the address.
    Execution,
    /// Data read in the watched range.
    Read,
    /// Data write in the watched range.
    Write,
    /// Read or write in the watched range.
    Access,
}

impl BreakpointKind
{
    /// Whether this kind watches data rather than code.
    #[must_use]
    pub const fn is_watchpoint(self) -> bool
    {
        !matches!(self, Self::Execution)
    }
}

impl fmt::Display for BreakpointKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let name = match self {
            Self::Execution => "execute",
            Self::Read => "read",
            Self::Write => "write",
            Self::Access => "access",
        };
        f.write_str(name)
    }
}

/// Requested location of a breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BreakpointLocation
{
    pub address: Address,
    /// Bytes covered; 1 for execution breakpoints
    pub length: u64,
    pub kind: BreakpointKind,
}

impl BreakpointLocation
{
    #[must_use]
    pub const fn new(address: Address, length: u64, kind: BreakpointKind) -> Self
    {
        Self { address, length, kind }
    }

    /// Whether an access at `address` falls in this location.
    #[must_use]
    pub fn covers(&self, address: Address) -> bool
    {
        self.address.range_contains(self.length.max(1), address)
    }
}

/// Public information about a breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointInfo
{
    /// Stable identifier
    pub id: BreakpointId,
    /// Current requested location
    pub location: BreakpointLocation,
    /// Addresses the backend actually armed; usually one
    pub resolved: SmallVec<[Address; 1]>,
    pub enabled: bool,
    pub hit_count: u64,
    /// When the breakpoint was first requested
    pub requested_at: SystemTime,
    /// When the backend last (re)resolved it
    pub resolved_at: Option<SystemTime>,
}

impl BreakpointInfo
{
    /// A freshly resolved, enabled breakpoint armed at its requested address.
    #[must_use]
    pub fn new(id: BreakpointId, location: BreakpointLocation) -> Self
    {
        let now = SystemTime::now();
        let mut resolved = SmallVec::new();
        resolved.push(location.address);
        Self {
            id,
            location,
            resolved,
            enabled: true,
            hit_count: 0,
            requested_at: now,
            resolved_at: Some(now),
        }
    }

    /// Move the breakpoint to `address`, keeping its identity.
    pub fn relocate(&mut self, address: Address)
    {
        self.location.address = address;
        self.resolved.clear();
        self.resolved.push(address);
        self.resolved_at = Some(SystemTime::now());
    }

    fn is_hit_by(&self, address: Address) -> bool
    {
        self.location.covers(address) || self.resolved.iter().any(|armed| *armed == address)
    }
}

/// Breakpoints reported by the backend, keyed by id.
#[derive(Debug, Default)]
pub struct BreakpointStore
{
    by_id: BTreeMap<BreakpointId, BreakpointInfo>,
}

impl BreakpointStore
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Insert a new breakpoint or update an existing one in place.
    ///
    /// An update keeps the id and `requested_at` of the existing entry and
    /// never lowers its hit count. Returns the stored info.
    pub fn apply(&mut self, info: BreakpointInfo) -> BreakpointInfo
    {
        match self.by_id.get_mut(&info.id) {
            Some(entry) => {
                entry.location = info.location;
                entry.resolved = info.resolved;
                entry.enabled = info.enabled;
                entry.hit_count = entry.hit_count.max(info.hit_count);
                entry.resolved_at = info.resolved_at.or(entry.resolved_at);
                entry.clone()
            }
            None => {
                self.by_id.insert(info.id, info.clone());
                info
            }
        }
    }

    /// Remove a breakpoint, returning its last info if it was present.
    pub fn remove(&mut self, id: BreakpointId) -> Option<BreakpointInfo>
    {
        self.by_id.remove(&id)
    }

    /// Record that execution stopped at `address`.
    ///
    /// Every enabled breakpoint covering the address counts a hit. Returns the
    /// updated infos.
    pub fn record_hit(&mut self, address: Address) -> Vec<BreakpointInfo>
    {
        self.by_id
            .values_mut()
            .filter(|entry| entry.enabled && entry.is_hit_by(address))
            .map(|entry| {
                entry.hit_count = entry.hit_count.saturating_add(1);
                entry.clone()
            })
            .collect()
    }

    /// All breakpoints in id order.
    #[must_use]
    pub fn list(&self) -> Vec<BreakpointInfo>
    {
        self.by_id.values().cloned().collect()
    }

    #[must_use]
    pub fn info(&self, id: BreakpointId) -> Option<BreakpointInfo>
    {
        self.by_id.get(&id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.by_id.is_empty()
    }

    /// Remove everything, returning the entries in id order.
    pub fn drain(&mut self) -> Vec<BreakpointInfo>
    {
        std::mem::take(&mut self.by_id).into_values().collect()
    }
}

/// Shared read access to a session's [`BreakpointStore`].
#[derive(Debug, Clone, Default)]
pub struct BreakpointView
{
    store: Arc<RwLock<BreakpointStore>>,
}

impl BreakpointView
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    #[must_use]
    pub fn list(&self) -> Vec<BreakpointInfo>
    {
        self.store.read().unwrap_or_else(PoisonError::into_inner).list()
    }

    #[must_use]
    pub fn info(&self, id: BreakpointId) -> Option<BreakpointInfo>
    {
        self.store.read().unwrap_or_else(PoisonError::into_inner).info(id)
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut BreakpointStore) -> R) -> R
    {
        f(&mut self.store.write().unwrap_or_else(PoisonError::into_inner))
    }
}
