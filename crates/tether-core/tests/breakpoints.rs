//! Tests for breakpoint bookkeeping

use tether_core::breakpoints::{BreakpointId, BreakpointInfo, BreakpointKind, BreakpointLocation, BreakpointStore};
use tether_core::types::Address;

fn info(id: u64, address: u64, kind: BreakpointKind, length: u64) -> BreakpointInfo
{
    BreakpointInfo::new(
        BreakpointId::from_raw(id),
        BreakpointLocation::new(Address::from(address), length, kind),
    )
}

#[test]
fn test_relocation_keeps_identity_and_hits()
{
    let mut store = BreakpointStore::new();
    let original = store.apply(info(1, 0x1000, BreakpointKind::Execution, 1));
    store.record_hit(Address::from(0x1000));

    let mut moved = original.clone();
    moved.relocate(Address::from(0x2000));
    moved.hit_count = 0;
    let stored = store.apply(moved);

    assert_eq!(stored.id, original.id);
    assert_eq!(stored.requested_at, original.requested_at);
    assert_eq!(stored.hit_count, 1);
    assert_eq!(stored.location.address, Address::from(0x2000));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_watchpoint_hits_cover_their_range()
{
    let mut store = BreakpointStore::new();
    store.apply(info(1, 0x1000, BreakpointKind::Write, 8));
    assert_eq!(store.record_hit(Address::from(0x1007)).len(), 1);
    assert!(store.record_hit(Address::from(0x1008)).is_empty());
}

#[test]
fn test_disabled_breakpoints_do_not_count()
{
    let mut store = BreakpointStore::new();
    let mut disabled = info(1, 0x1000, BreakpointKind::Execution, 1);
    disabled.enabled = false;
    store.apply(disabled);
    assert!(store.record_hit(Address::from(0x1000)).is_empty());
}

#[test]
fn test_list_is_in_id_order()
{
    let mut store = BreakpointStore::new();
    store.apply(info(3, 0x3000, BreakpointKind::Execution, 1));
    store.apply(info(1, 0x1000, BreakpointKind::Execution, 1));
    let ids: Vec<u64> = store.list().iter().map(|entry| entry.id.raw()).collect();
    assert_eq!(ids, [1, 3]);

    assert!(store.remove(BreakpointId::from_raw(1)).is_some());
    assert_eq!(store.drain().len(), 1);
    assert!(store.is_empty());
}
