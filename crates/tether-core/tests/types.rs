//! Tests for backend-neutral value types

use tether_core::types::{Address, ExecutionState, PathSegment, ProcessId, TargetEnvironment, TargetPath, ThreadId};

#[test]
fn test_process_id_from_u64()
{
    let pid = ProcessId::from(12345);
    assert_eq!(pid.0, 12345);
    assert_eq!(pid.to_string(), "12345");
}

#[test]
fn test_thread_id_equality()
{
    assert_eq!(ThreadId::from(7), ThreadId(7));
    assert_ne!(ThreadId::from(7), ThreadId(8));
}

#[test]
fn test_address_display_is_zero_padded()
{
    assert_eq!(Address::from(0x1000).to_string(), "0x0000000000001000");
}

#[test]
fn test_address_parse_hex()
{
    assert_eq!(Address::parse_hex("0x401000").unwrap(), Address::from(0x40_1000));
    assert_eq!(Address::parse_hex("401000").unwrap(), Address::from(0x40_1000));
    assert!(Address::parse_hex("main").is_err());
    assert!(Address::parse_hex("").is_err());
}

#[test]
fn test_address_range_contains()
{
    let base = Address::from(0x1000);
    assert!(base.range_contains(4, Address::from(0x1003)));
    assert!(!base.range_contains(4, Address::from(0x1004)));
    assert_eq!(base + 0x10, Address::from(0x1010));
}

#[test]
fn test_path_building_matches_parsing()
{
    let built = TargetPath::root().child("Sessions").index(0).child("Processes").index(4242);
    let parsed: TargetPath = "Sessions[0].Processes[4242]".parse().unwrap();
    assert_eq!(built, parsed);
    assert_eq!(built.last(), Some(&PathSegment::Index("4242".to_string())));
}

#[test]
fn test_path_ancestry()
{
    let process = TargetPath::parse("Sessions[0].Processes[4242]").unwrap();
    let thread = process.child("Threads").index(1);
    assert!(process.is_ancestor_of(&thread));
    assert!(process.is_ancestor_of(&process));
    assert!(!thread.is_ancestor_of(&process));
    assert!(TargetPath::root().is_ancestor_of(&thread));

    let ancestors: Vec<TargetPath> = thread.ancestors().collect();
    assert_eq!(ancestors.first(), Some(&thread));
    assert_eq!(ancestors.last(), Some(&TargetPath::root()));
    assert_eq!(thread.parent().and_then(|parent| parent.parent()), Some(process));
}

#[test]
fn test_path_rejects_malformed_text()
{
    for text in ["Sessions[0", "Sessions.", ".Sessions", "Sessions[]", "Sessions[0]Processes"] {
        assert!(TargetPath::parse(text).is_err(), "{text} should not parse");
    }
}

#[test]
fn test_execution_state_predicates()
{
    assert!(ExecutionState::Stopped.is_alive());
    assert!(ExecutionState::Running.is_alive());
    assert!(!ExecutionState::Terminated.is_alive());
    assert!(!ExecutionState::Inactive.is_alive());
    assert!(ExecutionState::Stopped.is_stopped());
    assert!(ExecutionState::Running.is_running());
    assert_eq!(ExecutionState::Running.to_string(), "RUNNING");
}

#[test]
fn test_host_environment()
{
    let environment = TargetEnvironment::host("lldb");
    assert_eq!(environment.debugger, "lldb");
    assert_eq!(environment.architecture, std::env::consts::ARCH);
    assert!(!environment.operating_system.is_empty());
}
