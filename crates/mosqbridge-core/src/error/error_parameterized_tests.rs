#![allow(non_snake_case)]

use super::*;
use test_case::test_case;

// ============================================================================
// Parameterized status code mapping tests
// ============================================================================

#[test_case(
    BridgeError::VersionUnsupported { broker: vec![4], plugin: vec![5] },
    StatusCode::NotSupported;
    "version unsupported"
)]
#[test_case(
    BridgeError::InvalidState { expected: "Active".into(), actual: "Terminated".into() },
    StatusCode::Unknown;
    "invalid state"
)]
#[test_case(BridgeError::InitFailure("x".into()), StatusCode::Unknown; "init failure")]
#[test_case(BridgeError::config("k", "r"), StatusCode::Inval; "config")]
#[test_case(BridgeError::NotHandled(EventKind::Tick), StatusCode::Success; "not handled tick")]
#[test_case(BridgeError::NotHandled(EventKind::BasicAuth), StatusCode::PluginDefer; "not handled auth")]
#[test_case(BridgeError::Handler("x".into()), StatusCode::Unknown; "handler")]
#[test_case(BridgeError::Host("x".into()), StatusCode::Unknown; "host")]
#[test_case(BridgeError::Panic("x".into()), StatusCode::Unknown; "panic")]
fn BridgeError___variant___maps_to_status(error: BridgeError, expected: StatusCode) {
    assert_eq!(error.status_code(), expected);
}

// ============================================================================
// Parameterized fatality tests
// ============================================================================

#[test_case(BridgeError::VersionUnsupported { broker: vec![], plugin: vec![5] }, true; "version")]
#[test_case(BridgeError::InitFailure("x".into()), true; "init")]
#[test_case(BridgeError::config("k", "r"), true; "config")]
#[test_case(
    BridgeError::Registration { kind: EventKind::Connect, status: StatusCode::Unknown },
    false;
    "registration"
)]
#[test_case(BridgeError::NotHandled(EventKind::Connect), false; "not handled")]
#[test_case(BridgeError::Handler("x".into()), false; "handler")]
fn BridgeError___variant___fatality(error: BridgeError, fatal: bool) {
    assert_eq!(error.is_fatal(), fatal);
}
