#![allow(non_snake_case)]

use super::*;
use test_case::test_case;

#[test_case(&[3, 4, 5], &[4, 5, 6], 5; "overlapping ranges")]
#[test_case(&[5], &[5], 5; "single common")]
#[test_case(&[5, 4, 3], &[3, 4], 4; "unordered broker list")]
#[test_case(&[2, 2, 5, 5], &[5, 2], 5; "duplicates")]
#[test_case(&[-3, 1], &[-3], -3; "negative values")]
fn negotiate___common_versions___returns_maximum(broker: &[i32], plugin: &[i32], expected: i32) {
    assert_eq!(negotiate(broker, plugin).unwrap(), expected);
}

#[test_case(&[1, 2], &[3]; "disjoint")]
#[test_case(&[], &[5]; "broker empty")]
#[test_case(&[5], &[]; "plugin empty")]
fn negotiate___no_common_version___returns_unsupported(broker: &[i32], plugin: &[i32]) {
    let result = negotiate(broker, plugin);

    assert!(matches!(
        result,
        Err(BridgeError::VersionUnsupported { .. })
    ));
}

#[test]
fn version_reply___incompatible___returns_abort_sentinel() {
    assert_eq!(version_reply(&[2, 3, 4], PLUGIN_API_VERSIONS), VERSION_ABORT);
}

#[test]
fn version_reply___broker_offers_v5___selects_v5() {
    assert_eq!(version_reply(&[2, 3, 4, 5], PLUGIN_API_VERSIONS), 5);
}

#[test]
fn VERSION_ABORT___is_negative() {
    assert!(VERSION_ABORT < 0);
}
