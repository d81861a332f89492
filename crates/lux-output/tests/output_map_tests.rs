//! OutputMap Integration Tests
//!
//! Exercises the multiplexer invariants end to end:
//! - Flat addressing across universes
//! - Patch fallback and rejection semantics
//! - Blackout snapshot/restore losslessness

use lux_core::{Address, UNIVERSE_CHANNELS};
use lux_output::{DUMMY_PLUGIN_NAME, DummyPlugin, OutputMap};

const UNIVERSES: usize = 2;

// ═══════════════════════════════════════════════════════════════════════════════
// ADDRESSING
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_flat_addressing_scenario() {
    let map = OutputMap::new(UNIVERSES);

    map.set_value(Address(5), 200);
    assert_eq!(map.value(Address(5)), 200);

    let mut buf = [0u8; UNIVERSE_CHANNELS];
    map.value_range(Address(0), &mut buf);

    assert_eq!(buf[5], 200);
    for (channel, &value) in buf.iter().enumerate() {
        if channel != 5 {
            assert_eq!(value, 0, "channel {channel} expected untouched");
        }
    }
}

#[test]
fn test_second_universe_is_independent() {
    let map = OutputMap::new(UNIVERSES);

    map.set_value(Address::from_parts(1, 5), 123);

    assert_eq!(map.value(Address::from_parts(1, 5)), 123);
    assert_eq!(map.value(Address::from_parts(0, 5)), 0);
}

#[test]
fn test_range_write_round_trip() {
    let map = OutputMap::new(UNIVERSES);
    let values = [10, 20, 30, 40];

    map.set_value_range(Address::from_parts(1, 100), &values);

    let mut out = [0u8; 4];
    map.value_range(Address::from_parts(1, 100), &mut out);
    assert_eq!(out, values);
}

// ═══════════════════════════════════════════════════════════════════════════════
// PATCHING
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_every_universe_patched_by_default() {
    let map = OutputMap::new(4);
    for universe in 0..4 {
        assert!(map.patch(universe).is_some(), "universe {universe} unpatched");
    }
}

#[test]
fn test_failed_patch_preserves_previous_binding() {
    let map = OutputMap::new(UNIVERSES);
    map.register_plugin(Box::new(DummyPlugin::new(1)));

    let before = map.patch(0).unwrap();
    assert!(map.set_patch(0, "USB DMX", 0).is_err());
    assert!(map.set_patch(UNIVERSES + 1, DUMMY_PLUGIN_NAME, 0).is_err());
    assert_eq!(map.patch(0).unwrap(), before);
}

#[test]
fn test_repatch_changes_binding() {
    let map = OutputMap::new(1);

    assert!(map.set_patch(0, DUMMY_PLUGIN_NAME, 0).is_ok());
    let patch = map.patch(0).unwrap();
    assert_eq!(patch.line, 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLACKOUT
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_blackout_zeroes_live_output_and_restores() {
    let map = OutputMap::new(UNIVERSES);

    map.set_value(Address(5), 200);
    map.set_value(Address::from_parts(1, 7), 77);

    map.set_blackout(true);
    assert!(map.blackout());

    // live plugin outputs are dark; reads go to the shadow store
    assert_eq!(map.value(Address(5)), 200);
    assert_eq!(map.value(Address::from_parts(1, 7)), 77);

    map.set_blackout(false);
    assert!(!map.blackout());

    // pre-blackout values restored exactly
    assert_eq!(map.value(Address(5)), 200);
    assert_eq!(map.value(Address::from_parts(1, 7)), 77);
}

#[test]
fn test_writes_during_blackout_are_restored() {
    let map = OutputMap::new(1);

    map.set_value(Address(0), 11);
    map.set_blackout(true);

    map.set_value(Address(0), 99);
    map.set_value(Address(1), 50);
    assert_eq!(map.value(Address(0)), 99);
    assert_eq!(map.value(Address(1)), 50);

    map.set_blackout(false);
    assert_eq!(map.value(Address(0)), 99);
    assert_eq!(map.value(Address(1)), 50);
}

#[test]
fn test_blackout_is_idempotent() {
    let map = OutputMap::new(1);
    map.set_value(Address(3), 42);

    map.set_blackout(true);
    map.set_blackout(true);
    assert!(map.blackout());
    assert_eq!(map.value(Address(3)), 42);

    map.set_blackout(false);
    map.set_blackout(false);
    assert!(!map.blackout());
    assert_eq!(map.value(Address(3)), 42);
}

#[test]
fn test_dump_suppressed_during_blackout() {
    let map = OutputMap::new(1);

    map.set_value(Address(0), 10);
    map.set_blackout(true);

    // a tick's worth of staged output must not reach the dark plugin
    {
        let mut lease = map.claim_universes();
        lease.set(Address(0), 255);
    }
    map.dump_universes();

    map.set_blackout(false);
    // the pre-blackout value came back, not the staged one
    assert_eq!(map.value(Address(0)), 10);

    // with blackout off the next dump flows again
    map.dump_universes();
    assert_eq!(map.value(Address(0)), 255);
}
