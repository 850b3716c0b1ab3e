//! Runtime Lifecycle Tests - Initialization, Teardown, Entry Table
//!
//! These tests verify the handle the entries go through:
//! - Initialization happens once per initializer; free functions build
//!   independent runtimes
//! - Teardown rejects further lifecycle use and aborts marking
//! - The C-ABI entry table drives the same barriers as the Rust methods
//! - Configuration comes from `FGC_*` values when asked

mod common;

use common::{assert_same_multiset, BarrierFixture, TEST_HEAP_SIZE, TEST_REGION_SIZE};
use fgc_barrier::logging::{self, BarrierEvent};
use fgc_barrier::{BarrierConfig, BarrierError, RuntimeInitializer, RuntimeState};
use std::collections::HashMap;

fn config() -> BarrierConfig {
    BarrierConfig {
        heap_size: TEST_HEAP_SIZE,
        region_size: TEST_REGION_SIZE,
        ..Default::default()
    }
}

/// ============================================================================
/// LIFECYCLE
/// ============================================================================

/// **Invariant verified:** A second initialize fails instead of creating a
/// second runtime
#[test]
fn test_initializer_runs_once() {
    let initializer = RuntimeInitializer::new(config());
    let runtime = initializer.initialize().expect("first initialize succeeds");
    assert_eq!(runtime.state(), RuntimeState::Running);

    let err = initializer.initialize().unwrap_err();
    assert!(matches!(err, BarrierError::InvalidState { .. }));
    assert!(err.is_bug());
}

/// Invalid configuration
///
/// **Invariant verified:** Rejected before any heap is reserved
#[test]
fn test_invalid_config_rejected() {
    let err = fgc_barrier::init_with_config(BarrierConfig {
        region_size: 3000,
        ..config()
    })
    .unwrap_err();
    assert!(matches!(err, BarrierError::Configuration(_)));
}

/// Teardown during marking
///
/// **Invariant verified:** Marking is aborted, new threads are refused,
/// attached threads can still detach
#[test]
fn test_teardown_aborts_marking_and_refuses_threads() {
    let fixture = BarrierFixture::with_buffer_size(2);
    let mut thread = fixture.attach();
    let leaves = fixture.leaves(3);
    let bs = fixture.runtime.barrier_set();
    bs.start_marking();
    for obj in &leaves {
        fixture.runtime.write_ref_field_pre(*obj, &mut thread);
    }

    fixture.runtime.teardown().expect("teardown of a running runtime");

    assert_eq!(fixture.runtime.state(), RuntimeState::Stopped);
    assert!(!fixture.runtime.is_live());
    assert!(!bs.satb_queue_set().is_active());
    assert!(bs.satb_queue_set().pending().is_empty());
    assert!(matches!(
        fixture.runtime.attach_thread(),
        Err(BarrierError::InvalidState { .. })
    ));
    assert!(fixture.runtime.teardown().is_err());
    assert_eq!(fixture.runtime.detach_thread(thread).unwrap(), 0);
}

/// Lifecycle events reach the global logger
#[test]
fn test_lifecycle_events_logged() {
    let fixture = BarrierFixture::with_defaults();
    let cycle = fixture.runtime.barrier_set().start_marking();

    let events = logging::get_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, BarrierEvent::RuntimeInitialized { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, BarrierEvent::MarkingStarted { cycle: c } if *c == cycle)));
}

/// ============================================================================
/// ENTRY TABLE
/// ============================================================================

/// Generated-code view of the barriers
///
/// **Invariant verified:** Table entries have the same effect as the
/// corresponding runtime methods
#[test]
fn test_entry_table_end_to_end() {
    let fixture = BarrierFixture::with_defaults();
    let table = fixture.runtime.entry_table();
    let mut thread = fixture.attach();
    let heap = fixture.heap();

    let [a, b, c] = [fixture.object(0), fixture.object(0), fixture.object(0)];
    let array = fixture.object_with_refs(&[Some(a), Some(b)]);
    let clone = fixture.object_with_refs(&[Some(c), Some(a)]);
    fixture.runtime.barrier_set().start_marking();

    unsafe {
        let dst = heap.ref_slot(array, 0);
        (table.write_ref_array_pre_narrow_oop)(table.runtime, &mut thread, dst as *const u32, 2);
        (table.write_ref_field_pre)(table.runtime, c.to_raw(), &mut thread);
        (table.clone_barrier)(table.runtime, &mut thread, clone.to_raw());
        (table.write_ref_array_post)(table.runtime, &mut thread, dst, 2);
    }

    assert_same_multiset(thread.satb_entries(), &[a, b, c, c, a, a, b]);

    let moved = fixture.forward(b);
    unsafe {
        assert_eq!((table.write_barrier_jrt)(table.runtime, b.to_raw()), moved.to_raw());
        assert_eq!((table.write_barrier_irt)(table.runtime, b.to_raw()), moved.to_raw());
    }
}

/// Field pre-barrier entry handed a null original
///
/// **Bug this finds:** A compiler that emits the pre-barrier without its
/// null check, silently logging nothing instead of failing loudly
#[test]
#[should_panic(expected = "barrier precondition violated")]
fn test_field_pre_entry_rejects_null() {
    let fixture = BarrierFixture::with_defaults();
    let table = fixture.runtime.entry_table();
    let mut thread = fixture.attach();
    fixture.runtime.barrier_set().start_marking();

    unsafe { (table.write_ref_field_pre)(table.runtime, 0, &mut thread) };
}

/// Clone barrier entry handed a null object
///
/// **Bug this finds:** Clone barrier emitted before the clone is allocated
#[test]
#[should_panic(expected = "barrier precondition violated")]
fn test_clone_entry_rejects_null() {
    let fixture = BarrierFixture::with_defaults();
    let table = fixture.runtime.entry_table();
    let mut thread = fixture.attach();

    unsafe { (table.clone_barrier)(table.runtime, &mut thread, 0) };
}

/// ============================================================================
/// CONFIGURATION
/// ============================================================================

/// **Invariant verified:** FGC_* values override defaults; others keep them
#[test]
fn test_config_from_lookup() {
    let vars: HashMap<&str, &str> = [
        ("FGC_SATB_BUFFER_SIZE", "128"),
        ("FGC_COMPRESSED_REFS", "0"),
    ]
    .into_iter()
    .collect();

    let config = BarrierConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

    assert_eq!(config.satb_buffer_size, 128);
    assert!(!config.compressed_refs);
    assert_eq!(config.heap_size, BarrierConfig::default().heap_size);
    assert!(config.validate().is_ok());
}

/// Environment-driven initialization
///
/// **Invariant verified:** `init_from_env` builds a runtime from exactly the
/// configuration `from_env` reads, without the test touching the environment
#[test]
fn test_init_from_env_uses_env_config() {
    let expected = BarrierConfig::from_env();
    if expected.validate().is_err() {
        // The surrounding environment carries an invalid FGC_* override.
        assert!(fgc_barrier::init_from_env().is_err());
        return;
    }

    let runtime = fgc_barrier::init_from_env().expect("init from a valid environment");
    assert_eq!(runtime.state(), RuntimeState::Running);
    assert_eq!(runtime.config(), &expected);
}
