//! Tests for the in-memory store
//!
//! These tests verify:
//! - Basic get/put/delete semantics
//! - Server-side expiry driven by the clock
//! - Reclamation of expired entries on the write path
//! - Atomic create-if-absent under contention
//! - Typed load/save helpers

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clinicq::clock::{Clock, ManualClock, SystemClock};
use clinicq::store::{self, MemoryStore, Store, SWEEP_INTERVAL};
use clinicq::ClinicError;

// =============================================================================
// Helper Functions
// =============================================================================

fn manual_store() -> (Arc<ManualClock>, MemoryStore) {
    let clock = Arc::new(ManualClock::new(1_000_000));
    let store = MemoryStore::new(clock.clone() as Arc<dyn Clock>);
    (clock, store)
}

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_put_and_get() {
    let (_clock, store) = manual_store();

    store.put("k", b"v", None).unwrap();
    assert_eq!(store.get("k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(store.get("missing").unwrap(), None);
}

#[test]
fn test_put_overwrites() {
    let (_clock, store) = manual_store();

    store.put("k", b"one", None).unwrap();
    store.put("k", b"two", None).unwrap();
    assert_eq!(store.get("k").unwrap(), Some(b"two".to_vec()));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_delete() {
    let (_clock, store) = manual_store();

    store.put("k", b"v", None).unwrap();
    store.delete("k").unwrap();
    assert_eq!(store.get("k").unwrap(), None);

    // Deleting an absent key is not an error
    store.delete("k").unwrap();
}

// =============================================================================
// Expiry Tests
// =============================================================================

#[test]
fn test_ttl_expires_entry() {
    let (clock, store) = manual_store();

    store.put("k", b"v", Some(Duration::from_secs(10))).unwrap();
    clock.advance_secs(9);
    assert_eq!(store.get("k").unwrap(), Some(b"v".to_vec()));

    clock.advance_secs(1);
    assert_eq!(store.get("k").unwrap(), None);
    assert!(!store.contains_live("k"));
}

#[test]
fn test_no_ttl_never_expires() {
    let (clock, store) = manual_store();

    store.put("k", b"v", None).unwrap();
    clock.advance_secs(365 * 24 * 60 * 60);
    assert_eq!(store.get("k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_purge_expired() {
    let (clock, store) = manual_store();

    store.put("short", b"1", Some(Duration::from_secs(1))).unwrap();
    store.put("long", b"2", Some(Duration::from_secs(100))).unwrap();
    store.put("forever", b"3", None).unwrap();

    clock.advance_secs(5);
    assert_eq!(store.purge_expired(), 1);
    assert_eq!(store.len(), 2);
}

#[test]
fn test_writes_reclaim_expired_entries() {
    let (clock, store) = manual_store();

    // One short-lived key per write, each expired before the next lands
    for i in 0..(SWEEP_INTERVAL * 4) {
        store
            .put(&format!("lock:visit-{}", i), b"token", Some(Duration::from_secs(60)))
            .unwrap();
        clock.advance_secs(60 * 60);
    }

    assert_eq!(store.len(), 0);
    assert!(store.stored_entries() <= SWEEP_INTERVAL as usize);
}

#[test]
fn test_sweep_keeps_live_entries() {
    let (clock, store) = manual_store();

    store.put("forever", b"1", None).unwrap();
    store.put("daily", b"2", Some(Duration::from_secs(48 * 60 * 60))).unwrap();
    for i in 0..SWEEP_INTERVAL {
        assert!(store
            .put_if_absent(&format!("lock:{}", i), b"t", Some(Duration::from_secs(1)))
            .unwrap());
        clock.advance_secs(2);
    }

    assert_eq!(store.get("forever").unwrap(), Some(b"1".to_vec()));
    assert_eq!(store.get("daily").unwrap(), Some(b"2".to_vec()));
    assert!(store.stored_entries() < SWEEP_INTERVAL as usize);
}

// =============================================================================
// Conditional Write Tests
// =============================================================================

#[test]
fn test_put_if_absent() {
    let (_clock, store) = manual_store();

    assert!(store.put_if_absent("k", b"first", None).unwrap());
    assert!(!store.put_if_absent("k", b"second", None).unwrap());
    assert_eq!(store.get("k").unwrap(), Some(b"first".to_vec()));
}

#[test]
fn test_put_if_absent_over_expired_entry() {
    let (clock, store) = manual_store();

    assert!(store.put_if_absent("k", b"old", Some(Duration::from_millis(50))).unwrap());
    clock.advance(Duration::from_millis(50));

    assert!(store.put_if_absent("k", b"new", None).unwrap());
    assert_eq!(store.get("k").unwrap(), Some(b"new".to_vec()));
}

#[test]
fn test_put_if_absent_single_winner() {
    let store = Arc::new(MemoryStore::new(Arc::new(SystemClock)));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.put_if_absent("contended", &[i as u8], None).unwrap())
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}

// =============================================================================
// Typed Helpers
// =============================================================================

#[test]
fn test_load_save_roundtrip() {
    let (_clock, store) = manual_store();

    let value = vec!["01".to_string(), "02".to_string()];
    store::save(&store, "list", &value, None).unwrap();

    let loaded: Option<Vec<String>> = store::load(&store, "list").unwrap();
    assert_eq!(loaded, Some(value));

    let missing: Option<Vec<String>> = store::load(&store, "nothing").unwrap();
    assert_eq!(missing, None);
}

#[test]
fn test_load_rejects_garbage() {
    let (_clock, store) = manual_store();

    store.put("bad", &[0xff], None).unwrap();
    let result: clinicq::Result<Option<Vec<String>>> = store::load(&store, "bad");
    assert!(matches!(result, Err(ClinicError::Serialization(_))));
}
