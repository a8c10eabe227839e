//! Tests for the PIN allocator
//!
//! These tests verify:
//! - FIFO issuance from the primary range, then the reserve range
//! - Exhaustion after the last reserve code
//! - Uniqueness and conservation under concurrent issuance
//! - Idempotent replays, including after a failed store write
//! - Validation and reset

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clinicq::clock::{Clock, ManualClock, SystemClock};
use clinicq::config::{LockConfig, PinConfig};
use clinicq::lock::DistributedLock;
use clinicq::pin::{DailyPinPool, PinAllocator};
use clinicq::store::{MemoryStore, Store};
use clinicq::{ClinicError, DateKey};

// =============================================================================
// Helper Functions
// =============================================================================

const DAY_TTL: Duration = Duration::from_secs(48 * 60 * 60);

fn allocator_with(clock: Arc<dyn Clock>, lock_config: LockConfig) -> (Arc<dyn Store>, PinAllocator) {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new(Arc::clone(&clock)));
    let lock = DistributedLock::new(Arc::clone(&store), clock, lock_config);
    let allocator = PinAllocator::new(Arc::clone(&store), lock, PinConfig::default(), DAY_TTL);
    (store, allocator)
}

fn allocator() -> PinAllocator {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(1_700_000_000_000));
    allocator_with(clock, LockConfig::default()).1
}

fn day() -> DateKey {
    DateKey::parse("2024-03-01").unwrap()
}

/// Store whose writes under `prefix` fail while `failing` is set
struct FailingStore {
    inner: MemoryStore,
    prefix: &'static str,
    failing: AtomicBool,
}

impl FailingStore {
    fn new(clock: Arc<dyn Clock>, prefix: &'static str) -> Self {
        Self {
            inner: MemoryStore::new(clock),
            prefix,
            failing: AtomicBool::new(true),
        }
    }

    fn check(&self, key: &str) -> clinicq::Result<()> {
        if self.failing.load(Ordering::SeqCst) && key.starts_with(self.prefix) {
            return Err(ClinicError::Storage(format!("write to {} refused", key)));
        }
        Ok(())
    }
}

impl Store for FailingStore {
    fn get(&self, key: &str) -> clinicq::Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> clinicq::Result<()> {
        self.check(key)?;
        self.inner.put(key, value, ttl)
    }

    fn put_if_absent(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> clinicq::Result<bool> {
        self.check(key)?;
        self.inner.put_if_absent(key, value, ttl)
    }

    fn delete(&self, key: &str) -> clinicq::Result<()> {
        self.inner.delete(key)
    }
}

fn failing_allocator(prefix: &'static str) -> (Arc<FailingStore>, PinAllocator) {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(1_700_000_000_000));
    let store = Arc::new(FailingStore::new(Arc::clone(&clock), prefix));
    let dyn_store: Arc<dyn Store> = store.clone();
    let lock = DistributedLock::new(Arc::clone(&dyn_store), clock, LockConfig::default());
    let allocator = PinAllocator::new(dyn_store, lock, PinConfig::default(), DAY_TTL);
    (store, allocator)
}

// =============================================================================
// Pool Shape
// =============================================================================

#[test]
fn test_fresh_pool_layout() {
    let pool = DailyPinPool::new(&PinConfig::default());

    assert_eq!(pool.available.len(), 20);
    assert_eq!(pool.reserve.len(), 10);
    assert_eq!(pool.available.front().map(String::as_str), Some("01"));
    assert_eq!(pool.reserve.front().map(String::as_str), Some("21"));
    assert_eq!(pool.reserve.back().map(String::as_str), Some("30"));
    assert!(pool.is_conserved());
    assert!(!pool.reserve_mode);
}

// =============================================================================
// Issuance Order and Exhaustion
// =============================================================================

#[test]
fn test_issue_order_and_exhaustion() {
    let pins = allocator();
    let date = day();

    for n in 1..=20 {
        let issued = pins.issue("lab", &date, None).unwrap();
        assert_eq!(issued.pin, format!("{:02}", n));
        assert!(!issued.reserve_mode);
    }

    for n in 21..=30 {
        let issued = pins.issue("lab", &date, None).unwrap();
        assert_eq!(issued.pin, format!("{:02}", n));
        assert!(issued.reserve_mode);
    }

    let err = pins.issue("lab", &date, None).unwrap_err();
    assert!(matches!(err, ClinicError::ResourceExhausted(_)));

    let pool = pins.pool("lab", &date).unwrap().unwrap();
    assert!(pool.is_exhausted());
    assert_eq!(pool.issued, 30);
    assert!(pool.is_conserved());
}

#[test]
fn test_pools_are_per_clinic_and_day() {
    let pins = allocator();
    let other_day = DateKey::parse("2024-03-02").unwrap();

    assert_eq!(pins.issue("lab", &day(), None).unwrap().pin, "01");
    assert_eq!(pins.issue("lab", &day(), None).unwrap().pin, "02");
    assert_eq!(pins.issue("xray", &day(), None).unwrap().pin, "01");
    assert_eq!(pins.issue("lab", &other_day, None).unwrap().pin, "01");
}

#[test]
fn test_pool_expires_with_daily_ttl() {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let (_store, pins) = allocator_with(clock.clone() as Arc<dyn Clock>, LockConfig::default());

    pins.issue("lab", &day(), None).unwrap();
    clock.advance(DAY_TTL);
    assert!(pins.pool("lab", &day()).unwrap().is_none());
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_issue_is_unique() {
    let lock_config = LockConfig {
        timeout_ms: 10_000,
        retry_interval_ms: 1,
        jitter_ms: 2,
        ..LockConfig::default()
    };
    let (_store, pins) = allocator_with(Arc::new(SystemClock), lock_config);
    let pins = Arc::new(pins);

    let handles: Vec<_> = (0..30)
        .map(|_| {
            let pins = Arc::clone(&pins);
            thread::spawn(move || pins.issue("lab", &day(), None).unwrap().pin)
        })
        .collect();

    let issued: HashSet<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let expected: HashSet<String> = (1..=30).map(|n| format!("{:02}", n)).collect();
    assert_eq!(issued, expected);

    let pool = pins.pool("lab", &day()).unwrap().unwrap();
    assert!(pool.is_conserved());
    assert_eq!(pool.taken.len(), 30);
}

// =============================================================================
// Idempotency
// =============================================================================

#[test]
fn test_idempotent_replay() {
    let pins = allocator();

    let first = pins.issue("lab", &day(), Some("req-1")).unwrap();
    let replay = pins.issue("lab", &day(), Some("req-1")).unwrap();

    assert_eq!(
        bincode::serialize(&first).unwrap(),
        bincode::serialize(&replay).unwrap()
    );
    assert_eq!(pins.pool("lab", &day()).unwrap().unwrap().issued, 1);

    let other = pins.issue("lab", &day(), Some("req-2")).unwrap();
    assert_eq!(other.pin, "02");
}

#[test]
fn test_idempotency_key_is_scoped_to_clinic() {
    let pins = allocator();

    pins.issue("lab", &day(), Some("req-1")).unwrap();
    pins.issue("lab", &day(), None).unwrap();
    let xray = pins.issue("xray", &day(), Some("req-1")).unwrap();

    assert_eq!(xray.pin, "01");
    assert_eq!(pins.pool("xray", &day()).unwrap().unwrap().issued, 1);
}

#[test]
fn test_replay_after_exhaustion_still_succeeds() {
    let pins = allocator();

    let first = pins.issue("lab", &day(), Some("early")).unwrap();
    for _ in 0..29 {
        pins.issue("lab", &day(), None).unwrap();
    }

    assert_eq!(pins.issue("lab", &day(), Some("early")).unwrap(), first);
    assert!(matches!(
        pins.issue("lab", &day(), Some("late")),
        Err(ClinicError::ResourceExhausted(_))
    ));
}

#[test]
fn test_failed_idempotency_write_keeps_pin_in_pool() {
    let (store, pins) = failing_allocator("idem:");

    assert!(matches!(
        pins.issue("lab", &day(), Some("req-1")),
        Err(ClinicError::Storage(_))
    ));
    assert!(pins.pool("lab", &day()).unwrap().is_none());

    store.failing.store(false, Ordering::SeqCst);
    let retried = pins.issue("lab", &day(), Some("req-1")).unwrap();
    assert_eq!(retried.pin, "01");
    assert_eq!(pins.pool("lab", &day()).unwrap().unwrap().issued, 1);
}

#[test]
fn test_failed_pool_write_drops_idempotency_entry() {
    let (store, pins) = failing_allocator("pins:");

    assert!(matches!(
        pins.issue("lab", &day(), Some("req-1")),
        Err(ClinicError::Storage(_))
    ));

    // The retry must not replay a pin the pool never gave out
    store.failing.store(false, Ordering::SeqCst);
    let retried = pins.issue("lab", &day(), Some("req-1")).unwrap();
    assert_eq!(retried.pin, "01");
    assert!(pins.validate("lab", &day(), "01").unwrap());
    assert_eq!(pins.issue("lab", &day(), None).unwrap().pin, "02");
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_validate() {
    let pins = allocator();

    let issued = pins.issue("lab", &day(), None).unwrap();
    assert!(pins.validate("lab", &day(), &issued.pin).unwrap());
    assert!(!pins.validate("lab", &day(), "02").unwrap());
    assert!(!pins.validate("xray", &day(), &issued.pin).unwrap());
    assert!(!pins.validate("lab", &DateKey::parse("2024-03-02").unwrap(), &issued.pin).unwrap());
}

#[test]
fn test_invalid_inputs_rejected() {
    let pins = allocator();

    assert!(matches!(pins.issue("", &day(), None), Err(ClinicError::Validation(_))));
    assert!(matches!(pins.issue("la b", &day(), None), Err(ClinicError::Validation(_))));
    assert!(matches!(pins.issue("lab:x", &day(), None), Err(ClinicError::Validation(_))));
    assert!(matches!(pins.issue("lab", &day(), Some("")), Err(ClinicError::Validation(_))));
    assert!(matches!(pins.validate("lab", &day(), ""), Err(ClinicError::Validation(_))));
}

// =============================================================================
// Reset
// =============================================================================

#[test]
fn test_reset_restores_full_pool() {
    let pins = allocator();

    for _ in 0..30 {
        pins.issue("lab", &day(), None).unwrap();
    }
    pins.reset("lab", &day()).unwrap();

    let pool = pins.pool("lab", &day()).unwrap().unwrap();
    assert_eq!(pool.remaining(), 30);
    assert_eq!(pool.issued, 0);
    assert!(!pool.reserve_mode);

    assert_eq!(pins.issue("lab", &day(), None).unwrap().pin, "01");
}

#[test]
fn test_corrupted_pool_is_reported() {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(1_700_000_000_000));
    let (store, pins) = allocator_with(clock, LockConfig::default());

    let mut pool = DailyPinPool::new(&PinConfig::default());
    pool.available.pop_front();
    clinicq::store::save(store.as_ref(), "pins:lab:2024-03-01", &pool, None).unwrap();

    assert!(matches!(
        pins.issue("lab", &day(), None),
        Err(ClinicError::Corruption(_))
    ));
}
