//! Tests for the queue ledger
//!
//! These tests verify:
//! - Gap-free ticket numbering, including under concurrent entry
//! - Idempotent entry per visit
//! - Call order and NEAR_TURN marking
//! - Completion statistics
//! - Position-change events

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clinicq::clock::{Clock, ManualClock, SystemClock};
use clinicq::config::LockConfig;
use clinicq::events::{ChannelSink, EventKind, EventPriority, EventSink, NullSink, QueueEvent};
use clinicq::lock::DistributedLock;
use clinicq::protocol::Reply;
use clinicq::queue::{QueueLedger, TicketStatus};
use clinicq::store::{MemoryStore, Store};
use clinicq::{ClinicError, DateKey};
use crossbeam::channel::Receiver;
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

const DAY_TTL: Duration = Duration::from_secs(48 * 60 * 60);

fn ledger_with(clock: Arc<dyn Clock>, sink: Arc<dyn EventSink>, lock_config: LockConfig) -> QueueLedger {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new(Arc::clone(&clock)));
    let lock = DistributedLock::new(Arc::clone(&store), Arc::clone(&clock), lock_config);
    QueueLedger::new(store, lock, clock, sink, DAY_TTL, 10)
}

fn manual_ledger() -> (Arc<ManualClock>, QueueLedger, Receiver<QueueEvent>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let (sink, events) = ChannelSink::new();
    let ledger = ledger_with(clock.clone() as Arc<dyn Clock>, Arc::new(sink), LockConfig::default());
    (clock, ledger, events)
}

fn day() -> DateKey {
    DateKey::parse("2024-03-01").unwrap()
}

fn drain(events: &Receiver<QueueEvent>) -> Vec<QueueEvent> {
    events.try_iter().collect()
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_ticket_numbers_start_at_one() {
    let (_clock, ledger, _events) = manual_ledger();

    for (n, visit) in ["v1", "v2", "v3"].iter().enumerate() {
        let outcome = ledger.enter("lab", &day(), visit).unwrap();
        assert_eq!(outcome.ticket_number, n as u64 + 1);
        assert_eq!(outcome.status, TicketStatus::Waiting);
        assert!(!outcome.already_queued);
    }

    let status = ledger.status("lab", &day()).unwrap();
    assert_eq!(status.waiting, 3);
    assert_eq!(status.next_ticket_number, 4);
    assert_eq!(status.stats.total_entered, 3);
}

#[test]
fn test_duplicate_entry_returns_existing_ticket() {
    let (_clock, ledger, _events) = manual_ledger();

    let first = ledger.enter("lab", &day(), "v1").unwrap();
    let again = ledger.enter("lab", &day(), "v1").unwrap();

    assert_eq!(again.ticket_number, first.ticket_number);
    assert!(again.already_queued);
    assert_eq!(ledger.status("lab", &day()).unwrap().next_ticket_number, 2);
}

#[test]
fn test_reentry_after_done_gets_new_ticket() {
    let (_clock, ledger, _events) = manual_ledger();

    ledger.enter("lab", &day(), "v1").unwrap();
    ledger.call_next("lab", &day()).unwrap();
    ledger.complete("lab", &day(), 1).unwrap();

    let again = ledger.enter("lab", &day(), "v1").unwrap();
    assert_eq!(again.ticket_number, 2);
    assert!(!again.already_queued);
}

#[test]
fn test_queues_are_per_clinic() {
    let (_clock, ledger, _events) = manual_ledger();

    assert_eq!(ledger.enter("lab", &day(), "v1").unwrap().ticket_number, 1);
    assert_eq!(ledger.enter("xray", &day(), "v1").unwrap().ticket_number, 1);
    assert_eq!(ledger.enter("lab", &day(), "v2").unwrap().ticket_number, 2);
}

#[test]
fn test_concurrent_entries_are_dense() {
    let lock_config = LockConfig {
        timeout_ms: 10_000,
        retry_interval_ms: 1,
        jitter_ms: 2,
        ..LockConfig::default()
    };
    let ledger = Arc::new(ledger_with(Arc::new(SystemClock), Arc::new(NullSink), lock_config));

    let handles: Vec<_> = (0..24)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                ledger
                    .enter("lab", &day(), &format!("visit-{}", i))
                    .unwrap()
                    .ticket_number
            })
        })
        .collect();

    let numbers: BTreeSet<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let expected: BTreeSet<u64> = (1..=24).collect();
    assert_eq!(numbers, expected);
    assert_eq!(ledger.status("lab", &day()).unwrap().next_ticket_number, 25);
}

#[test]
fn test_invalid_ids_rejected() {
    let (_clock, ledger, _events) = manual_ledger();

    assert!(matches!(ledger.enter("", &day(), "v1"), Err(ClinicError::Validation(_))));
    assert!(matches!(ledger.enter("lab", &day(), ""), Err(ClinicError::Validation(_))));
    assert!(matches!(ledger.enter("lab", &day(), "a b"), Err(ClinicError::Validation(_))));
}

// =============================================================================
// Call Tests
// =============================================================================

#[test]
fn test_call_next_on_empty_queue() {
    let (_clock, ledger, _events) = manual_ledger();
    assert_eq!(ledger.call_next("lab", &day()).unwrap(), None);
}

#[test]
fn test_call_next_marks_near_turn() {
    let (_clock, ledger, _events) = manual_ledger();
    for visit in ["v1", "v2", "v3"] {
        ledger.enter("lab", &day(), visit).unwrap();
    }

    let called = ledger.call_next("lab", &day()).unwrap().unwrap();
    assert_eq!(called.ticket_number, 1);
    assert_eq!(called.visit_id, "v1");
    assert_eq!(called.near_turn, Some(2));

    let status = ledger.status("lab", &day()).unwrap();
    assert_eq!(status.in_service, 1);
    assert_eq!(status.near_turn, 1);
    assert_eq!(status.waiting, 1);

    // The NEAR_TURN ticket is called next, and the warning moves on
    let called = ledger.call_next("lab", &day()).unwrap().unwrap();
    assert_eq!(called.ticket_number, 2);
    assert_eq!(called.near_turn, Some(3));

    let called = ledger.call_next("lab", &day()).unwrap().unwrap();
    assert_eq!(called.ticket_number, 3);
    assert_eq!(called.near_turn, None);

    assert_eq!(ledger.call_next("lab", &day()).unwrap(), None);
}

#[test]
fn test_position() {
    let (_clock, ledger, _events) = manual_ledger();
    for visit in ["v1", "v2", "v3"] {
        ledger.enter("lab", &day(), visit).unwrap();
    }

    assert_eq!(ledger.position("lab", &day(), "v3").unwrap(), 3);

    ledger.call_next("lab", &day()).unwrap();
    assert_eq!(ledger.position("lab", &day(), "v1").unwrap(), 0);
    assert_eq!(ledger.position("lab", &day(), "v2").unwrap(), 1);
    assert_eq!(ledger.position("lab", &day(), "v3").unwrap(), 2);

    assert!(matches!(
        ledger.position("lab", &day(), "nobody"),
        Err(ClinicError::NotFound(_))
    ));
}

// =============================================================================
// Completion Tests
// =============================================================================

#[test]
fn test_average_wait_and_service() {
    let (clock, ledger, _events) = manual_ledger();
    for visit in ["v1", "v2", "v3"] {
        ledger.enter("lab", &day(), visit).unwrap();
    }

    clock.advance_secs(60);
    ledger.call_next("lab", &day()).unwrap();

    clock.advance_secs(60);
    let done = ledger.complete("lab", &day(), 1).unwrap();
    assert_eq!(done.wait_seconds, 60);
    assert_eq!(done.service_seconds, 60);
    ledger.call_next("lab", &day()).unwrap();

    clock.advance_secs(60);
    ledger.complete("lab", &day(), 2).unwrap();
    ledger.call_next("lab", &day()).unwrap();

    clock.advance_secs(60);
    ledger.complete("lab", &day(), 3).unwrap();

    let stats = ledger.status("lab", &day()).unwrap().stats;
    assert_eq!(stats.total_completed, 3);
    assert!((stats.avg_wait_seconds - 120.0).abs() < 1e-9);
    assert!((stats.avg_service_seconds - 60.0).abs() < 1e-9);
}

#[test]
fn test_complete_requires_in_service() {
    let (_clock, ledger, _events) = manual_ledger();
    ledger.enter("lab", &day(), "v1").unwrap();

    assert!(matches!(
        ledger.complete("lab", &day(), 1),
        Err(ClinicError::InvalidState(_))
    ));

    ledger.call_next("lab", &day()).unwrap();
    ledger.complete("lab", &day(), 1).unwrap();

    assert!(matches!(
        ledger.complete("lab", &day(), 1),
        Err(ClinicError::InvalidState(_))
    ));
}

#[test]
fn test_complete_unknown_ticket() {
    let (_clock, ledger, _events) = manual_ledger();
    ledger.enter("lab", &day(), "v1").unwrap();

    assert!(matches!(
        ledger.complete("lab", &day(), 99),
        Err(ClinicError::NotFound(_))
    ));
}

#[test]
fn test_failed_complete_releases_lock() {
    let (_clock, ledger, _events) = manual_ledger();
    ledger.enter("lab", &day(), "v1").unwrap();

    assert!(ledger.complete("lab", &day(), 1).is_err());
    // A leaked lock would make this time out
    ledger.enter("lab", &day(), "v2").unwrap();
}

// =============================================================================
// Estimates and Reset
// =============================================================================

#[test]
fn test_estimated_wait_uses_default_then_history() {
    let (clock, ledger, _events) = manual_ledger();
    for visit in ["v1", "v2", "v3"] {
        ledger.enter("lab", &day(), visit).unwrap();
    }
    assert_eq!(ledger.waiting_count("lab", &day()).unwrap(), 3);
    assert_eq!(ledger.estimated_wait_minutes("lab", &day()).unwrap(), 30);

    ledger.call_next("lab", &day()).unwrap();
    clock.advance_secs(4 * 60);
    ledger.complete("lab", &day(), 1).unwrap();

    // Two still queued at four minutes each
    assert_eq!(ledger.estimated_wait_minutes("lab", &day()).unwrap(), 8);
}

#[test]
fn test_reset_clears_queue() {
    let (_clock, ledger, _events) = manual_ledger();
    ledger.enter("lab", &day(), "v1").unwrap();
    ledger.enter("lab", &day(), "v2").unwrap();

    ledger.reset("lab", &day()).unwrap();

    let status = ledger.status("lab", &day()).unwrap();
    assert_eq!(status.waiting, 0);
    assert_eq!(status.next_ticket_number, 1);
    assert_eq!(ledger.enter("lab", &day(), "v3").unwrap().ticket_number, 1);
}

// =============================================================================
// Event Tests
// =============================================================================

#[test]
fn test_enter_emits_queue_update() {
    let (_clock, ledger, events) = manual_ledger();
    ledger.enter("lab", &day(), "v1").unwrap();
    ledger.enter("lab", &day(), "v2").unwrap();

    let emitted = drain(&events);
    assert_eq!(emitted.len(), 2);
    assert_eq!(emitted[1].kind, EventKind::QueueUpdate);
    assert_eq!(emitted[1].recipient_id, "v2");
    assert_eq!(emitted[1].position, 2);
    assert_eq!(emitted[1].wait_time_minutes, 10);
}

#[test]
fn test_duplicate_entry_emits_nothing() {
    let (_clock, ledger, events) = manual_ledger();
    ledger.enter("lab", &day(), "v1").unwrap();
    drain(&events);

    ledger.enter("lab", &day(), "v1").unwrap();
    assert!(drain(&events).is_empty());
}

#[test]
fn test_call_next_events() {
    let (_clock, ledger, events) = manual_ledger();
    for visit in ["v1", "v2", "v3"] {
        ledger.enter("lab", &day(), visit).unwrap();
    }
    drain(&events);

    ledger.call_next("lab", &day()).unwrap();
    let emitted = drain(&events);

    assert_eq!(emitted.len(), 3);
    assert_eq!(emitted[0], QueueEvent::your_turn("v1", "lab"));
    assert_eq!(emitted[1].kind, EventKind::NearTurn);
    assert_eq!(emitted[1].recipient_id, "v2");
    assert_eq!(emitted[1].priority, EventPriority::High);
    assert_eq!(emitted[2].kind, EventKind::QueueUpdate);
    assert_eq!(emitted[2].recipient_id, "v3");
    assert_eq!(emitted[2].position, 2);
}

#[test]
fn test_event_json_contract() {
    let json = QueueEvent::near_turn("v-17", "lab", 8).to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["type"], "near_turn");
    assert_eq!(value["recipientId"], "v-17");
    assert_eq!(value["clinicId"], "lab");
    assert_eq!(value["position"], 1);
    assert_eq!(value["waitTimeMinutes"], 8);
    assert_eq!(value["priority"], "high");
}

#[test]
fn test_call_next_json_contract() {
    let (_clock, ledger, _events) = manual_ledger();
    ledger.enter("lab", &day(), "v1").unwrap();
    ledger.enter("lab", &day(), "v2").unwrap();

    let first = Reply::Called(ledger.call_next("lab", &day()).unwrap());
    assert_eq!(
        first.to_json_value().unwrap(),
        json!({ "ticketNumber": 1, "visitId": "v1", "nearTurn": 2 })
    );

    // Nobody left to warn, so the key is absent
    let second = Reply::Called(ledger.call_next("lab", &day()).unwrap());
    assert_eq!(
        second.to_json_value().unwrap(),
        json!({ "ticketNumber": 2, "visitId": "v2" })
    );

    let empty = Reply::Called(ledger.call_next("lab", &day()).unwrap());
    assert_eq!(empty.to_json_value().unwrap(), json!({ "none": true }));
    assert_eq!(empty.to_json().unwrap(), r#"{"none":true}"#);
}
