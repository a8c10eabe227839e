//! Queue Ledger
//!
//! Ticket assignment, service calls and wait-time statistics for every
//! clinic/day pair.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{ClinicError, Result};
use crate::events::{self, EventSink, QueueEvent};
use crate::keys::{self, DateKey};
use crate::lock::DistributedLock;
use crate::store::{self, Store};

use super::{ClinicQueueState, QueueStats, TicketStatus};

/// Result of `enter`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterOutcome {
    pub ticket_number: u64,
    pub status: TicketStatus,

    /// The visit already held a live ticket; nothing was allocated
    pub already_queued: bool,
}

/// Result of `call_next`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalledTicket {
    pub ticket_number: u64,
    pub visit_id: String,

    /// Ticket marked NEAR_TURN by this call, if any
    pub near_turn: Option<u64>,
}

/// Result of `complete`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub wait_seconds: u64,
    pub service_seconds: u64,
}

/// Read-only aggregate of one clinic/day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub clinic_id: String,
    pub date_key: DateKey,
    pub waiting: usize,
    pub near_turn: usize,
    pub in_service: usize,
    pub done: usize,
    pub next_ticket_number: u64,
    pub stats: QueueStats,
}

/// Owns every [`ClinicQueueState`]
pub struct QueueLedger {
    store: Arc<dyn Store>,
    lock: DistributedLock,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    daily_ttl: Duration,
    default_service_minutes: u32,
}

impl QueueLedger {
    pub fn new(
        store: Arc<dyn Store>,
        lock: DistributedLock,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
        daily_ttl: Duration,
        default_service_minutes: u32,
    ) -> Self {
        Self {
            store,
            lock,
            clock,
            sink,
            daily_ttl,
            default_service_minutes,
        }
    }

    /// Put a visit in line
    ///
    /// Idempotent per visit: a visit with a live ticket gets that ticket back
    /// with `already_queued = true` and the counter does not move.
    pub fn enter(&self, clinic_id: &str, date_key: &DateKey, visit_id: &str) -> Result<EnterOutcome> {
        keys::validate_id("clinicId", clinic_id)?;
        keys::validate_id("visitId", visit_id)?;

        let queue_key = keys::queue_key(clinic_id, date_key);
        let guard = self.lock.lock(&queue_key)?;
        let mut state = self.load(&queue_key)?;

        if let Some(existing) = state.active_ticket(visit_id) {
            let outcome = EnterOutcome {
                ticket_number: existing.ticket_number,
                status: existing.status,
                already_queued: true,
            };
            guard.release()?;
            tracing::debug!(clinic_id, %date_key, visit_id, ticket_number = outcome.ticket_number, "visit already queued");
            return Ok(outcome);
        }

        let ticket_number = state.admit(visit_id, self.clock.now_ms()).ticket_number;
        self.save(&queue_key, &state)?;
        guard.release()?;

        tracing::info!(clinic_id, %date_key, visit_id, ticket_number, "ticket issued");

        let position = state.position_of(visit_id).unwrap_or(0);
        let wait = self.estimate_minutes(&state.stats, position.saturating_sub(1));
        events::dispatch(
            self.sink.as_ref(),
            vec![QueueEvent::queue_update(visit_id, clinic_id, position, wait)],
        );

        Ok(EnterOutcome {
            ticket_number,
            status: TicketStatus::Waiting,
            already_queued: false,
        })
    }

    /// Call the earliest queued ticket into service
    ///
    /// The next plain WAITING ticket is marked NEAR_TURN so its holder can be
    /// warned ahead of time.
    pub fn call_next(&self, clinic_id: &str, date_key: &DateKey) -> Result<Option<CalledTicket>> {
        keys::validate_id("clinicId", clinic_id)?;

        let queue_key = keys::queue_key(clinic_id, date_key);
        let guard = self.lock.lock(&queue_key)?;
        let mut state = self.load(&queue_key)?;

        let Some(index) = state.next_to_call() else {
            guard.release()?;
            tracing::debug!(clinic_id, %date_key, "call_next on empty queue");
            return Ok(None);
        };

        let now = self.clock.now_ms();
        let called = &mut state.tickets[index];
        if !called.transition(TicketStatus::InService) {
            return Err(ClinicError::InvalidState(format!(
                "ticket {} cannot move from {} to IN_SERVICE",
                called.ticket_number, called.status
            )));
        }
        called.called_at = Some(now);
        let ticket_number = called.ticket_number;
        let visit_id = called.visit_id.clone();

        let mut near_turn = None;
        if state.count(TicketStatus::NearTurn) == 0 {
            if let Some(next) = state.first_waiting() {
                let ticket = &mut state.tickets[next];
                if ticket.transition(TicketStatus::NearTurn) {
                    near_turn = Some(ticket.ticket_number);
                }
            }
        }

        self.save(&queue_key, &state)?;
        guard.release()?;

        tracing::info!(clinic_id, %date_key, ticket_number, near_turn = ?near_turn, "ticket called");

        events::dispatch(self.sink.as_ref(), self.call_events(clinic_id, &visit_id, &state));

        Ok(Some(CalledTicket {
            ticket_number,
            visit_id,
            near_turn,
        }))
    }

    /// Finish service for an IN_SERVICE ticket and fold its times into the stats
    pub fn complete(&self, clinic_id: &str, date_key: &DateKey, ticket_number: u64) -> Result<Completion> {
        keys::validate_id("clinicId", clinic_id)?;

        let queue_key = keys::queue_key(clinic_id, date_key);
        let guard = self.lock.lock(&queue_key)?;
        let mut state = self.load(&queue_key)?;
        let now = self.clock.now_ms();

        let ticket = state.ticket_mut(ticket_number).ok_or_else(|| {
            ClinicError::NotFound(format!(
                "ticket {} at {} on {}",
                ticket_number, clinic_id, date_key
            ))
        })?;

        if ticket.status != TicketStatus::InService {
            return Err(ClinicError::InvalidState(format!(
                "ticket {} is {}, expected IN_SERVICE",
                ticket_number, ticket.status
            )));
        }
        let called_at = ticket.called_at.ok_or_else(|| {
            ClinicError::InvalidState(format!("ticket {} is in service but was never called", ticket_number))
        })?;

        ticket.transition(TicketStatus::Done);
        ticket.completed_at = Some(now);

        let completion = Completion {
            wait_seconds: called_at.saturating_sub(ticket.entered_at) / 1000,
            service_seconds: now.saturating_sub(called_at) / 1000,
        };
        state
            .stats
            .record_completion(completion.wait_seconds, completion.service_seconds);

        self.save(&queue_key, &state)?;
        guard.release()?;

        tracing::info!(
            clinic_id,
            %date_key,
            ticket_number,
            wait_seconds = completion.wait_seconds,
            service_seconds = completion.service_seconds,
            avg_wait_seconds = state.stats.avg_wait_seconds,
            "ticket completed"
        );
        Ok(completion)
    }

    /// Counts and stats; reads without the lock and may be momentarily stale
    pub fn status(&self, clinic_id: &str, date_key: &DateKey) -> Result<QueueSnapshot> {
        keys::validate_id("clinicId", clinic_id)?;
        let state = self.load(&keys::queue_key(clinic_id, date_key))?;

        Ok(QueueSnapshot {
            clinic_id: clinic_id.to_string(),
            date_key: date_key.clone(),
            waiting: state.count(TicketStatus::Waiting),
            near_turn: state.count(TicketStatus::NearTurn),
            in_service: state.count(TicketStatus::InService),
            done: state.count(TicketStatus::Done),
            next_ticket_number: state.next_ticket_number,
            stats: state.stats,
        })
    }

    /// Place of a visit in line (0 = in service), or `NotFound`
    pub fn position(&self, clinic_id: &str, date_key: &DateKey, visit_id: &str) -> Result<u32> {
        keys::validate_id("clinicId", clinic_id)?;
        keys::validate_id("visitId", visit_id)?;
        let state = self.load(&keys::queue_key(clinic_id, date_key))?;
        state.position_of(visit_id).ok_or_else(|| {
            ClinicError::NotFound(format!("visit {} in queue {} on {}", visit_id, clinic_id, date_key))
        })
    }

    /// Tickets still waiting to be called (the router's load signal)
    pub fn waiting_count(&self, clinic_id: &str, date_key: &DateKey) -> Result<usize> {
        let state = self.load(&keys::queue_key(clinic_id, date_key))?;
        Ok(state.queued_count())
    }

    /// Estimated wait in minutes for someone joining `clinic_id` now
    pub fn estimated_wait_minutes(&self, clinic_id: &str, date_key: &DateKey) -> Result<u32> {
        let state = self.load(&keys::queue_key(clinic_id, date_key))?;
        Ok(self.estimate_minutes(&state.stats, state.queued_count() as u32))
    }

    /// Drop the whole day's queue for a clinic
    pub fn reset(&self, clinic_id: &str, date_key: &DateKey) -> Result<()> {
        keys::validate_id("clinicId", clinic_id)?;
        let queue_key = keys::queue_key(clinic_id, date_key);

        self.lock.with_lock(&queue_key, || {
            self.store.delete(&queue_key)?;
            tracing::warn!(audit = true, clinic_id, %date_key, "queue reset");
            Ok(())
        })
    }

    fn call_events(&self, clinic_id: &str, called_visit: &str, state: &ClinicQueueState) -> Vec<QueueEvent> {
        let mut out = vec![QueueEvent::your_turn(called_visit, clinic_id)];
        for (ahead, ticket) in state.queued().enumerate() {
            let position = ahead as u32 + 1;
            let wait = self.estimate_minutes(&state.stats, ahead as u32);
            out.push(match ticket.status {
                TicketStatus::NearTurn => QueueEvent::near_turn(&ticket.visit_id, clinic_id, wait),
                _ => QueueEvent::queue_update(&ticket.visit_id, clinic_id, position, wait),
            });
        }
        out
    }

    fn estimate_minutes(&self, stats: &QueueStats, tickets_ahead: u32) -> u32 {
        let per_ticket_secs = if stats.total_completed > 0 {
            stats.avg_service_seconds
        } else {
            f64::from(self.default_service_minutes) * 60.0
        };
        (f64::from(tickets_ahead) * per_ticket_secs / 60.0).ceil() as u32
    }

    fn load(&self, queue_key: &str) -> Result<ClinicQueueState> {
        Ok(store::load(self.store.as_ref(), queue_key)?.unwrap_or_default())
    }

    fn save(&self, queue_key: &str, state: &ClinicQueueState) -> Result<()> {
        store::save(self.store.as_ref(), queue_key, state, Some(self.daily_ttl))
    }
}
