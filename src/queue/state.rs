//! Per-clinic, per-day queue state

use serde::{Deserialize, Serialize};

use super::{QueueTicket, TicketStatus};

/// Running counters for one clinic/day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total_entered: u64,
    pub total_completed: u64,
    pub avg_wait_seconds: f64,
    pub avg_service_seconds: f64,
}

impl QueueStats {
    /// Fold one completion into the running means
    ///
    /// `avg' = (avg * (n - 1) + x) / n` with `n = total_completed + 1`
    pub fn record_completion(&mut self, wait_seconds: u64, service_seconds: u64) {
        let n = (self.total_completed + 1) as f64;
        self.avg_wait_seconds = (self.avg_wait_seconds * (n - 1.0) + wait_seconds as f64) / n;
        self.avg_service_seconds =
            (self.avg_service_seconds * (n - 1.0) + service_seconds as f64) / n;
        self.total_completed += 1;
    }
}

/// All tickets of one clinic for one day, in ticket-number order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicQueueState {
    pub tickets: Vec<QueueTicket>,
    pub next_ticket_number: u64,
    pub stats: QueueStats,
}

impl Default for ClinicQueueState {
    fn default() -> Self {
        Self {
            tickets: Vec::new(),
            next_ticket_number: 1,
            stats: QueueStats::default(),
        }
    }
}

impl ClinicQueueState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The visit's ticket that has not reached DONE, if any
    pub fn active_ticket(&self, visit_id: &str) -> Option<&QueueTicket> {
        self.tickets
            .iter()
            .find(|t| t.visit_id == visit_id && !t.status.is_terminal())
    }

    /// Allocate the next ticket number and append a WAITING ticket
    pub fn admit(&mut self, visit_id: &str, now_ms: u64) -> &QueueTicket {
        let ticket = QueueTicket::new(self.next_ticket_number, visit_id, now_ms);
        self.next_ticket_number += 1;
        self.stats.total_entered += 1;
        self.tickets.push(ticket);
        &self.tickets[self.tickets.len() - 1]
    }

    pub fn ticket(&self, ticket_number: u64) -> Option<&QueueTicket> {
        self.tickets.iter().find(|t| t.ticket_number == ticket_number)
    }

    pub fn ticket_mut(&mut self, ticket_number: u64) -> Option<&mut QueueTicket> {
        self.tickets
            .iter_mut()
            .find(|t| t.ticket_number == ticket_number)
    }

    /// Index of the earliest ticket still waiting to be called
    pub fn next_to_call(&self) -> Option<usize> {
        self.tickets.iter().position(|t| t.status.is_queued())
    }

    /// Index of the earliest plain WAITING ticket
    pub fn first_waiting(&self) -> Option<usize> {
        self.tickets
            .iter()
            .position(|t| t.status == TicketStatus::Waiting)
    }

    pub fn count(&self, status: TicketStatus) -> usize {
        self.tickets.iter().filter(|t| t.status == status).count()
    }

    /// WAITING + NEAR_TURN
    pub fn queued_count(&self) -> usize {
        self.tickets.iter().filter(|t| t.status.is_queued()).count()
    }

    /// 1-based place among queued tickets; 0 while in service
    pub fn position_of(&self, visit_id: &str) -> Option<u32> {
        let ticket = self.active_ticket(visit_id)?;
        if ticket.status == TicketStatus::InService {
            return Some(0);
        }
        let ahead = self
            .tickets
            .iter()
            .filter(|t| t.status.is_queued() && t.ticket_number < ticket.ticket_number)
            .count();
        Some(ahead as u32 + 1)
    }

    /// Queued tickets in call order
    pub fn queued(&self) -> impl Iterator<Item = &QueueTicket> {
        self.tickets.iter().filter(|t| t.status.is_queued())
    }
}
