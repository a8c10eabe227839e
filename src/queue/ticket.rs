//! Queue tickets
//!
//! A ticket is a clinic/date-scoped sequence number with a forward-only
//! status machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ticket status
///
/// ```text
/// WAITING ──▶ NEAR_TURN ──▶ IN_SERVICE ──▶ DONE
///    └──────────────────────────▲
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Waiting,
    NearTurn,
    InService,
    Done,
}

impl TicketStatus {
    /// Whether moving to `next` is a legal forward transition
    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, next),
            (Waiting, NearTurn) | (Waiting, InService) | (NearTurn, InService) | (InService, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == TicketStatus::Done
    }

    /// Still waiting to be called
    pub fn is_queued(self) -> bool {
        matches!(self, TicketStatus::Waiting | TicketStatus::NearTurn)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Waiting => "WAITING",
            TicketStatus::NearTurn => "NEAR_TURN",
            TicketStatus::InService => "IN_SERVICE",
            TicketStatus::Done => "DONE",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One patient's place in a clinic's queue for one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueTicket {
    pub ticket_number: u64,
    pub visit_id: String,
    pub status: TicketStatus,

    /// Unix millis
    pub entered_at: u64,
    pub called_at: Option<u64>,
    pub completed_at: Option<u64>,
}

impl QueueTicket {
    pub fn new(ticket_number: u64, visit_id: &str, entered_at: u64) -> Self {
        Self {
            ticket_number,
            visit_id: visit_id.to_string(),
            status: TicketStatus::Waiting,
            entered_at,
            called_at: None,
            completed_at: None,
        }
    }

    /// Apply a transition, returning false (and changing nothing) if illegal
    pub fn transition(&mut self, next: TicketStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        true
    }
}
