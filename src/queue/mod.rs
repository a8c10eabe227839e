//! Queue Module
//!
//! Per-clinic, per-day ticket ledger.
//!
//! ## Responsibilities
//! - Race-free, gap-free ticket numbering (1, 2, 3, ...) per clinic/day
//! - Forward-only ticket status transitions
//! - Incremental wait/service time statistics
//! - Position-change events for the notification dispatcher
//!
//! Every mutation runs under the clinic/day lock; `status` and `position`
//! read without it.

mod ticket;
mod state;
mod ledger;

pub use ticket::{QueueTicket, TicketStatus};
pub use state::{ClinicQueueState, QueueStats};
pub use ledger::{CalledTicket, Completion, EnterOutcome, QueueLedger, QueueSnapshot};
