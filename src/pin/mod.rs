//! PIN Module
//!
//! Per-clinic, per-day access codes.
//!
//! ## Responsibilities
//! - Hand out unique codes from a bounded pool under concurrent requests
//! - Switch to the reserve range once the primary range is gone
//! - Replay responses for retried requests (idempotency keys)
//! - Answer "was this code issued today?"
//!
//! ## Pool Layout (defaults)
//! ```text
//! available: 01 02 ... 20   (FIFO)
//! reserve:   21 22 ... 30   (FIFO, sets reserve mode)
//! taken:     issued codes in order
//! ```

mod pool;
mod allocator;

pub use pool::DailyPinPool;
pub use allocator::{IssuedPin, PinAllocator};
