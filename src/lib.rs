//! # ClinicQ
//!
//! Queue, PIN allocation and path routing engine for a walk-in medical
//! examination center:
//! - Unique, non-reusable daily access PINs from a bounded pool
//! - Race-free, gap-free per-clinic ticket sequences with wait statistics
//! - Sticky, load-weighted clinic order per patient and exam type
//! - Store-backed distributed lock guarding every read-modify-write
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 TCP Server / CLI (adapters)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Request / Reply
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                         Engine                              │
//! └──────┬──────────────────┬──────────────────────┬────────────┘
//!        │                  │                      │
//!        ▼                  ▼                      ▼
//!  ┌────────────┐    ┌─────────────┐        ┌─────────────┐
//!  │    PIN     │    │    Queue    │◀───────│    Path     │
//!  │ Allocator  │    │   Ledger    │ load   │   Router    │
//!  └─────┬──────┘    └──────┬──────┘        └──────┬──────┘
//!        │                  │   events ─▶ EventSink │
//!        └──────────┬───────┴──────────────────────┘
//!                   ▼
//!        ┌─────────────────────┐
//!        │  DistributedLock    │
//!        └──────────┬──────────┘
//!                   ▼
//!        ┌─────────────────────┐
//!        │ Store (Memory/Log)  │
//!        └─────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod clock;
pub mod keys;

pub mod store;
pub mod lock;
pub mod events;
pub mod pin;
pub mod queue;
pub mod router;
pub mod protocol;
pub mod network;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ClinicError, Result};
pub use config::Config;
pub use engine::Engine;
pub use keys::DateKey;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ClinicQ
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
