//! Error types for ClinicQ
//!
//! Provides a unified error type for all operations.
//!
//! The first group of variants is the caller-facing taxonomy: each one tells
//! the caller whether retrying can help. Only [`ClinicError::LockTimeout`] is
//! transient.

use thiserror::Error;

/// Result type alias using ClinicError
pub type Result<T> = std::result::Result<T, ClinicError>;

/// Unified error type for ClinicQ operations
#[derive(Debug, Error)]
pub enum ClinicError {
    // -------------------------------------------------------------------------
    // Caller-facing taxonomy
    // -------------------------------------------------------------------------
    /// Missing or malformed input. The caller must fix the request.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown clinic, visit, ticket, pin, path or exam type.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate non-idempotent attempt.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// PIN pool fully consumed. Recoverable only through an explicit reset.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Lock contention exceeded the wait budget.
    #[error("Lock timeout on '{key}' after {waited_ms}ms")]
    LockTimeout { key: String, waited_ms: u64 },

    /// Operation is not legal in the entity's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Log corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClinicError {
    /// Whether a caller may retry the same request and expect a different outcome
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClinicError::LockTimeout { .. })
    }
}

impl From<bincode::Error> for ClinicError {
    fn from(e: bincode::Error) -> Self {
        ClinicError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for ClinicError {
    fn from(e: serde_json::Error) -> Self {
        ClinicError::Serialization(e.to_string())
    }
}
