//! Response definitions
//!
//! Represents responses to clients.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ClinicError, Result};
use crate::pin::IssuedPin;
use crate::queue::{CalledTicket, Completion, EnterOutcome, QueueSnapshot};
use crate::router::{Advance, PatientPath};

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
    Validation = 0x03,
    Conflict = 0x04,
    ResourceExhausted = 0x05,
    LockTimeout = 0x06,
    InvalidState = 0x07,
}

impl Status {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => Status::Ok,
            0x01 => Status::NotFound,
            0x02 => Status::Error,
            0x03 => Status::Validation,
            0x04 => Status::Conflict,
            0x05 => Status::ResourceExhausted,
            0x06 => Status::LockTimeout,
            0x07 => Status::InvalidState,
            _ => return None,
        })
    }
}

/// Successful result of a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    Pin(IssuedPin),
    Validity { valid: bool },
    Entered(EnterOutcome),
    Called(Option<CalledTicket>),
    Completed(Completion),
    Status(QueueSnapshot),
    Position { position: u32 },
    Path(PatientPath),
    Advanced(Advance),
    Reset,
    Pong,
}

impl Reply {
    /// JSON rendering handed to callers outside the binary protocol
    ///
    /// Struct replies keep their camelCase field names. Markers become
    /// flag objects: `{"none": true}` when nobody is waiting and
    /// `{"journeyComplete": true}` at the end of a path.
    pub fn to_json_value(&self) -> Result<Value> {
        Ok(match self {
            Reply::Pin(issued) => serde_json::to_value(issued)?,
            Reply::Validity { valid } => json!({ "valid": valid }),
            Reply::Entered(outcome) => serde_json::to_value(outcome)?,
            Reply::Called(None) => json!({ "none": true }),
            Reply::Called(Some(called)) => {
                let mut value = json!({
                    "ticketNumber": called.ticket_number,
                    "visitId": called.visit_id,
                });
                if let Some(near_turn) = called.near_turn {
                    value["nearTurn"] = json!(near_turn);
                }
                value
            }
            Reply::Completed(completion) => serde_json::to_value(completion)?,
            Reply::Status(snapshot) => serde_json::to_value(snapshot)?,
            Reply::Position { position } => json!({ "position": position }),
            Reply::Path(path) => serde_json::to_value(path)?,
            Reply::Advanced(Advance::Next { next_clinic }) => json!({ "nextClinic": next_clinic }),
            Reply::Advanced(Advance::JourneyComplete) => json!({ "journeyComplete": true }),
            Reply::Reset => json!({ "reset": true }),
            Reply::Pong => json!({ "pong": true }),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_json_value()?)?)
    }
}

/// Error body carried by non-OK responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireError {
    Validation(String),
    NotFound(String),
    Conflict(String),
    ResourceExhausted(String),
    LockTimeout { key: String, waited_ms: u64 },
    InvalidState(String),
    Internal(String),
}

impl WireError {
    pub fn status(&self) -> Status {
        match self {
            WireError::Validation(_) => Status::Validation,
            WireError::NotFound(_) => Status::NotFound,
            WireError::Conflict(_) => Status::Conflict,
            WireError::ResourceExhausted(_) => Status::ResourceExhausted,
            WireError::LockTimeout { .. } => Status::LockTimeout,
            WireError::InvalidState(_) => Status::InvalidState,
            WireError::Internal(_) => Status::Error,
        }
    }
}

impl From<&ClinicError> for WireError {
    fn from(e: &ClinicError) -> Self {
        match e {
            ClinicError::Validation(m) => WireError::Validation(m.clone()),
            ClinicError::NotFound(m) => WireError::NotFound(m.clone()),
            ClinicError::Conflict(m) => WireError::Conflict(m.clone()),
            ClinicError::ResourceExhausted(m) => WireError::ResourceExhausted(m.clone()),
            ClinicError::LockTimeout { key, waited_ms } => WireError::LockTimeout {
                key: key.clone(),
                waited_ms: *waited_ms,
            },
            ClinicError::InvalidState(m) => WireError::InvalidState(m.clone()),
            other => WireError::Internal(other.to_string()),
        }
    }
}

impl From<WireError> for ClinicError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::Validation(m) => ClinicError::Validation(m),
            WireError::NotFound(m) => ClinicError::NotFound(m),
            WireError::Conflict(m) => ClinicError::Conflict(m),
            WireError::ResourceExhausted(m) => ClinicError::ResourceExhausted(m),
            WireError::LockTimeout { key, waited_ms } => ClinicError::LockTimeout { key, waited_ms },
            WireError::InvalidState(m) => ClinicError::InvalidState(m),
            WireError::Internal(m) => ClinicError::Network(format!("server error: {}", m)),
        }
    }
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// bincode `Reply` when OK, bincode `WireError` otherwise
    pub payload: Vec<u8>,
}

impl Response {
    /// Create an OK response
    pub fn ok(reply: &Reply) -> Result<Self> {
        Ok(Self {
            status: Status::Ok,
            payload: bincode::serialize(reply)?,
        })
    }

    /// Create an error response
    pub fn error(error: &ClinicError) -> Result<Self> {
        let wire = WireError::from(error);
        Ok(Self {
            status: wire.status(),
            payload: bincode::serialize(&wire)?,
        })
    }

    /// Encode the outcome of an operation
    pub fn from_result(result: &Result<Reply>) -> Result<Self> {
        match result {
            Ok(reply) => Self::ok(reply),
            Err(e) => Self::error(e),
        }
    }

    /// Decode back into the operation outcome
    pub fn into_result(self) -> Result<Reply> {
        match self.status {
            Status::Ok => Ok(bincode::deserialize(&self.payload)?),
            _ => {
                let wire: WireError = bincode::deserialize(&self.payload)?;
                Err(wire.into())
            }
        }
    }
}
