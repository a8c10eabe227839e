//! Request definitions
//!
//! One variant per engine operation.

use serde::{Deserialize, Serialize};

use crate::keys::DateKey;

/// Request op codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    IssuePin = 0x01,
    ValidatePin = 0x02,
    Enter = 0x03,
    CallNext = 0x04,
    Complete = 0x05,
    QueueStatus = 0x06,
    Position = 0x07,
    AssignPath = 0x08,
    AdvancePath = 0x09,
    ResetClinicDay = 0x0A,
    Ping = 0x0F,
}

impl OpCode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x01 => OpCode::IssuePin,
            0x02 => OpCode::ValidatePin,
            0x03 => OpCode::Enter,
            0x04 => OpCode::CallNext,
            0x05 => OpCode::Complete,
            0x06 => OpCode::QueueStatus,
            0x07 => OpCode::Position,
            0x08 => OpCode::AssignPath,
            0x09 => OpCode::AdvancePath,
            0x0A => OpCode::ResetClinicDay,
            0x0F => OpCode::Ping,
            _ => return None,
        })
    }
}

/// A parsed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    IssuePin {
        clinic_id: String,
        date_key: DateKey,
        idempotency_key: Option<String>,
    },

    ValidatePin {
        clinic_id: String,
        date_key: DateKey,
        pin: String,
    },

    /// Join a queue, optionally presenting a PIN
    Enter {
        clinic_id: String,
        date_key: DateKey,
        visit_id: String,
        pin: Option<String>,
    },

    CallNext {
        clinic_id: String,
        date_key: DateKey,
    },

    Complete {
        clinic_id: String,
        date_key: DateKey,
        ticket_number: u64,
    },

    QueueStatus {
        clinic_id: String,
        date_key: DateKey,
    },

    Position {
        clinic_id: String,
        date_key: DateKey,
        visit_id: String,
    },

    AssignPath {
        patient_id: String,
        exam_type: String,
    },

    AdvancePath {
        patient_id: String,
        exam_type: String,
        completed_clinic_id: String,
    },

    /// Administrative: fresh PIN pool and empty queue for the day
    ResetClinicDay {
        clinic_id: String,
        date_key: DateKey,
    },

    /// Health check
    Ping,
}

impl Request {
    pub fn op_code(&self) -> OpCode {
        match self {
            Request::IssuePin { .. } => OpCode::IssuePin,
            Request::ValidatePin { .. } => OpCode::ValidatePin,
            Request::Enter { .. } => OpCode::Enter,
            Request::CallNext { .. } => OpCode::CallNext,
            Request::Complete { .. } => OpCode::Complete,
            Request::QueueStatus { .. } => OpCode::QueueStatus,
            Request::Position { .. } => OpCode::Position,
            Request::AssignPath { .. } => OpCode::AssignPath,
            Request::AdvancePath { .. } => OpCode::AdvancePath,
            Request::ResetClinicDay { .. } => OpCode::ResetClinicDay,
            Request::Ping => OpCode::Ping,
        }
    }
}
