//! Log record definitions
//!
//! Defines the structure of individual records in the state log.

use serde::{Deserialize, Serialize};

use crate::error::{ClinicError, Result};

/// Header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single record payload (16 MB)
pub const MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

/// A single record in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The mutation to replay
    pub op: LogOp,

    /// Timestamp (unix millis) when the record was created
    pub timestamp_ms: u64,
}

/// Mutations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOp {
    /// Write a value with an optional absolute expiry
    Put {
        key: String,
        value: Vec<u8>,
        expires_at_ms: Option<u64>,
    },

    /// Remove a key
    Delete { key: String },
}

impl LogRecord {
    pub fn new(lsn: u64, op: LogOp, timestamp_ms: u64) -> Self {
        Self {
            lsn,
            op,
            timestamp_ms,
        }
    }

    /// Encode as `LSN | CRC32(payload) | Len | payload`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        if payload.len() > MAX_RECORD_SIZE {
            return Err(ClinicError::Storage(format!(
                "record of {} bytes exceeds max {}",
                payload.len(),
                MAX_RECORD_SIZE
            )));
        }

        let crc = crc32fast::hash(&payload);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&self.lsn.to_be_bytes());
        bytes.extend_from_slice(&crc.to_be_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode one record from the front of `bytes`
    ///
    /// Returns the record and the number of bytes consumed.
    /// - `Corruption` if the checksum or the embedded LSN disagrees with the header
    /// - `Storage` if the buffer ends before the record does (torn write)
    pub fn deserialize(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < HEADER_SIZE {
            return Err(ClinicError::Storage(format!(
                "incomplete record header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut lsn_bytes = [0u8; 8];
        lsn_bytes.copy_from_slice(&bytes[0..8]);
        let lsn = u64::from_be_bytes(lsn_bytes);
        let crc = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let len = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;

        if len > MAX_RECORD_SIZE {
            return Err(ClinicError::Corruption(format!(
                "record length {} exceeds max {}",
                len, MAX_RECORD_SIZE
            )));
        }

        let total = HEADER_SIZE + len;
        if bytes.len() < total {
            return Err(ClinicError::Storage(format!(
                "incomplete record payload: expected {} bytes, got {}",
                len,
                bytes.len() - HEADER_SIZE
            )));
        }

        let payload = &bytes[HEADER_SIZE..total];
        if crc32fast::hash(payload) != crc {
            return Err(ClinicError::Corruption(format!("CRC mismatch at lsn {}", lsn)));
        }

        let record: LogRecord = bincode::deserialize(payload)
            .map_err(|e| ClinicError::Corruption(format!("undecodable record: {}", e)))?;
        if record.lsn != lsn {
            return Err(ClinicError::Corruption(format!(
                "header lsn {} does not match record lsn {}",
                lsn, record.lsn
            )));
        }

        Ok((record, total))
    }
}
