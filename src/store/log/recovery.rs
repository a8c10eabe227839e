//! Log Recovery
//!
//! Rebuilds state after a restart or crash by replaying the log.

use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::error::{ClinicError, Result};

use super::LogRecord;

/// Replays the state log
pub struct LogRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of records successfully recovered
    pub records_recovered: u64,

    /// Number of corrupted records found (replay stops at the first one)
    pub records_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the file was truncated (bad tail removed)
    pub was_truncated: bool,
}

impl LogRecovery {
    /// Recover records from a log file
    ///
    /// This will:
    /// 1. Read records in order until the end or the first bad record
    /// 2. Truncate the file after the last good record
    /// 3. Return all valid records in order
    ///
    /// Framing cannot be trusted past a bad record, so everything after it
    /// is discarded.
    pub fn recover(path: &Path) -> Result<(Vec<LogRecord>, RecoveryResult)> {
        let (records, result, good_len) = Self::scan(path)?;

        if result.was_truncated {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(good_len as u64)?;
            file.sync_all()?;
        }

        Ok((records, result))
    }

    /// Verify integrity of a log file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result, _) = Self::scan(path)?;
        Ok(result)
    }

    fn scan(path: &Path) -> Result<(Vec<LogRecord>, RecoveryResult, usize)> {
        let bytes = fs::read(path)?;
        let mut records = Vec::new();
        let mut result = RecoveryResult::default();
        let mut offset = 0;

        while offset < bytes.len() {
            match LogRecord::deserialize(&bytes[offset..]) {
                Ok((record, consumed)) if record.lsn > result.last_lsn => {
                    result.last_lsn = record.lsn;
                    result.records_recovered += 1;
                    records.push(record);
                    offset += consumed;
                }
                Ok((record, _)) => {
                    tracing::warn!(
                        lsn = record.lsn,
                        last_lsn = result.last_lsn,
                        "non-monotonic lsn in state log"
                    );
                    result.records_corrupted += 1;
                    result.was_truncated = true;
                    break;
                }
                Err(ClinicError::Corruption(reason)) => {
                    tracing::warn!(offset, %reason, "corrupted record in state log");
                    result.records_corrupted += 1;
                    result.was_truncated = true;
                    break;
                }
                Err(ClinicError::Storage(reason)) => {
                    tracing::warn!(offset, %reason, "torn write at end of state log");
                    result.was_truncated = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok((records, result, offset))
    }
}
