//! Key Space
//!
//! Canonical persisted-state keys and the validation of the identifiers
//! that go into them.
//!
//! ```text
//! pins:{clinicId}:{dateKey}
//! queue:{clinicId}:{dateKey}
//! path:{patientId}:{examType}
//! lock:{contentionKey}
//! idem:pin:{clinicId}:{dateKey}:{idempotencyKey}
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{ClinicError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Civil date (`YYYY-MM-DD`) anchoring all daily state to the service time zone
///
/// Deserialization goes through [`DateKey::parse`], so a malformed date
/// arriving over the wire is rejected before it reaches an operation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(String);

impl DateKey {
    /// Parse and validate a `YYYY-MM-DD` string
    pub fn parse(s: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| {
            ClinicError::Validation(format!("dateKey '{}' is not YYYY-MM-DD: {}", s, e))
        })?;
        Ok(Self::from_date(date))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format(DATE_FORMAT).to_string())
    }

    /// The operational day containing `unix_ms` in the given fixed offset
    pub fn at(unix_ms: u64, utc_offset_secs: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(utc_offset_secs).ok_or_else(|| {
            ClinicError::Config(format!("invalid utc offset {}s", utc_offset_secs))
        })?;
        let instant = DateTime::from_timestamp_millis(unix_ms as i64).ok_or_else(|| {
            ClinicError::Validation(format!("timestamp {}ms out of range", unix_ms))
        })?;
        Ok(Self::from_date(instant.with_timezone(&offset).date_naive()))
    }

    /// Today's date key according to `clock`
    pub fn today(clock: &dyn Clock, utc_offset_secs: i32) -> Result<Self> {
        Self::at(clock.now_ms(), utc_offset_secs)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DateKey {
    type Error = ClinicError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<DateKey> for String {
    fn from(key: DateKey) -> Self {
        key.0
    }
}

impl FromStr for DateKey {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Reject identifiers that are empty or would corrupt the key space
pub fn validate_id(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ClinicError::Validation(format!("{} is required", field)));
    }
    if value.contains(':') || value.chars().any(char::is_whitespace) {
        return Err(ClinicError::Validation(format!(
            "{} '{}' must not contain ':' or whitespace",
            field, value
        )));
    }
    Ok(())
}

pub fn pins_key(clinic_id: &str, date_key: &DateKey) -> String {
    format!("pins:{}:{}", clinic_id, date_key)
}

pub fn queue_key(clinic_id: &str, date_key: &DateKey) -> String {
    format!("queue:{}:{}", clinic_id, date_key)
}

pub fn path_key(patient_id: &str, exam_type: &str) -> String {
    format!("path:{}:{}", patient_id, exam_type)
}

pub fn lock_key(contention_key: &str) -> String {
    format!("lock:{}", contention_key)
}

pub fn pin_idempotency_key(clinic_id: &str, date_key: &DateKey, idempotency_key: &str) -> String {
    format!("idem:pin:{}:{}:{}", clinic_id, date_key, idempotency_key)
}
