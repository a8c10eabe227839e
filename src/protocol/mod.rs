//! Protocol Module
//!
//! Defines the wire protocol for client-server communication. This is a
//! thin adapter: every request maps one-to-one onto an engine operation.
//!
//! ### Op Codes
//! - 0x01: ISSUE_PIN        - 0x06: QUEUE_STATUS
//! - 0x02: VALIDATE_PIN     - 0x07: POSITION
//! - 0x03: ENTER            - 0x08: ASSIGN_PATH
//! - 0x04: CALL_NEXT        - 0x09: ADVANCE_PATH
//! - 0x05: COMPLETE         - 0x0A: RESET_CLINIC_DAY
//! - 0x0F: PING
//!
//! ### Status Codes
//! - 0x00: OK
//! - 0x01: NOT_FOUND
//! - 0x02: ERROR
//! - 0x03: VALIDATION
//! - 0x04: CONFLICT
//! - 0x05: RESOURCE_EXHAUSTED
//! - 0x06: LOCK_TIMEOUT
//! - 0x07: INVALID_STATE

mod request;
mod response;
mod codec;

pub use request::{OpCode, Request};
pub use response::{Reply, Response, Status, WireError};
pub use codec::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, write_request, write_response, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
