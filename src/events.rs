//! Events Module
//!
//! The contract this engine emits toward the notification dispatcher when a
//! ticket or a patient's position changes. Delivery is someone else's
//! problem; only the payload shape is fixed:
//!
//! ```json
//! {"type":"near_turn","recipientId":"v-17","clinicId":"lab",
//!  "position":1,"waitTimeMinutes":8,"priority":"high"}
//! ```

use crossbeam::channel::{self, Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::error::{ClinicError, Result};

/// What happened to the recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The recipient's ticket was just called
    YourTurn,

    /// The recipient is next in line
    NearTurn,

    /// The recipient's position or estimate changed
    QueueUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPriority {
    High,
    Normal,
    Low,
}

/// A position-change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub recipient_id: String,
    pub clinic_id: String,

    /// 0 = being served, 1 = next, ...
    pub position: u32,
    pub wait_time_minutes: u32,
    pub priority: EventPriority,
}

impl QueueEvent {
    pub fn your_turn(recipient_id: &str, clinic_id: &str) -> Self {
        Self {
            kind: EventKind::YourTurn,
            recipient_id: recipient_id.to_string(),
            clinic_id: clinic_id.to_string(),
            position: 0,
            wait_time_minutes: 0,
            priority: EventPriority::High,
        }
    }

    pub fn near_turn(recipient_id: &str, clinic_id: &str, wait_time_minutes: u32) -> Self {
        Self {
            kind: EventKind::NearTurn,
            recipient_id: recipient_id.to_string(),
            clinic_id: clinic_id.to_string(),
            position: 1,
            wait_time_minutes,
            priority: EventPriority::High,
        }
    }

    pub fn queue_update(
        recipient_id: &str,
        clinic_id: &str,
        position: u32,
        wait_time_minutes: u32,
    ) -> Self {
        Self {
            kind: EventKind::QueueUpdate,
            recipient_id: recipient_id.to_string(),
            clinic_id: clinic_id.to_string(),
            position,
            wait_time_minutes,
            priority: EventPriority::Normal,
        }
    }

    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Render the wire payload
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Consumer of queue events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: QueueEvent) -> Result<()>;
}

/// Deliver a batch, logging (never propagating) sink failures
pub(crate) fn dispatch(sink: &dyn EventSink, events: Vec<QueueEvent>) {
    for event in events {
        let recipient = event.recipient_id.clone();
        if let Err(e) = sink.emit(event) {
            tracing::error!(recipient = %recipient, error = %e, "event sink rejected event");
        }
    }
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: QueueEvent) -> Result<()> {
        Ok(())
    }
}

/// Logs every event as JSON at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: QueueEvent) -> Result<()> {
        tracing::info!(target: "clinicq::events", payload = %event.to_json()?, "queue event");
        Ok(())
    }
}

/// Forwards events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<QueueEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver the dispatcher reads from
    pub fn new() -> (Self, Receiver<QueueEvent>) {
        let (sender, receiver) = channel::unbounded();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: QueueEvent) -> Result<()> {
        self.sender
            .send(event)
            .map_err(|_| ClinicError::Network("event receiver disconnected".to_string()))
    }
}
