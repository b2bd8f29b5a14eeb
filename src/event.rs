//! Lifecycle notifications emitted by the tracker.
//!
//! Subscribers get a broadcast receiver and see every event emitted after
//! they subscribed. Failures after startup surface only here, so a caller
//! that never listens for `error` never hears about them.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tokio::sync::broadcast;

use crate::error::Error;
use crate::model::{Row, SheetData, Status};

const DEFAULT_CAPACITY: usize = 256;

/// A notification emitted by the tracker.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Monotonic sequence number. Consumers can detect gaps.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum EventKind {
    /// The primary sheet changed since the last poll.
    Updated(SheetData),
    /// A log row was created or moved to `started`.
    Started(Row),
    Completed(Row),
    Rejected(Row),
    Error(#[serde(serialize_with = "serialize_error")] Error),
}

impl EventKind {
    /// Event for a log row that reached `status`.
    pub fn transition(status: Status, row: Row) -> Self {
        match status {
            Status::Started => Self::Started(row),
            Status::Completed => Self::Completed(row),
            Status::Rejected => Self::Rejected(row),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Updated(_) => "updated",
            Self::Started(_) => "started",
            Self::Completed(_) => "completed",
            Self::Rejected(_) => "rejected",
            Self::Error(_) => "error",
        }
    }

    /// The row carried by a transition event.
    pub fn row(&self) -> Option<&Row> {
        match self {
            Self::Started(row) | Self::Completed(row) | Self::Rejected(row) => Some(row),
            _ => None,
        }
    }
}

fn serialize_error<S: Serializer>(error: &Error, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&error.to_string())
}

/// Fan-out channel shared by the poller and the status calls.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    seq: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            seq: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Stamp and broadcast an event. Having no subscribers is fine.
    pub fn emit(&self, kind: EventKind) -> Event {
        let event = Event {
            seq: self.seq.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp: Utc::now(),
            kind,
        };
        let _ = self.tx.send(event.clone());
        event
    }

    /// Broadcast a failure and hand it back for the caller's own result.
    pub fn emit_error(&self, error: Error) -> Error {
        self.emit(EventKind::Error(error.clone()));
        error
    }
}
