//! Event types and EventBus for the Tagdesk station
//!
//! Notifications are push, fire-and-forget from the core's perspective: the
//! coordinator and scan pipeline emit, any number of consumers (display,
//! logger, host bridge) subscribe. Events are serializable so a host can
//! forward them over whatever transport it likes.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::db::models::{DecodedPayload, Identity, Session};

/// Why a session was ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    /// Ended because another identity was presented at the reader
    AutomaticSwitch,
    /// Ended by an explicit logout request
    Manual,
    /// Ended because the station is shutting down
    Shutdown,
}

/// Why a scan was turned away by the admission gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// Identical payload seen within the short guard window
    Duplicate {
        /// Elapsed time since the previous sighting, in milliseconds
        within_ms: u64,
    },
    /// Session exceeded its rolling admission cap
    RateLimited,
    /// Payload already durably recorded earlier today
    DuplicateToday,
}

/// Station event types
///
/// Broadcast via [`EventBus`]; every consumer sees every event. For a single
/// identity switch the coordinator guarantees the order
/// `SessionResetRequested` → `UserLoggedOut`* → `UserLoggedIn` (or a terminal
/// `ScanError`/`SystemError`), never interleaved with another switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StationEvent {
    /// A new identity was accepted at the reader; consumers should clear any
    /// stale per-worker display state before the logout/login events land.
    SessionResetRequested {
        identity: Identity,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A session was installed as the station's current session.
    UserLoggedIn {
        identity: Identity,
        session: Session,
        /// How many sessions the switch ended beforehand
        ended_count: usize,
        /// True when the login came through the full reader-driven reset
        full_reset: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A session was ended.
    UserLoggedOut {
        identity_id: Uuid,
        identity_name: String,
        session_id: Uuid,
        reason: LogoutReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A user-visible, non-fatal problem with a tag or scan.
    ScanError {
        /// The offending tag id or payload
        subject: String,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A scan passed admission and was durably recorded.
    ScanAdmitted {
        session_id: Uuid,
        decoded: DecodedPayload,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A scan was rejected by the admission gate.
    ScanRejected {
        session_id: Uuid,
        payload: String,
        reason: RejectReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A persistence or internal failure requiring operator attention.
    SystemError {
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl StationEvent {
    /// Shorthand for a [`StationEvent::ScanError`] stamped now.
    pub fn scan_error(subject: impl Into<String>, message: impl Into<String>) -> Self {
        StationEvent::ScanError {
            subject: subject.into(),
            message: message.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Shorthand for a [`StationEvent::SystemError`] stamped now.
    pub fn system_error(message: impl Into<String>) -> Self {
        StationEvent::SystemError {
            message: message.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for station-wide events
///
/// Wraps `tokio::broadcast`, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StationEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity.
    ///
    /// Events beyond `capacity` that no subscriber has consumed yet are
    /// dropped oldest-first; a lagging subscriber observes the gap as
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events.
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<StationEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns the subscriber count, or `Err` if no subscriber is listening.
    /// Callers that don't care whether anyone is listening use `.ok()`.
    pub fn emit(
        &self,
        event: StationEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<StationEvent>> {
        self.tx.send(event)
    }

    /// Channel capacity this bus was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("receivers", &self.tx.receiver_count())
            .finish()
    }
}
