//! Error types for the relay domain.
//!
//! [`RelayError`] covers the failures a routed event can hit before reaching
//! the completion backend. Backend failures have their own type in the
//! completion crate; the relay maps both onto wire events.

use thiserror::Error;

use crate::ids::SessionId;

/// Failures produced while routing an event to a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// The session identifier did not resolve to a live session.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The session exists but its room is at capacity.
    ///
    /// On the wire this is reported as `session-not-found`; the distinction
    /// survives only in logs and metrics.
    #[error("session {id} is full (capacity {capacity})")]
    RoomFull {
        /// Session whose room is full.
        id: SessionId,
        /// Configured room capacity.
        capacity: usize,
    },
}

impl RelayError {
    /// Machine-readable error code for logs and metric labels.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "session_not_found",
            Self::RoomFull { .. } => "room_full",
        }
    }

    /// The session identifier the failing request targeted.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::SessionNotFound(id) | Self::RoomFull { id, .. } => id,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
