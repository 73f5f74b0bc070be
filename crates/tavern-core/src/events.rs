//! Wire protocol events exchanged over the WebSocket transport.
//!
//! Every frame is a JSON envelope `{"event": "<name>", "data": <payload>}`,
//! modeled here as adjacently tagged enums. [`ClientEvent`] covers frames sent
//! by clients, [`ServerEvent`] frames sent by the relay. Event names are
//! kebab-case on the wire.

use serde::{Deserialize, Serialize};

use crate::ids::{ConnectionId, SessionId};
use crate::messages::{Message, SessionState};

// ─────────────────────────────────────────────────────────────────────────────
// Client → server
// ─────────────────────────────────────────────────────────────────────────────

/// A frame received from a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Allocate a new session and report its identifier.
    CreateSession,
    /// Join an existing session as a named player.
    #[serde(rename_all = "camelCase")]
    JoinSession {
        /// Target session.
        session_id: SessionId,
        /// Display name; the relay assigns `Player N` when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_name: Option<String>,
    },
    /// Request the full message log of a session.
    #[serde(rename_all = "camelCase")]
    RequestMessageLog {
        /// Target session.
        session_id: SessionId,
    },
    /// Post a message for the completion backend to answer.
    #[serde(rename_all = "camelCase")]
    PostMessage {
        /// Target session.
        session_id: SessionId,
        /// Message body forwarded to the backend.
        text: String,
    },
    /// Start a session, enabling message exchange.
    #[serde(rename_all = "camelCase")]
    StartSession {
        /// Target session.
        session_id: SessionId,
    },
}

impl ClientEvent {
    /// Wire name of this event, as it appears in the envelope tag.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateSession => "create-session",
            Self::JoinSession { .. } => "join-session",
            Self::RequestMessageLog { .. } => "request-message-log",
            Self::PostMessage { .. } => "post-message",
            Self::StartSession { .. } => "start-session",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server → client
// ─────────────────────────────────────────────────────────────────────────────

/// A frame sent by the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// First frame on every connection, carrying the assigned connection ID.
    #[serde(rename_all = "camelCase")]
    ConnectionEstablished {
        /// Identifier assigned to this connection.
        connection_id: ConnectionId,
    },
    /// A session was created; payload is its identifier.
    SessionCreated(SessionId),
    /// The caller joined a session; payload is the state snapshot.
    SessionJoined(SessionState),
    /// The identifier did not resolve (or the room was full).
    SessionNotFound(SessionId),
    /// Full message log of a session, in insertion order.
    MessageLog(Vec<Message>),
    /// The log grew; payload is the full updated log, broadcast to the room.
    UpdatedMessages(Vec<Message>),
    /// The session was started; payload is the state snapshot.
    SessionStarted(SessionState),
    /// The completion backend failed; the log was left untouched.
    #[serde(rename_all = "camelCase")]
    CompletionFailed {
        /// Session whose exchange failed.
        session_id: SessionId,
        /// Sanitized description of the failure.
        message: String,
    },
    /// The inbound frame could not be parsed as a known event.
    InvalidPayload {
        /// Description of the parse failure.
        message: String,
    },
}

impl ServerEvent {
    /// Wire name of this event, as it appears in the envelope tag.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished { .. } => "connection-established",
            Self::SessionCreated(_) => "session-created",
            Self::SessionJoined(_) => "session-joined",
            Self::SessionNotFound(_) => "session-not-found",
            Self::MessageLog(_) => "message-log",
            Self::UpdatedMessages(_) => "updated-messages",
            Self::SessionStarted(_) => "session-started",
            Self::CompletionFailed { .. } => "completion-failed",
            Self::InvalidPayload { .. } => "invalid-payload",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
