//! Chat log entries and session state shared between the relay and clients.
//!
//! Every entry in a session's message log is a [`Message`]. Two flags classify
//! the author: system notices (joins, welcome text) and AI replies. A plain
//! player message carries neither flag.

use serde::{Deserialize, Serialize};

/// Author name attached to system notices.
pub const SYSTEM_NAME: &str = "System";

/// Author name attached to AI replies.
pub const AI_NAME: &str = "AI";

// ─────────────────────────────────────────────────────────────────────────────
// Message
// ─────────────────────────────────────────────────────────────────────────────

/// A single entry in a session's message log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Display name of the author.
    pub name: String,
    /// Message body.
    pub text: String,
    /// True for relay-generated notices (welcome text, join announcements).
    pub is_system_message: bool,
    /// True for replies produced by the completion backend.
    #[serde(rename = "isFromAI")]
    pub is_from_ai: bool,
}

impl Message {
    /// A relay-generated notice, attributed to [`SYSTEM_NAME`].
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            name: SYSTEM_NAME.to_owned(),
            text: text.into(),
            is_system_message: true,
            is_from_ai: false,
        }
    }

    /// A message authored by a player.
    #[must_use]
    pub fn player(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            is_system_message: false,
            is_from_ai: false,
        }
    }

    /// A reply produced by the completion backend, attributed to [`AI_NAME`].
    #[must_use]
    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            name: AI_NAME.to_owned(),
            text: text.into(),
            is_system_message: false,
            is_from_ai: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session state
// ─────────────────────────────────────────────────────────────────────────────

/// Snapshot of a session's lifecycle flags, sent on join and on start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Whether the session has been started by a member.
    pub has_started: bool,
    /// Whether members may currently post messages.
    pub allow_message_sending: bool,
    /// Display names of current members, in join order.
    pub players: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
