//! Settings type definitions with compiled defaults.
//!
//! All structs use camelCase serde naming so the JSON file reads the same as
//! the wire protocol. Every field has a default, so a partial settings file
//! only overrides what it names.

use serde::{Deserialize, Serialize};

/// Root settings object, stored at `~/.tavern/settings.json`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TavernSettings {
    /// Network and transport settings.
    pub server: ServerSettings,
    /// Session and room behavior.
    pub relay: RelaySettings,
    /// Completion backend settings.
    pub completion: CompletionSettings,
}

/// Server network and runtime settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. Port 0 asks the OS for a free port (used in tests).
    pub port: u16,
    /// Maximum number of concurrent WebSocket connections.
    pub max_connections: usize,
    /// WebSocket ping interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Seconds without a pong before a connection is considered dead.
    pub heartbeat_timeout_secs: u64,
    /// Maximum inbound frame size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            max_connections: 50,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 64 * 1024,
        }
    }
}

/// Session and room behavior settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Maximum number of members per room.
    pub room_capacity: usize,
    /// System message seeded into every new session's log.
    pub welcome_message: String,
    /// Seconds a session may sit idle before the sweeper evicts it.
    pub session_ttl_secs: u64,
    /// Interval between eviction sweeps in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            room_capacity: 4,
            welcome_message: "Welcome to the game!".to_string(),
            session_ttl_secs: 3600,
            sweep_interval_secs: 60,
        }
    }
}

/// Completion backend settings.
///
/// The API key is deliberately absent here: credentials come from the
/// process environment only, never from the settings file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompletionSettings {
    /// Base URL of the completion service.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            request_timeout_secs: 30,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
