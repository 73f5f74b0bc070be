//! Event fan-out to connected WebSocket clients.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use tavern_core::{ConnectionId, ServerEvent, SessionId};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use crate::metrics::WS_BROADCAST_DROPS_TOTAL;

/// Manages event broadcasting to connected clients.
///
/// Room membership lives on the connections themselves; a broadcast to a
/// session reaches every connection whose room matches. Frames are
/// serialized once and shared across recipients.
pub struct BroadcastManager {
    /// Connected clients indexed by connection ID.
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl BroadcastManager {
    /// Create a new broadcast manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Remove a connection by ID.
    pub async fn remove(&self, connection_id: &ConnectionId) {
        let mut conns = self.connections.write().await;
        let _ = conns.remove(connection_id);
    }

    /// Broadcast an event to every connection in the given session's room.
    pub async fn broadcast_to_room(&self, session_id: &SessionId, event: &ServerEvent) {
        let json = match serde_json::to_string(event) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event = event.name(), error = %e, "failed to serialize event");
                return;
            }
        };
        let conns = self.connections.read().await;
        let mut recipients = 0usize;
        for conn in conns.values() {
            if conn.room().as_ref() == Some(session_id) {
                recipients += 1;
                if !conn.send(json.clone()) {
                    counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                    warn!(conn_id = %conn.id, session_id = %session_id, "dropped frame for slow client");
                }
            }
        }
        debug!(
            event = event.name(),
            session_id = %session_id,
            recipients,
            "broadcast event to room"
        );
    }

    /// Number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Number of connections in a session's room.
    ///
    /// This is the capacity check used at join time: membership is tracked
    /// by the transport, not by the session record.
    pub async fn room_size(&self, session_id: &SessionId) -> usize {
        let conns = self.connections.read().await;
        conns
            .values()
            .filter(|c| c.room().as_ref() == Some(session_id))
            .count()
    }

    /// Get connections in a specific session's room.
    pub async fn room_connections(&self, session_id: &SessionId) -> Vec<Arc<ClientConnection>> {
        let conns = self.connections.read().await;
        conns
            .values()
            .filter(|c| c.room().as_ref() == Some(session_id))
            .cloned()
            .collect()
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}
