//! In-memory session registry with idle eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use parking_lot::RwLock;
use tavern_core::SessionId;
use tavern_settings::RelaySettings;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::session::Session;
use crate::metrics::{SESSIONS_ACTIVE, SESSIONS_EVICTED_TOTAL};

/// Creates, looks up, and evicts sessions.
///
/// Sessions live in memory only. A background sweeper removes sessions idle
/// longer than the configured TTL so an abandoned process does not grow
/// without bound.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    ttl: Duration,
    welcome_message: String,
}

impl SessionRegistry {
    /// Create a registry from relay settings.
    #[must_use]
    pub fn new(settings: &RelaySettings) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: Duration::from_secs(settings.session_ttl_secs),
            welcome_message: settings.welcome_message.clone(),
        }
    }

    /// Allocate a new session and insert it under its fresh ID.
    pub fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new(&self.welcome_message));
        let id = session.id.clone();
        let _ = self.sessions.write().insert(id.clone(), session.clone());
        gauge!(SESSIONS_ACTIVE).increment(1.0);
        debug!(session_id = %id, "session created");
        session
    }

    /// Look up a session by ID.
    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether the registry holds no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Remove every session idle longer than the TTL. Returns the count.
    pub fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|id, session| {
            let keep = session.idle_for() < self.ttl;
            if !keep {
                info!(session_id = %id, "evicting idle session");
            }
            keep
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            counter!(SESSIONS_EVICTED_TOTAL).increment(evicted as u64);
            gauge!(SESSIONS_ACTIVE).decrement(evicted as f64);
        }
        evicted
    }

    /// Spawn the background eviction sweeper.
    ///
    /// Runs until the cancellation token fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Skip the immediate first tick
            let _ = ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = registry.evict_idle();
                        if evicted > 0 {
                            info!(evicted, "idle sweep complete");
                        }
                    }
                    () = token.cancelled() => break,
                }
            }
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
