//! Bridge between a session and the completion backend.
//!
//! One exchange = one backend call. The bridge holds the session's exchange
//! lock across the await, reads the continuation token only after the lock
//! is acquired, and commits the reply and new token atomically on success.
//! A failed exchange leaves the log and token untouched.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tavern_core::Message;
use tavern_llm::{CompletionBackend, CompletionError};
use tracing::{debug, instrument, warn};

use super::session::Session;
use crate::metrics::{COMPLETION_REQUESTS_TOTAL, COMPLETION_REQUEST_DURATION_SECONDS};

/// Forwards posted messages to the completion backend, one at a time per
/// session.
pub struct CompletionBridge {
    backend: Arc<dyn CompletionBackend>,
}

impl CompletionBridge {
    /// Create a bridge over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Exchange one posted message for an AI reply.
    ///
    /// Returns the full updated message log on success.
    ///
    /// # Errors
    ///
    /// Returns the backend's error unchanged; the session log and
    /// continuation token are not modified on failure.
    #[instrument(skip_all, fields(session_id = %session.id))]
    pub async fn exchange(
        &self,
        session: &Session,
        text: &str,
    ) -> Result<Vec<Message>, CompletionError> {
        let _guard = session.lock_exchange().await;

        // Read the token only after the lock is held, so a concurrent
        // exchange cannot slip its commit in between.
        let continuation = session.continuation();

        let start = Instant::now();
        let result = self.backend.complete(text, continuation.as_deref()).await;
        histogram!(COMPLETION_REQUEST_DURATION_SECONDS).record(start.elapsed().as_secs_f64());

        match result {
            Ok(outcome) => {
                counter!(COMPLETION_REQUESTS_TOTAL, "outcome" => "ok").increment(1);
                debug!(token = %outcome.continuation, "exchange committed");
                Ok(session.commit_exchange(outcome))
            }
            Err(e) => {
                counter!(COMPLETION_REQUESTS_TOTAL, "outcome" => e.category()).increment(1);
                warn!(error = %e, category = e.category(), "exchange failed");
                Err(e)
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
