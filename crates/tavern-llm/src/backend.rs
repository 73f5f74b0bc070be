//! Core abstraction for text-completion backends.
//!
//! Every backend implements [`CompletionBackend`]: one message in, one reply
//! out, with an opaque continuation token threading conversational context
//! between calls. The relay owns the token; backends only mint the next one.

use async_trait::async_trait;

/// Result type alias for backend operations.
pub type CompletionResult<T> = Result<T, CompletionError>;

/// A successful exchange with the completion service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionOutcome {
    /// The reply text to append to the session log.
    pub reply: String,
    /// Token the next request must carry to continue this conversation.
    pub continuation: String,
}

/// Errors that can occur during a completion exchange.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Service returned a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description extracted from the body.
        message: String,
    },

    /// Service answered successfully but produced no reply text.
    #[error("completion service returned an empty reply")]
    EmptyReply,
}

impl CompletionError {
    /// Whether the failure was a request timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }

    /// Error category string for logs and metric labels.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Json(_) => "parse",
            Self::Api { .. } => "api",
            Self::EmptyReply => "empty_reply",
        }
    }
}

/// Request/reply completion backend.
///
/// Implementors must be `Send + Sync` for use across async tasks. Callers are
/// responsible for serializing calls that share a continuation token; the
/// backend itself is stateless.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Exchange one message for one reply.
    ///
    /// `continuation` is the token returned by the previous exchange in the
    /// same conversation, or `None` for the first exchange.
    async fn complete(
        &self,
        text: &str,
        continuation: Option<&str>,
    ) -> CompletionResult<CompletionOutcome>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
