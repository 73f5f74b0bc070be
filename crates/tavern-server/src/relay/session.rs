//! A single relay session: message log, membership, lifecycle flags, and
//! the continuation token threading the AI conversation.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tavern_core::{Message, SessionId, SessionState};
use tavern_llm::CompletionOutcome;
use tokio::sync::MutexGuard;

/// Mutable session state, guarded by the session's sync lock.
struct SessionInner {
    messages: Vec<Message>,
    has_started: bool,
    allow_message_sending: bool,
    players: Vec<String>,
    continuation: Option<String>,
    last_activity: Instant,
}

/// A relay session (room).
///
/// Synchronous mutations (join, start, log reads) go through an internal
/// `parking_lot` mutex and never block the executor. The completion exchange
/// is the one suspending operation; callers serialize it per session via
/// [`lock_exchange`](Session::lock_exchange) so a second post cannot start
/// until the first has committed its continuation token.
pub struct Session {
    /// Unique session ID.
    pub id: SessionId,
    inner: Mutex<SessionInner>,
    exchange: tokio::sync::Mutex<()>,
}

impl Session {
    /// Create a session seeded with a system welcome message.
    #[must_use]
    pub fn new(welcome_message: &str) -> Self {
        Self {
            id: SessionId::new(),
            inner: Mutex::new(SessionInner {
                messages: vec![Message::system(welcome_message)],
                has_started: false,
                allow_message_sending: false,
                players: Vec::new(),
                continuation: None,
                last_activity: Instant::now(),
            }),
            exchange: tokio::sync::Mutex::new(()),
        }
    }

    /// Add a player and announce the join in the log.
    ///
    /// When `name` is absent the player is assigned `Player N` by join
    /// order. Joining never resets the started flags; a session that has
    /// started stays started when a new player arrives.
    pub fn join(&self, name: Option<String>) -> SessionState {
        let mut inner = self.inner.lock();
        let name = name.unwrap_or_else(|| format!("Player {}", inner.players.len() + 1));
        inner
            .messages
            .push(Message::system(format!("{name} has joined the game!")));
        inner.players.push(name);
        inner.last_activity = Instant::now();
        snapshot(&inner)
    }

    /// Start the session, enabling message exchange. Idempotent.
    pub fn start(&self) -> SessionState {
        let mut inner = self.inner.lock();
        inner.has_started = true;
        inner.allow_message_sending = true;
        inner.last_activity = Instant::now();
        snapshot(&inner)
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> SessionState {
        snapshot(&self.inner.lock())
    }

    /// Full message log, in insertion order.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.inner.lock().messages.clone()
    }

    /// The most recent log entry.
    #[must_use]
    pub fn latest_message(&self) -> Option<Message> {
        self.inner.lock().messages.last().cloned()
    }

    /// Append a message to the log and return it. Never fails.
    pub fn append_message(&self, message: Message) -> Message {
        let mut inner = self.inner.lock();
        inner.messages.push(message.clone());
        inner.last_activity = Instant::now();
        message
    }

    /// The continuation token committed by the last successful exchange.
    #[must_use]
    pub fn continuation(&self) -> Option<String> {
        self.inner.lock().continuation.clone()
    }

    /// Acquire the per-session exchange lock.
    ///
    /// Held across the completion backend call so concurrent posts to the
    /// same session are serialized and cannot interleave their tokens.
    pub async fn lock_exchange(&self) -> MutexGuard<'_, ()> {
        self.exchange.lock().await
    }

    /// Commit a successful exchange: append the AI reply, store the new
    /// continuation token, and return the full updated log.
    pub fn commit_exchange(&self, outcome: CompletionOutcome) -> Vec<Message> {
        let mut inner = self.inner.lock();
        inner.messages.push(Message::ai(outcome.reply));
        inner.continuation = Some(outcome.continuation);
        inner.last_activity = Instant::now();
        inner.messages.clone()
    }

    /// Record activity on this session (used by read-only operations).
    pub fn touch(&self) {
        self.inner.lock().last_activity = Instant::now();
    }

    /// Time since the last activity.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.inner.lock().last_activity.elapsed()
    }
}

fn snapshot(inner: &SessionInner) -> SessionState {
    SessionState {
        has_started: inner.has_started,
        allow_message_sending: inner.allow_message_sending,
        players: inner.players.clone(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
