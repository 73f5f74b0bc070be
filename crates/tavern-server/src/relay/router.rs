//! Inbound event routing.
//!
//! Parses each WebSocket text frame as a [`ClientEvent`] and routes it to
//! the session registry, the completion bridge, or the broadcast layer.
//! Replies go to the originating connection; only `updated-messages` fans
//! out to the whole room.

use std::sync::Arc;

use metrics::counter;
use tavern_core::{ClientEvent, RelayError, ServerEvent, SessionId};
use tracing::{debug, instrument, warn};

use super::bridge::CompletionBridge;
use super::registry::SessionRegistry;
use crate::metrics::{RELAY_ERRORS_TOTAL, RELAY_EVENTS_TOTAL};
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::connection::ClientConnection;

/// Everything the router needs to serve a connection.
pub struct RelayContext {
    /// Session registry.
    pub registry: Arc<SessionRegistry>,
    /// Completion bridge.
    pub bridge: Arc<CompletionBridge>,
    /// Broadcast manager (also the source of room sizes).
    pub broadcast: Arc<BroadcastManager>,
    /// Maximum room membership admitted at join time.
    pub room_capacity: usize,
}

/// Handle one inbound text frame from a client.
///
/// Unparseable frames get an `invalid-payload` reply instead of being
/// silently dropped; everything else dispatches to the matching operation.
#[instrument(skip_all, fields(conn_id = %conn.id, event))]
pub async fn handle_frame(text: &str, conn: &Arc<ClientConnection>, ctx: &RelayContext) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            warn!("unparseable frame received");
            counter!(RELAY_ERRORS_TOTAL, "event" => "unknown", "error" => "invalid_payload")
                .increment(1);
            let _ = conn.send_event(&ServerEvent::InvalidPayload {
                message: format!("invalid payload: {e}"),
            });
            return;
        }
    };

    let _ = tracing::Span::current().record("event", event.name());
    counter!(RELAY_EVENTS_TOTAL, "event" => event.name()).increment(1);
    debug!(event = event.name(), "dispatching event");

    match event {
        ClientEvent::CreateSession => handle_create(conn, ctx),
        ClientEvent::JoinSession {
            session_id,
            player_name,
        } => handle_join(conn, ctx, session_id, player_name).await,
        ClientEvent::RequestMessageLog { session_id } => handle_message_log(conn, ctx, session_id),
        ClientEvent::PostMessage { session_id, text } => {
            handle_post(conn, ctx, session_id, &text).await;
        }
        ClientEvent::StartSession { session_id } => handle_start(conn, ctx, session_id),
    }
}

fn handle_create(conn: &ClientConnection, ctx: &RelayContext) {
    let session = ctx.registry.create();
    let _ = conn.send_event(&ServerEvent::SessionCreated(session.id.clone()));
}

async fn handle_join(
    conn: &Arc<ClientConnection>,
    ctx: &RelayContext,
    session_id: SessionId,
    player_name: Option<String>,
) {
    let Some(session) = ctx.registry.get(&session_id) else {
        reject(conn, "join-session", &RelayError::SessionNotFound(session_id));
        return;
    };

    let room_size = ctx.broadcast.room_size(&session_id).await;
    if room_size >= ctx.room_capacity {
        // Full rooms answer session-not-found on the wire; the real cause
        // survives only here and in metrics.
        reject(
            conn,
            "join-session",
            &RelayError::RoomFull {
                id: session_id,
                capacity: ctx.room_capacity,
            },
        );
        return;
    }

    conn.join_room(session_id.clone());
    let state = session.join(player_name);
    debug!(session_id = %session_id, "connection joined room");
    let _ = conn.send_event(&ServerEvent::SessionJoined(state));
}

fn handle_message_log(conn: &ClientConnection, ctx: &RelayContext, session_id: SessionId) {
    match ctx.registry.get(&session_id) {
        Some(session) => {
            session.touch();
            let _ = conn.send_event(&ServerEvent::MessageLog(session.messages()));
        }
        None => reject(
            conn,
            "request-message-log",
            &RelayError::SessionNotFound(session_id),
        ),
    }
}

async fn handle_post(
    conn: &Arc<ClientConnection>,
    ctx: &RelayContext,
    session_id: SessionId,
    text: &str,
) {
    let Some(session) = ctx.registry.get(&session_id) else {
        reject(conn, "post-message", &RelayError::SessionNotFound(session_id));
        return;
    };

    match ctx.bridge.exchange(&session, text).await {
        Ok(log) => {
            ctx.broadcast
                .broadcast_to_room(&session_id, &ServerEvent::UpdatedMessages(log))
                .await;
        }
        Err(e) => {
            counter!(RELAY_ERRORS_TOTAL, "event" => "post-message", "error" => e.category())
                .increment(1);
            let _ = conn.send_event(&ServerEvent::CompletionFailed {
                session_id,
                message: e.to_string(),
            });
        }
    }
}

fn handle_start(conn: &ClientConnection, ctx: &RelayContext, session_id: SessionId) {
    match ctx.registry.get(&session_id) {
        Some(session) => {
            let _ = conn.send_event(&ServerEvent::SessionStarted(session.start()));
        }
        None => reject(
            conn,
            "start-session",
            &RelayError::SessionNotFound(session_id),
        ),
    }
}

/// Log a relay error and answer the caller with `session-not-found`.
fn reject(conn: &ClientConnection, event: &'static str, error: &RelayError) {
    warn!(session_id = %error.session_id(), code = error.code(), "{error}");
    counter!(RELAY_ERRORS_TOTAL, "event" => event, "error" => error.code()).increment(1);
    let _ = conn.send_event(&ServerEvent::SessionNotFound(error.session_id().clone()));
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tavern_core::ConnectionId;
    use tavern_llm::{CompletionBackend, CompletionError, CompletionOutcome, CompletionResult};
    use tavern_settings::RelaySettings;
    use tokio::sync::mpsc;

    struct EchoBackend;

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        async fn complete(
            &self,
            text: &str,
            continuation: Option<&str>,
        ) -> CompletionResult<CompletionOutcome> {
            Ok(CompletionOutcome {
                reply: format!("reply to {text}"),
                continuation: format!("{}+{text}", continuation.unwrap_or("none")),
            })
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl CompletionBackend for FailingBackend {
        async fn complete(
            &self,
            _text: &str,
            _continuation: Option<&str>,
        ) -> CompletionResult<CompletionOutcome> {
            Err(CompletionError::Api {
                status: 503,
                message: "overloaded".to_owned(),
            })
        }
    }

    fn make_ctx(backend: Arc<dyn CompletionBackend>) -> RelayContext {
        let settings = RelaySettings::default();
        RelayContext {
            registry: Arc::new(SessionRegistry::new(&settings)),
            bridge: Arc::new(CompletionBridge::new(backend)),
            broadcast: Arc::new(BroadcastManager::new()),
            room_capacity: settings.room_capacity,
        }
    }

    fn make_conn(id: &str) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(32);
        (
            Arc::new(ClientConnection::new(ConnectionId::from(id), tx)),
            rx,
        )
    }

    fn recv_event(rx: &mut mpsc::Receiver<Arc<String>>) -> serde_json::Value {
        let frame = rx.try_recv().expect("expected an outbound frame");
        serde_json::from_str(&frame).unwrap()
    }

    async fn join(
        ctx: &RelayContext,
        conn: &Arc<ClientConnection>,
        session_id: &str,
        name: &str,
    ) {
        let frame = serde_json::json!({
            "event": "join-session",
            "data": {"sessionId": session_id, "playerName": name},
        });
        ctx.broadcast.add(conn.clone()).await;
        handle_frame(&frame.to_string(), conn, ctx).await;
    }

    #[tokio::test]
    async fn create_session_replies_with_fresh_id() {
        let ctx = make_ctx(Arc::new(EchoBackend));
        let (conn, mut rx) = make_conn("c1");

        handle_frame(r#"{"event": "create-session"}"#, &conn, &ctx).await;

        let event = recv_event(&mut rx);
        assert_eq!(event["event"], "session-created");
        let id = SessionId::from(event["data"].as_str().unwrap());
        assert!(ctx.registry.get(&id).is_some());
    }

    #[tokio::test]
    async fn two_creates_yield_distinct_ids() {
        let ctx = make_ctx(Arc::new(EchoBackend));
        let (conn, mut rx) = make_conn("c1");

        handle_frame(r#"{"event": "create-session"}"#, &conn, &ctx).await;
        handle_frame(r#"{"event": "create-session"}"#, &conn, &ctx).await;

        let first = recv_event(&mut rx)["data"].as_str().unwrap().to_owned();
        let second = recv_event(&mut rx)["data"].as_str().unwrap().to_owned();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn join_known_session_returns_state_and_binds_room() {
        let ctx = make_ctx(Arc::new(EchoBackend));
        let session = ctx.registry.create();
        let (conn, mut rx) = make_conn("c1");

        join(&ctx, &conn, session.id.as_str(), "Alice").await;

        let event = recv_event(&mut rx);
        assert_eq!(event["event"], "session-joined");
        assert_eq!(event["data"]["players"][0], "Alice");
        assert_eq!(conn.room().unwrap(), session.id);
        assert_eq!(ctx.broadcast.room_size(&session.id).await, 1);
    }

    #[tokio::test]
    async fn join_unknown_session_returns_not_found() {
        let ctx = make_ctx(Arc::new(EchoBackend));
        let (conn, mut rx) = make_conn("c1");

        join(&ctx, &conn, "missing", "Alice").await;

        let event = recv_event(&mut rx);
        assert_eq!(event["event"], "session-not-found");
        assert_eq!(event["data"], "missing");
        assert!(conn.room().is_none());
    }

    #[tokio::test]
    async fn join_full_room_answers_not_found() {
        let ctx = make_ctx(Arc::new(EchoBackend));
        let session = ctx.registry.create();

        let mut members = Vec::new();
        for i in 0..4 {
            let (conn, rx) = make_conn(&format!("member-{i}"));
            join(&ctx, &conn, session.id.as_str(), &format!("P{i}")).await;
            members.push((conn, rx));
        }

        let (late, mut late_rx) = make_conn("late");
        join(&ctx, &late, session.id.as_str(), "Eve").await;

        let event = recv_event(&mut late_rx);
        assert_eq!(event["event"], "session-not-found");
        assert!(late.room().is_none());
        // The session record never saw the rejected player.
        assert_eq!(session.state().players.len(), 4);
    }

    #[tokio::test]
    async fn message_log_returns_full_log() {
        let ctx = make_ctx(Arc::new(EchoBackend));
        let session = ctx.registry.create();
        let _ = session.join(Some("Alice".to_owned()));
        let (conn, mut rx) = make_conn("c1");

        let frame = serde_json::json!({
            "event": "request-message-log",
            "data": {"sessionId": session.id.as_str()},
        });
        handle_frame(&frame.to_string(), &conn, &ctx).await;

        let event = recv_event(&mut rx);
        assert_eq!(event["event"], "message-log");
        let log = event["data"].as_array().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1]["text"], "Alice has joined the game!");
    }

    #[tokio::test]
    async fn message_log_for_unknown_session_returns_not_found() {
        let ctx = make_ctx(Arc::new(EchoBackend));
        let (conn, mut rx) = make_conn("c1");

        let frame = serde_json::json!({
            "event": "request-message-log",
            "data": {"sessionId": "gone"},
        });
        handle_frame(&frame.to_string(), &conn, &ctx).await;

        assert_eq!(recv_event(&mut rx)["event"], "session-not-found");
    }

    #[tokio::test]
    async fn start_session_enables_sending() {
        let ctx = make_ctx(Arc::new(EchoBackend));
        let session = ctx.registry.create();
        let (conn, mut rx) = make_conn("c1");

        let frame = serde_json::json!({
            "event": "start-session",
            "data": {"sessionId": session.id.as_str()},
        });
        handle_frame(&frame.to_string(), &conn, &ctx).await;

        let event = recv_event(&mut rx);
        assert_eq!(event["event"], "session-started");
        assert_eq!(event["data"]["hasStarted"], true);
        assert_eq!(event["data"]["allowMessageSending"], true);
    }

    #[tokio::test]
    async fn start_unknown_session_returns_not_found() {
        let ctx = make_ctx(Arc::new(EchoBackend));
        let (conn, mut rx) = make_conn("c1");

        let frame = serde_json::json!({
            "event": "start-session",
            "data": {"sessionId": "gone"},
        });
        handle_frame(&frame.to_string(), &conn, &ctx).await;

        assert_eq!(recv_event(&mut rx)["event"], "session-not-found");
    }

    #[tokio::test]
    async fn post_message_broadcasts_updated_log_to_room() {
        let ctx = make_ctx(Arc::new(EchoBackend));
        let session = ctx.registry.create();

        let (alice, mut alice_rx) = make_conn("alice");
        let (bob, mut bob_rx) = make_conn("bob");
        join(&ctx, &alice, session.id.as_str(), "Alice").await;
        join(&ctx, &bob, session.id.as_str(), "Bob").await;
        let _ = recv_event(&mut alice_rx);
        let _ = recv_event(&mut bob_rx);

        let frame = serde_json::json!({
            "event": "post-message",
            "data": {"sessionId": session.id.as_str(), "text": "hello"},
        });
        handle_frame(&frame.to_string(), &alice, &ctx).await;

        // Both room members get the same updated log.
        for rx in [&mut alice_rx, &mut bob_rx] {
            let event = recv_event(rx);
            assert_eq!(event["event"], "updated-messages");
            let log = event["data"].as_array().unwrap();
            // welcome, Alice joined, Bob joined, AI reply
            assert_eq!(log.len(), 4);
            assert_eq!(log[3]["isFromAI"], true);
            assert_eq!(log[3]["text"], "reply to hello");
        }
    }

    #[tokio::test]
    async fn post_message_appends_exactly_one_entry() {
        let ctx = make_ctx(Arc::new(EchoBackend));
        let session = ctx.registry.create();
        let (conn, mut rx) = make_conn("c1");
        join(&ctx, &conn, session.id.as_str(), "Alice").await;
        let _ = recv_event(&mut rx);

        let before = session.messages().len();
        let frame = serde_json::json!({
            "event": "post-message",
            "data": {"sessionId": session.id.as_str(), "text": "hi"},
        });
        handle_frame(&frame.to_string(), &conn, &ctx).await;

        assert_eq!(session.messages().len(), before + 1);
    }

    #[tokio::test]
    async fn post_to_unknown_session_returns_not_found() {
        let ctx = make_ctx(Arc::new(EchoBackend));
        let (conn, mut rx) = make_conn("c1");

        let frame = serde_json::json!({
            "event": "post-message",
            "data": {"sessionId": "gone", "text": "hi"},
        });
        handle_frame(&frame.to_string(), &conn, &ctx).await;

        assert_eq!(recv_event(&mut rx)["event"], "session-not-found");
    }

    #[tokio::test]
    async fn backend_failure_reports_completion_failed() {
        let ctx = make_ctx(Arc::new(FailingBackend));
        let session = ctx.registry.create();
        let (conn, mut rx) = make_conn("c1");
        join(&ctx, &conn, session.id.as_str(), "Alice").await;
        let _ = recv_event(&mut rx);

        let frame = serde_json::json!({
            "event": "post-message",
            "data": {"sessionId": session.id.as_str(), "text": "hi"},
        });
        handle_frame(&frame.to_string(), &conn, &ctx).await;

        let event = recv_event(&mut rx);
        assert_eq!(event["event"], "completion-failed");
        assert_eq!(event["data"]["sessionId"], session.id.as_str());
        assert!(event["data"]["message"].as_str().unwrap().contains("503"));
        // Log untouched: welcome + join announcement only.
        assert_eq!(session.messages().len(), 2);
        assert!(session.continuation().is_none());
    }

    #[tokio::test]
    async fn unparseable_frame_gets_invalid_payload() {
        let ctx = make_ctx(Arc::new(EchoBackend));
        let (conn, mut rx) = make_conn("c1");

        handle_frame("not json", &conn, &ctx).await;

        let event = recv_event(&mut rx);
        assert_eq!(event["event"], "invalid-payload");
        assert!(event["data"]["message"].as_str().unwrap().len() > 0);
    }

    #[tokio::test]
    async fn unknown_event_name_gets_invalid_payload() {
        let ctx = make_ctx(Arc::new(EchoBackend));
        let (conn, mut rx) = make_conn("c1");

        handle_frame(r#"{"event": "delete-session", "data": {}}"#, &conn, &ctx).await;

        assert_eq!(recv_event(&mut rx)["event"], "invalid-payload");
    }
}
