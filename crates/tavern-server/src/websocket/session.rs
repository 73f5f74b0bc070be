//! WebSocket session lifecycle, from upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use tavern_core::{ConnectionId, ServerEvent};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use super::broadcast::BroadcastManager;
use super::connection::ClientConnection;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::relay::{router, RelayContext};

/// Outbound frame buffer per connection. A client that falls this far
/// behind starts losing broadcasts rather than stalling the room.
const SEND_BUFFER: usize = 256;

/// Run a WebSocket session for one connected client.
///
/// 1. Announces the connection with a `connection-established` event
/// 2. Routes incoming text frames through the relay
/// 3. Forwards queued outbound frames from the send channel
/// 4. Pings on an interval and disconnects unresponsive clients
/// 5. Unregisters from the broadcast layer on disconnect
#[instrument(skip_all, fields(conn_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    ctx: Arc<RelayContext>,
    ping_interval: Duration,
    pong_timeout: Duration,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let connection_id = ConnectionId::new();
    let _ = tracing::Span::current().record("conn_id", connection_id.as_str());

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(SEND_BUFFER);
    let connection = Arc::new(ClientConnection::new(connection_id.clone(), send_tx));

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    ctx.broadcast.add(connection.clone()).await;

    // First frame out is always the connection handshake.
    let established = ServerEvent::ConnectionEstablished {
        connection_id: connection_id.clone(),
    };
    if let Ok(json) = serde_json::to_string(&established) {
        let _ = ws_tx.send(Message::Text(json.into())).await;
    }

    // Outbound forwarder with periodic Ping frames.
    let outbound_conn = connection.clone();
    let outbound = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        // Skip the immediate first tick
        let _ = ticker.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    match frame {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!("client unresponsive for {pong_timeout:?}, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    while let Some(Ok(msg)) = ws_rx.next().await {
        let text = match msg {
            Message::Text(ref t) => Some(t.to_string()),
            Message::Binary(ref data) => match std::str::from_utf8(data) {
                Ok(s) => Some(s.to_string()),
                Err(_) => {
                    info!(len = data.len(), "received non-UTF8 binary frame");
                    None
                }
            },
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                None
            }
        };

        let Some(text) = text else { continue };
        router::handle_frame(&text, &connection, &ctx).await;
    }

    info!(dropped = connection.drop_count(), "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    outbound.abort();
    ctx.broadcast.remove(&connection_id).await;
}
