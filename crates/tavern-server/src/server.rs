//! `TavernServer` assembles the Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tavern_llm::CompletionBackend;
use tavern_settings::TavernSettings;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::health::{self, HealthResponse};
use crate::relay::{CompletionBridge, RelayContext, SessionRegistry};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Relay context handed to every WebSocket session.
    pub ctx: Arc<RelayContext>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle backing `/metrics`, when installed.
    pub metrics: Option<PrometheusHandle>,
    /// Interval between server Ping frames.
    pub ping_interval: Duration,
    /// How long a silent client survives before disconnect.
    pub pong_timeout: Duration,
    /// Upgrade requests past this connection count are refused.
    pub max_connections: usize,
    /// Per-frame size cap handed to the WebSocket upgrade.
    pub max_message_size: usize,
}

/// The relay server.
pub struct TavernServer {
    host: String,
    port: u16,
    state: AppState,
}

impl TavernServer {
    /// Create a new server from settings and a completion backend.
    pub fn new(settings: &TavernSettings, backend: Arc<dyn CompletionBackend>) -> Self {
        let registry = Arc::new(SessionRegistry::new(&settings.relay));
        let broadcast = Arc::new(BroadcastManager::new());
        let ctx = Arc::new(RelayContext {
            registry,
            bridge: Arc::new(CompletionBridge::new(backend)),
            broadcast,
            room_capacity: settings.relay.room_capacity,
        });

        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            state: AppState {
                ctx,
                shutdown: Arc::new(ShutdownCoordinator::new()),
                start_time: Instant::now(),
                metrics: None,
                ping_interval: Duration::from_secs(settings.server.heartbeat_interval_secs),
                pong_timeout: Duration::from_secs(settings.server.heartbeat_timeout_secs),
                max_connections: settings.server.max_connections,
                max_message_size: settings.server.max_message_size,
            },
        }
    }

    /// Attach a Prometheus handle so `/metrics` serves the recorder output.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.state.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .with_state(self.state.clone())
            .layer(CorsLayer::permissive())
    }

    /// Bind the listener and serve in a background task.
    ///
    /// Returns the bound address (useful with port 0) and the serve task
    /// handle. The task exits when the shutdown coordinator fires.
    pub async fn listen(&self) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind((self.host.as_str(), self.port)).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "server listening");

        let router = self.router();
        let token = self.state.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "server task exited with error");
            }
        });

        Ok((addr, handle))
    }

    /// Get the relay context.
    pub fn ctx(&self) -> &Arc<RelayContext> {
        &self.state.ctx
    }

    /// Get the session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.state.ctx.registry
    }

    /// Get the broadcast manager.
    pub fn broadcast(&self) -> &Arc<BroadcastManager> {
        &self.state.ctx.broadcast
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }
}

/// GET /
async fn root_handler() -> &'static str {
    "Hello World!"
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.ctx.broadcast.connection_count().await;
    let sessions = state.ctx.registry.len();
    Json(health::health_check(state.start_time, connections, sessions))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics {
        Some(handle) => crate::metrics::render(&handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// GET /ws, the WebSocket upgrade.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let connections = state.ctx.broadcast.connection_count().await;
    if connections >= state.max_connections {
        warn!(connections, "connection limit reached, refusing upgrade");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(socket, state.ctx, state.ping_interval, state.pong_timeout)
        })
        .into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
