//! # tavern-server
//!
//! Axum HTTP + `WebSocket` relay server for Tavern game sessions.
//!
//! - HTTP endpoints: health check, Prometheus metrics
//! - `WebSocket` gateway: connection management, heartbeat, event dispatch
//! - Relay domain: session registry, room broadcast, completion bridge
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod health;
pub mod metrics;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod websocket;
