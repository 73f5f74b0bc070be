//! WebSocket connection management, heartbeat, and room broadcasting.

pub mod broadcast;
pub mod connection;
pub mod session;
