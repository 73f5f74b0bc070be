//! # tavern-core
//!
//! Foundation types, errors, branded IDs, and wire events for the Tavern relay.
//!
//! This crate provides the shared vocabulary that all other Tavern crates
//! depend on:
//!
//! - **Branded IDs**: `SessionId`, `ConnectionId` as newtypes for type safety
//! - **Messages**: the chat log entry shared between clients and the relay
//! - **Wire events**: `ClientEvent` / `ServerEvent` tagged JSON envelopes
//! - **Errors**: `RelayError` hierarchy via `thiserror`
//! - **Logging**: `tracing` subscriber initialization

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;
pub mod messages;

pub use errors::RelayError;
pub use events::{ClientEvent, ServerEvent};
pub use ids::{ConnectionId, SessionId};
pub use messages::{Message, SessionState};
