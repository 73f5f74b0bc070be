//! Relay domain: sessions, the registry, the completion bridge, and the
//! event router that ties them to the transport.

pub mod bridge;
pub mod registry;
pub mod router;
pub mod session;

pub use bridge::CompletionBridge;
pub use registry::SessionRegistry;
pub use router::RelayContext;
pub use session::Session;
