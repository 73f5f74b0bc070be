//! # tavern-llm
//!
//! Text-completion backend for the Tavern relay.
//!
//! The relay treats the completion service as an opaque request/reply
//! dependency behind the [`CompletionBackend`] trait. The production
//! implementation, [`HttpCompletionBackend`], talks to an OpenAI-compatible
//! Responses API over HTTPS; tests substitute scripted stubs.

#![deny(unsafe_code)]

pub mod backend;
pub mod http;

pub use backend::{CompletionBackend, CompletionError, CompletionOutcome, CompletionResult};
pub use http::HttpCompletionBackend;
