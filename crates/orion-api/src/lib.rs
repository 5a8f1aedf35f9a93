//! REST boundary of the agent platform as the Orion client consumes it.
//!
//! # Main types
//!
//! - [`ApiClient`] — Bearer-token HTTP client for the backend endpoints.
//! - [`TurnStore`] — Persistence adapter: durably record one turn.
//! - [`VoiceProvisioning`] — Voice agent config and session system prompt.

/// Adapter traits the voice bridge and session client depend on.
pub mod adapter;
/// HTTP client implementation.
pub mod client;
/// Request and response payloads.
pub mod types;

pub use adapter::{TurnStore, VoiceProvisioning};
pub use client::{ApiClient, PROCESSED_ACK};
pub use types::{SessionSummary, StepResult, VoiceAgentConfig, VoicePrompt};
