//! Core types and error definitions for the Orion conversation client.
//!
//! This crate provides the foundational types shared across all Orion crates,
//! including error handling, conversation turns, and the persisted record
//! shapes the backend hands back on reload.
//!
//! # Main types
//!
//! - [`OrionError`] — Unified error enum for all Orion subsystems.
//! - [`OrionResult`] — Convenience alias for `Result<T, OrionError>`.
//! - [`Role`] — Author of a turn (user or assistant).
//! - [`Message`] — A single turn in a session timeline.
//! - [`MemoryRecord`] — A server-owned historical record, read-only input to reconstruction.
//! - [`TurnRecord`] — The turn-oriented body written through the persistence call.

/// Error type and result alias.
pub mod error;
/// Conversation turns and roles.
pub mod message;
/// Persisted record shapes exchanged with the backend.
pub mod record;

pub use error::{OrionError, OrionResult};
pub use message::{Message, Role};
pub use record::{MemoryRecord, TurnRecord};
