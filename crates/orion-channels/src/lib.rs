//! Persistent text channel between the client and the agent backend.
//!
//! Provides the [`TextChannel`] seam the rest of the client talks to, the
//! WebSocket-backed [`ConnectionManager`] that implements it, and the wire
//! frames exchanged over the socket.
//!
//! # Main types
//!
//! - [`TextChannel`] — Connect, send, disconnect and subscribe to typed events.
//! - [`ChannelEvent`] — Typed events emitted by a channel.
//! - [`ConnectionManager`] — At most one live WebSocket per manager.
//! - [`ChannelConfig`] — Endpoint settings for the manager.
//! - [`ExchangeGate`] — One request/reply exchange on the channel at a time.

/// Channel trait, handle and event types.
pub mod channel;
/// JSON wire frames.
pub mod frame;
/// Ownership of the channel's next reply.
pub mod gate;
/// WebSocket connection manager.
pub mod manager;

pub use channel::{ChannelEvent, ChannelHandle, TextChannel};
pub use frame::{parse_frame, ClientFrame};
pub use gate::{ExchangeGate, ExchangePermit};
pub use manager::{ChannelConfig, ConnectionManager};
