use async_trait::async_trait;
use orion_core::OrionResult;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Identifies one live channel. A second `connect` on an already-live
/// channel hands back the same handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHandle {
    /// Local identifier of the underlying connection.
    pub id: Uuid,
    /// Session the channel was opened for.
    pub session_id: String,
}

/// Typed events emitted by a [`TextChannel`], delivered in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The transport is up.
    Connected,
    /// The transport went away (closed by either side, or failed).
    Disconnected,
    /// The server acknowledged the session (`connected` frame).
    SessionAcknowledged(serde_json::Value),
    /// A streamed fragment of the in-flight reply.
    PartialToken {
        /// Fragment text.
        text: String,
    },
    /// The in-flight reply is complete.
    ReplyComplete {
        /// Whole reply text as the server assembled it.
        full_text: String,
    },
    /// A non-streaming reply.
    Reply {
        /// Reply text.
        text: String,
    },
    /// Raw agent response payload; informational only.
    AgentResponse(serde_json::Value),
    /// A server-reported or socket-level error.
    TransportError {
        /// Human-readable message, when the server sent one.
        message: Option<String>,
    },
    /// The server renamed the session.
    SessionRenamed {
        /// Renamed session.
        session_id: String,
        /// New display name.
        name: String,
    },
}

/// A persistent bidirectional text channel scoped to one session.
///
/// Implementations must keep at most one live connection and deliver events
/// in the order they were received.
#[async_trait]
pub trait TextChannel: Send + Sync {
    /// Open the channel, or return the live handle if already connected.
    async fn connect(&self, session_id: &str, token: &str) -> OrionResult<ChannelHandle>;

    /// Submit user text. Fire-and-forget: dropped silently when not connected.
    fn send(&self, text: &str);

    /// Tear the channel down. Safe to call repeatedly.
    fn disconnect(&self);

    /// Whether a live connection exists right now.
    fn is_connected(&self) -> bool;

    /// Subscribe to events emitted after this call.
    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent>;
}
