use crate::history::reconstruct;
use chrono::{DateTime, Duration, Utc};
use orion_channels::ChannelEvent;
use orion_core::{MemoryRecord, Message, OrionError, OrionResult, Role};
use tracing::{debug, info, warn};

/// Shown when the server reports an error without a message.
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred";
/// Banner text when the channel drops while a reply is outstanding.
pub const CONNECTION_LOST: &str = "Connection lost. Replies will use the fallback path.";

const ERROR_PREFIX: &str = "⚠️";
const GUARDRAILS: &str = "guardrails";

/// Accumulates the in-flight assistant reply while tokens stream in.
#[derive(Debug, Default, Clone)]
pub struct StreamingBuffer {
    text: String,
    active: bool,
}

impl StreamingBuffer {
    /// Append a fragment and mark the buffer active.
    pub fn push(&mut self, fragment: &str) {
        self.text.push_str(fragment);
        self.active = true;
    }

    /// Whether tokens have arrived for the current reply.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Accumulated text so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Drain the accumulated text and deactivate.
    pub fn take(&mut self) -> String {
        self.active = false;
        std::mem::take(&mut self.text)
    }

    /// Drop any partial text.
    pub fn clear(&mut self) {
        self.active = false;
        self.text.clear();
    }
}

/// A typed exchange awaiting its reply.
#[derive(Debug, Clone, Copy)]
struct Exchange {
    /// The server acknowledged the request or started streaming.
    acknowledged: bool,
}

/// The ordered message view of one session.
///
/// The timeline finalizes channel replies only for exchanges it started with
/// [`Timeline::submit_user`]. Replies to utterances the voice bridge forwarded
/// are delivered by the bridge through [`Timeline::append_voice`], so each
/// turn has exactly one writer.
#[derive(Debug, Default)]
pub struct Timeline {
    messages: Vec<Message>,
    buffer: StreamingBuffer,
    pending: Option<Exchange>,
    connected: bool,
    last_reply: Option<String>,
    banner: Option<String>,
    display_name: Option<String>,
}

impl Timeline {
    /// An empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the head of the timeline with turns rebuilt from history.
    ///
    /// Messages appended before the history arrived are kept after it, in
    /// their original order.
    pub fn load_history(&mut self, records: &[MemoryRecord]) {
        let mut messages = reconstruct(records);
        info!(records = records.len(), turns = messages.len(), "History reconstructed");
        messages.append(&mut self.messages);
        self.messages = messages;
    }

    /// Finalized messages in display order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Whether a new user message may be submitted.
    pub fn can_send(&self) -> bool {
        self.pending.is_none() && !self.buffer.is_active()
    }

    /// Echo a typed user message and open an exchange for its reply.
    pub fn submit_user(&mut self, text: &str) -> OrionResult<Message> {
        if text.trim().is_empty() {
            return Err(OrionError::Session("Message is empty".into()));
        }
        if !self.can_send() {
            return Err(OrionError::Session("A reply is still in progress".into()));
        }
        self.buffer.clear();
        // Suppression only covers the reply of the exchange just closed.
        self.last_reply = None;
        self.pending = Some(Exchange {
            acknowledged: false,
        });
        Ok(self.push(Role::User, text))
    }

    /// Close the outstanding exchange with a reply obtained off-channel
    /// (plan-then-execute).
    pub fn complete_exchange(&mut self, reply: &str) -> Message {
        self.pending = None;
        self.buffer.clear();
        self.last_reply = Some(reply.to_string());
        self.push(Role::Assistant, reply)
    }

    /// Close the outstanding exchange with an error turn.
    pub fn fail_exchange(&mut self, message: &str) -> Message {
        self.pending = None;
        self.buffer.clear();
        self.push(Role::Assistant, &format!("Error: {message}"))
    }

    /// Append a turn delivered by the voice bridge. Does not touch the
    /// exchange state of typed input.
    pub fn append_voice(&mut self, role: Role, text: &str) -> Message {
        self.push(role, text)
    }

    /// Apply one channel event. Returns the message it finalized, if any.
    pub fn apply(&mut self, event: &ChannelEvent) -> Option<Message> {
        match event {
            ChannelEvent::Connected => {
                self.connected = true;
                None
            }
            ChannelEvent::Disconnected => {
                self.connected = false;
                if self.pending.is_some() || self.buffer.is_active() {
                    warn!("Channel lost with a reply outstanding");
                    self.banner = Some(CONNECTION_LOST.to_string());
                    self.pending = None;
                    self.buffer.clear();
                }
                None
            }
            ChannelEvent::SessionAcknowledged(data) => {
                debug!(data = %data, "Session acknowledged");
                None
            }
            ChannelEvent::PartialToken { text } => {
                let exchange = self.pending.as_mut()?;
                exchange.acknowledged = true;
                self.buffer.push(text);
                None
            }
            ChannelEvent::ReplyComplete { full_text } => {
                self.pending.take()?;
                let streamed = self.buffer.take();
                let text = if streamed.is_empty() {
                    full_text.clone()
                } else {
                    streamed
                };
                if text.is_empty() {
                    debug!("Reply completed with no text");
                    return None;
                }
                self.last_reply = Some(text.clone());
                Some(self.push(Role::Assistant, &text))
            }
            ChannelEvent::Reply { text } => {
                if self.buffer.is_active() {
                    return None;
                }
                self.pending.take()?;
                self.last_reply = Some(text.clone());
                Some(self.push(Role::Assistant, text))
            }
            ChannelEvent::AgentResponse(_) => {
                if let Some(exchange) = self.pending.as_mut() {
                    exchange.acknowledged = true;
                }
                None
            }
            ChannelEvent::TransportError { message } => {
                self.pending = None;
                self.buffer.clear();
                let message = message
                    .as_deref()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or(DEFAULT_ERROR_MESSAGE);
                if self.already_reported(message) {
                    debug!(message = %message, "Suppressing error already shown in reply");
                    return None;
                }
                Some(self.push(Role::Assistant, &format!("{ERROR_PREFIX} {message}")))
            }
            ChannelEvent::SessionRenamed { session_id, name } => {
                info!(session_id = %session_id, name = %name, "Session renamed");
                self.display_name = Some(name.clone());
                None
            }
        }
    }

    /// Whether the channel is up, as last reported.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Whether tokens are streaming for the current reply.
    pub fn is_streaming(&self) -> bool {
        self.buffer.is_active()
    }

    /// An exchange is outstanding and nothing has come back yet.
    pub fn is_thinking(&self) -> bool {
        self.pending.is_some_and(|e| !e.acknowledged)
    }

    /// Partial text of the in-flight reply, for rendering.
    pub fn streaming_preview(&self) -> Option<&str> {
        (self.buffer.is_active() && !self.buffer.text().is_empty()).then(|| self.buffer.text())
    }

    /// Current inline error banner.
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    /// Raise the inline error banner.
    pub fn set_banner(&mut self, message: impl Into<String>) {
        self.banner = Some(message.into());
    }

    /// Dismiss the inline error banner.
    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    /// Display name announced by the server, if the session was renamed.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    fn already_reported(&self, message: &str) -> bool {
        message.to_lowercase().contains(GUARDRAILS)
            || self
                .last_reply
                .as_deref()
                .is_some_and(|reply| reply.contains(message))
    }

    fn push(&mut self, role: Role, text: &str) -> Message {
        let message = Message::new(role, text).at(self.next_timestamp());
        self.messages.push(message.clone());
        message
    }

    /// Now, or just after the last message if the clock has not advanced.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.messages.last() {
            Some(last) if now <= last.timestamp => last.timestamp + Duration::microseconds(1),
            _ => now,
        }
    }
}
