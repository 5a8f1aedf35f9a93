use crate::channel::{ChannelEvent, ChannelHandle, TextChannel};
use crate::frame::{parse_frame, ClientFrame};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use orion_core::{OrionError, OrionResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Endpoint settings for a [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Base WebSocket URL, e.g. `ws://localhost:3000`.
    pub ws_url: String,
    /// Path appended to the base URL, e.g. `/voice`.
    pub namespace: String,
    /// Capacity of the event broadcast buffer.
    pub event_capacity: usize,
}

impl ChannelConfig {
    /// Create a config for the given base URL and namespace.
    pub fn new(ws_url: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            namespace: namespace.into(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Full endpoint URL for a session. The id is percent-encoded.
    pub fn endpoint(&self, session_id: &str) -> String {
        let base = self.ws_url.trim_end_matches('/');
        let namespace = self.namespace.trim_matches('/');
        let session_id = urlencoding::encode(session_id);
        if namespace.is_empty() {
            format!("{base}/?sessionId={session_id}")
        } else {
            format!("{base}/{namespace}?sessionId={session_id}")
        }
    }
}

struct LiveChannel {
    handle: ChannelHandle,
    outbound: mpsc::UnboundedSender<ClientFrame>,
    connected: Arc<AtomicBool>,
}

/// Owns at most one live WebSocket to the agent backend.
///
/// The manager is an ordinary value: construct one per session page, share it
/// behind an `Arc`, and drop it (or call [`TextChannel::disconnect`]) when the
/// page goes away. Events from the socket are fanned out on a broadcast
/// channel so the timeline and the voice bridge can both observe them.
pub struct ConnectionManager {
    config: ChannelConfig,
    events: broadcast::Sender<ChannelEvent>,
    live: Mutex<Option<LiveChannel>>,
    connect_lock: tokio::sync::Mutex<()>,
}

impl ConnectionManager {
    /// Create a disconnected manager.
    pub fn new(config: ChannelConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Arc::new(Self {
            config,
            events,
            live: Mutex::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Handle of the live channel, if any.
    pub fn handle(&self) -> Option<ChannelHandle> {
        self.live
            .lock()
            .as_ref()
            .filter(|live| live.connected.load(Ordering::SeqCst))
            .map(|live| live.handle.clone())
    }

    fn emit(events: &broadcast::Sender<ChannelEvent>, event: ChannelEvent) {
        // No subscribers is fine; nobody is rendering yet.
        let _ = events.send(event);
    }
}

#[async_trait]
impl TextChannel for ConnectionManager {
    async fn connect(&self, session_id: &str, token: &str) -> OrionResult<ChannelHandle> {
        let _guard = self.connect_lock.lock().await;

        if let Some(handle) = self.handle() {
            if handle.session_id != session_id {
                warn!(
                    live = %handle.session_id,
                    requested = %session_id,
                    "Channel is live for another session"
                );
                return Err(OrionError::Channel(format!(
                    "Channel is already live for session '{}'",
                    handle.session_id
                )));
            }
            debug!(connection_id = %handle.id, "Channel already live, reusing");
            return Ok(handle);
        }
        // Drop any dead channel left behind by a remote close.
        self.live.lock().take();

        let url = self.config.endpoint(session_id);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| OrionError::Channel(format!("Invalid channel URL '{url}': {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| OrionError::Channel(format!("Invalid auth token: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (ws_stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| OrionError::Channel(format!("Connect to {url} failed: {e}")))?;
        let (mut write, mut read) = ws_stream.split();

        let handle = ChannelHandle {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
        };
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let connected = Arc::new(AtomicBool::new(true));

        // Announce before the reader can emit anything.
        Self::emit(&self.events, ChannelEvent::Connected);
        info!(connection_id = %handle.id, session_id = %session_id, "Channel connected");

        let events = self.events.clone();
        let flag = connected.clone();
        let connection_id = handle.id;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outbound = outbound_rx.recv() => match outbound {
                        Some(frame) => {
                            let json = match serde_json::to_string(&frame) {
                                Ok(json) => json,
                                Err(e) => {
                                    warn!(error = %e, "Failed to encode client frame");
                                    continue;
                                }
                            };
                            if let Err(e) = write.send(Message::Text(json)).await {
                                error!(connection_id = %connection_id, error = %e, "Channel write failed");
                                Self::emit(&events, ChannelEvent::TransportError {
                                    message: Some(e.to_string()),
                                });
                                break;
                            }
                        }
                        None => {
                            // Sender dropped: local disconnect.
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    inbound = read.next() => match inbound {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(event) = parse_frame(&text) {
                                Self::emit(&events, event);
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!(connection_id = %connection_id, "Channel closed by server");
                            break;
                        }
                        Some(Ok(_)) => {} // Ignore ping/pong/binary
                        Some(Err(e)) => {
                            error!(connection_id = %connection_id, error = %e, "Channel read error");
                            Self::emit(&events, ChannelEvent::TransportError {
                                message: Some(e.to_string()),
                            });
                            break;
                        }
                    },
                }
            }
            flag.store(false, Ordering::SeqCst);
            Self::emit(&events, ChannelEvent::Disconnected);
        });

        *self.live.lock() = Some(LiveChannel {
            handle: handle.clone(),
            outbound: outbound_tx,
            connected,
        });

        Ok(handle)
    }

    fn send(&self, text: &str) {
        let live = self.live.lock();
        match live.as_ref() {
            Some(live) if live.connected.load(Ordering::SeqCst) => {
                if live.outbound.send(ClientFrame::text_input(text)).is_err() {
                    debug!("Channel task gone, text dropped");
                }
            }
            _ => debug!("Send on disconnected channel dropped"),
        }
    }

    fn disconnect(&self) {
        if let Some(live) = self.live.lock().take() {
            live.connected.store(false, Ordering::SeqCst);
            info!(connection_id = %live.handle.id, "Channel disconnect requested");
            // Dropping `live.outbound` makes the socket task close and exit.
        }
    }

    fn is_connected(&self) -> bool {
        self.handle().is_some()
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_formatting() {
        let config = ChannelConfig::new("ws://localhost:3000/", "/voice");
        assert_eq!(config.endpoint("abc"), "ws://localhost:3000/voice?sessionId=abc");

        let bare = ChannelConfig::new("ws://host", "");
        assert_eq!(bare.endpoint("s"), "ws://host/?sessionId=s");
    }

    #[test]
    fn test_endpoint_encodes_session_id() {
        let config = ChannelConfig::new("ws://localhost:3000", "/voice");
        assert_eq!(
            config.endpoint("a b&c=d"),
            "ws://localhost:3000/voice?sessionId=a%20b%26c%3Dd"
        );
    }

    #[test]
    fn test_fresh_manager_is_disconnected() {
        let manager = ConnectionManager::new(ChannelConfig::new("ws://127.0.0.1:1", "/voice"));
        assert!(!manager.is_connected());
        assert!(manager.handle().is_none());
        // Both are no-ops without a live channel.
        manager.send("ignored");
        manager.disconnect();
        manager.disconnect();
        assert!(!manager.is_connected());
    }
}
