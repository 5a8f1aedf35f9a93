use crate::config::ClientConfig;
use orion_api::ApiClient;
use orion_channels::{ChannelEvent, ExchangeGate, ExchangePermit, TextChannel};
use orion_core::{Message, OrionError, OrionResult};
use orion_session::Timeline;
use orion_voice::{Microphone, VoiceBridge, VoiceDeps, VoiceSdk, VoiceTurn};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Banner when the live channel could not be opened.
pub const CHANNEL_UNAVAILABLE: &str = "Live connection unavailable. Replies will use the fallback path.";
/// Banner when the backend rejected the token.
pub const SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";

/// Controller for one open conversation session.
///
/// Owns the timeline and the event subscription; the channel and the voice
/// bridge are shared collaborators whose lifetime ends with [`Self::close`].
pub struct SessionClient {
    session_id: String,
    api: Arc<ApiClient>,
    channel: Arc<dyn TextChannel>,
    events: broadcast::Receiver<ChannelEvent>,
    timeline: Timeline,
    voice: Option<Arc<VoiceBridge>>,
    voice_turns: Option<mpsc::UnboundedReceiver<VoiceTurn>>,
    /// Shared with the voice bridge; held while a typed exchange is open on
    /// the channel.
    gate: Option<ExchangeGate>,
    exchange: Option<ExchangePermit>,
}

impl SessionClient {
    /// Create a client for `session_id`. Subscribes to channel events at once
    /// so nothing emitted during [`Self::open`] is missed.
    pub fn new(
        session_id: impl Into<String>,
        api: Arc<ApiClient>,
        channel: Arc<dyn TextChannel>,
    ) -> Self {
        let events = channel.subscribe();
        Self {
            session_id: session_id.into(),
            api,
            channel,
            events,
            timeline: Timeline::new(),
            voice: None,
            voice_turns: None,
            gate: None,
            exchange: None,
        }
    }

    /// Session this client is bound to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The assembled timeline.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Dismiss the inline error banner.
    pub fn dismiss_banner(&mut self) {
        self.timeline.dismiss_banner();
    }

    /// Load history, then open the live channel.
    ///
    /// Neither step is fatal: a failed history load leaves the timeline
    /// empty, and a failed connect raises the banner and leaves sends on the
    /// fallback path.
    pub async fn open(&mut self) {
        match self.api.session_history(&self.session_id).await {
            Ok(records) => self.timeline.load_history(&records),
            Err(OrionError::Unauthorized(msg)) => {
                warn!(session_id = %self.session_id, error = %msg, "History rejected, token expired");
                self.timeline.set_banner(SESSION_EXPIRED);
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Failed to load history");
            }
        }

        let Some(token) = self.api.token().map(str::to_string) else {
            warn!("No token configured, live channel disabled");
            self.timeline.set_banner(CHANNEL_UNAVAILABLE);
            return;
        };
        match self.channel.connect(&self.session_id, &token).await {
            Ok(handle) => info!(session_id = %handle.session_id, channel = %handle.id, "Live channel open"),
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Live channel unavailable");
                self.timeline.set_banner(CHANNEL_UNAVAILABLE);
            }
        }
    }

    /// Submit user text.
    ///
    /// Over the live channel the reply arrives later as events. Without a
    /// channel the reply comes from plan-then-execute before this returns;
    /// a failure there becomes an `Error: ...` assistant turn.
    ///
    /// While a voice utterance owns the channel's next reply the send is
    /// refused, so each reply has exactly one owner.
    pub async fn send(&mut self, text: &str) -> OrionResult<Message> {
        let live = self.channel.is_connected();
        let permit = if live && self.timeline.can_send() {
            self.claim_channel()?
        } else {
            None
        };
        let echoed = self.timeline.submit_user(text)?;

        if live {
            self.channel.send(text);
            self.exchange = permit;
            return Ok(echoed);
        }

        debug!(session_id = %self.session_id, "Channel down, using plan-then-execute");
        match self.api.plan_and_execute(&self.session_id, text).await {
            Ok(reply) => {
                self.timeline.complete_exchange(&reply);
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Fallback request failed");
                self.timeline.fail_exchange(&error_text(&e));
            }
        }
        Ok(echoed)
    }

    fn claim_channel(&self) -> OrionResult<Option<ExchangePermit>> {
        match &self.gate {
            Some(gate) => gate.try_claim().map(Some).ok_or_else(|| {
                OrionError::Session("A voice request is still in progress".into())
            }),
            None => Ok(None),
        }
    }

    /// Apply one channel event to the timeline.
    pub fn handle_event(&mut self, event: &ChannelEvent) -> Option<Message> {
        let finalized = self.timeline.apply(event);
        self.release_if_settled();
        finalized
    }

    /// Give the channel back once the typed exchange has an outcome.
    fn release_if_settled(&mut self) {
        if self.exchange.is_some() && self.timeline.can_send() {
            debug!(session_id = %self.session_id, "Typed exchange settled");
            self.exchange = None;
        }
    }

    /// Wait for the next channel event and apply it. Returns the event, or
    /// `None` once the channel's event stream has ended.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => {
                    self.handle_event(&event);
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session client lagged behind the channel");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Apply every event already queued. Returns the messages finalized.
    pub fn drain_events(&mut self) -> Vec<Message> {
        let mut finalized = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => finalized.extend(self.handle_event(&event)),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session client lagged behind the channel");
                }
                Err(_) => break,
            }
        }
        finalized
    }

    // ── Voice ────────────────────────────────────────────────────────────

    /// Build a voice bridge for this session from `config` and attach it.
    ///
    /// The bridge shares this client's channel, and uses the REST client for
    /// provisioning and turn persistence.
    pub fn enable_voice(
        &mut self,
        sdk: Arc<dyn VoiceSdk>,
        microphone: Arc<dyn Microphone>,
        config: &ClientConfig,
    ) -> OrionResult<Arc<VoiceBridge>> {
        let deps = VoiceDeps {
            sdk,
            microphone,
            provisioning: self.api.clone(),
            store: self.api.clone(),
            channel: self.channel.clone(),
        };
        let bridge = VoiceBridge::new(
            deps,
            config.voice.clone(),
            config.voice_identity(),
            Some(self.session_id.clone()),
        )?;
        self.attach_voice(bridge.clone());
        Ok(bridge)
    }

    /// Route a voice bridge's surfaced turns into this timeline and share
    /// its exchange gate for typed input.
    pub fn attach_voice(&mut self, bridge: Arc<VoiceBridge>) {
        self.voice_turns = bridge.take_turns();
        if self.voice_turns.is_none() {
            warn!("Voice turns already claimed elsewhere");
        }
        self.gate = Some(bridge.exchange_gate());
        self.voice = Some(bridge);
    }

    /// The attached voice bridge.
    pub fn voice(&self) -> Option<&Arc<VoiceBridge>> {
        self.voice.as_ref()
    }

    /// Append one voice turn.
    pub fn apply_voice_turn(&mut self, turn: &VoiceTurn) -> Message {
        self.timeline.append_voice(turn.role, &turn.text)
    }

    /// Wait for the next voice turn and append it.
    pub async fn next_voice_turn(&mut self) -> Option<Message> {
        let turn = self.voice_turns.as_mut()?.recv().await?;
        Some(self.apply_voice_turn(&turn))
    }

    /// Append every voice turn already queued.
    pub fn drain_voice_turns(&mut self) -> Vec<Message> {
        let mut turns = Vec::new();
        if let Some(rx) = self.voice_turns.as_mut() {
            while let Ok(turn) = rx.try_recv() {
                turns.push(turn);
            }
        }
        turns.iter().map(|t| self.apply_voice_turn(t)).collect()
    }

    /// Tear down the voice session and the channel.
    pub async fn close(&mut self) {
        if let Some(voice) = self.voice.take() {
            voice.stop().await;
        }
        self.voice_turns = None;
        self.exchange = None;
        self.channel.disconnect();
        info!(session_id = %self.session_id, "Session closed");
    }
}

/// User-facing text of a fallback failure: the server's message when there
/// is one.
fn error_text(error: &OrionError) -> String {
    match error {
        OrionError::Http(msg) | OrionError::Unauthorized(msg) => msg.clone(),
        other => other.to_string(),
    }
}
