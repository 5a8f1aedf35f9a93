use crate::classify::IntentClassifier;
use crate::config::VoiceConfig;
use crate::correlate::{await_reply, TOOL_TIMEOUT_REPLY};
use crate::markers::MarkerStripper;
use crate::sdk::{CaptureStream, Microphone, SessionOverrides, Utterance, VoiceSdk, VoiceSdkEvent};
use crate::state::{Transition, VoiceState};
use orion_api::{TurnStore, VoiceProvisioning};
use orion_channels::{ExchangeGate, TextChannel};
use orion_core::{OrionError, OrionResult, Role, TurnRecord};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const FALLBACK_FIRST_NAME: &str = "there";

/// Collaborators the bridge drives.
pub struct VoiceDeps {
    /// Third-party spoken-dialogue SDK.
    pub sdk: Arc<dyn VoiceSdk>,
    /// Audio capture.
    pub microphone: Arc<dyn Microphone>,
    /// Voice config and prompt endpoints.
    pub provisioning: Arc<dyn VoiceProvisioning>,
    /// Turn persistence.
    pub store: Arc<dyn TurnStore>,
    /// Text channel used for tool-requiring utterances.
    pub channel: Arc<dyn TextChannel>,
}

/// Who is talking, as far as the backend is concerned.
#[derive(Debug, Clone, Default)]
pub struct VoiceIdentity {
    /// Bearer token for the text channel.
    pub token: Option<String>,
    /// Full display name of the user.
    pub user_name: Option<String>,
}

impl VoiceIdentity {
    /// First word of the user's name, or `there`.
    pub fn first_name(&self) -> &str {
        self.user_name
            .as_deref()
            .and_then(|name| name.split_whitespace().next())
            .unwrap_or(FALLBACK_FIRST_NAME)
    }
}

/// A turn the bridge surfaced, for the voice panel and the owning page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceTurn {
    /// Speaker.
    pub role: Role,
    /// Display text.
    pub text: String,
}

enum Forwarded {
    Reply(String),
    /// Dropped on purpose (no token, or torn down while waiting).
    Abandoned,
    /// No channel; handle the utterance directly instead.
    Unavailable,
}

#[derive(Default)]
struct Inner {
    session_id: Option<String>,
    capture: Option<Box<dyn CaptureStream>>,
    sdk_live: bool,
    pending: Vec<(Role, String)>,
    transcript: Vec<VoiceTurn>,
    last_error: Option<String>,
}

/// Owns one voice session for one conversation.
///
/// Utterances are handled one at a time. A user utterance that matches the
/// action lexicon is sent over the text channel and only the reply is
/// surfaced, since the SDK already shows what the user said. Everything else
/// is surfaced directly after marker stripping. Turns are persisted through
/// the [`TurnStore`]; without a session id they queue until
/// [`VoiceBridge::set_session_id`].
pub struct VoiceBridge {
    deps: VoiceDeps,
    identity: VoiceIdentity,
    config: VoiceConfig,
    classifier: IntentClassifier,
    stripper: MarkerStripper,
    state: watch::Sender<VoiceState>,
    /// Bumped on every teardown; in-flight work started under an older
    /// epoch is abandoned.
    epoch: watch::Sender<u64>,
    inner: Mutex<Inner>,
    utterances: tokio::sync::Mutex<()>,
    persistence: tokio::sync::Mutex<()>,
    gate: ExchangeGate,
    turns_tx: mpsc::UnboundedSender<VoiceTurn>,
    turns_rx: Mutex<Option<mpsc::UnboundedReceiver<VoiceTurn>>>,
}

impl VoiceBridge {
    /// Build an idle bridge.
    pub fn new(
        deps: VoiceDeps,
        config: VoiceConfig,
        identity: VoiceIdentity,
        session_id: Option<String>,
    ) -> OrionResult<Arc<Self>> {
        let stripper = config.stripper()?;
        let classifier = config.classifier();
        let (state, _) = watch::channel(VoiceState::Idle);
        let (epoch, _) = watch::channel(0u64);
        let (turns_tx, turns_rx) = mpsc::unbounded_channel();

        Ok(Arc::new(Self {
            deps,
            identity,
            config,
            classifier,
            stripper,
            state,
            epoch,
            inner: Mutex::new(Inner {
                session_id,
                ..Default::default()
            }),
            utterances: tokio::sync::Mutex::new(()),
            persistence: tokio::sync::Mutex::new(()),
            gate: ExchangeGate::new(),
            turns_tx,
            turns_rx: Mutex::new(Some(turns_rx)),
        }))
    }

    // ── Observers ────────────────────────────────────────────────────────

    /// Current state.
    pub fn state(&self) -> VoiceState {
        *self.state.borrow()
    }

    /// Watch state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<VoiceState> {
        self.state.subscribe()
    }

    /// Error shown on the voice panel, if any.
    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    /// Dismiss the voice panel error.
    pub fn dismiss_error(&self) {
        self.inner.lock().last_error = None;
    }

    /// Turns shown on the voice panel so far.
    pub fn transcript(&self) -> Vec<VoiceTurn> {
        self.inner.lock().transcript.clone()
    }

    /// Session the bridge persists into, once known.
    pub fn session_id(&self) -> Option<String> {
        self.inner.lock().session_id.clone()
    }

    /// Turns waiting for a session id.
    pub fn pending_turns(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Gate a forwarded utterance holds while it owns the channel's next
    /// reply. Typed input on the same channel must claim it too.
    pub fn exchange_gate(&self) -> ExchangeGate {
        self.gate.clone()
    }

    /// Take the stream of surfaced turns. Only the first caller gets it.
    pub fn take_turns(&self) -> Option<mpsc::UnboundedReceiver<VoiceTurn>> {
        self.turns_rx.lock().take()
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Start a voice session: microphone, agent config, system prompt, SDK.
    ///
    /// Ignored while a session is already starting or live. On failure the
    /// microphone is released, the error is kept for [`Self::last_error`],
    /// and the bridge returns to idle.
    pub async fn start(&self) -> OrionResult<()> {
        if !self.transition(Transition::Start) {
            debug!(state = %self.state(), "Voice start ignored");
            return Ok(());
        }
        self.inner.lock().last_error = None;

        let epoch = *self.epoch.borrow();
        match self.open_session(epoch).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if !self.is_stale(epoch) {
                    self.fail(&e.to_string()).await;
                }
                Err(e)
            }
        }
    }

    async fn open_session(&self, epoch: u64) -> OrionResult<()> {
        let mut capture = self.deps.microphone.acquire().await?;
        if self.is_stale(epoch) {
            capture.stop_tracks();
            return Ok(());
        }
        self.inner.lock().capture = Some(capture);
        debug!("Microphone acquired");

        let agent = self
            .deps
            .provisioning
            .agent_config(&self.config.config_type)
            .await
            .map_err(|e| OrionError::Voice(format!("Failed to fetch agent config: {e}")))?;

        let session_id = self.session_id().unwrap_or_default();
        let prompt = self
            .deps
            .provisioning
            .system_prompt(&session_id, self.identity.first_name())
            .await
            .map_err(|e| OrionError::Voice(format!("Failed to fetch system prompt: {e}")))?;

        if self.is_stale(epoch) {
            return Ok(());
        }

        let overrides = SessionOverrides {
            agent_id: agent.agent_id,
            prompt: prompt.system_prompt,
            first_message: prompt.first_message,
            language: self.config.language.clone(),
            tts_model: agent.model,
        };
        self.deps.sdk.start_session(overrides).await?;

        if self.is_stale(epoch) {
            // Stopped while the SDK was starting; nobody else will end it.
            if let Err(e) = self.deps.sdk.end_session().await {
                warn!(error = %e, "Ending abandoned voice session failed");
            }
            return Ok(());
        }
        self.inner.lock().sdk_live = true;
        info!(session_id = %session_id, "Voice session started");
        Ok(())
    }

    /// Tear everything down and return to idle. Safe to call at any time,
    /// any number of times.
    pub async fn stop(&self) {
        self.teardown().await;
        self.inner.lock().last_error = None;
        if self.transition(Transition::Reset) {
            info!("Voice session stopped");
        }
    }

    /// Feed one SDK callback into the bridge.
    pub async fn on_sdk_event(&self, event: VoiceSdkEvent) {
        match event {
            VoiceSdkEvent::Connected => {
                if self.transition(Transition::SdkConnected) {
                    self.inner.lock().sdk_live = true;
                    info!("Voice session connected");
                }
            }
            VoiceSdkEvent::Disconnected => {
                if self.state() != VoiceState::Idle {
                    info!("Voice session ended remotely");
                    self.inner.lock().sdk_live = false;
                    self.teardown().await;
                    self.transition(Transition::Reset);
                }
            }
            VoiceSdkEvent::Error(message) => self.fail(&message).await,
            VoiceSdkEvent::ModeChanged(mode) => {
                self.transition(Transition::Mode(mode));
            }
            VoiceSdkEvent::Utterance(utterance) => self.handle_utterance(utterance).await,
        }
    }

    /// Pump SDK events into the bridge until `events` closes.
    ///
    /// Utterances go through a dedicated worker so a long tool call does not
    /// hold up state callbacks, while utterances still run strictly in order.
    pub fn attach(self: &Arc<Self>, mut events: mpsc::UnboundedReceiver<VoiceSdkEvent>) -> JoinHandle<()> {
        let (utterance_tx, mut utterance_rx) = mpsc::unbounded_channel::<Utterance>();

        let worker = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(utterance) = utterance_rx.recv().await {
                worker.handle_utterance(utterance).await;
            }
        });

        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    VoiceSdkEvent::Utterance(utterance) => {
                        if utterance_tx.send(utterance).is_err() {
                            break;
                        }
                    }
                    other => bridge.on_sdk_event(other).await,
                }
            }
            debug!("Voice SDK event stream ended");
        })
    }

    // ── Utterances ───────────────────────────────────────────────────────

    /// Classify and route one transcript message.
    pub async fn handle_utterance(&self, utterance: Utterance) {
        let _turn = self.utterances.lock().await;
        let epoch = *self.epoch.borrow();

        if !self.state().is_busy() {
            debug!("Ignoring utterance outside a voice session");
            return;
        }
        let role = utterance.speaker();
        let Some(text) = utterance.content() else {
            return;
        };

        if role == Role::User && self.classifier.requires_tool(text) {
            match self.forward(text, epoch).await {
                Forwarded::Reply(reply) => {
                    if self.is_stale(epoch) {
                        debug!("Tool reply arrived after teardown, dropped");
                        return;
                    }
                    self.deliver(Role::Assistant, reply, self.config.persist_tool_replies)
                        .await;
                    return;
                }
                Forwarded::Abandoned => return,
                Forwarded::Unavailable => {
                    debug!("Text channel unavailable, handling utterance directly");
                }
            }
        }

        let display = self.stripper.strip(text);
        if display.is_empty() {
            debug!("Utterance was control markers only");
            return;
        }
        if self.is_stale(epoch) {
            debug!("Voice session torn down, utterance dropped");
            return;
        }
        self.deliver(role, display, true).await;
    }

    async fn forward(&self, text: &str, epoch: u64) -> Forwarded {
        let Some(session_id) = self.session_id() else {
            return Forwarded::Unavailable;
        };
        let Some(token) = self.identity.token.as_deref() else {
            error!("No token available for tool execution");
            return Forwarded::Abandoned;
        };

        let channel = &self.deps.channel;
        if !channel.is_connected() {
            if let Err(e) = channel.connect(&session_id, token).await {
                warn!(error = %e, "Could not open text channel for tool execution");
            }
        }
        // Any teardown after this point wakes `cancel`.
        let mut cancel = self.epoch.subscribe();
        if *cancel.borrow_and_update() != epoch {
            debug!("Voice session torn down while connecting");
            return Forwarded::Abandoned;
        }
        if !channel.is_connected() {
            return Forwarded::Unavailable;
        }

        let timeout = self.config.tool_timeout();
        let _permit = tokio::select! {
            permit = self.gate.claim() => permit,
            _ = cancel.changed() => return Forwarded::Abandoned,
            () = tokio::time::sleep(timeout) => {
                warn!("Channel stayed busy with another exchange");
                return Forwarded::Reply(TOOL_TIMEOUT_REPLY.to_string());
            }
        };

        let mut events = channel.subscribe();
        info!(session_id = %session_id, "Routing utterance through the text channel");
        channel.send(text);

        match await_reply(&mut events, timeout, &mut cancel)
            .await
            .into_reply()
        {
            Some(reply) => Forwarded::Reply(reply),
            None => {
                debug!("Tool reply abandoned after teardown");
                Forwarded::Abandoned
            }
        }
    }

    // ── Persistence ──────────────────────────────────────────────────────

    /// Set the session id and flush queued turns in their original order.
    pub async fn set_session_id(&self, session_id: impl Into<String>) {
        let session_id = session_id.into();
        let _order = self.persistence.lock().await;
        let queued = {
            let mut inner = self.inner.lock();
            inner.session_id = Some(session_id.clone());
            std::mem::take(&mut inner.pending)
        };
        if !queued.is_empty() {
            info!(session_id = %session_id, count = queued.len(), "Flushing queued voice turns");
        }
        for (role, content) in queued {
            self.store(&TurnRecord::new(session_id.clone(), role, content))
                .await;
        }
    }

    async fn deliver(&self, role: Role, text: String, persist: bool) {
        let turn = VoiceTurn {
            role,
            text: text.clone(),
        };
        self.inner.lock().transcript.push(turn.clone());
        if self.turns_tx.send(turn).is_err() {
            debug!("No listener for voice turns");
        }
        if persist {
            self.persist(role, text).await;
        }
    }

    async fn persist(&self, role: Role, text: String) {
        let _order = self.persistence.lock().await;
        let session_id = {
            let mut inner = self.inner.lock();
            match inner.session_id.clone() {
                Some(id) => id,
                None => {
                    inner.pending.push((role, text));
                    debug!(queued = inner.pending.len(), "Queued voice turn until a session id exists");
                    return;
                }
            }
        };
        self.store(&TurnRecord::new(session_id, role, text)).await;
    }

    async fn store(&self, record: &TurnRecord) {
        if let Err(e) = self.deps.store.store_turn(record).await {
            warn!(session_id = %record.session_id, error = %e, "Failed to store voice turn");
        }
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn transition(&self, transition: Transition) -> bool {
        self.state.send_if_modified(|state| match state.next(transition) {
            Some(next) if next != *state => {
                debug!(from = %state, to = %next, "Voice state changed");
                *state = next;
                true
            }
            _ => false,
        })
    }

    fn is_stale(&self, epoch: u64) -> bool {
        *self.epoch.borrow() != epoch
    }

    async fn fail(&self, message: &str) {
        error!(message = %message, "Voice session failed");
        self.transition(Transition::Fail);
        self.teardown().await;
        self.inner.lock().last_error = Some(message.to_string());
        self.transition(Transition::Reset);
    }

    /// Microphone tracks first, then the remote session.
    async fn teardown(&self) {
        self.epoch.send_modify(|epoch| *epoch += 1);
        let (capture, sdk_live) = {
            let mut inner = self.inner.lock();
            (inner.capture.take(), std::mem::take(&mut inner.sdk_live))
        };
        if let Some(mut capture) = capture {
            capture.stop_tracks();
            debug!("Microphone released");
        }
        if sdk_live {
            if let Err(e) = self.deps.sdk.end_session().await {
                warn!(error = %e, "Ending voice session failed");
            }
        }
    }
}

impl Drop for VoiceBridge {
    fn drop(&mut self) {
        if let Some(mut capture) = self.inner.get_mut().capture.take() {
            capture.stop_tracks();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_name() {
        let named = VoiceIdentity {
            token: None,
            user_name: Some("Ada Lovelace".into()),
        };
        assert_eq!(named.first_name(), "Ada");
        assert_eq!(VoiceIdentity::default().first_name(), "there");
        let blank = VoiceIdentity {
            token: None,
            user_name: Some("   ".into()),
        };
        assert_eq!(blank.first_name(), "there");
    }
}
