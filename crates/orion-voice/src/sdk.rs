use async_trait::async_trait;
use orion_core::{OrionResult, Role};
use serde::{Deserialize, Serialize};

/// Per-session configuration handed to the voice SDK on start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOverrides {
    /// Third-party agent to talk to.
    pub agent_id: String,
    /// Session-specific system prompt.
    pub prompt: String,
    /// Line the agent opens with.
    pub first_message: Option<String>,
    /// Conversation language code.
    pub language: String,
    /// TTS model override.
    pub tts_model: Option<String>,
}

/// Whether the remote agent is talking or listening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// The agent is producing audio.
    Speaking,
    /// The agent is waiting for the user.
    Listening,
}

/// One transcript message reported by the voice SDK.
///
/// SDKs disagree on field names, so every known spelling is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    /// Explicit role, when reported.
    #[serde(default)]
    pub role: Option<String>,
    /// Message source (`user` / `ai`), when reported.
    #[serde(default)]
    pub source: Option<String>,
    /// Text, primary spelling.
    #[serde(default)]
    pub text: Option<String>,
    /// Text, alternate spelling.
    #[serde(default)]
    pub message: Option<String>,
    /// Text, transcript spelling.
    #[serde(default)]
    pub transcript: Option<String>,
}

impl Utterance {
    /// A user transcript.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            source: Some("user".into()),
            message: Some(text.into()),
            ..Default::default()
        }
    }

    /// An agent transcript.
    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            source: Some("ai".into()),
            message: Some(text.into()),
            ..Default::default()
        }
    }

    /// User if either `role` or `source` says so, assistant otherwise.
    pub fn speaker(&self) -> Role {
        let is_user = |v: &Option<String>| v.as_deref() == Some("user");
        if is_user(&self.role) || is_user(&self.source) {
            Role::User
        } else {
            Role::Assistant
        }
    }

    /// First non-empty text field, trimmed.
    pub fn content(&self) -> Option<&str> {
        [&self.text, &self.message, &self.transcript]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .find(|s| !s.is_empty())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Callbacks from the voice SDK, delivered to the bridge in order.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceSdkEvent {
    /// The remote session is live.
    Connected,
    /// The remote session ended.
    Disconnected,
    /// The SDK reported a failure.
    Error(String),
    /// The agent switched between speaking and listening.
    ModeChanged(AgentMode),
    /// A transcript message.
    Utterance(Utterance),
}

/// Minimal surface of a third-party spoken-dialogue SDK.
///
/// Events flow back separately as [`VoiceSdkEvent`]s so a test double can
/// drive the bridge deterministically.
#[async_trait]
pub trait VoiceSdk: Send + Sync {
    /// Open a remote session.
    async fn start_session(&self, overrides: SessionOverrides) -> OrionResult<()>;

    /// End the remote session.
    async fn end_session(&self) -> OrionResult<()>;
}

/// Source of audio capture.
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Ask for capture permission and open a stream.
    ///
    /// A refusal is reported as [`orion_core::OrionError::Permission`].
    async fn acquire(&self) -> OrionResult<Box<dyn CaptureStream>>;
}

/// An open audio capture stream.
pub trait CaptureStream: Send + Sync {
    /// Stop every track of the stream.
    fn stop_tracks(&mut self);
}
