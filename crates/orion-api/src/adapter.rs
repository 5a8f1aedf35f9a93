use crate::client::ApiClient;
use crate::types::{VoiceAgentConfig, VoicePrompt};
use async_trait::async_trait;
use orion_core::{OrionResult, TurnRecord};

/// Durable record of conversation turns.
///
/// Callers treat failures as non-fatal: log and move on.
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// Persist one turn.
    async fn store_turn(&self, turn: &TurnRecord) -> OrionResult<()>;
}

/// Backend endpoints a voice session needs before it can start.
#[async_trait]
pub trait VoiceProvisioning: Send + Sync {
    /// Voice agent identity and TTS model for the given config type.
    async fn agent_config(&self, config_type: &str) -> OrionResult<VoiceAgentConfig>;

    /// System prompt and opening line for a session.
    async fn system_prompt(&self, session_id: &str, user_name: &str) -> OrionResult<VoicePrompt>;
}

#[async_trait]
impl TurnStore for ApiClient {
    async fn store_turn(&self, turn: &TurnRecord) -> OrionResult<()> {
        self.store_message(turn).await
    }
}

#[async_trait]
impl VoiceProvisioning for ApiClient {
    async fn agent_config(&self, config_type: &str) -> OrionResult<VoiceAgentConfig> {
        self.voice_config(config_type).await
    }

    async fn system_prompt(&self, session_id: &str, user_name: &str) -> OrionResult<VoicePrompt> {
        self.voice_prompt(session_id, user_name).await
    }
}
