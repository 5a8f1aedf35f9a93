use crate::classify::{IntentClassifier, DEFAULT_ACTION_KEYWORDS};
use crate::markers::{MarkerStripper, DEFAULT_CONTROL_TAGS, DEFAULT_STATUS_MARKERS};
use orion_core::OrionResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Voice bridge settings, the `[voice]` table of `orion.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// How long a forwarded utterance waits for its reply.
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// Action-intent lexicon.
    #[serde(default = "default_action_keywords")]
    pub action_keywords: Vec<String>,
    /// Paired control tags stripped from display text.
    #[serde(default = "default_control_tags")]
    pub control_tags: Vec<String>,
    /// Standalone status markers stripped from display text.
    #[serde(default = "default_status_markers")]
    pub status_markers: Vec<String>,
    /// Persist replies to forwarded utterances through the turn store.
    #[serde(default = "default_true")]
    pub persist_tool_replies: bool,
    /// Conversation language code.
    #[serde(default = "default_language")]
    pub language: String,
    /// Config type requested from `GET /voice/config`.
    #[serde(default = "default_config_type")]
    pub config_type: String,
}

fn default_tool_timeout_secs() -> u64 {
    30
}
fn default_action_keywords() -> Vec<String> {
    DEFAULT_ACTION_KEYWORDS.iter().map(|s| s.to_string()).collect()
}
fn default_control_tags() -> Vec<String> {
    DEFAULT_CONTROL_TAGS.iter().map(|s| s.to_string()).collect()
}
fn default_status_markers() -> Vec<String> {
    DEFAULT_STATUS_MARKERS.iter().map(|s| s.to_string()).collect()
}
fn default_true() -> bool {
    true
}
fn default_language() -> String {
    "en".into()
}
fn default_config_type() -> String {
    "default".into()
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            action_keywords: default_action_keywords(),
            control_tags: default_control_tags(),
            status_markers: default_status_markers(),
            persist_tool_replies: default_true(),
            language: default_language(),
            config_type: default_config_type(),
        }
    }
}

impl VoiceConfig {
    /// Tool-call timeout as a [`Duration`].
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Classifier over the configured lexicon.
    pub fn classifier(&self) -> IntentClassifier {
        IntentClassifier::new(&self.action_keywords)
    }

    /// Stripper over the configured markers.
    pub fn stripper(&self) -> OrionResult<MarkerStripper> {
        MarkerStripper::new(&self.control_tags, &self.status_markers)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_uses_defaults() {
        let config: VoiceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.tool_timeout(), Duration::from_secs(30));
        assert!(config.persist_tool_replies);
        assert_eq!(config.language, "en");
        assert_eq!(config.config_type, "default");
        assert_eq!(config.classifier().len(), DEFAULT_ACTION_KEYWORDS.len());
    }

    #[test]
    fn test_overrides() {
        let config: VoiceConfig = serde_json::from_str(
            r#"{"tool_timeout_secs": 5, "action_keywords": ["order"], "control_tags": ["META"]}"#,
        )
        .unwrap();
        assert_eq!(config.tool_timeout(), Duration::from_secs(5));
        assert!(config.classifier().requires_tool("order pizza"));
        assert!(!config.classifier().requires_tool("search"));
        assert_eq!(config.stripper().unwrap().strip("hi [META]x[/META]"), "hi");
    }
}
