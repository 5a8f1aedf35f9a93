use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Voice agent identity returned by `GET /voice/config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceAgentConfig {
    /// Third-party agent identifier.
    pub agent_id: String,
    /// TTS model override.
    #[serde(default)]
    pub model: Option<String>,
}

/// Session-specific prompt returned by `POST /voice/prompt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoicePrompt {
    /// System prompt for the voice agent.
    pub system_prompt: String,
    /// Opening line the agent speaks first.
    #[serde(default)]
    pub first_message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VoicePromptRequest<'a> {
    pub session_id: &'a str,
    pub user_name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct PlanRequest<'a> {
    pub input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<&'a str>,
}

/// One step result from `POST /agent/sessions/{id}/execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Step output; usually `{ "text": ... }` but tools may return anything.
    #[serde(default)]
    pub result: serde_json::Value,
}

impl StepResult {
    /// Render the step for display: its `text` field when present, otherwise
    /// the JSON encoding of the whole result. Empty results render as `None`.
    pub fn display_text(&self) -> Option<String> {
        if self.result.is_null() {
            return None;
        }
        match self.result.get("text").and_then(serde_json::Value::as_str) {
            Some(text) if !text.is_empty() => Some(text.to_string()),
            _ => Some(self.result.to_string()),
        }
    }
}

/// A session as listed by `GET /sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Session identifier.
    pub id: String,
    /// Lifecycle status (`ACTIVE`, `ENDED`, ...).
    #[serde(default)]
    pub status: String,
    /// Free-form metadata; `name` lives here.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl SessionSummary {
    /// Display name from metadata, if set.
    pub fn name(&self) -> Option<&str> {
        self.metadata.get("name").and_then(serde_json::Value::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_step_display_text() {
        let text = StepResult {
            result: serde_json::json!({"text": "3 results"}),
        };
        assert_eq!(text.display_text().as_deref(), Some("3 results"));

        let raw = StepResult {
            result: serde_json::json!({"count": 3}),
        };
        assert_eq!(raw.display_text().as_deref(), Some(r#"{"count":3}"#));

        let empty = StepResult {
            result: serde_json::Value::Null,
        };
        assert!(empty.display_text().is_none());
    }

    #[test]
    fn test_prompt_request_is_camel_case() {
        let body = VoicePromptRequest {
            session_id: "s-1",
            user_name: "Ada",
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, serde_json::json!({"sessionId": "s-1", "userName": "Ada"}));
    }
}
