use crate::types::{
    PlanRequest, SessionSummary, StepResult, VoiceAgentConfig, VoicePrompt, VoicePromptRequest,
};
use orion_core::{MemoryRecord, OrionError, OrionResult, TurnRecord};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

/// Reply used when plan-then-execute succeeds but produces no displayable text.
pub const PROCESSED_ACK: &str = "I processed your request.";

/// Bearer-token client for the agent platform's REST API.
///
/// All paths are relative to `base_url` (e.g. `http://localhost:3000/api/v1`).
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl ApiClient {
    /// Create a client. Without a token, requests go out unauthenticated.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    /// The bearer token, if configured.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── Sessions ─────────────────────────────────────────────────────────

    /// Fetch the persisted memory records of a session.
    ///
    /// Records that fail to decode are skipped so a partial history still
    /// loads.
    pub async fn session_history(&self, session_id: &str) -> OrionResult<Vec<MemoryRecord>> {
        let raw: serde_json::Value = self
            .send_json(self.request(Method::GET, &format!("/sessions/{session_id}/memory")))
            .await?;

        let items = match raw {
            serde_json::Value::Array(items) => items,
            other => {
                return Err(OrionError::Session(format!(
                    "Unexpected history payload (expected a list, got {})",
                    json_kind(&other)
                )))
            }
        };

        let total = items.len();
        let records: Vec<MemoryRecord> = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<MemoryRecord>(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!(error = %e, "Skipping undecodable memory record");
                    None
                }
            })
            .collect();

        info!(
            session_id = %session_id,
            total,
            decoded = records.len(),
            "Session history fetched"
        );
        Ok(records)
    }

    /// List the caller's sessions.
    pub async fn list_sessions(&self) -> OrionResult<Vec<SessionSummary>> {
        self.send_json(self.request(Method::GET, "/sessions")).await
    }

    /// Create a session, optionally with a display name.
    pub async fn create_session(&self, name: Option<&str>) -> OrionResult<SessionSummary> {
        let body = match name {
            Some(name) => serde_json::json!({ "metadata": { "name": name } }),
            None => serde_json::json!({}),
        };
        self.send_json(self.request(Method::POST, "/sessions").json(&body))
            .await
    }

    // ── Voice ────────────────────────────────────────────────────────────

    /// Fetch the voice agent identity for a config type.
    pub async fn voice_config(&self, config_type: &str) -> OrionResult<VoiceAgentConfig> {
        self.send_json(
            self.request(Method::GET, "/voice/config")
                .query(&[("type", config_type)]),
        )
        .await
    }

    /// Fetch the session-specific system prompt for the voice agent.
    pub async fn voice_prompt(&self, session_id: &str, user_name: &str) -> OrionResult<VoicePrompt> {
        let body = VoicePromptRequest {
            session_id,
            user_name,
        };
        self.send_json(self.request(Method::POST, "/voice/prompt").json(&body))
            .await
    }

    /// Persist one conversation turn.
    pub async fn store_message(&self, turn: &TurnRecord) -> OrionResult<()> {
        let response = self
            .request(Method::POST, "/voice/message")
            .json(turn)
            .send()
            .await
            .map_err(|e| OrionError::Http(format!("Store message failed: {e}")))?;
        check(response).await?;
        debug!(session_id = %turn.session_id, role = %turn.role, "Turn stored");
        Ok(())
    }

    // ── Agent (one-shot fallback) ────────────────────────────────────────

    /// Ask the planner for a plan. The plan is opaque to the client.
    pub async fn plan(
        &self,
        session_id: &str,
        input: &str,
        context: Option<&str>,
    ) -> OrionResult<serde_json::Value> {
        let body = PlanRequest { input, context };
        self.send_json(
            self.request(Method::POST, &format!("/agent/sessions/{session_id}/plan"))
                .json(&body),
        )
        .await
    }

    /// Execute a plan previously returned by [`ApiClient::plan`].
    pub async fn execute(
        &self,
        session_id: &str,
        plan: &serde_json::Value,
    ) -> OrionResult<Vec<StepResult>> {
        self.send_json(
            self.request(Method::POST, &format!("/agent/sessions/{session_id}/execute"))
                .json(plan),
        )
        .await
    }

    /// Plan, execute, and aggregate the step outputs into one reply.
    ///
    /// Used when no streaming channel is available; there is no partial
    /// output on this path.
    pub async fn plan_and_execute(&self, session_id: &str, input: &str) -> OrionResult<String> {
        let plan = self.plan(session_id, input, None).await?;
        let results = self.execute(session_id, &plan).await?;
        let text = results
            .iter()
            .filter_map(StepResult::display_text)
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            Ok(PROCESSED_ACK.to_string())
        } else {
            Ok(text)
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> OrionResult<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| OrionError::Http(format!("Request failed: {e}")))?;
        let response = check(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| OrionError::Http(format!("Invalid response body: {e}")))
    }
}

/// Map non-success statuses to errors, preferring the server's `message`.
async fn check(response: Response) -> OrionResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| format!("{status}: {body}"));

    if status == StatusCode::UNAUTHORIZED {
        warn!("Backend rejected the bearer token");
        return Err(OrionError::Unauthorized(message));
    }
    Err(OrionError::Http(message))
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "an object",
    }
}
