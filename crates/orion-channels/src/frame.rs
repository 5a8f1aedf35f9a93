use crate::channel::ChannelEvent;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Commands the client emits over the channel.
///
/// Serialized as `{"event": "text_input", "data": {"text": "..."}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    /// User text submitted for the agent.
    TextInput {
        /// The submitted text.
        text: String,
    },
}

impl ClientFrame {
    /// Build a `text_input` frame.
    pub fn text_input(text: impl Into<String>) -> Self {
        ClientFrame::TextInput { text: text.into() }
    }
}

// ── Server frame payloads ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TextPayload {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletePayload {
    full_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenamePayload {
    session_id: String,
    name: String,
}

/// Decode one text frame into a [`ChannelEvent`].
///
/// Returns `None` for frames that are not JSON, carry an unknown event name,
/// or whose payload does not match the expected shape.
pub fn parse_frame(text: &str) -> Option<ChannelEvent> {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!(error = %e, "Dropping non-envelope frame");
            return None;
        }
    };

    let event = match envelope.event.as_str() {
        "connected" => ChannelEvent::SessionAcknowledged(envelope.data),
        "text_chunk" => {
            let payload: TextPayload = decode(&envelope.event, envelope.data)?;
            ChannelEvent::PartialToken { text: payload.text }
        }
        "text_complete" => {
            let payload: CompletePayload = decode(&envelope.event, envelope.data)?;
            ChannelEvent::ReplyComplete {
                full_text: payload.full_text,
            }
        }
        "text_output" => {
            let payload: TextPayload = decode(&envelope.event, envelope.data)?;
            ChannelEvent::Reply { text: payload.text }
        }
        "agent_response" => ChannelEvent::AgentResponse(envelope.data),
        "error" => ChannelEvent::TransportError {
            message: error_message(&envelope.data),
        },
        "session_name_updated" => {
            let payload: RenamePayload = decode(&envelope.event, envelope.data)?;
            ChannelEvent::SessionRenamed {
                session_id: payload.session_id,
                name: payload.name,
            }
        }
        other => {
            debug!(event = %other, "Unknown channel event");
            return None;
        }
    };

    Some(event)
}

fn decode<T: serde::de::DeserializeOwned>(event: &str, data: serde_json::Value) -> Option<T> {
    match serde_json::from_value(data) {
        Ok(payload) => Some(payload),
        Err(e) => {
            debug!(event = %event, error = %e, "Malformed frame payload");
            None
        }
    }
}

fn error_message(data: &serde_json::Value) -> Option<String> {
    match data {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Object(map) => map
            .get("message")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_client_frame_shape() {
        let json = serde_json::to_value(ClientFrame::text_input("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"event": "text_input", "data": {"text": "hi"}}));
    }

    #[test]
    fn test_parse_stream_frames() {
        let chunk = parse_frame(r#"{"event":"text_chunk","data":{"text":"Hel"}}"#).unwrap();
        assert_eq!(chunk, ChannelEvent::PartialToken { text: "Hel".into() });

        let done = parse_frame(r#"{"event":"text_complete","data":{"fullText":"Hello"}}"#).unwrap();
        assert_eq!(
            done,
            ChannelEvent::ReplyComplete {
                full_text: "Hello".into()
            }
        );
    }

    #[test]
    fn test_parse_error_variants() {
        let with_message = parse_frame(r#"{"event":"error","data":{"message":"boom"}}"#).unwrap();
        assert_eq!(
            with_message,
            ChannelEvent::TransportError {
                message: Some("boom".into())
            }
        );

        let bare = parse_frame(r#"{"event":"error"}"#).unwrap();
        assert_eq!(bare, ChannelEvent::TransportError { message: None });

        let string = parse_frame(r#"{"event":"error","data":"socket hang up"}"#).unwrap();
        assert_eq!(
            string,
            ChannelEvent::TransportError {
                message: Some("socket hang up".into())
            }
        );
    }

    #[test]
    fn test_parse_rename() {
        let ev = parse_frame(
            r#"{"event":"session_name_updated","data":{"sessionId":"s1","name":"Trip plans"}}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            ChannelEvent::SessionRenamed {
                session_id: "s1".into(),
                name: "Trip plans".into()
            }
        );
    }

    #[test]
    fn test_unknown_and_malformed_frames_dropped() {
        assert!(parse_frame("not json").is_none());
        assert!(parse_frame(r#"{"event":"pong"}"#).is_none());
        assert!(parse_frame(r#"{"event":"text_chunk","data":{}}"#).is_none());
    }
}
