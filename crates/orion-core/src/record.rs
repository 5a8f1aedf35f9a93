use crate::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Memory type tag the backend uses for standalone facts.
pub const FACT_KIND: &str = "FACT";

/// A server-owned historical record as returned by the session memory endpoint.
///
/// Records are heterogeneous: some carry an explicit `role` in their metadata,
/// some encode a whole exchange as `User: ...\nAssistant: ...`, some are
/// planning utterances, and some are plain facts. The client never writes this
/// shape; it only reads it back for reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    /// Server-assigned identifier.
    pub id: String,
    /// Memory type (`FACT`, `CONVERSATION`, ...), when present.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Raw record content.
    #[serde(default)]
    pub content: String,
    /// Free-form metadata; may be `null`.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Creation time on the server.
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// The raw `metadata.role` tag, if the record carries one.
    pub fn role_tag(&self) -> Option<&str> {
        self.metadata.get("role").and_then(serde_json::Value::as_str)
    }

    /// Whether this record is tagged as a standalone fact.
    pub fn is_fact(&self) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|k| k.eq_ignore_ascii_case(FACT_KIND))
    }
}

/// Body of the turn-persistence call (`POST /voice/message`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRecord {
    /// Session the turn belongs to.
    pub session_id: String,
    /// Author of the turn.
    pub role: Role,
    /// Turn text.
    pub content: String,
}

impl TurnRecord {
    /// Build a turn record for a session.
    pub fn new(session_id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            role,
            content: content.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_record_with_null_metadata() {
        let json = r#"{"id":"m1","type":"FACT","content":"sky is blue","metadata":null,"createdAt":"2024-05-01T10:00:00Z"}"#;
        let record: MemoryRecord = serde_json::from_str(json).unwrap();
        assert!(record.role_tag().is_none());
        assert!(record.is_fact());
    }

    #[test]
    fn test_record_role_tag() {
        let json = r#"{"id":"m2","content":"Hi","metadata":{"role":"user"},"createdAt":"2024-05-01T10:00:00Z"}"#;
        let record: MemoryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.role_tag(), Some("user"));
        assert!(!record.is_fact());
    }

    #[test]
    fn test_turn_record_wire_shape() {
        let turn = TurnRecord::new("s-1", Role::Assistant, "done");
        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(value["sessionId"], "s-1");
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["content"], "done");
    }
}
