use orion_core::{MemoryRecord, Message, Role};
use tracing::debug;

const USER_MARKER: &str = "User:";
const ASSISTANT_MARKER: &str = "Assistant:";
const REQUEST_PREFIX: &str = "User request:";
const PLACEHOLDER: &str = "...";

/// Rebuild the human-readable turns of a session from its memory records.
///
/// Each record is matched against, in order:
///
/// 1. an explicit `metadata.role` tag, emitted verbatim;
/// 2. a `User: ... Assistant: ...` exchange, split into two turns;
/// 3. a `User request:` planning utterance, emitted as a user turn;
/// 4. a `FACT` record, emitted as an assistant turn.
///
/// Anything else is not a turn and is skipped. The result is stable-sorted
/// by timestamp, so ties keep emission order and the output is the same on
/// every run over the same records.
pub fn reconstruct(records: &[MemoryRecord]) -> Vec<Message> {
    let mut messages: Vec<Message> = records.iter().flat_map(extract).collect();
    messages.sort_by_key(|m| m.timestamp);
    messages
}

fn extract(record: &MemoryRecord) -> Vec<Message> {
    let content = record.content.as_str();

    if let Some(tag) = record.role_tag().filter(|t| !t.trim().is_empty()) {
        return match Role::parse_role(tag) {
            Some(role) => vec![turn(&record.id, role, content, record)],
            None => {
                debug!(record_id = %record.id, role = %tag, "Skipping record with unknown role tag");
                Vec::new()
            }
        };
    }

    if content.contains(USER_MARKER) && content.contains(ASSISTANT_MARKER) {
        let mut out = Vec::with_capacity(2);
        if let Some(user) = user_segment(content) {
            out.push(turn(&format!("{}-user", record.id), Role::User, user, record));
        }
        if let Some(assistant) = assistant_segment(content) {
            out.push(turn(
                &format!("{}-assistant", record.id),
                Role::Assistant,
                assistant,
                record,
            ));
        }
        return out;
    }

    if let Some(rest) = content.strip_prefix(REQUEST_PREFIX) {
        let request = rest.trim();
        if is_meaningful(request) {
            return vec![turn(&record.id, Role::User, request, record)];
        }
        return Vec::new();
    }

    if record.is_fact() && is_meaningful(content) {
        return vec![turn(&record.id, Role::Assistant, content, record)];
    }

    Vec::new()
}

/// Text after the first user marker, up to the next line-leading assistant
/// marker or the end.
fn user_segment(content: &str) -> Option<&str> {
    let start = content.find(USER_MARKER)? + USER_MARKER.len();
    let rest = &content[start..];
    let end = rest
        .find(&format!("\n{ASSISTANT_MARKER}"))
        .unwrap_or(rest.len());
    non_empty(rest[..end].trim())
}

/// Text after the first assistant marker to the end.
fn assistant_segment(content: &str) -> Option<&str> {
    let start = content.find(ASSISTANT_MARKER)? + ASSISTANT_MARKER.len();
    non_empty(content[start..].trim())
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn is_meaningful(s: &str) -> bool {
    !s.is_empty() && s != PLACEHOLDER
}

fn turn(id: &str, role: Role, content: &str, record: &MemoryRecord) -> Message {
    Message::new(role, content)
        .with_id(id)
        .at(record.created_at)
}
