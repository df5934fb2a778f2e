//! Projection of a transcript event log into a chat message sequence.

use serde::{Deserialize, Serialize};

use super::types::TranscriptLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A role-tagged message extracted from a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Convert log events into messages, keeping log order.
///
/// `action` events become user messages and `trace` events become assistant
/// messages. Events without extractable, non-blank text and events of any
/// other kind are dropped.
pub fn project_messages(logs: &[TranscriptLog]) -> Vec<ChatMessage> {
    logs.iter().filter_map(project_event).collect()
}

fn project_event(log: &TranscriptLog) -> Option<ChatMessage> {
    let role = match log.kind.as_str() {
        "action" => MessageRole::User,
        "trace" => MessageRole::Assistant,
        _ => return None,
    };

    let text = log
        .data
        .as_ref()
        .and_then(|data| data.payload.as_ref())
        .and_then(|payload| payload.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())?;

    Some(ChatMessage {
        role,
        text: text.to_string(),
        timestamp: log.created_at.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn logs(value: serde_json::Value) -> Vec<TranscriptLog> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_role_filtering_keeps_log_order() {
        let logs = logs(json!([
            {"type": "action", "data": {"type": "text", "payload": "Where is my order?"}},
            {"type": "trace", "data": {"type": "text", "payload": {"message": ""}}},
            {"type": "trace", "data": {"type": "text", "payload": {"message": "Let me check."}}}
        ]));

        let messages = project_messages(&logs);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].text, "Where is my order?");
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].text, "Let me check.");
    }

    #[test]
    fn test_other_event_kinds_and_textless_events_dropped() {
        let logs = logs(json!([
            {"type": "launch", "data": {"payload": "start"}},
            {"type": "trace", "data": {"type": "block", "payload": {"blockID": "abc"}}},
            {"type": "action"},
            {"type": "action", "data": {"type": "intent", "payload": {"query": "talk to agent"}},
             "createdAt": "2025-09-01T10:00:00.000Z"}
        ]));

        let messages = project_messages(&logs);

        assert_eq!(
            messages,
            vec![ChatMessage {
                role: MessageRole::User,
                text: "talk to agent".to_string(),
                timestamp: Some("2025-09-01T10:00:00.000Z".to_string()),
            }]
        );
    }
}
