//! Messages sent from the proxy to the client (voice-agent).

use super::{FunctionCallItem, Role};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Optional; the client tolerates its absence.
    Welcome { request_id: Uuid },

    /// Readiness signal: the client must not have its first user
    /// message forwarded upstream before this is emitted.
    SettingsApplied,

    /// A user or assistant utterance surfaced to the client UI.
    ConversationText { role: Role, content: String },

    UserStartedSpeaking,

    UserStoppedSpeaking {
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },

    UtteranceEnd {
        #[serde(skip_serializing_if = "Option::is_none")]
        channel: Option<u32>,
        last_word_end: f64,
    },

    AgentThinking,

    /// Emitted at most once per response.
    AgentStartedSpeaking,

    AgentAudioDone,

    FunctionCallRequest { functions: Vec<FunctionCallItem> },

    /// A fatal condition; the socket closes after this is sent.
    Error { description: String, code: String },

    /// A recoverable condition; the session remains `Ready`.
    Warning { description: String, code: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag_and_snake_variant_names() {
        let msg = ServerMessage::SettingsApplied;
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "SettingsApplied");
    }

    #[test]
    fn conversation_text_round_trips_role() {
        let msg = ServerMessage::ConversationText {
            role: Role::Assistant,
            content: "Hello".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "Hello");
    }

    #[test]
    fn error_never_carries_a_credential_field() {
        let msg = ServerMessage::Error {
            description: "authentication failed".to_string(),
            code: "auth_error".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("api_key"));
        assert!(!json.contains("Bearer"));
    }

    #[test]
    fn function_call_request_omits_client_side_when_absent() {
        let msg = ServerMessage::FunctionCallRequest {
            functions: vec![FunctionCallItem {
                id: "c1".into(),
                name: "get_time".into(),
                arguments: "{}".into(),
                client_side: None,
            }],
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json["functions"][0].get("client_side").is_none());
    }
}
