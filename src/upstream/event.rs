//! The Realtime protocol: the event-driven JSON vocabulary spoken with
//! the upstream provider.
//!
//! These are hand-rolled, internally-tagged `serde` enums local to this
//! crate rather than a binding to a third-party provider SDK. See
//! DESIGN.md for why.

use serde::{Deserialize, Serialize};

/// Events this proxy sends upstream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum UpstreamClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionResource },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    #[serde(rename = "response.create")]
    ResponseCreate,

    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

/// The session-configuration payload carried by `session.update`.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SessionResource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    pub fn function(name: String, description: String, parameters: serde_json::Value) -> Self {
        Self {
            kind: "function",
            name,
            description,
            parameters,
        }
    }
}

/// A `conversation.item.create` payload: either a message (user or
/// assistant) or a function-call output.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ConversationItem {
    #[serde(rename = "message")]
    Message {
        role: ItemRole,
        content: Vec<ContentPart>,
    },
    #[serde(rename = "function_call_output")]
    FunctionCallOutput { call_id: String, output: String },
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemRole {
    User,
    Assistant,
}

/// Role-dependent content type: user items use `input_text`, assistant
/// items use `output_text`, mandatory, not interchangeable.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "input_text")]
    InputText { text: String },
    #[serde(rename = "output_text")]
    OutputText { text: String },
}

impl ConversationItem {
    /// Builds a `message` item with the role-appropriate content type
    /// (never `input_text` for an assistant item).
    pub fn user_message(text: impl Into<String>) -> Self {
        ConversationItem::Message {
            role: ItemRole::User,
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }

    pub fn assistant_message(text: impl Into<String>) -> Self {
        ConversationItem::Message {
            role: ItemRole::Assistant,
            content: vec![ContentPart::OutputText { text: text.into() }],
        }
    }
}

/// Events this proxy receives from upstream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum UpstreamServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated { session: SessionInfo },

    #[serde(rename = "session.updated")]
    SessionUpdated,

    #[serde(rename = "conversation.item.added")]
    ConversationItemAdded { item: ItemRef },

    #[serde(rename = "conversation.item.done")]
    ConversationItemDone { item: ItemRef },

    #[serde(rename = "response.created")]
    ResponseCreated,

    #[serde(rename = "response.content_part.added")]
    ResponseContentPartAdded,

    #[serde(rename = "response.done")]
    ResponseDone,

    #[serde(rename = "response.output_text.delta")]
    ResponseOutputTextDelta { delta: String },

    #[serde(rename = "response.output_text.done")]
    ResponseOutputTextDone { text: String },

    #[serde(rename = "response.output_audio.delta")]
    ResponseOutputAudioDelta { delta: String },

    #[serde(rename = "response.output_audio.done")]
    ResponseOutputAudioDone,

    #[serde(rename = "response.output_audio_transcript.delta")]
    ResponseOutputAudioTranscriptDelta { delta: String },

    #[serde(rename = "response.output_audio_transcript.done")]
    ResponseOutputAudioTranscriptDone { transcript: String },

    #[serde(rename = "response.function_call_arguments.delta")]
    ResponseFunctionCallArgumentsDelta { call_id: String, delta: String },

    #[serde(rename = "response.function_call_arguments.done")]
    ResponseFunctionCallArgumentsDone {
        call_id: String,
        name: String,
        arguments: String,
    },

    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioBufferSpeechStarted,

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    InputAudioBufferSpeechStopped {
        #[serde(default)]
        audio_end_ms: Option<f64>,
    },

    #[serde(rename = "error")]
    Error { error: UpstreamErrorDetail },
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemRef {
    pub id: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamErrorDetail {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_update_serializes_with_dotted_type_tag() {
        let event = UpstreamClientEvent::SessionUpdate {
            session: SessionResource {
                instructions: Some("Help.".into()),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session.update");
        assert_eq!(json["session"]["instructions"], "Help.");
        assert!(json["session"].get("voice").is_none());
    }

    #[test]
    fn user_message_uses_input_text_content_type() {
        let item = ConversationItem::user_message("hi");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["type"], "input_text");
        assert_eq!(json["content"][0]["text"], "hi");
    }

    #[test]
    fn assistant_message_uses_output_text_content_type() {
        let item = ConversationItem::assistant_message("Welcome!");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"][0]["type"], "output_text");
    }

    #[test]
    fn parses_function_call_arguments_done() {
        let json = r#"{"type":"response.function_call_arguments.done","call_id":"c1","name":"get_time","arguments":"{}"}"#;
        let event: UpstreamServerEvent = serde_json::from_str(json).unwrap();
        match event {
            UpstreamServerEvent::ResponseFunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
            } => {
                assert_eq!(call_id, "c1");
                assert_eq!(name, "get_time");
                assert_eq!(arguments, "{}");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn parses_error_event_without_leaking_extra_fields() {
        let json = r#"{"type":"error","error":{"message":"invalid request","code":"invalid_request_error"}}"#;
        let event: UpstreamServerEvent = serde_json::from_str(json).unwrap();
        match event {
            UpstreamServerEvent::Error { error } => {
                assert_eq!(error.message, "invalid request");
                assert_eq!(error.code.as_deref(), Some("invalid_request_error"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
