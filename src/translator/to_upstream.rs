//! Pure mapping from Agent-protocol (client) messages to Realtime-
//! protocol (upstream) events.
//!
//! These functions do no I/O. Where the mapping has a state effect
//! beyond "emit these events" (queuing a pending user message, closing
//! the session) the effect is returned as data for the session to
//! apply, not performed here.

use crate::protocol::{AgentConfig, HistoryMessage, Role};
use crate::upstream::{ConversationItem, SessionResource, ToolSpec, UpstreamClientEvent};

/// The proxy's resolved view of `Settings.agent`, derived once when
/// `Settings` is received and reused for the session-updated ack,
/// `UpdatePrompt`/`UpdateSpeak`, and history/greeting injection.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub instructions: String,
    pub voice: String,
    pub tools: Vec<ToolSpec>,
    pub greeting: Option<String>,
    pub history: Vec<HistoryMessage>,
}

impl SessionConfig {
    /// Builds the resolved session config from `Settings.agent`,
    /// stripping the client-only `client_side` flag from every tool
    /// definition before it can reach upstream.
    pub fn from_agent_config(agent: &AgentConfig) -> Self {
        let tools = agent
            .think
            .functions
            .iter()
            .map(|f| ToolSpec::function(f.name.clone(), f.description.clone(), f.parameters.clone()))
            .collect();
        let history = agent
            .context
            .as_ref()
            .map(|c| c.messages.clone())
            .unwrap_or_default();

        Self {
            instructions: agent.think.prompt.clone(),
            voice: agent.speak.clone(),
            tools,
            greeting: agent.greeting.clone(),
            history,
        }
    }

    /// The full `session.update` event sent once, right after the
    /// upstream socket opens, once the session has moved past
    /// `UpstreamConnecting`.
    ///
    /// Missing/empty tool lists omit the `tools` field entirely rather
    /// than sending an empty array.
    pub fn session_update_event(&self) -> UpstreamClientEvent {
        UpstreamClientEvent::SessionUpdate {
            session: SessionResource {
                instructions: Some(self.instructions.clone()),
                voice: Some(self.voice.clone()),
                tools: if self.tools.is_empty() {
                    None
                } else {
                    Some(self.tools.clone())
                },
                input_audio_format: Some("linear16".to_string()),
                output_audio_format: Some("linear16".to_string()),
            },
        }
    }
}

/// `UpdatePrompt{prompt}` -> a partial `session.update` touching only
/// `instructions`; other session fields are left unchanged because the
/// event omits them entirely.
pub fn prompt_update_event(prompt: &str) -> UpstreamClientEvent {
    UpstreamClientEvent::SessionUpdate {
        session: SessionResource {
            instructions: Some(prompt.to_string()),
            ..Default::default()
        },
    }
}

/// `UpdateSpeak{speak}` -> a partial `session.update` touching only
/// `voice`.
pub fn speak_update_event(voice: &str) -> UpstreamClientEvent {
    UpstreamClientEvent::SessionUpdate {
        session: SessionResource {
            voice: Some(voice.to_string()),
            ..Default::default()
        },
    }
}

/// One history item, replayed upstream during `InjectingHistory` in
/// declared order. Role-dependent content type is mandatory:
/// user -> `input_text`, assistant -> `output_text`.
pub fn history_item_event(message: &HistoryMessage) -> UpstreamClientEvent {
    let item = match message.role {
        Role::User => ConversationItem::user_message(message.content.clone()),
        Role::Assistant => ConversationItem::assistant_message(message.content.clone()),
    };
    UpstreamClientEvent::ConversationItemCreate { item }
}

/// The greeting's upstream half: one assistant `output_text` item.
pub fn greeting_item_event(greeting: &str) -> UpstreamClientEvent {
    UpstreamClientEvent::ConversationItemCreate {
        item: ConversationItem::assistant_message(greeting.to_string()),
    }
}

/// `InjectUserMessage{content}` -> a user `conversation.item.create`.
/// Do NOT emit `response.create` here: the session
/// defers it until the matching `conversation.item.added` arrives
/// from upstream.
pub fn inject_user_message_event(content: &str) -> UpstreamClientEvent {
    UpstreamClientEvent::ConversationItemCreate {
        item: ConversationItem::user_message(content.to_string()),
    }
}

/// `InjectAgentMessage{content}` -> an assistant
/// `conversation.item.create`.
pub fn inject_agent_message_event(content: &str) -> UpstreamClientEvent {
    UpstreamClientEvent::ConversationItemCreate {
        item: ConversationItem::assistant_message(content.to_string()),
    }
}

/// `FunctionCallResponse{id,content}` -> the function-call-output item
/// followed by the response trigger, in that order.
pub fn function_call_response_events(call_id: &str, output: &str) -> Vec<UpstreamClientEvent> {
    vec![
        UpstreamClientEvent::ConversationItemCreate {
            item: ConversationItem::FunctionCallOutput {
                call_id: call_id.to_string(),
                output: output.to_string(),
            },
        },
        UpstreamClientEvent::ResponseCreate,
    ]
}

/// A raw binary audio frame -> `input_audio_buffer.append`.
pub fn audio_append_event(frame: &[u8]) -> UpstreamClientEvent {
    UpstreamClientEvent::InputAudioBufferAppend {
        audio: crate::audio::encode_frame(frame),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{AgentConfig, ContextConfig, ThinkConfig, ToolDefinition};

    fn agent_config_with_tools(functions: Vec<ToolDefinition>) -> AgentConfig {
        AgentConfig {
            language: "en".into(),
            listen: None,
            think: ThinkConfig {
                provider: "open_ai".into(),
                model: "gpt-4o".into(),
                prompt: "Help.".into(),
                functions,
            },
            speak: "alloy".into(),
            greeting: None,
            context: None,
        }
    }

    #[test]
    fn strips_client_side_flag_from_tools() {
        let agent = agent_config_with_tools(vec![ToolDefinition {
            name: "f".into(),
            description: "d".into(),
            parameters: serde_json::json!({}),
            client_side: true,
        }]);
        let config = SessionConfig::from_agent_config(&agent);
        let event = config.session_update_event();
        let json = serde_json::to_value(&event).unwrap();
        let tool = &json["session"]["tools"][0];
        assert_eq!(tool["name"], "f");
        assert!(tool.get("client_side").is_none());
    }

    #[test]
    fn empty_function_list_omits_tools_field() {
        let agent = agent_config_with_tools(vec![]);
        let config = SessionConfig::from_agent_config(&agent);
        let event = config.session_update_event();
        let json = serde_json::to_value(&event).unwrap();
        assert!(json["session"].get("tools").is_none());
    }

    #[test]
    fn prompt_update_touches_only_instructions() {
        let event = prompt_update_event("New instructions");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["session"]["instructions"], "New instructions");
        assert!(json["session"].get("voice").is_none());
        assert!(json["session"].get("tools").is_none());
    }

    #[test]
    fn speak_update_touches_only_voice() {
        let event = speak_update_event("verse");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["session"]["voice"], "verse");
        assert!(json["session"].get("instructions").is_none());
    }

    #[test]
    fn history_items_use_role_dependent_content_type() {
        let user_item = history_item_event(&HistoryMessage {
            role: Role::User,
            content: "Hello".into(),
        });
        let assistant_item = history_item_event(&HistoryMessage {
            role: Role::Assistant,
            content: "Hi".into(),
        });
        let user_json = serde_json::to_value(&user_item).unwrap();
        let assistant_json = serde_json::to_value(&assistant_item).unwrap();
        assert_eq!(user_json["item"]["content"][0]["type"], "input_text");
        assert_eq!(assistant_json["item"]["content"][0]["type"], "output_text");
    }

    #[test]
    fn function_call_response_orders_item_create_before_response_create() {
        let events = function_call_response_events("c1", "{\"time\":\"12:00\"}");
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            UpstreamClientEvent::ConversationItemCreate { .. }
        ));
        assert!(matches!(events[1], UpstreamClientEvent::ResponseCreate));
    }

    #[test]
    fn inject_user_message_never_includes_a_response_create() {
        let event = inject_user_message_event("hi");
        assert!(!matches!(event, UpstreamClientEvent::ResponseCreate));
    }

    #[test]
    fn context_messages_preserved_in_declared_order() {
        let agent = AgentConfig {
            language: "en".into(),
            listen: None,
            think: ThinkConfig {
                provider: "open_ai".into(),
                model: "gpt-4o".into(),
                prompt: "Help.".into(),
                functions: vec![],
            },
            speak: "alloy".into(),
            greeting: Some("Welcome!".into()),
            context: Some(ContextConfig {
                messages: vec![
                    HistoryMessage {
                        role: Role::User,
                        content: "Hello".into(),
                    },
                    HistoryMessage {
                        role: Role::Assistant,
                        content: "Hi".into(),
                    },
                ],
            }),
        };
        let config = SessionConfig::from_agent_config(&agent);
        assert_eq!(config.history.len(), 2);
        assert_eq!(config.history[0].content, "Hello");
        assert_eq!(config.history[1].content, "Hi");
        assert_eq!(config.greeting.as_deref(), Some("Welcome!"));
    }
}
