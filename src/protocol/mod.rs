//! The Agent protocol: the JSON+binary message set exchanged with the
//! voice-agent client.

pub mod client;
pub mod server;

pub use client::ClientMessage;
pub use server::ServerMessage;

use serde::{Deserialize, Serialize};

/// A conversation participant role, shared by history replay and
/// `ConversationText` echoes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in `Settings.agent.context.messages`, replayed upstream
/// in declared order before the greeting.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

/// A function/tool definition as the client declares it.
///
/// `client_side` is an auxiliary flag the proxy must strip before
/// forwarding upstream, since upstream rejects unknown fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub client_side: bool,
}

/// The `Settings.agent.think` block: the model and instructions the
/// upstream session should run with.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThinkConfig {
    pub provider: String,
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub functions: Vec<ToolDefinition>,
}

/// `Settings.agent.context`: declared conversation history to replay.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ContextConfig {
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

/// `Settings.agent`: everything needed to derive the upstream
/// session-update event plus history/greeting injection.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub language: String,
    #[serde(default)]
    pub listen: Option<serde_json::Value>,
    pub think: ThinkConfig,
    pub speak: String,
    #[serde(default)]
    pub greeting: Option<String>,
    #[serde(default)]
    pub context: Option<ContextConfig>,
}

/// `Settings.audio`: the client-declared input/output audio framing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioSettings {
    pub input: AudioFormat,
    pub output: AudioFormat,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioFormat {
    pub encoding: String,
    pub sample_rate: u32,
}

/// One requested function call, echoed to the client in
/// `FunctionCallRequest.functions`.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionCallItem {
    pub id: String,
    pub name: String,
    pub arguments: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_side: Option<bool>,
}
