//! Messages sent from the client (voice-agent) to the proxy.

use super::{AgentConfig, AudioSettings};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Must be the first message on the connection. Carries
    /// everything needed to derive the upstream session configuration.
    #[serde(rename = "Settings")]
    Settings {
        audio: AudioSettings,
        agent: AgentConfig,
    },

    /// A user utterance to inject as if spoken.
    #[serde(rename = "InjectUserMessage")]
    InjectUserMessage { content: String },

    /// Replaces the upstream instructions without touching other
    /// session fields.
    #[serde(rename = "UpdatePrompt")]
    UpdatePrompt { prompt: String },

    /// Replaces the upstream voice without touching other session
    /// fields.
    #[serde(rename = "UpdateSpeak")]
    UpdateSpeak { speak: String },

    /// An assistant message to inject as if spoken by the agent.
    #[serde(rename = "InjectAgentMessage")]
    InjectAgentMessage { content: String },

    /// The client's answer to a previously emitted
    /// `FunctionCallRequest`.
    #[serde(rename = "FunctionCallResponse")]
    FunctionCallResponse {
        id: String,
        name: String,
        content: String,
    },

    /// A periodic no-op; upstream keeps the connection alive on its
    /// own.
    #[serde(rename = "KeepAlive")]
    KeepAlive,

    /// Requests an orderly shutdown of the session.
    #[serde(rename = "CloseStream")]
    CloseStream,
}
