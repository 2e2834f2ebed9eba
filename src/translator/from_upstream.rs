//! Pure mapping from upstream Realtime-protocol events to Agent-protocol
//! (client-facing) messages.
//!
//! Per-response bookkeeping (has `AgentStartedSpeaking` already fired
//! for this response, has the transcript already been echoed, has
//! `AgentAudioDone` already fired) lives in [`ResponseTrackingState`],
//! owned by the session and reset whenever a new `response.created`
//! arrives.

use crate::protocol::{Role, ServerMessage};
use crate::upstream::UpstreamErrorDetail;

/// Tracks the handful of per-response facts needed to de-duplicate
/// client-visible events that upstream may otherwise trigger more than
/// once for the same response.
#[derive(Debug, Default)]
pub struct ResponseTrackingState {
    started_speaking_emitted: bool,
    audio_done_emitted: bool,
    transcript_done_text: Option<String>,
    /// A function call that arrived before any transcript for this
    /// response. Held back so the client still sees
    /// ConversationText/FunctionCallRequest/ConversationText in order
    /// once the transcript lands; flushed bare if the response ends
    /// without ever producing one.
    pending_function_call: Option<crate::protocol::FunctionCallItem>,
}

impl ResponseTrackingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all per-response flags. Call on `response.created`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// `response.content_part.added` or the first output delta ->
    /// `AgentStartedSpeaking`, emitted at most once per response.
    pub fn on_started_speaking_trigger(&mut self) -> Option<ServerMessage> {
        if self.started_speaking_emitted {
            None
        } else {
            self.started_speaking_emitted = true;
            Some(ServerMessage::AgentStartedSpeaking)
        }
    }

    /// `response.output_audio_transcript.done` (or
    /// `response.output_text.done`) -> `ConversationText`, always
    /// emitted first. If a function call for this response already
    /// arrived and is waiting on this transcript, it is released here,
    /// followed by a second `ConversationText` echo, guaranteeing the
    /// client sees ConversationText, FunctionCallRequest,
    /// ConversationText in that order regardless of which upstream
    /// event arrived first.
    pub fn on_transcript_done(&mut self, transcript: &str) -> Vec<ServerMessage> {
        self.transcript_done_text = Some(transcript.to_string());
        let mut out = vec![ServerMessage::ConversationText {
            role: Role::Assistant,
            content: transcript.to_string(),
        }];
        if let Some(call) = self.pending_function_call.take() {
            out.push(ServerMessage::FunctionCallRequest {
                functions: vec![call],
            });
            out.push(ServerMessage::ConversationText {
                role: Role::Assistant,
                content: transcript.to_string(),
            });
        }
        out
    }

    /// `response.function_call_arguments.done`. If a transcript for
    /// this response already arrived, emits the function-call request
    /// plus a second `ConversationText` echo of that transcript right
    /// away. Otherwise the call is held until a transcript arrives (or
    /// the response ends without one, see `on_response_complete`) so
    /// the client never sees the request before its paired text.
    pub fn on_function_call_done(
        &mut self,
        call: crate::protocol::FunctionCallItem,
    ) -> Vec<ServerMessage> {
        if let Some(text) = self.transcript_done_text.clone() {
            vec![
                ServerMessage::FunctionCallRequest {
                    functions: vec![call],
                },
                ServerMessage::ConversationText {
                    role: Role::Assistant,
                    content: text,
                },
            ]
        } else {
            self.pending_function_call = Some(call);
            vec![]
        }
    }

    /// Called when a response ends (`response.done` /
    /// `response.output_audio.done`). Flushes a function call that
    /// never got a paired transcript, the common pure function-call
    /// turn, which has no transcript at all.
    pub fn on_response_complete(&mut self) -> Option<ServerMessage> {
        self.pending_function_call
            .take()
            .map(|call| ServerMessage::FunctionCallRequest {
                functions: vec![call],
            })
    }

    /// `response.output_audio.done` or `response.done` -> `AgentAudioDone`,
    /// emitted at most once, and only if audio for this response
    /// actually started (a text-only response never emits it).
    pub fn on_audio_done_trigger(&mut self) -> Option<ServerMessage> {
        if self.audio_done_emitted || !self.started_speaking_emitted {
            None
        } else {
            self.audio_done_emitted = true;
            Some(ServerMessage::AgentAudioDone)
        }
    }
}

/// `input_audio_buffer.speech_started` -> `UserStartedSpeaking`.
pub fn speech_started() -> ServerMessage {
    ServerMessage::UserStartedSpeaking
}

/// `input_audio_buffer.speech_stopped` -> `UserStoppedSpeaking`.
pub fn speech_stopped(audio_end_ms: Option<f64>) -> ServerMessage {
    ServerMessage::UserStoppedSpeaking {
        timestamp: audio_end_ms,
    }
}

/// `input_audio_buffer.speech_stopped` also synthesizes an
/// `UtteranceEnd` carrying the same timing field, converted from
/// upstream's milliseconds to the seconds convention `last_word_end`
/// uses. Emitted in addition to, never instead of, `UserStoppedSpeaking`.
pub fn utterance_end(audio_end_ms: Option<f64>) -> ServerMessage {
    ServerMessage::UtteranceEnd {
        channel: None,
        last_word_end: audio_end_ms.unwrap_or(0.0) / 1000.0,
    }
}

/// `error` -> a client-visible `Error`. The credential used to dial
/// upstream never passes through this path: `UpstreamErrorDetail` has
/// no field capable of carrying it.
pub fn map_error(detail: &UpstreamErrorDetail) -> ServerMessage {
    ServerMessage::Error {
        description: detail.message.clone(),
        code: detail.code.clone().unwrap_or_else(|| "upstream_error".to_string()),
    }
}

/// A recoverable upstream error, surfaced as a `Warning` rather than a
/// session-ending `Error`.
pub fn map_warning(detail: &UpstreamErrorDetail) -> ServerMessage {
    ServerMessage::Warning {
        description: detail.message.clone(),
        code: detail.code.clone().unwrap_or_else(|| "upstream_warning".to_string()),
    }
}
