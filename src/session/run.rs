//! The steady-state `Ready` loop: read from the client, read from
//! upstream, and watch the audio debounce timer, translating and
//! forwarding in both directions until the session closes.

use super::{ClientReader, Session};
use crate::audio::DebounceOutcome;
use crate::error::{ErrorClass, ProxyError, classify_upstream_error};
use crate::protocol::{ClientMessage, FunctionCallItem, Role, ServerMessage};
use crate::translator::{from_upstream, to_upstream};
use crate::upstream::{self, UpstreamClientEvent, UpstreamReader, UpstreamServerEvent};
use axum::extract::ws::Message;
use futures_util::StreamExt;
use tracing::{info, warn};

pub(crate) async fn run(
    mut session: Session,
    mut client_rx: ClientReader,
    mut upstream_rx: UpstreamReader,
) -> Result<(), ProxyError> {
    loop {
        tokio::select! {
            client_msg = client_rx.next() => {
                match client_msg {
                    Some(Ok(msg)) => {
                        let cont = match handle_client_message(&mut session, msg).await {
                            Ok(cont) => cont,
                            Err(e) => handle_backpressure(&session, e)?,
                        };
                        if !cont {
                            break;
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        info!("Client closed the connection.");
                        break;
                    }
                }
            }
            upstream_msg = upstream_rx.next() => {
                match upstream_msg {
                    Some(Ok(msg)) => {
                        let cont = match handle_upstream_message(&mut session, msg).await {
                            Ok(cont) => cont,
                            Err(e) => handle_backpressure(&session, e)?,
                        };
                        if !cont {
                            break;
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        warn!("Upstream closed the connection.");
                        break;
                    }
                }
            }
            () = session.audio.wait_for_timer(), if session.audio.is_armed() => {
                if let Err(e) = handle_debounce_fire(&mut session).await {
                    if !handle_backpressure(&session, e)? {
                        break;
                    }
                }
            }
        }
    }

    session.audio.cancel();
    Ok(())
}

/// A full write queue means the peer (or upstream) isn't draining fast
/// enough to keep memory bounded. Rather than treat that like any
/// other fatal error, close the session in an orderly way: warn the
/// client, then stop. Any other error still propagates as fatal.
fn handle_backpressure(session: &Session, err: ProxyError) -> Result<bool, ProxyError> {
    match err {
        ProxyError::Backpressure => {
            warn!("Write queue backpressure exceeded; closing the session.");
            let _ = session.client_tx.send(ServerMessage::Warning {
                description: "The connection could not keep up and is being closed.".to_string(),
                code: "backpressure".to_string(),
            });
            Ok(false)
        }
        other => Err(other),
    }
}

/// Returns `false` when the session should close.
async fn handle_client_message(session: &mut Session, msg: Message) -> Result<bool, ProxyError> {
    match msg {
        Message::Text(text) => {
            let parsed: ClientMessage = match serde_json::from_str(&text) {
                Ok(m) => m,
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed client message.");
                    session.client_tx.send(ServerMessage::Warning {
                        description: e.to_string(),
                        code: "malformed_message".to_string(),
                    })?;
                    return Ok(true);
                }
            };
            handle_client_control_message(session, parsed).await
        }
        Message::Binary(data) => {
            session.audio.on_frame_appended(data.len());
            upstream::send_event(&session.upstream_tx, &to_upstream::audio_append_event(&data))?;
            Ok(true)
        }
        Message::Close(_) => {
            info!("Client sent a close frame.");
            Ok(false)
        }
        Message::Ping(_) | Message::Pong(_) => Ok(true),
    }
}

async fn handle_client_control_message(
    session: &mut Session,
    msg: ClientMessage,
) -> Result<bool, ProxyError> {
    match msg {
        ClientMessage::Settings { .. } => {
            return Err(ProxyError::ProtocolViolation(
                "Settings may only be sent once, as the first message".to_string(),
            ));
        }
        ClientMessage::InjectUserMessage { content } => {
            upstream::send_event(
                &session.upstream_tx,
                &to_upstream::inject_user_message_event(&content),
            )?;
            session.pending_user_responses += 1;
            session.client_tx.send(ServerMessage::ConversationText {
                role: Role::User,
                content,
            })?;
        }
        ClientMessage::UpdatePrompt { prompt } => {
            upstream::send_event(&session.upstream_tx, &to_upstream::prompt_update_event(&prompt))?;
        }
        ClientMessage::UpdateSpeak { speak } => {
            upstream::send_event(&session.upstream_tx, &to_upstream::speak_update_event(&speak))?;
        }
        ClientMessage::InjectAgentMessage { content } => {
            upstream::send_event(
                &session.upstream_tx,
                &to_upstream::inject_agent_message_event(&content),
            )?;
            session.client_tx.send(ServerMessage::ConversationText {
                role: Role::Assistant,
                content,
            })?;
        }
        ClientMessage::FunctionCallResponse { id, content, .. } => {
            for event in to_upstream::function_call_response_events(&id, &content) {
                upstream::send_event(&session.upstream_tx, &event)?;
            }
        }
        ClientMessage::KeepAlive => {}
        ClientMessage::CloseStream => {
            info!("Client requested an orderly shutdown.");
            return Ok(false);
        }
    }
    Ok(true)
}

/// Returns `false` when the session should close.
async fn handle_upstream_message(
    session: &mut Session,
    msg: tokio_tungstenite::tungstenite::Message,
) -> Result<bool, ProxyError> {
    let text = match msg.to_text() {
        Ok(t) => t,
        Err(_) => return Ok(true),
    };
    let event: UpstreamServerEvent = serde_json::from_str(text)?;

    match event {
        UpstreamServerEvent::SessionCreated { .. } | UpstreamServerEvent::SessionUpdated => {}

        UpstreamServerEvent::ConversationItemAdded { item } => {
            if item.role.as_deref() == Some("user") && session.pending_user_responses > 0 {
                session.pending_user_responses -= 1;
                upstream::send_event(&session.upstream_tx, &UpstreamClientEvent::ResponseCreate)?;
            }
        }
        UpstreamServerEvent::ConversationItemDone { .. } => {}

        UpstreamServerEvent::ResponseCreated => {
            session.tracking.reset();
            session.client_tx.send(ServerMessage::AgentThinking)?;
        }
        UpstreamServerEvent::ResponseContentPartAdded => {
            if let Some(m) = session.tracking.on_started_speaking_trigger() {
                session.client_tx.send(m)?;
            }
        }
        UpstreamServerEvent::ResponseDone => {
            if let Some(m) = session.tracking.on_audio_done_trigger() {
                session.client_tx.send(m)?;
            }
            if let Some(m) = session.tracking.on_response_complete() {
                session.client_tx.send(m)?;
            }
        }

        UpstreamServerEvent::ResponseOutputTextDelta { .. } => {}
        UpstreamServerEvent::ResponseOutputTextDone { text } => {
            for m in session.tracking.on_transcript_done(&text) {
                session.client_tx.send(m)?;
            }
        }

        UpstreamServerEvent::ResponseOutputAudioDelta { delta } => {
            if let Some(m) = session.tracking.on_started_speaking_trigger() {
                session.client_tx.send(m)?;
            }
            let frame = crate::audio::decode_frame(&delta)
                .map_err(|e| ProxyError::Translation(e.to_string()))?;
            session.client_tx.try_send(Message::Binary(frame.into()))?;
        }
        UpstreamServerEvent::ResponseOutputAudioDone => {
            if let Some(m) = session.tracking.on_audio_done_trigger() {
                session.client_tx.send(m)?;
            }
            if let Some(m) = session.tracking.on_response_complete() {
                session.client_tx.send(m)?;
            }
        }

        UpstreamServerEvent::ResponseOutputAudioTranscriptDelta { .. } => {}
        UpstreamServerEvent::ResponseOutputAudioTranscriptDone { transcript } => {
            for m in session.tracking.on_transcript_done(&transcript) {
                session.client_tx.send(m)?;
            }
        }

        UpstreamServerEvent::ResponseFunctionCallArgumentsDelta { .. } => {}
        UpstreamServerEvent::ResponseFunctionCallArgumentsDone {
            call_id,
            name,
            arguments,
        } => {
            let item = FunctionCallItem {
                id: call_id,
                name,
                arguments,
                client_side: None,
            };
            for m in session.tracking.on_function_call_done(item) {
                session.client_tx.send(m)?;
            }
        }

        UpstreamServerEvent::InputAudioBufferSpeechStarted => {
            session.client_tx.send(from_upstream::speech_started())?;
        }
        UpstreamServerEvent::InputAudioBufferSpeechStopped { audio_end_ms } => {
            session
                .client_tx
                .send(from_upstream::speech_stopped(audio_end_ms))?;
            session
                .client_tx
                .send(from_upstream::utterance_end(audio_end_ms))?;
        }

        UpstreamServerEvent::Error { error } => {
            return match classify_upstream_error(&error) {
                ErrorClass::Fatal => {
                    session.client_tx.send(from_upstream::map_error(&error))?;
                    Ok(false)
                }
                ErrorClass::Recoverable => {
                    session.client_tx.send(from_upstream::map_warning(&error))?;
                    Ok(true)
                }
            };
        }
    }

    Ok(true)
}

async fn handle_debounce_fire(session: &mut Session) -> Result<(), ProxyError> {
    if session.audio.on_timer_fired() == DebounceOutcome::Commit {
        upstream::send_event(&session.upstream_tx, &UpstreamClientEvent::InputAudioBufferCommit)?;
        upstream::send_event(&session.upstream_tx, &UpstreamClientEvent::ResponseCreate)?;
        session.audio.reset_after_commit();
    }
    Ok(())
}
