//! Per-connection session lifecycle: handshake with the client,
//! handshake with upstream, then the steady-state translation loop.
//!
//! - `mod.rs`: the axum entry point and the linear handshake stages
//!   (`AwaitingSettings` -> `UpstreamConnecting` ->
//!   `AwaitingSessionUpdated` -> `InjectingHistory` -> `Ready`).
//! - `run`: the steady-state `Ready` loop, analogous to the handshake
//!   stages but looping instead of running once.

mod run;
mod writer;

use crate::config::Config;
use crate::error::ProxyError;
use crate::protocol::{AgentConfig, AudioSettings, ClientMessage, ServerMessage};
use crate::translator::{ResponseTrackingState, SessionConfig};
use crate::upstream::{self, UpstreamReader, UpstreamServerEvent, UpstreamWriter, UpstreamWriterHandle};
pub(crate) use writer::ClientWriterHandle;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tracing::{Instrument, error, info, instrument, warn};
use uuid::Uuid;

pub(crate) type ClientWriter = SplitSink<WebSocket, Message>;
pub(crate) type ClientReader = SplitStream<WebSocket>;

/// The stage a connection is in before it settles into the steady-state
/// `Ready` loop. Only used for logging, since each stage below runs once,
/// in order, and a failure at any stage ends the connection.
#[derive(Debug, Clone, Copy)]
enum SessionPhase {
    AwaitingSettings,
    UpstreamConnecting,
    AwaitingSessionUpdated,
    InjectingHistory,
    Ready,
}

/// Everything the steady-state loop in `run` needs, gathered once the
/// handshake completes.
pub(crate) struct Session {
    client_tx: ClientWriterHandle,
    upstream_tx: UpstreamWriterHandle,
    audio: crate::audio::AudioBufferState,
    tracking: ResponseTrackingState,
    /// Count of `InjectUserMessage`s sent upstream whose matching
    /// `conversation.item.added` hasn't arrived yet. Each one owes a
    /// deferred `response.create`.
    pending_user_responses: usize,
}

/// Axum handler: upgrades the HTTP connection and hands it to
/// [`handle_socket`].
pub async fn ws_handler(ws: WebSocketUpgrade, State(config): State<Arc<Config>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, config))
}

#[instrument(name = "agent_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, config: Arc<Config>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", session_id.to_string());
    info!("New client connection.");

    let (mut client_tx, mut client_rx) = socket.split();

    if let Err(e) = send_client_msg(&mut client_tx, ServerMessage::Welcome { request_id: session_id }).await {
        warn!(error = %e, "Client disconnected before the welcome message could be sent.");
        return;
    }

    let (audio_settings, agent) = match await_settings(&mut client_rx, &mut client_tx).await {
        Ok(settings) => settings,
        Err(e) => {
            warn!(error = %e, "Handshake failed while awaiting Settings.");
            let _ = send_client_msg(
                &mut client_tx,
                ServerMessage::Error {
                    description: e.to_string(),
                    code: "protocol_violation".to_string(),
                },
            )
            .await;
            return;
        }
    };
    info!(
        input_encoding = %audio_settings.input.encoding,
        output_encoding = %audio_settings.output.encoding,
        "Settings received."
    );

    let session_config = SessionConfig::from_agent_config(&agent);

    info!(phase = ?SessionPhase::UpstreamConnecting, "Dialing upstream realtime provider.");
    let (mut upstream_tx, mut upstream_rx) =
        match upstream::connect(&config.upstream_url, &config.upstream_api_key).await {
            Ok(pair) => pair,
            Err(e) => {
                error!(error = %e, "Failed to connect to upstream provider.");
                let _ = send_client_msg(
                    &mut client_tx,
                    ServerMessage::Error {
                        description: "Failed to reach the realtime provider.".to_string(),
                        code: "upstream_unreachable".to_string(),
                    },
                )
                .await;
                return;
            }
        };

    if let Err(e) =
        upstream::send_event_direct(&mut upstream_tx, &session_config.session_update_event()).await
    {
        error!(error = %e, "Failed to send initial session.update.");
        let _ = send_client_msg(
            &mut client_tx,
            ServerMessage::Error {
                description: "Failed to configure the realtime session.".to_string(),
                code: "upstream_unreachable".to_string(),
            },
        )
        .await;
        return;
    }

    info!(phase = ?SessionPhase::AwaitingSessionUpdated, "Waiting for upstream to acknowledge session.update.");
    match tokio::time::timeout(
        config.session_updated_timeout,
        await_session_updated(&mut upstream_rx),
    )
    .await
    {
        Ok(Ok(())) => {}
        Ok(Err(ProxyError::UpstreamRejected(detail))) => {
            error!(error = %detail.message, "Upstream rejected the session configuration.");
            let _ = send_client_msg(&mut client_tx, crate::translator::from_upstream::map_error(&detail)).await;
            return;
        }
        Ok(Err(e)) => {
            error!(error = %e, "Upstream rejected the session configuration.");
            let _ = send_client_msg(
                &mut client_tx,
                ServerMessage::Error {
                    description: e.to_string(),
                    code: "session_update_rejected".to_string(),
                },
            )
            .await;
            return;
        }
        Err(_) => {
            let err = ProxyError::Timeout;
            error!(error = %err, "Timed out waiting for upstream session.updated.");
            let _ = send_client_msg(
                &mut client_tx,
                ServerMessage::Error {
                    description: err.to_string(),
                    code: "session_updated_timeout".to_string(),
                },
            )
            .await;
            return;
        }
    }

    if let Err(e) = send_client_msg(&mut client_tx, ServerMessage::SettingsApplied).await {
        warn!(error = %e, "Client disconnected before SettingsApplied could be sent.");
        return;
    }

    info!(phase = ?SessionPhase::InjectingHistory, history_len = session_config.history.len(), "Replaying declared history.");
    if let Err(e) = inject_history_and_greeting(&mut upstream_tx, &mut client_tx, &session_config).await {
        error!(error = %e, "Failed to replay history to upstream.");
        let _ = send_client_msg(
            &mut client_tx,
            ServerMessage::Error {
                description: "Failed to initialize conversation history.".to_string(),
                code: "upstream_unreachable".to_string(),
            },
        )
        .await;
        return;
    }
    info!(phase = ?SessionPhase::Ready, "Session ready; entering steady-state loop.");

    let session = Session {
        client_tx: ClientWriterHandle::spawn(client_tx),
        upstream_tx: UpstreamWriterHandle::spawn(upstream_tx),
        audio: crate::audio::AudioBufferState::new(
            config.audio_commit_debounce,
            config.audio_commit_min_bytes,
        ),
        tracking: ResponseTrackingState::new(),
        pending_user_responses: 0,
    };

    let session_span = tracing::info_span!("ready_loop", %session_id);
    async move {
        if let Err(e) = run::run(session, client_rx, upstream_rx).await {
            error!(error = %e, "Session ended with an error.");
        }
        info!("Session closed.");
    }
    .instrument(session_span)
    .await;
}

/// Reads client messages until `Settings` arrives. Binary audio sent
/// this early is dropped with a `Warning` rather than failing the
/// handshake, per spec: the session keeps waiting. Any other message
/// type sent before `Settings` is a fatal protocol violation.
async fn await_settings(
    client_rx: &mut ClientReader,
    client_tx: &mut ClientWriter,
) -> Result<(AudioSettings, AgentConfig), ProxyError> {
    loop {
        match client_rx.next().await {
            Some(Ok(Message::Text(text))) => {
                return match serde_json::from_str::<ClientMessage>(&text)? {
                    ClientMessage::Settings { audio, agent } => Ok((audio, agent)),
                    other => Err(ProxyError::ProtocolViolation(format!(
                        "expected Settings as the first message, got {other:?}"
                    ))),
                };
            }
            Some(Ok(Message::Binary(_))) => {
                warn!("Dropping binary audio received before Settings.");
                send_client_msg(
                    client_tx,
                    ServerMessage::Warning {
                        description: "Audio frames are ignored until Settings is received."
                            .to_string(),
                        code: "audio_before_settings".to_string(),
                    },
                )
                .await?;
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) => {
                return Err(ProxyError::ProtocolViolation(
                    "client closed the connection before sending Settings".to_string(),
                ));
            }
            Some(Err(e)) => return Err(e.into()),
            None => {
                return Err(ProxyError::ProtocolViolation(
                    "client disconnected before sending Settings".to_string(),
                ));
            }
        }
    }
}

/// Drains upstream events until `session.updated` arrives. A
/// `session.created` along the way is expected and ignored; an `error`
/// fails the handshake.
async fn await_session_updated(upstream_rx: &mut UpstreamReader) -> Result<(), ProxyError> {
    loop {
        match upstream_rx.next().await {
            Some(Ok(msg)) => {
                let text = match msg.to_text() {
                    Ok(t) => t.to_string(),
                    Err(_) => continue,
                };
                match serde_json::from_str::<UpstreamServerEvent>(&text) {
                    Ok(UpstreamServerEvent::SessionUpdated) => return Ok(()),
                    Ok(UpstreamServerEvent::SessionCreated { session }) => {
                        info!(upstream_session_id = %session.id, "Upstream session created.");
                    }
                    Ok(UpstreamServerEvent::Error { error }) => {
                        return Err(ProxyError::UpstreamRejected(error));
                    }
                    Ok(_) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            Some(Err(e)) => return Err(e.into()),
            None => {
                return Err(ProxyError::UpstreamHandshake(
                    "upstream closed the connection during handshake".to_string(),
                ));
            }
        }
    }
}

/// Replays `Settings.agent.context.messages` in order (upstream only, no
/// client echo), then the greeting (if any) injected both ways: one
/// upstream assistant item and one client `ConversationText`.
async fn inject_history_and_greeting(
    upstream_tx: &mut UpstreamWriter,
    client_tx: &mut ClientWriter,
    session_config: &SessionConfig,
) -> Result<(), ProxyError> {
    for message in &session_config.history {
        upstream::send_event_direct(
            upstream_tx,
            &crate::translator::to_upstream::history_item_event(message),
        )
        .await?;
    }
    if let Some(greeting) = &session_config.greeting {
        upstream::send_event_direct(
            upstream_tx,
            &crate::translator::to_upstream::greeting_item_event(greeting),
        )
        .await?;
        send_client_msg(
            client_tx,
            ServerMessage::ConversationText {
                role: crate::protocol::Role::Assistant,
                content: greeting.clone(),
            },
        )
        .await?;
    }
    Ok(())
}

pub(crate) async fn send_client_msg(
    client_tx: &mut ClientWriter,
    msg: ServerMessage,
) -> Result<(), ProxyError> {
    let text = serde_json::to_string(&msg)?;
    client_tx.send(Message::Text(text.into())).await?;
    Ok(())
}
