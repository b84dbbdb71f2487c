use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use futures::{SinkExt, StreamExt, stream::SplitStream};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    agent::PlayerAgent,
    dto::ws::{ControllerInbound, ControllerOutbound},
    error::ServiceError,
    state::SharedState,
    store::to_value,
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Internal error type for controller message handling.
///
/// Distinct from `ServiceError`, which is reported back to the device
/// without closing the connection.
#[derive(Debug, Error)]
enum ControllerError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
    /// The room document disappeared.
    #[error("room closed")]
    RoomClosed,
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

/// Handle the full lifecycle of one controller WebSocket connection:
/// identification, then join and intents until the device leaves.
///
/// `linked_room` is the room carried by the join link the device opened.
pub async fn handle_socket(state: SharedState, socket: WebSocket, linked_room: Option<String>) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let Some(mut agent) = identify(&state, &mut receiver, &outbound_tx, linked_room).await else {
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    let room = agent.code().to_string();
    let player = agent.principal().to_string();
    info!(room = %room, player = %player, "controller connected");

    let identified = ControllerOutbound::Identified {
        room: room.clone(),
        principal: player.clone(),
    };
    if send_message_to_websocket(&outbound_tx, &identified).is_err()
        || push_room(&outbound_tx, &agent).is_err()
    {
        finalize(writer_task, outbound_tx).await;
        return;
    }

    loop {
        tokio::select! {
            message = receiver.next() => {
                let Some(message) = message else { break };
                match message {
                    Ok(Message::Text(text)) => {
                        let inbound = match ControllerInbound::from_json_str(&text) {
                            Ok(inbound) => inbound,
                            Err(err) => {
                                warn!(room = %room, player = %player, error = %err, "failed to parse controller message");
                                let reply = ControllerOutbound::Error { message: err.to_string() };
                                if send_message_to_websocket(&outbound_tx, &reply).is_err() {
                                    break;
                                }
                                continue;
                            }
                        };
                        if matches!(inbound, ControllerInbound::Leave) {
                            if let Err(err) = agent.leave().await {
                                warn!(room = %room, player = %player, error = %err, "failed to leave room");
                            }
                            let _ = outbound_tx.send(Message::Close(None));
                            finalize(writer_task, outbound_tx).await;
                            return;
                        }
                        match handle_message(&state, &mut agent, inbound, &outbound_tx).await {
                            Ok(()) => {}
                            Err(ControllerError::Service(err)) => {
                                debug!(room = %room, player = %player, error = %err, "controller request failed");
                                let reply = ControllerOutbound::Error { message: err.to_string() };
                                if send_message_to_websocket(&outbound_tx, &reply).is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                info!(room = %room, player = %player, error = %err, "terminating controller connection");
                                break;
                            }
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        let _ = outbound_tx.send(Message::Pong(payload));
                    }
                    Ok(Message::Close(frame)) => {
                        info!(room = %room, player = %player, "controller closed");
                        let _ = outbound_tx.send(Message::Close(frame));
                        break;
                    }
                    Ok(Message::Binary(_)) => {}
                    Ok(Message::Pong(_)) => {}
                    Err(err) => {
                        warn!(room = %room, player = %player, error = %err, "websocket error");
                        break;
                    }
                }
            }
            alive = agent.changed() => {
                if !alive || agent.room().is_none() {
                    let reply = ControllerOutbound::Error { message: ControllerError::RoomClosed.to_string() };
                    let _ = send_message_to_websocket(&outbound_tx, &reply);
                    let _ = outbound_tx.send(Message::Close(None));
                    finalize(writer_task, outbound_tx).await;
                    return;
                }
                if push_room(&outbound_tx, &agent).is_err() {
                    break;
                }
            }
        }
    }

    // The entry stays for the running game; only presence changes.
    if let Err(err) = agent.leave().await {
        warn!(room = %room, player = %player, error = %err, "failed to mark controller offline");
    }
    info!(room = %room, player = %player, "controller disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Wait for the identification message and attach an agent to its room.
async fn identify(
    state: &SharedState,
    receiver: &mut SplitStream<WebSocket>,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    linked_room: Option<String>,
) -> Option<PlayerAgent> {
    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => return None,
        Ok(Some(Ok(_))) => return None,
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            return None;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            return None;
        }
    };

    let (room, principal) = match ControllerInbound::from_json_str(&initial_message) {
        Ok(ControllerInbound::Identify { room, principal }) => (room, principal),
        Ok(_) => {
            warn!("first message was not identification");
            return None;
        }
        Err(err) => {
            warn!(error = %err, "failed to parse or validate identification");
            let _ = send_message_to_websocket(
                outbound_tx,
                &ControllerOutbound::Error {
                    message: err.to_string(),
                },
            );
            return None;
        }
    };

    let Some(room) = room.or(linked_room) else {
        let _ = send_message_to_websocket(
            outbound_tx,
            &ControllerOutbound::Error {
                message: ServiceError::InvalidInput("no room to join".into()).to_string(),
            },
        );
        return None;
    };
    let principal = principal.unwrap_or_else(|| state.identity().issue());
    match PlayerAgent::connect(state.store().clone(), &room, principal, state.clock()).await {
        Ok(agent) => Some(agent),
        Err(err) => {
            warn!(room = %room, error = %err, "controller could not attach to room");
            let _ = send_message_to_websocket(
                outbound_tx,
                &ControllerOutbound::Error {
                    message: err.to_string(),
                },
            );
            None
        }
    }
}

async fn handle_message(
    state: &SharedState,
    agent: &mut PlayerAgent,
    message: ControllerInbound,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), ControllerError> {
    match message {
        ControllerInbound::Identify { .. } => {
            warn!(room = %agent.code(), player = %agent.principal(), "ignoring duplicate identification message");
            Ok(())
        }
        ControllerInbound::Join {
            name,
            avatar,
            sensors,
        } => {
            let avatar = avatar.as_deref().and_then(decode_avatar_upload);
            let player = agent.join(&name, avatar, sensors, state.config()).await?;
            let reply = ControllerOutbound::Joined {
                player: to_value(&player).map_err(ServiceError::from)?,
            };
            send_message_to_websocket(outbound_tx, &reply)
        }
        ControllerInbound::Intent { intent } => {
            let outcome = agent.emit_intent(intent).await?;
            send_message_to_websocket(outbound_tx, &ControllerOutbound::IntentResult { outcome })
        }
        ControllerInbound::Leave => {
            agent.leave().await?;
            Ok(())
        }
    }
}

/// Raw image bytes of an uploaded avatar, given as base64 or a base64 data URL.
fn decode_avatar_upload(upload: &str) -> Option<Vec<u8>> {
    let payload = match upload.split_once(";base64,") {
        Some((_, payload)) => payload,
        None => upload,
    };
    match STANDARD.decode(payload.trim()) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            debug!(error = %err, "avatar upload is not base64; joining without avatar");
            None
        }
    }
}

fn push_room(
    tx: &mpsc::UnboundedSender<Message>,
    agent: &PlayerAgent,
) -> Result<(), ControllerError> {
    let Some(room) = agent.room() else {
        return Err(ControllerError::RoomClosed);
    };
    let room = to_value(&room).map_err(ServiceError::from)?;
    send_message_to_websocket(tx, &ControllerOutbound::Room { room })
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Returns `Err(ControllerError::ConnectionClosed)` if the writer channel is
/// closed; serialization failures are logged and swallowed.
fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), ControllerError>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| ControllerError::ConnectionClosed)
}

async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
