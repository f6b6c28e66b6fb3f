//! WebSocket channel: `GET /api/v1/rooms/:room_id/ws`.
//!
//! One socket per participant connection. Text frames from the client carry
//! one event each; the reply (`ack` or `error`) goes back on the same socket.
//! Room deltas arrive through the participant sink attached to the room.
//!
//! The socket is closed by the server after it forwards the room's
//! `roomClosed` or the participant's own `participantLeft`. A voluntary
//! leave closes only after its `left` ack is written. When the client goes
//! away the sink is detached and the participant is marked disconnected.

use crate::actors::RoomHandle;
use crate::errors::RcError;
use crate::events::{decode_event, EventAck, LeaveReason, RoomDelta, ServerMessage};
use crate::routes::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
    Extension,
};
use common::types::Caller;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Outbound buffer per connection. A full buffer drops deltas for this
/// connection only.
pub const SINK_BUFFER: usize = 64;

/// How long a socket stays open for the `left` ack after a voluntary leave.
/// Leaves sent over HTTP never produce one on this socket.
const LEAVE_ACK_WAIT: Duration = Duration::from_secs(1);

/// Handler for GET /api/v1/rooms/:room_id/ws
///
/// The room is resolved before the upgrade so unknown or closed rooms get a
/// plain HTTP error.
#[instrument(
    skip_all,
    name = "rc.gateway.ws",
    fields(room_id = %room_id, identity = %caller.identity)
)]
pub async fn room_socket(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(room_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, RcError> {
    let room = state.controller.room(&room_id).await?;
    Ok(ws.on_upgrade(move |socket| run_socket(socket, room, caller)))
}

async fn run_socket(socket: WebSocket, room: RoomHandle, caller: Caller) {
    let connection_id = Uuid::new_v4();
    let (sink_tx, sink_rx) = mpsc::channel(SINK_BUFFER);
    let (mut ws_sender, mut ws_receiver) = socket.split();

    if let Err(err) = room
        .attach(caller.identity.clone(), connection_id, sink_tx.clone())
        .await
    {
        debug!(
            target: "rc.gateway",
            room_id = %room.room_id(),
            identity = %caller.identity,
            error = %err,
            "Attach rejected"
        );
        let _ = send_frame(&mut ws_sender, &ServerMessage::error(&err)).await;
        let _ = ws_sender.close().await;
        return;
    }

    info!(
        target: "rc.gateway",
        room_id = %room.room_id(),
        identity = %caller.identity,
        connection_id = %connection_id,
        "WebSocket connected"
    );

    let writer = tokio::spawn(write_frames(ws_sender, sink_rx, caller.identity.clone()));

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let reply = match decode_event(&text) {
                    Ok(event) => match room.dispatch(caller.clone(), event).await {
                        Ok(ack) => ServerMessage::Ack { ack },
                        Err(err) => ServerMessage::error(&err),
                    },
                    Err(err) => ServerMessage::error(&err),
                };
                if sink_tx.send(reply).await.is_err() {
                    break;
                }
            }
            Ok(Message::Ping(_)) => {
                // Client keepalive counts as liveness.
                let _ = room.transport_seen(caller.identity.clone()).await;
            }
            Ok(Message::Binary(_)) => {
                let err = RcError::InvalidPayload("Binary frames are not supported".to_string());
                if sink_tx.send(ServerMessage::error(&err)).await.is_err() {
                    break;
                }
            }
            Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => break,
            Err(err) => {
                debug!(
                    target: "rc.gateway",
                    identity = %caller.identity,
                    error = %err,
                    "WebSocket receive failed"
                );
                break;
            }
        }
    }

    room.detach(caller.identity.clone(), connection_id).await;
    drop(sink_tx);
    writer.abort();

    info!(
        target: "rc.gateway",
        room_id = %room.room_id(),
        identity = %caller.identity,
        connection_id = %connection_id,
        "WebSocket disconnected"
    );
}

/// Forward sink messages to the socket until the room is done with us.
async fn write_frames(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut sink_rx: mpsc::Receiver<ServerMessage>,
    identity: String,
) {
    let mut leaving = false;
    loop {
        let next = if leaving {
            tokio::time::timeout(LEAVE_ACK_WAIT, sink_rx.recv())
                .await
                .unwrap_or(None)
        } else {
            sink_rx.recv().await
        };
        let Some(message) = next else {
            break;
        };

        let effect = frame_effect(&message, &identity);
        if send_frame(&mut ws_sender, &message).await.is_err() {
            return;
        }
        match effect {
            FrameEffect::Keep => {}
            FrameEffect::Leaving => leaving = true,
            FrameEffect::Last => break,
        }
    }
    let _ = ws_sender.close().await;
}

async fn send_frame(
    ws_sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            warn!(target: "rc.gateway", error = %e, "Failed to encode server message");
            return Ok(());
        }
    };
    ws_sender.send(Message::Text(text)).await
}

/// What forwarding a message means for the connection.
#[derive(Debug, PartialEq, Eq)]
enum FrameEffect {
    Keep,
    /// Own voluntary departure; the `left` ack is still to come.
    Leaving,
    Last,
}

fn frame_effect(message: &ServerMessage, identity: &str) -> FrameEffect {
    match message {
        ServerMessage::Delta {
            delta: RoomDelta::RoomClosed { .. },
            ..
        } => FrameEffect::Last,
        ServerMessage::Delta {
            delta:
                RoomDelta::ParticipantLeft {
                    identity: departed,
                    reason,
                },
            ..
        } if departed == identity => match reason {
            LeaveReason::Voluntary => FrameEffect::Leaving,
            LeaveReason::Removed | LeaveReason::TransportLeft | LeaveReason::Timeout => {
                FrameEffect::Last
            }
        },
        ServerMessage::Ack {
            ack: EventAck::Left,
        } => FrameEffect::Last,
        ServerMessage::Delta { .. } | ServerMessage::Ack { .. } | ServerMessage::Error { .. } => {
            FrameEffect::Keep
        }
    }
}
