//! Room API handlers.
//!
//! - `POST /api/v1/rooms` - Open a room (instructor only)
//! - `GET /api/v1/rooms/:room_id` - Room state snapshot
//! - `GET /api/v1/rooms/:room_id/participants` - Ordered roster
//! - `POST /api/v1/rooms/:room_id/events` - Route one event, returns the ack
//! - `GET /api/v1/rooms/:room_id/polls/:poll_id/tally` - On-demand tally
//! - `POST /api/v1/rooms/:room_id/transport/left` - Transport left report
//! - `POST /api/v1/rooms/:room_id/transport/seen` - Transport join / heartbeat
//!
//! Request bodies are read as raw bytes and decoded here so malformed JSON
//! answers with the standard `INVALID_PAYLOAD` envelope.

use crate::actors::RoomCreated;
use crate::errors::RcError;
use crate::events::{decode_event, EventAck, InboundEvent};
use crate::polls::Tally;
use crate::roster::ParticipantInfo;
use crate::routes::AppState;
use crate::state::RoomSnapshot;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use common::types::Caller;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// Body of `POST /api/v1/rooms`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub room_id: String,
    pub display_name: String,
}

/// Body of the transport report endpoints.
#[derive(Debug, Deserialize)]
pub struct TransportReport {
    pub identity: String,
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, RcError> {
    serde_json::from_slice(body).map_err(|e| RcError::InvalidPayload(format!("Invalid body: {e}")))
}

/// Handler for POST /api/v1/rooms
///
/// # Response
///
/// - 201 Created: room state and the owner's participant record
/// - 403 Forbidden: caller is not an instructor
/// - 409 Conflict: room id already live
/// - 503 Service Unavailable: at capacity or draining
#[instrument(skip_all, name = "rc.gateway.create_room", fields(identity = %caller.identity))]
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Bytes,
) -> Result<(StatusCode, Json<RoomCreated>), RcError> {
    let request: CreateRoomRequest = parse_body(&body)?;

    let created = state
        .controller
        .create_room(request.room_id, caller, request.display_name)
        .await?;

    info!(
        target: "rc.gateway",
        room_id = %created.room.room_id,
        owner = %created.owner.identity,
        "Room created"
    );

    Ok((StatusCode::CREATED, Json(created)))
}

/// Handler for GET /api/v1/rooms/:room_id
#[instrument(skip_all, name = "rc.gateway.get_room", fields(room_id = %room_id))]
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSnapshot>, RcError> {
    let room = state.controller.room(&room_id).await?;
    Ok(Json(room.get_state().await?))
}

/// Handler for GET /api/v1/rooms/:room_id/participants
#[instrument(skip_all, name = "rc.gateway.list_participants", fields(room_id = %room_id))]
pub async fn list_participants(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<ParticipantInfo>>, RcError> {
    let room = state.controller.room(&room_id).await?;
    Ok(Json(room.list_participants().await?))
}

/// Handler for POST /api/v1/rooms/:room_id/events
///
/// The body is one event in wire form; the response is the sender's ack.
#[instrument(
    skip_all,
    name = "rc.gateway.post_event",
    fields(room_id = %room_id, identity = %caller.identity)
)]
pub async fn post_event(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(room_id): Path<String>,
    body: Bytes,
) -> Result<Json<EventAck>, RcError> {
    let text = std::str::from_utf8(&body)
        .map_err(|_| RcError::InvalidPayload("Body is not UTF-8".to_string()))?;
    let event = decode_event(text)?;

    let ack = state
        .controller
        .dispatch(InboundEvent {
            room_id,
            sender: caller,
            event,
        })
        .await?;

    Ok(Json(ack))
}

/// Handler for GET /api/v1/rooms/:room_id/polls/:poll_id/tally
#[instrument(skip_all, name = "rc.gateway.tally", fields(room_id = %room_id, poll_id = %poll_id))]
pub async fn get_tally(
    State(state): State<Arc<AppState>>,
    Path((room_id, poll_id)): Path<(String, String)>,
) -> Result<Json<Tally>, RcError> {
    let room = state.controller.room(&room_id).await?;
    Ok(Json(room.tally(poll_id).await?))
}

/// Handler for POST /api/v1/rooms/:room_id/transport/left
///
/// Unknown identities and repeated reports answer 204 as well.
#[instrument(skip_all, name = "rc.gateway.transport_left", fields(room_id = %room_id))]
pub async fn transport_left(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, RcError> {
    let report: TransportReport = parse_body(&body)?;
    state
        .controller
        .transport_left(&room_id, report.identity)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /api/v1/rooms/:room_id/transport/seen
#[instrument(skip_all, name = "rc.gateway.transport_seen", fields(room_id = %room_id))]
pub async fn transport_seen(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, RcError> {
    let report: TransportReport = parse_body(&body)?;
    state
        .controller
        .transport_seen(&room_id, report.identity)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
