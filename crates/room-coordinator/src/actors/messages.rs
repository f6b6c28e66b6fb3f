//! Message types for actor communication.
//!
//! Request messages carry a `respond_to` oneshot sender; notifications do
//! not. All mailboxes are bounded `tokio::sync::mpsc` channels.

use super::room::RoomHandle;
use crate::errors::RcError;
use crate::events::{EventAck, RoomEvent, ServerMessage};
use crate::lifecycle::CloseReason;
use crate::polls::Tally;
use crate::roster::ParticipantInfo;
use crate::state::RoomSnapshot;
use common::types::Caller;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Outbound channel of one participant connection.
pub type ParticipantSink = mpsc::Sender<ServerMessage>;

/// Messages handled by the `RoomControllerActor`.
#[derive(Debug)]
pub enum ControllerMessage {
    /// Open a room with `owner` as its first participant.
    CreateRoom {
        room_id: String,
        owner: Caller,
        display_name: String,
        respond_to: oneshot::Sender<Result<RoomCreated, RcError>>,
    },

    /// Look up the actor of a live room.
    GetRoom {
        room_id: String,
        respond_to: oneshot::Sender<Result<RoomHandle, RcError>>,
    },

    /// Stop a room immediately.
    RemoveRoom {
        room_id: String,
        respond_to: oneshot::Sender<Result<(), RcError>>,
    },

    /// A room actor finished its retention window and is exiting.
    RoomFinished {
        room_id: String,
        generation: u64,
        reason: Option<CloseReason>,
    },

    GetStatus {
        respond_to: oneshot::Sender<ControllerStatus>,
    },

    /// Stop accepting rooms and cancel every room.
    Shutdown {
        deadline: Duration,
        respond_to: oneshot::Sender<Result<(), RcError>>,
    },
}

/// Messages handled by a `RoomActor`.
#[derive(Debug)]
pub enum RoomMessage {
    /// Route one inbound event.
    Dispatch {
        sender: Caller,
        event: RoomEvent,
        respond_to: oneshot::Sender<Result<EventAck, RcError>>,
    },

    /// Media transport reported the participant gone.
    TransportLeft {
        identity: String,
        respond_to: oneshot::Sender<Result<(), RcError>>,
    },

    /// Media transport join report or heartbeat.
    TransportSeen {
        identity: String,
        respond_to: oneshot::Sender<Result<(), RcError>>,
    },

    /// Attach an outbound sink for `identity`, replacing any earlier one.
    Attach {
        identity: String,
        connection_id: Uuid,
        sink: ParticipantSink,
        respond_to: oneshot::Sender<Result<(), RcError>>,
    },

    /// A connection closed. Ignored unless `connection_id` is the one
    /// currently attached for `identity`.
    Detach { identity: String, connection_id: Uuid },

    ListParticipants {
        respond_to: oneshot::Sender<Vec<ParticipantInfo>>,
    },

    GetParticipant {
        identity: String,
        respond_to: oneshot::Sender<Result<ParticipantInfo, RcError>>,
    },

    HandRaised {
        identity: String,
        respond_to: oneshot::Sender<Result<bool, RcError>>,
    },

    Tally {
        poll_id: String,
        respond_to: oneshot::Sender<Result<Tally, RcError>>,
    },

    GetState {
        respond_to: oneshot::Sender<RoomSnapshot>,
    },
}

/// Reply to a successful `CreateRoom`.
#[derive(Debug, Clone, Serialize)]
pub struct RoomCreated {
    pub room: RoomSnapshot,
    pub owner: ParticipantInfo,
}

/// Controller status snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerStatus {
    pub room_count: usize,
    pub participant_count: usize,
    pub sink_count: usize,
    /// Closed room ids remembered for `RoomClosed` answers.
    pub tombstone_count: usize,
    pub is_draining: bool,
    pub mailbox_depth: usize,
}
