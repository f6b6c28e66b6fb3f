//! Event vocabulary.
//!
//! Inbound events are a tagged union (`{"type": ..., "payload": {...}}`,
//! camelCase). Anything that does not decode into a known variant, or whose
//! payload fails validation, is rejected with `InvalidPayload` before it
//! reaches a room.
//!
//! Outbound traffic is a [`ServerMessage`]: an `ack` or `error` addressed to
//! the sender only, or a `delta` broadcast to the room.

use crate::errors::RcError;
use crate::lifecycle::CloseReason;
use crate::polls::{PollSnapshot, Tally};
use crate::roster::ParticipantInfo;
use chrono::{DateTime, Utc};
use common::types::Caller;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum display name length in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 64;

/// Maximum reaction emoji length in characters.
pub const MAX_EMOJI_CHARS: usize = 16;

/// Client to room event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum RoomEvent {
    #[serde(rename_all = "camelCase")]
    Join { display_name: String },
    Leave,
    RaiseHand,
    LowerHand,
    SendReaction { emoji: String },
    CreatePoll { question: String, options: Vec<String> },
    #[serde(rename_all = "camelCase")]
    CastVote { poll_id: String, option_index: usize },
    #[serde(rename_all = "camelCase")]
    ClosePoll { poll_id: String },
    #[serde(rename_all = "camelCase")]
    SetPermission { target: String, can_publish: bool },
    RemoveParticipant { target: String },
    EndRoom,
}

impl RoomEvent {
    /// Event type label for logs and metrics.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            RoomEvent::Join { .. } => "join",
            RoomEvent::Leave => "leave",
            RoomEvent::RaiseHand => "raiseHand",
            RoomEvent::LowerHand => "lowerHand",
            RoomEvent::SendReaction { .. } => "sendReaction",
            RoomEvent::CreatePoll { .. } => "createPoll",
            RoomEvent::CastVote { .. } => "castVote",
            RoomEvent::ClosePoll { .. } => "closePoll",
            RoomEvent::SetPermission { .. } => "setPermission",
            RoomEvent::RemoveParticipant { .. } => "removeParticipant",
            RoomEvent::EndRoom => "endRoom",
        }
    }

    /// Events only a roster instructor may send.
    #[must_use]
    pub const fn is_instructor_only(&self) -> bool {
        matches!(
            self,
            RoomEvent::RemoveParticipant { .. }
                | RoomEvent::SetPermission { .. }
                | RoomEvent::EndRoom
                | RoomEvent::CreatePoll { .. }
                | RoomEvent::ClosePoll { .. }
        )
    }

    /// Shape checks that do not need room state.
    ///
    /// Poll definitions are validated by the poll engine.
    ///
    /// # Errors
    ///
    /// `InvalidPayload` describing the first problem found.
    pub fn validate(&self) -> Result<(), RcError> {
        match self {
            RoomEvent::Join { display_name } => {
                let len = display_name.trim().chars().count();
                if len == 0 || len > MAX_DISPLAY_NAME_CHARS {
                    return Err(RcError::InvalidPayload(format!(
                        "displayName must be 1 to {MAX_DISPLAY_NAME_CHARS} characters"
                    )));
                }
            }
            RoomEvent::SendReaction { emoji } => {
                let len = emoji.trim().chars().count();
                if len == 0 || len > MAX_EMOJI_CHARS {
                    return Err(RcError::InvalidPayload(format!(
                        "emoji must be 1 to {MAX_EMOJI_CHARS} characters"
                    )));
                }
            }
            RoomEvent::CastVote { poll_id, .. } | RoomEvent::ClosePoll { poll_id } => {
                if poll_id.trim().is_empty() {
                    return Err(RcError::InvalidPayload("pollId must not be empty".to_string()));
                }
            }
            RoomEvent::SetPermission { target, .. } | RoomEvent::RemoveParticipant { target } => {
                if target.trim().is_empty() {
                    return Err(RcError::InvalidPayload("target must not be empty".to_string()));
                }
            }
            RoomEvent::Leave
            | RoomEvent::RaiseHand
            | RoomEvent::LowerHand
            | RoomEvent::CreatePoll { .. }
            | RoomEvent::EndRoom => {}
        }
        Ok(())
    }
}

/// Decode one event from its JSON text.
///
/// Only the shape is checked here. Field limits are checked by the room,
/// after its lifecycle gate, so a closed room answers `RoomClosed` first.
///
/// # Errors
///
/// `InvalidPayload` for unknown types and shape mismatches.
pub fn decode_event(text: &str) -> Result<RoomEvent, RcError> {
    serde_json::from_str(text)
        .map_err(|e| RcError::InvalidPayload(format!("Unrecognized event: {e}")))
}

/// An event together with its routing facts.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub room_id: String,
    pub sender: Caller,
    pub event: RoomEvent,
}

/// Why a participant left the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LeaveReason {
    /// Participant sent `leave`.
    Voluntary,
    /// Instructor sent `removeParticipant`.
    Removed,
    /// Media transport reported the participant gone.
    TransportLeft,
    /// No liveness signal within the last-seen timeout.
    Timeout,
}

impl LeaveReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            LeaveReason::Voluntary => "voluntary",
            LeaveReason::Removed => "removed",
            LeaveReason::TransportLeft => "transport_left",
            LeaveReason::Timeout => "timeout",
        }
    }
}

/// Ephemeral emoji broadcast. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub id: Uuid,
    pub emoji: String,
    pub sender: String,
    pub sent_at: DateTime<Utc>,
    pub ttl_ms: u64,
}

impl Reaction {
    #[must_use]
    pub fn new(emoji: &str, sender: &str, ttl_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            emoji: emoji.trim().to_string(),
            sender: sender.to_string(),
            sent_at: Utc::now(),
            ttl_ms,
        }
    }
}

/// State change broadcast to every attached participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RoomDelta {
    ParticipantJoined {
        participant: ParticipantInfo,
    },
    ParticipantUpdated {
        participant: ParticipantInfo,
    },
    ParticipantLeft {
        identity: String,
        reason: LeaveReason,
    },
    HandChanged {
        identity: String,
        raised: bool,
    },
    #[serde(rename_all = "camelCase")]
    PermissionChanged {
        identity: String,
        can_publish: bool,
    },
    Reaction {
        reaction: Reaction,
    },
    PollCreated {
        poll: PollSnapshot,
    },
    TallyUpdated {
        tally: Tally,
    },
    PollClosed {
        tally: Tally,
    },
    #[serde(rename_all = "camelCase")]
    RoomEnding {
        ended_by: String,
    },
    RoomClosed {
        reason: CloseReason,
    },
}

impl RoomDelta {
    /// Identity this delta removes from the room, if any.
    #[must_use]
    pub fn departed(&self) -> Option<&str> {
        match self {
            RoomDelta::ParticipantLeft { identity, .. } => Some(identity),
            _ => None,
        }
    }
}

/// Result of an accepted event, returned to the sender only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum EventAck {
    /// Join accepted; carries the current room view.
    Joined {
        participant: ParticipantInfo,
        participants: Vec<ParticipantInfo>,
        polls: Vec<PollSnapshot>,
    },
    Left,
    Participant {
        participant: ParticipantInfo,
    },
    Reaction {
        reaction: Reaction,
    },
    Poll {
        poll: PollSnapshot,
    },
    Tally {
        tally: Tally,
    },
    Removed {
        identity: String,
    },
    RoomEnding,
}

/// Server to client frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Delta { room_id: String, delta: RoomDelta },
    Ack { ack: EventAck },
    Error { code: String, message: String },
}

impl ServerMessage {
    /// Client-safe error frame.
    #[must_use]
    pub fn error(err: &RcError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            message: err.client_message(),
        }
    }
}
