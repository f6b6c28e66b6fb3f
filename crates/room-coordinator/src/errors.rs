//! Room coordinator error types.
//!
//! Every error is scoped to the single request that caused it and is
//! surfaced only to the originating sender, never broadcast. Internal
//! details are logged server-side but not exposed to clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned for every instructor-only control attempt by a student.
pub const INSTRUCTOR_ONLY_MESSAGE: &str = "Only the instructor can do this";

/// Room coordinator error type.
///
/// Maps to client error codes and HTTP statuses:
/// - `InvalidCaller`: `INVALID_CALLER` (401)
/// - `Unauthorized`: `UNAUTHORIZED` (403)
/// - `RoomNotFound`, `ParticipantNotFound`, `PollNotFound`: `*_NOT_FOUND` (404)
/// - `NotAParticipant`: `NOT_A_PARTICIPANT` (403)
/// - `RoomClosed`: `ROOM_CLOSED` (410)
/// - `RoomExists`: `CONFLICT` (409)
/// - `InvalidPoll`, `InvalidOption`, `InvalidPayload`: 400
/// - `PollInactive`: `POLL_INACTIVE` (409)
/// - `CapacityExceeded`, `Draining`: 503
/// - `Internal`: `INTERNAL_ERROR` (500)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RcError {
    /// Caller identity facts are missing or malformed.
    #[error("Invalid caller: {0}")]
    InvalidCaller(String),

    /// Role or ownership check failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Room is not known to this coordinator.
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Target participant is not in the roster.
    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    /// Sender has no roster entry in the room.
    #[error("Sender is not a participant of this room")]
    NotAParticipant,

    /// Event arrived after the room reached `ending` or `closed`.
    #[error("Room is closed")]
    RoomClosed,

    /// A room with this id is already live.
    #[error("Room already exists")]
    RoomExists,

    /// Malformed poll definition.
    #[error("Invalid poll: {0}")]
    InvalidPoll(String),

    /// Vote for an option index outside the poll's option list.
    #[error("Invalid option {index}: poll has {options} options")]
    InvalidOption { index: usize, options: usize },

    /// Poll id unknown in this room.
    #[error("Poll not found")]
    PollNotFound,

    /// Vote after the poll was closed.
    #[error("Poll is not active")]
    PollInactive,

    /// Event payload failed shape validation.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Room or coordinator is at capacity.
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Coordinator is shutting down.
    #[error("Coordinator is draining")]
    Draining,

    /// Internal error (actor channel failure and similar).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RcError {
    /// Returns the stable client error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            RcError::InvalidCaller(_) => "INVALID_CALLER",
            RcError::Unauthorized(_) => "UNAUTHORIZED",
            RcError::RoomNotFound(_) => "ROOM_NOT_FOUND",
            RcError::ParticipantNotFound(_) => "PARTICIPANT_NOT_FOUND",
            RcError::NotAParticipant => "NOT_A_PARTICIPANT",
            RcError::RoomClosed => "ROOM_CLOSED",
            RcError::RoomExists => "CONFLICT",
            RcError::InvalidPoll(_) => "INVALID_POLL",
            RcError::InvalidOption { .. } => "INVALID_OPTION",
            RcError::PollNotFound => "POLL_NOT_FOUND",
            RcError::PollInactive => "POLL_INACTIVE",
            RcError::InvalidPayload(_) => "INVALID_PAYLOAD",
            RcError::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            RcError::Draining => "DRAINING",
            RcError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            RcError::InvalidCaller(_) => 401,
            RcError::Unauthorized(_) | RcError::NotAParticipant => 403,
            RcError::RoomNotFound(_) | RcError::ParticipantNotFound(_) | RcError::PollNotFound => {
                404
            }
            RcError::RoomExists | RcError::PollInactive => 409,
            RcError::RoomClosed => 410,
            RcError::InvalidPoll(_) | RcError::InvalidOption { .. } | RcError::InvalidPayload(_) => {
                400
            }
            RcError::CapacityExceeded(_) | RcError::Draining => 503,
            RcError::Internal(_) => 500,
        }
    }

    /// Returns the metrics outcome label for this error.
    #[must_use]
    pub fn outcome_label(&self) -> String {
        self.code().to_ascii_lowercase()
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            RcError::Internal(_) => "An internal error occurred".to_string(),
            RcError::RoomNotFound(_) => "Room not found".to_string(),
            RcError::ParticipantNotFound(_) => "Participant not found".to_string(),
            RcError::NotAParticipant => "You are not a participant of this room".to_string(),
            RcError::RoomClosed => "This session has ended".to_string(),
            RcError::RoomExists => "Room already exists".to_string(),
            RcError::PollNotFound => "Poll not found".to_string(),
            RcError::PollInactive => "This poll is closed".to_string(),
            RcError::InvalidOption { options, .. } => {
                format!("Choose one of the {options} options")
            }
            RcError::Draining => "Server is shutting down, please reconnect".to_string(),
            RcError::InvalidCaller(msg)
            | RcError::Unauthorized(msg)
            | RcError::InvalidPoll(msg)
            | RcError::InvalidPayload(msg)
            | RcError::CapacityExceeded(msg) => msg.clone(),
        }
    }

    /// Shorthand for the instructor-only rejection.
    #[must_use]
    pub fn instructor_only() -> Self {
        RcError::Unauthorized(INSTRUCTOR_ONLY_MESSAGE.to_string())
    }
}

impl From<common::error::CommonError> for RcError {
    fn from(err: common::error::CommonError) -> Self {
        RcError::InvalidCaller(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for RcError {
    fn into_response(self) -> Response {
        if let RcError::Internal(detail) = &self {
            tracing::error!(target: "rc.errors", error = %detail, "Internal error");
        }

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.client_message(),
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(RcError::InvalidCaller("x".to_string()).status_code(), 401);
        assert_eq!(RcError::instructor_only().status_code(), 403);
        assert_eq!(RcError::NotAParticipant.status_code(), 403);
        assert_eq!(RcError::RoomNotFound("r".to_string()).status_code(), 404);
        assert_eq!(RcError::PollNotFound.status_code(), 404);
        assert_eq!(RcError::RoomExists.status_code(), 409);
        assert_eq!(RcError::PollInactive.status_code(), 409);
        assert_eq!(RcError::RoomClosed.status_code(), 410);
        assert_eq!(
            RcError::InvalidOption {
                index: 3,
                options: 2
            }
            .status_code(),
            400
        );
        assert_eq!(RcError::Draining.status_code(), 503);
        assert_eq!(RcError::Internal("boom".to_string()).status_code(), 500);
    }

    #[test]
    fn test_client_messages_hide_internal_details() {
        let err = RcError::Internal("channel send failed: receiver dropped".to_string());
        assert_eq!(err.client_message(), "An internal error occurred");

        let err = RcError::RoomNotFound("secret-room-42".to_string());
        assert!(!err.client_message().contains("secret-room-42"));
    }

    #[test]
    fn test_instructor_only_message_is_actionable() {
        let err = RcError::instructor_only();
        assert_eq!(err.code(), "UNAUTHORIZED");
        assert_eq!(err.client_message(), "Only the instructor can do this");
    }

    #[test]
    fn test_outcome_label() {
        assert_eq!(RcError::RoomClosed.outcome_label(), "room_closed");
        assert_eq!(RcError::NotAParticipant.outcome_label(), "not_a_participant");
    }

    #[test]
    fn test_common_error_conversion() {
        let err: RcError = common::error::CommonError::InvalidRole("admin".to_string()).into();
        assert!(matches!(err, RcError::InvalidCaller(_)));
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!(
                "{}",
                RcError::InvalidOption {
                    index: 5,
                    options: 2
                }
            ),
            "Invalid option 5: poll has 2 options"
        );
        assert_eq!(format!("{}", RcError::RoomClosed), "Room is closed");
    }
}
