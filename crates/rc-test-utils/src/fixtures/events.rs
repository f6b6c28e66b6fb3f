//! Event builders.
//!
//! ```rust,ignore
//! let poll = events::create_poll("Ready?", &["Yes", "No"]);
//! let body = events::to_json(&poll);
//! ```

use room_coordinator::events::RoomEvent;

#[must_use]
pub fn join(display_name: &str) -> RoomEvent {
    RoomEvent::Join {
        display_name: display_name.to_string(),
    }
}

#[must_use]
pub fn leave() -> RoomEvent {
    RoomEvent::Leave
}

#[must_use]
pub fn raise_hand() -> RoomEvent {
    RoomEvent::RaiseHand
}

#[must_use]
pub fn lower_hand() -> RoomEvent {
    RoomEvent::LowerHand
}

#[must_use]
pub fn reaction(emoji: &str) -> RoomEvent {
    RoomEvent::SendReaction {
        emoji: emoji.to_string(),
    }
}

#[must_use]
pub fn create_poll(question: &str, options: &[&str]) -> RoomEvent {
    RoomEvent::CreatePoll {
        question: question.to_string(),
        options: options.iter().map(|o| (*o).to_string()).collect(),
    }
}

#[must_use]
pub fn cast_vote(poll_id: &str, option_index: usize) -> RoomEvent {
    RoomEvent::CastVote {
        poll_id: poll_id.to_string(),
        option_index,
    }
}

#[must_use]
pub fn close_poll(poll_id: &str) -> RoomEvent {
    RoomEvent::ClosePoll {
        poll_id: poll_id.to_string(),
    }
}

#[must_use]
pub fn set_permission(target: &str, can_publish: bool) -> RoomEvent {
    RoomEvent::SetPermission {
        target: target.to_string(),
        can_publish,
    }
}

#[must_use]
pub fn remove(target: &str) -> RoomEvent {
    RoomEvent::RemoveParticipant {
        target: target.to_string(),
    }
}

#[must_use]
pub fn end_room() -> RoomEvent {
    RoomEvent::EndRoom
}

/// Wire form of an event, as a client would send it.
#[must_use]
pub fn to_json(event: &RoomEvent) -> String {
    serde_json::to_string(event).expect("events always serialize")
}
