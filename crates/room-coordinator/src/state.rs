//! Authoritative per-room state.
//!
//! `RoomState` bundles the lifecycle, roster and poll engine of one room.
//! It is owned by a single `RoomActor` and every mutation goes through the
//! event router or the lifecycle reconciliation methods.

use crate::config::RoomSettings;
use crate::errors::RcError;
use crate::events::{LeaveReason, RoomDelta};
use crate::lifecycle::{CloseReason, Lifecycle, LifecycleState};
use crate::polls::PollEngine;
use crate::roster::{ParticipantInfo, Roster};
use chrono::{DateTime, Utc};
use common::types::{Caller, Role};
use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug)]
pub struct RoomState {
    pub room_id: String,
    pub lifecycle: Lifecycle,
    pub roster: Roster,
    pub polls: PollEngine,
    pub settings: RoomSettings,
}

/// Wire form of a room's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: String,
    pub state: LifecycleState,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub participant_count: usize,
    pub connected_count: usize,
    pub active_polls: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<CloseReason>,
}

impl RoomState {
    /// Open a room with `owner` upserted as its first participant.
    #[must_use]
    pub fn new(
        room_id: &str,
        owner: &Caller,
        display_name: &str,
        settings: RoomSettings,
        now: Instant,
    ) -> (Self, ParticipantInfo) {
        let mut roster = Roster::new(settings.students_can_publish);
        let owner_entry = roster
            .upsert_participant(&owner.identity, Role::Instructor, display_name.trim(), now)
            .participant;

        let state = Self {
            room_id: room_id.to_string(),
            lifecycle: Lifecycle::new(&owner.identity),
            roster,
            polls: PollEngine::new(),
            settings,
        };

        (state, owner_entry)
    }

    #[must_use]
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id.clone(),
            state: self.lifecycle.state(),
            owner: self.lifecycle.owner().to_string(),
            created_at: self.lifecycle.created_at(),
            participant_count: self.roster.len(),
            connected_count: self.roster.connected_count(),
            active_polls: self.polls.active_count(),
            ended_by: self.lifecycle.ended_by().map(str::to_string),
            close_reason: self.lifecycle.close_reason(),
        }
    }

    /// Participants in join order.
    #[must_use]
    pub fn participants(&self) -> Vec<ParticipantInfo> {
        self.roster.list_participants().map(|p| p.info()).collect()
    }

    /// Remove `identity` and report it, followed by any lifecycle change the
    /// removal causes.
    ///
    /// # Errors
    ///
    /// `ParticipantNotFound` if the identity is not in the roster.
    pub(crate) fn remove_with_reason(
        &mut self,
        identity: &str,
        reason: LeaveReason,
        now: Instant,
    ) -> Result<Vec<RoomDelta>, RcError> {
        let removed = self.roster.remove_participant(identity)?;

        tracing::debug!(
            target: "rc.router",
            room_id = %self.room_id,
            identity = %removed.identity,
            reason = reason.as_str(),
            "Participant left"
        );

        let mut deltas = vec![RoomDelta::ParticipantLeft {
            identity: removed.identity,
            reason,
        }];
        deltas.extend(self.after_roster_change(now));
        Ok(deltas)
    }

    /// Re-evaluate lifecycle after any roster change.
    pub(crate) fn after_roster_change(&mut self, now: Instant) -> Vec<RoomDelta> {
        let closes = self.lifecycle.observe_roster(
            self.roster.len(),
            self.roster.connected_count(),
            now,
        );

        match closes {
            Some(reason) => self.close_room(reason, now),
            None => Vec::new(),
        }
    }

    /// Move to `closed`. Yields the final `roomClosed` delta once.
    pub fn close_room(&mut self, reason: CloseReason, now: Instant) -> Vec<RoomDelta> {
        if !self.lifecycle.close(reason, now) {
            return Vec::new();
        }

        tracing::info!(
            target: "rc.lifecycle",
            room_id = %self.room_id,
            reason = reason.as_str(),
            participants = self.roster.len(),
            "Room closed"
        );

        vec![RoomDelta::RoomClosed { reason }]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_room_has_owner_as_instructor() {
        let owner = Caller::instructor("alice").unwrap();
        let (state, entry) =
            RoomState::new("room-1", &owner, " Alice ", RoomSettings::default(), Instant::now());

        assert_eq!(entry.role, Role::Instructor);
        assert_eq!(entry.display_name, "Alice");
        assert!(entry.can_publish);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.state, LifecycleState::Open);
        assert_eq!(snapshot.owner, "alice");
        assert_eq!(snapshot.participant_count, 1);
        assert_eq!(snapshot.connected_count, 1);
        assert!(snapshot.close_reason.is_none());
    }

    #[test]
    fn test_close_room_once() {
        let owner = Caller::instructor("alice").unwrap();
        let (mut state, _) =
            RoomState::new("room-1", &owner, "Alice", RoomSettings::default(), Instant::now());

        assert_eq!(
            state.close_room(CloseReason::Shutdown, Instant::now()),
            vec![RoomDelta::RoomClosed {
                reason: CloseReason::Shutdown
            }]
        );
        assert!(state.close_room(CloseReason::Drained, Instant::now()).is_empty());
        assert_eq!(state.snapshot().close_reason, Some(CloseReason::Shutdown));
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let owner = Caller::instructor("alice").unwrap();
        let (state, _) =
            RoomState::new("room-1", &owner, "Alice", RoomSettings::default(), Instant::now());

        let value = serde_json::to_value(state.snapshot()).unwrap();
        assert_eq!(value["roomId"], "room-1");
        assert_eq!(value["state"], "open");
        assert_eq!(value["participantCount"], 1);
        assert!(value.get("closeReason").is_none());
    }
}
