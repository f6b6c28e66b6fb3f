//! Roster store.
//!
//! Authoritative participant set for one room. A roster is owned by exactly
//! one `RoomActor`, so nothing here is synchronized; every method runs inside
//! the actor's serialized mailbox loop.
//!
//! Participants are kept in join order (`join_seq`) and indexed by identity.
//! Re-joining keeps the original sequence number, so ordering stays stable
//! across reconnects.

use crate::errors::RcError;
use chrono::{DateTime, Utc};
use common::types::Role;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;

/// Connection state reported by the channel collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// One participant record.
#[derive(Debug, Clone)]
pub struct Participant {
    pub identity: String,
    pub display_name: String,
    pub role: Role,
    pub connection: ConnectionState,
    pub can_publish: bool,
    pub hand_raised: bool,
    pub joined_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub join_seq: u64,
    /// Monotonic liveness clock (pausable in tests).
    last_seen: Instant,
}

impl Participant {
    /// Serializable snapshot of this participant.
    #[must_use]
    pub fn info(&self) -> ParticipantInfo {
        ParticipantInfo {
            identity: self.identity.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            connection: self.connection,
            can_publish: self.can_publish,
            hand_raised: self.hand_raised,
            joined_at: self.joined_at,
            last_seen_at: self.last_seen_at,
            join_seq: self.join_seq,
        }
    }
}

/// Wire form of a participant, used in acks, deltas and the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub identity: String,
    pub display_name: String,
    pub role: Role,
    pub connection: ConnectionState,
    pub can_publish: bool,
    pub hand_raised: bool,
    pub joined_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub join_seq: u64,
}

/// Result of [`Roster::upsert_participant`].
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub participant: ParticipantInfo,
    /// `true` when a new record was created, `false` on duplicate join.
    pub inserted: bool,
}

/// Participant set of one room, ordered by join sequence.
#[derive(Debug)]
pub struct Roster {
    by_seq: BTreeMap<u64, Participant>,
    index: HashMap<String, u64>,
    next_seq: u64,
    students_can_publish: bool,
}

impl Roster {
    #[must_use]
    pub fn new(students_can_publish: bool) -> Self {
        Self {
            by_seq: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
            students_can_publish,
        }
    }

    /// Insert or refresh a participant.
    ///
    /// A duplicate join updates display name and role, refreshes liveness and
    /// marks the participant connected. Join order, `can_publish` and the
    /// hand flag are preserved.
    pub fn upsert_participant(
        &mut self,
        identity: &str,
        role: Role,
        display_name: &str,
        now: Instant,
    ) -> UpsertOutcome {
        let wall_now = Utc::now();

        if let Some(existing) = self
            .index
            .get(identity)
            .and_then(|seq| self.by_seq.get_mut(seq))
        {
            existing.display_name = display_name.to_string();
            existing.role = role;
            existing.connection = ConnectionState::Connected;
            existing.last_seen = now;
            existing.last_seen_at = wall_now;

            tracing::debug!(
                target: "rc.roster",
                identity = %identity,
                join_seq = existing.join_seq,
                "Participant re-joined"
            );

            return UpsertOutcome {
                participant: existing.info(),
                inserted: false,
            };
        }

        let join_seq = self.next_seq;
        self.next_seq += 1;

        let participant = Participant {
            identity: identity.to_string(),
            display_name: display_name.to_string(),
            role,
            connection: ConnectionState::Connected,
            can_publish: role.is_instructor() || self.students_can_publish,
            hand_raised: false,
            joined_at: wall_now,
            last_seen_at: wall_now,
            join_seq,
            last_seen: now,
        };
        let info = participant.info();

        self.index.insert(identity.to_string(), join_seq);
        self.by_seq.insert(join_seq, participant);

        UpsertOutcome {
            participant: info,
            inserted: true,
        }
    }

    /// Remove a participant.
    ///
    /// # Errors
    ///
    /// `ParticipantNotFound` if the identity is not in the roster.
    pub fn remove_participant(&mut self, identity: &str) -> Result<Participant, RcError> {
        let removed = self
            .index
            .remove(identity)
            .and_then(|seq| self.by_seq.remove(&seq));

        removed.ok_or_else(|| {
            tracing::debug!(target: "rc.roster", identity = %identity, "Remove of absent participant");
            RcError::ParticipantNotFound(identity.to_string())
        })
    }

    /// Change a participant's publish permission.
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless `caller` is an instructor in this roster;
    /// `ParticipantNotFound` if `target` is absent.
    pub fn set_publish_permission(
        &mut self,
        caller: &str,
        target: &str,
        can_publish: bool,
    ) -> Result<ParticipantInfo, RcError> {
        if self.role_of(caller) != Some(Role::Instructor) {
            return Err(RcError::instructor_only());
        }

        let participant = self
            .get_mut(target)
            .ok_or_else(|| RcError::ParticipantNotFound(target.to_string()))?;
        participant.can_publish = can_publish;

        Ok(participant.info())
    }

    /// Raise or lower a hand. Only the participant themself may do this.
    ///
    /// # Errors
    ///
    /// `Unauthorized` when `caller != target`; `ParticipantNotFound` if absent.
    pub fn set_hand_raised(
        &mut self,
        caller: &str,
        target: &str,
        raised: bool,
    ) -> Result<ParticipantInfo, RcError> {
        if caller != target {
            return Err(RcError::Unauthorized(
                "You can only raise or lower your own hand".to_string(),
            ));
        }

        let participant = self
            .get_mut(target)
            .ok_or_else(|| RcError::ParticipantNotFound(target.to_string()))?;
        participant.hand_raised = raised;

        Ok(participant.info())
    }

    /// Current hand flag.
    ///
    /// # Errors
    ///
    /// `ParticipantNotFound` if absent.
    pub fn hand_raised(&self, identity: &str) -> Result<bool, RcError> {
        self.get(identity)
            .map(|p| p.hand_raised)
            .ok_or_else(|| RcError::ParticipantNotFound(identity.to_string()))
    }

    /// Participants in join order. The iterator is cheap to clone, so callers
    /// can walk it more than once.
    pub fn list_participants(&self) -> impl Iterator<Item = &Participant> + Clone + '_ {
        self.by_seq.values()
    }

    #[must_use]
    pub fn get(&self, identity: &str) -> Option<&Participant> {
        self.index.get(identity).and_then(|seq| self.by_seq.get(seq))
    }

    fn get_mut(&mut self, identity: &str) -> Option<&mut Participant> {
        self.index
            .get(identity)
            .and_then(|seq| self.by_seq.get_mut(seq))
    }

    #[must_use]
    pub fn contains(&self, identity: &str) -> bool {
        self.index.contains_key(identity)
    }

    #[must_use]
    pub fn role_of(&self, identity: &str) -> Option<Role> {
        self.get(identity).map(|p| p.role)
    }

    /// Refresh liveness. Returns `false` if the identity is unknown.
    pub fn touch(&mut self, identity: &str, now: Instant) -> bool {
        match self.get_mut(identity) {
            Some(participant) => {
                participant.last_seen = now;
                participant.last_seen_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Refresh liveness and mark connected. Returns the snapshot if the
    /// connection state changed.
    pub fn mark_connected(&mut self, identity: &str, now: Instant) -> Option<ParticipantInfo> {
        let participant = self.get_mut(identity)?;
        participant.last_seen = now;
        participant.last_seen_at = Utc::now();
        if participant.connection == ConnectionState::Connected {
            return None;
        }
        participant.connection = ConnectionState::Connected;
        Some(participant.info())
    }

    /// Mark disconnected. Returns the snapshot if the state changed.
    pub fn mark_disconnected(&mut self, identity: &str) -> Option<ParticipantInfo> {
        let participant = self.get_mut(identity)?;
        if participant.connection == ConnectionState::Disconnected {
            return None;
        }
        participant.connection = ConnectionState::Disconnected;
        Some(participant.info())
    }

    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.by_seq
            .values()
            .filter(|p| p.connection == ConnectionState::Connected)
            .count()
    }

    /// Identities not seen for longer than `timeout`, in join order.
    #[must_use]
    pub fn stale(&self, now: Instant, timeout: Duration) -> Vec<String> {
        self.by_seq
            .values()
            .filter(|p| now.saturating_duration_since(p.last_seen) > timeout)
            .map(|p| p.identity.clone())
            .collect()
    }

    /// Drop every record.
    pub fn purge(&mut self) {
        self.by_seq.clear();
        self.index.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_seq.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_seq.is_empty()
    }
}
