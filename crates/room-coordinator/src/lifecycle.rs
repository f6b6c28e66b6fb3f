//! Session lifecycle manager.
//!
//! State machine per room:
//!
//! ```text
//! open ──endRoom──▶ ending ──roster drained / ending grace──▶ closed
//!   └────────────── empty-room grace ─────────────────────────▶ closed
//! ```
//!
//! `closed` is terminal. A closed room keeps its roster for the retention
//! window so late transport reports match as no-ops, then the actor purges
//! it and stops.
//!
//! Reconciliation with the media transport lives here too: transport
//! "left" reports and liveness timeouts remove participants on behalf of
//! the `system` sender, bypassing authority checks.

use crate::config::RoomSettings;
use crate::errors::RcError;
use crate::events::{LeaveReason, RoomDelta, RoomEvent};
use crate::state::RoomState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Room lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Open,
    Ending,
    Closed,
}

impl LifecycleState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Open => "open",
            LifecycleState::Ending => "ending",
            LifecycleState::Closed => "closed",
        }
    }
}

/// Why a room reached `closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CloseReason {
    /// Roster emptied while ending.
    Drained,
    /// Nobody connected for the empty-room grace period.
    EmptyGrace,
    /// Ending grace elapsed before the roster drained.
    EndingTimeout,
    /// Coordinator shutdown.
    Shutdown,
}

impl CloseReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Drained => "drained",
            CloseReason::EmptyGrace => "empty_grace",
            CloseReason::EndingTimeout => "ending_timeout",
            CloseReason::Shutdown => "shutdown",
        }
    }
}

/// Lifecycle bookkeeping for one room.
#[derive(Debug)]
pub struct Lifecycle {
    state: LifecycleState,
    owner: String,
    created_at: DateTime<Utc>,
    ended_by: Option<String>,
    close_reason: Option<CloseReason>,
    ending_since: Option<Instant>,
    closed_at: Option<Instant>,
    empty_since: Option<Instant>,
}

impl Lifecycle {
    #[must_use]
    pub fn new(owner: &str) -> Self {
        Self {
            state: LifecycleState::Open,
            owner: owner.to_string(),
            created_at: Utc::now(),
            ended_by: None,
            close_reason: None,
            ending_since: None,
            closed_at: None,
            empty_since: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn ended_by(&self) -> Option<&str> {
        self.ended_by.as_deref()
    }

    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == LifecycleState::Closed
    }

    /// Gate an inbound event on the current state.
    ///
    /// # Errors
    ///
    /// `RoomClosed` for every event once closed, and for everything except
    /// `leave` while ending.
    pub fn admits(&self, event: &RoomEvent) -> Result<(), RcError> {
        match self.state {
            LifecycleState::Open => Ok(()),
            LifecycleState::Ending if matches!(event, RoomEvent::Leave) => Ok(()),
            LifecycleState::Ending | LifecycleState::Closed => Err(RcError::RoomClosed),
        }
    }

    /// `open -> ending`. Returns `false` if the room was not open.
    pub fn begin_ending(&mut self, by: &str, now: Instant) -> bool {
        if self.state != LifecycleState::Open {
            return false;
        }
        self.state = LifecycleState::Ending;
        self.ended_by = Some(by.to_string());
        self.ending_since = Some(now);
        self.empty_since = None;
        true
    }

    /// Move to `closed`. Returns `false` if already closed.
    pub fn close(&mut self, reason: CloseReason, now: Instant) -> bool {
        if self.state == LifecycleState::Closed {
            return false;
        }
        self.state = LifecycleState::Closed;
        self.close_reason = Some(reason);
        self.closed_at = Some(now);
        true
    }

    /// Track roster occupancy after a change. Returns a close reason when
    /// the change itself finishes the room (ending room drained).
    pub fn observe_roster(&mut self, members: usize, connected: usize, now: Instant) -> Option<CloseReason> {
        match self.state {
            LifecycleState::Open => {
                if connected == 0 {
                    self.empty_since.get_or_insert(now);
                } else {
                    self.empty_since = None;
                }
                None
            }
            LifecycleState::Ending if members == 0 => Some(CloseReason::Drained),
            LifecycleState::Ending | LifecycleState::Closed => None,
        }
    }

    /// Deadline-driven close, checked on every housekeeping tick.
    #[must_use]
    pub fn due(&self, now: Instant, settings: &RoomSettings) -> Option<CloseReason> {
        match self.state {
            LifecycleState::Open => self
                .empty_since
                .filter(|since| elapsed(*since, now) >= settings.empty_room_grace)
                .map(|_| CloseReason::EmptyGrace),
            LifecycleState::Ending => self
                .ending_since
                .filter(|since| elapsed(*since, now) >= settings.ending_grace)
                .map(|_| CloseReason::EndingTimeout),
            LifecycleState::Closed => None,
        }
    }

    /// `true` once a closed room has kept its roster for `retention`.
    #[must_use]
    pub fn retention_elapsed(&self, now: Instant, retention: Duration) -> bool {
        self.closed_at
            .is_some_and(|closed_at| elapsed(closed_at, now) >= retention)
    }
}

fn elapsed(since: Instant, now: Instant) -> Duration {
    now.saturating_duration_since(since)
}

impl RoomState {
    /// Apply a transport "participant left" report as a system removal.
    ///
    /// Unknown identities and closed rooms are no-ops, so duplicate and
    /// late reports are harmless.
    pub fn reconcile_transport_left(&mut self, identity: &str, now: Instant) -> Vec<RoomDelta> {
        if self.lifecycle.is_closed() || !self.roster.contains(identity) {
            tracing::debug!(
                target: "rc.lifecycle",
                room_id = %self.room_id,
                identity = %identity,
                "Transport left report matched nothing"
            );
            return Vec::new();
        }

        self.remove_with_reason(identity, LeaveReason::TransportLeft, now)
            .unwrap_or_default()
    }

    /// Apply a transport "joined" report or heartbeat.
    ///
    /// # Errors
    ///
    /// `ParticipantNotFound` if the identity is not in an open or ending
    /// room's roster.
    pub fn reconcile_seen(&mut self, identity: &str, now: Instant) -> Result<Vec<RoomDelta>, RcError> {
        if self.lifecycle.is_closed() {
            return Ok(Vec::new());
        }

        if !self.roster.contains(identity) {
            return Err(RcError::ParticipantNotFound(identity.to_string()));
        }

        let mut deltas = Vec::new();
        if let Some(participant) = self.roster.mark_connected(identity, now) {
            deltas.push(RoomDelta::ParticipantUpdated { participant });
        }
        deltas.extend(self.after_roster_change(now));
        Ok(deltas)
    }

    /// A participant's gateway channel closed. The participant stays in the
    /// roster until it leaves or times out.
    pub fn connection_closed(&mut self, identity: &str, now: Instant) -> Vec<RoomDelta> {
        if self.lifecycle.is_closed() {
            return Vec::new();
        }

        let mut deltas = Vec::new();
        if let Some(participant) = self.roster.mark_disconnected(identity) {
            deltas.push(RoomDelta::ParticipantUpdated { participant });
        }
        deltas.extend(self.after_roster_change(now));
        deltas
    }

    /// Housekeeping tick: remove silent participants, then apply any
    /// lifecycle deadline that has passed.
    pub fn sweep(&mut self, now: Instant) -> Vec<RoomDelta> {
        if self.lifecycle.is_closed() {
            return Vec::new();
        }

        let mut deltas = Vec::new();
        for identity in self.roster.stale(now, self.settings.last_seen_timeout) {
            tracing::info!(
                target: "rc.lifecycle",
                room_id = %self.room_id,
                identity = %identity,
                "Participant timed out"
            );
            if let Ok(removed) = self.remove_with_reason(&identity, LeaveReason::Timeout, now) {
                deltas.extend(removed);
            }
        }

        if let Some(reason) = self.lifecycle.due(now, &self.settings) {
            deltas.extend(self.close_room(reason, now));
        }

        deltas
    }
}
