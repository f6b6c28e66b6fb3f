//! Actor metrics and mailbox monitoring.
//!
//! Mailbox depth thresholds:
//!
//! | Actor Type | Normal | Warning | Critical |
//! |------------|--------|---------|----------|
//! | Controller | < 100  | 100-500 | > 500    |
//! | Room       | < 100  | 100-500 | > 500    |
//!
//! Counters here are the in-process source of truth; every change is also
//! pushed to the Prometheus gauges in [`crate::observability::metrics`].

use crate::observability::metrics as prom;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Mailbox depth thresholds for the controller actor.
pub const CONTROLLER_MAILBOX_NORMAL: usize = 100;
pub const CONTROLLER_MAILBOX_WARNING: usize = 500;

/// Mailbox depth thresholds for room actors.
pub const ROOM_MAILBOX_NORMAL: usize = 100;
pub const ROOM_MAILBOX_WARNING: usize = 500;

/// Actor type for metrics labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    /// `RoomControllerActor` (singleton).
    Controller,
    /// `RoomActor` (one per room).
    Room,
}

impl ActorType {
    /// Returns the actor type as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActorType::Controller => "controller",
            ActorType::Room => "room",
        }
    }

    /// Depth above which the mailbox is critical.
    #[must_use]
    pub const fn warning_threshold(&self) -> usize {
        match self {
            ActorType::Controller => CONTROLLER_MAILBOX_WARNING,
            ActorType::Room => ROOM_MAILBOX_WARNING,
        }
    }

    /// Depth above which the mailbox is elevated.
    #[must_use]
    pub const fn normal_threshold(&self) -> usize {
        match self {
            ActorType::Controller => CONTROLLER_MAILBOX_NORMAL,
            ActorType::Room => ROOM_MAILBOX_NORMAL,
        }
    }
}

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    /// At or below the normal threshold.
    Normal,
    /// Above normal, at or below the warning threshold.
    Warning,
    /// Above the warning threshold.
    Critical,
}

/// Tracks queue depth of one actor's mailbox.
#[derive(Debug)]
pub struct MailboxMonitor {
    /// Label for metrics and logs.
    actor_type: ActorType,
    /// Room id or controller instance id.
    actor_id: String,
    /// Messages enqueued but not yet handled.
    depth: AtomicUsize,
    /// Highest depth seen over the actor's lifetime.
    peak_depth: AtomicUsize,
    /// Messages handled so far.
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    /// Create a monitor for one actor instance.
    #[must_use]
    pub fn new(actor_type: ActorType, actor_id: impl Into<String>) -> Self {
        Self {
            actor_type,
            actor_id: actor_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// Record a message being added to the mailbox.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_depth.fetch_max(new_depth, Ordering::Relaxed);
        prom::set_actor_mailbox_depth(self.actor_type.as_str(), new_depth);

        let level = self.level_for_depth(new_depth);
        if level == MailboxLevel::Critical {
            warn!(
                target: "rc.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth = new_depth,
                threshold = self.actor_type.warning_threshold(),
                "Mailbox depth critical"
            );
        } else if level == MailboxLevel::Warning
            && new_depth == self.actor_type.normal_threshold() + 1
        {
            debug!(
                target: "rc.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth = new_depth,
                "Mailbox depth elevated"
            );
        }
    }

    /// Record a message being removed from the mailbox (processed).
    pub fn record_dequeue(&self) {
        let new_depth = self.depth.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        prom::set_actor_mailbox_depth(self.actor_type.as_str(), new_depth);
    }

    /// Messages currently waiting.
    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Highest depth recorded.
    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    /// Messages handled by this actor.
    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    /// Alert level for the current depth.
    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        self.level_for_depth(self.current_depth())
    }

    fn level_for_depth(&self, depth: usize) -> MailboxLevel {
        if depth > self.actor_type.warning_threshold() {
            MailboxLevel::Critical
        } else if depth > self.actor_type.normal_threshold() {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

/// Aggregated metrics for the actor system, shared by every actor.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    /// Rooms currently hosted by a live `RoomActor`.
    pub active_rooms: AtomicUsize,
    /// Roster entries across live rooms.
    pub active_participants: AtomicUsize,
    /// Attached outbound sinks (WebSocket channels).
    pub attached_sinks: AtomicUsize,
    /// Total actor panics (indicates bugs).
    pub actor_panics: AtomicU64,
    /// Deltas that could not be delivered to a sink.
    pub broadcasts_dropped: AtomicU64,
    /// Total messages processed across all actors.
    pub total_messages_processed: AtomicU64,
}

impl ActorMetrics {
    /// Create zeroed metrics for sharing between actors.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A room actor started.
    pub fn room_created(&self) {
        let rooms = self.active_rooms.fetch_add(1, Ordering::Relaxed) + 1;
        prom::set_rooms_active(rooms);
    }

    /// A room actor exited.
    pub fn room_removed(&self) {
        let rooms = self
            .active_rooms
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        prom::set_rooms_active(rooms);
    }

    /// Apply a roster size change reported by one room.
    pub fn participants_changed(&self, before: usize, after: usize) {
        let total = if after >= before {
            self.active_participants
                .fetch_add(after - before, Ordering::Relaxed)
                + (after - before)
        } else {
            self.active_participants
                .fetch_sub(before - after, Ordering::Relaxed)
                .saturating_sub(before - after)
        };
        prom::set_participants_active(total);
    }

    /// A WebSocket channel attached its sink.
    pub fn sink_attached(&self) {
        let sinks = self.attached_sinks.fetch_add(1, Ordering::Relaxed) + 1;
        prom::set_ws_connections_active(sinks);
    }

    /// A sink was detached or dropped by its room.
    pub fn sink_detached(&self) {
        let sinks = self
            .attached_sinks
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        prom::set_ws_connections_active(sinks);
    }

    /// Record an undeliverable broadcast. `cause` is `full` or `closed`.
    pub fn record_broadcast_dropped(&self, cause: &'static str) {
        self.broadcasts_dropped.fetch_add(1, Ordering::Relaxed);
        prom::record_broadcast_dropped(cause);
    }

    /// Record an actor panic (always a bug).
    pub fn record_panic(&self, actor_type: ActorType) {
        self.actor_panics.fetch_add(1, Ordering::Relaxed);
        prom::record_actor_panic(actor_type.as_str());
        tracing::error!(
            target: "rc.actor.panic",
            actor_type = actor_type.as_str(),
            total_panics = self.actor_panics.load(Ordering::Relaxed),
            "Actor panic detected - indicates bug, investigation required"
        );
    }

    /// Count one handled mailbox message.
    pub fn record_message_processed(&self) {
        self.total_messages_processed
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Live rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.active_rooms.load(Ordering::Relaxed)
    }

    /// Roster entries across live rooms.
    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.active_participants.load(Ordering::Relaxed)
    }

    /// Attached sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.attached_sinks.load(Ordering::Relaxed)
    }

    /// Broadcasts dropped since start.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.broadcasts_dropped.load(Ordering::Relaxed)
    }
}
