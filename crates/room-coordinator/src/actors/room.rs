//! `RoomActor` - per-room actor that owns room state.
//!
//! Each `RoomActor`:
//! - Owns the `RoomState` (lifecycle, roster, polls) of one room
//! - Serializes every inbound event through its mailbox
//! - Fans out deltas to attached participant sinks with `try_send`
//! - Runs the housekeeping tick (liveness sweep, lifecycle deadlines)
//!
//! # Exit
//!
//! Once the room is `closed` the actor keeps answering (mostly with
//! `RoomClosed`) until the retention window passes, then purges the roster,
//! drops every sink and tells the controller it finished. Cancellation
//! closes the room with reason `shutdown` and exits immediately.

use crate::config::RoomSettings;
use crate::errors::RcError;
use crate::events::{EventAck, LeaveReason, RoomDelta, RoomEvent, ServerMessage};
use crate::lifecycle::CloseReason;
use crate::observability::metrics as prom;
use crate::polls::Tally;
use crate::roster::ParticipantInfo;
use crate::state::{RoomSnapshot, RoomState};

use super::messages::{ControllerMessage, ParticipantSink, RoomCreated, RoomMessage};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

use common::types::Caller;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Default channel buffer size for the room mailbox.
const ROOM_CHANNEL_BUFFER: usize = 500;

/// Handle to a `RoomActor`.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    cancel_token: CancellationToken,
    room_id: String,
}

impl RoomHandle {
    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Send a request and wait for the reply. A room whose actor has gone
    /// away is reported as closed.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RoomMessage,
    ) -> Result<T, RcError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| RcError::RoomClosed)?;
        rx.await.map_err(|_| RcError::RoomClosed)
    }

    /// Route one event from `sender` and return the sender's ack.
    pub async fn dispatch(&self, sender: Caller, event: RoomEvent) -> Result<EventAck, RcError> {
        self.request(|respond_to| RoomMessage::Dispatch {
            sender,
            event,
            respond_to,
        })
        .await?
    }

    /// Apply a transport "participant left" report.
    pub async fn transport_left(&self, identity: String) -> Result<(), RcError> {
        self.request(|respond_to| RoomMessage::TransportLeft {
            identity,
            respond_to,
        })
        .await?
    }

    /// Apply a transport join report or heartbeat.
    pub async fn transport_seen(&self, identity: String) -> Result<(), RcError> {
        self.request(|respond_to| RoomMessage::TransportSeen {
            identity,
            respond_to,
        })
        .await?
    }

    /// Attach an outbound sink for `identity`.
    pub async fn attach(
        &self,
        identity: String,
        connection_id: Uuid,
        sink: ParticipantSink,
    ) -> Result<(), RcError> {
        self.request(|respond_to| RoomMessage::Attach {
            identity,
            connection_id,
            sink,
            respond_to,
        })
        .await?
    }

    /// Report a closed connection. Fire-and-forget.
    pub async fn detach(&self, identity: String, connection_id: Uuid) {
        let _ = self
            .sender
            .send(RoomMessage::Detach {
                identity,
                connection_id,
            })
            .await;
    }

    pub async fn list_participants(&self) -> Result<Vec<ParticipantInfo>, RcError> {
        self.request(|respond_to| RoomMessage::ListParticipants { respond_to })
            .await
    }

    pub async fn get_participant(&self, identity: String) -> Result<ParticipantInfo, RcError> {
        self.request(|respond_to| RoomMessage::GetParticipant {
            identity,
            respond_to,
        })
        .await?
    }

    pub async fn hand_raised(&self, identity: String) -> Result<bool, RcError> {
        self.request(|respond_to| RoomMessage::HandRaised {
            identity,
            respond_to,
        })
        .await?
    }

    pub async fn tally(&self, poll_id: String) -> Result<Tally, RcError> {
        self.request(|respond_to| RoomMessage::Tally {
            poll_id,
            respond_to,
        })
        .await?
    }

    pub async fn get_state(&self) -> Result<RoomSnapshot, RcError> {
        self.request(|respond_to| RoomMessage::GetState { respond_to })
            .await
    }

    /// Cancel the actor (closes the room with reason `shutdown`).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// Outbound channel attached for one identity.
struct AttachedSink {
    connection_id: Uuid,
    sink: ParticipantSink,
}

/// Everything needed to start a room.
pub struct RoomSpec {
    pub room_id: String,
    pub owner: Caller,
    pub display_name: String,
    pub settings: RoomSettings,
    /// Distinguishes successive rooms opened under the same id.
    pub generation: u64,
}

/// The `RoomActor` implementation.
pub struct RoomActor {
    room_id: String,
    receiver: mpsc::Receiver<RoomMessage>,
    cancel_token: CancellationToken,
    state: RoomState,
    sinks: HashMap<String, AttachedSink>,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
    generation: u64,
    /// Notified once when the actor finishes.
    controller: Option<mpsc::Sender<ControllerMessage>>,
    /// Roster size last pushed to `metrics`.
    reported_participants: usize,
}

impl RoomActor {
    /// Open the room and spawn its actor.
    ///
    /// The owner is upserted as the first participant before the actor
    /// starts, so the returned `RoomCreated` already reflects it.
    pub fn spawn(
        spec: RoomSpec,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
        controller: Option<mpsc::Sender<ControllerMessage>>,
    ) -> (RoomHandle, JoinHandle<()>, RoomCreated) {
        let (sender, receiver) = mpsc::channel(ROOM_CHANNEL_BUFFER);

        let (state, owner) = RoomState::new(
            &spec.room_id,
            &spec.owner,
            &spec.display_name,
            spec.settings,
            Instant::now(),
        );
        let created = RoomCreated {
            room: state.snapshot(),
            owner,
        };

        metrics.participants_changed(0, state.roster.len());

        let actor = Self {
            room_id: spec.room_id.clone(),
            receiver,
            cancel_token: cancel_token.clone(),
            reported_participants: state.roster.len(),
            state,
            sinks: HashMap::new(),
            metrics,
            mailbox: MailboxMonitor::new(ActorType::Room, &spec.room_id),
            generation: spec.generation,
            controller,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = RoomHandle {
            sender,
            cancel_token,
            room_id: spec.room_id,
        };

        (handle, task_handle, created)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "rc.actor.room", fields(room_id = %self.room_id))]
    async fn run(mut self) {
        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            owner = %self.state.lifecycle.owner(),
            "RoomActor started"
        );

        let mut housekeeping = tokio::time::interval(self.state.settings.sweep_interval);
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        housekeeping.tick().await;

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "rc.actor.room",
                        room_id = %self.room_id,
                        "RoomActor received cancellation signal"
                    );
                    let was_closed = self.state.lifecycle.is_closed();
                    let deltas = self.state.close_room(CloseReason::Shutdown, Instant::now());
                    self.apply(deltas, was_closed);
                    break;
                }

                _ = housekeeping.tick() => {
                    if self.housekeeping() {
                        break;
                    }
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_enqueue();
                            self.handle_message(message);
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();
                        }
                        None => {
                            info!(
                                target: "rc.actor.room",
                                room_id = %self.room_id,
                                "RoomActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.finish();
    }

    /// Handle a single message.
    fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Dispatch {
                sender,
                event,
                respond_to,
            } => {
                let result = self.handle_dispatch(&sender, event);
                let _ = respond_to.send(result);
            }

            RoomMessage::TransportLeft {
                identity,
                respond_to,
            } => {
                let was_closed = self.state.lifecycle.is_closed();
                let deltas = self.state.reconcile_transport_left(&identity, Instant::now());
                if !deltas.is_empty() {
                    prom::record_reconciliation(LeaveReason::TransportLeft.as_str());
                }
                self.apply(deltas, was_closed);
                let _ = respond_to.send(Ok(()));
            }

            RoomMessage::TransportSeen {
                identity,
                respond_to,
            } => {
                let was_closed = self.state.lifecycle.is_closed();
                let result = self
                    .state
                    .reconcile_seen(&identity, Instant::now())
                    .map(|deltas| self.apply(deltas, was_closed));
                let _ = respond_to.send(result);
            }

            RoomMessage::Attach {
                identity,
                connection_id,
                sink,
                respond_to,
            } => {
                let result = self.handle_attach(identity, connection_id, sink);
                let _ = respond_to.send(result);
            }

            RoomMessage::Detach {
                identity,
                connection_id,
            } => {
                self.handle_detach(&identity, connection_id);
            }

            RoomMessage::ListParticipants { respond_to } => {
                let _ = respond_to.send(self.state.participants());
            }

            RoomMessage::GetParticipant {
                identity,
                respond_to,
            } => {
                let result = self
                    .state
                    .roster
                    .get(&identity)
                    .map(|p| p.info())
                    .ok_or(RcError::ParticipantNotFound(identity));
                let _ = respond_to.send(result);
            }

            RoomMessage::HandRaised {
                identity,
                respond_to,
            } => {
                let _ = respond_to.send(self.state.roster.hand_raised(&identity));
            }

            RoomMessage::Tally {
                poll_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.state.polls.tally(&poll_id));
            }

            RoomMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.state.snapshot());
            }
        }
    }

    fn handle_dispatch(&mut self, sender: &Caller, event: RoomEvent) -> Result<EventAck, RcError> {
        let event_type = event.event_type();
        let started = std::time::Instant::now();
        let was_closed = self.state.lifecycle.is_closed();

        let result = self.state.route(sender, event, Instant::now());
        prom::record_event_latency(event_type, started.elapsed());

        match result {
            Ok(routed) => {
                prom::record_event(event_type, prom::OUTCOME_ACCEPTED);
                debug!(
                    target: "rc.router",
                    room_id = %self.room_id,
                    identity = %sender.identity,
                    event_type,
                    deltas = routed.deltas.len(),
                    "Event accepted"
                );
                self.apply(routed.deltas, was_closed);
                Ok(routed.ack)
            }
            Err(err) => {
                prom::record_event(event_type, &err.outcome_label());
                debug!(
                    target: "rc.router",
                    room_id = %self.room_id,
                    identity = %sender.identity,
                    event_type,
                    error = %err,
                    "Event rejected"
                );
                Err(err)
            }
        }
    }

    fn handle_attach(
        &mut self,
        identity: String,
        connection_id: Uuid,
        sink: ParticipantSink,
    ) -> Result<(), RcError> {
        if self.state.lifecycle.is_closed() {
            return Err(RcError::RoomClosed);
        }

        let replaced = self
            .sinks
            .insert(identity.clone(), AttachedSink { connection_id, sink });
        if replaced.is_none() {
            self.metrics.sink_attached();
        }

        debug!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            identity = %identity,
            connection_id = %connection_id,
            replaced = replaced.is_some(),
            "Sink attached"
        );
        Ok(())
    }

    fn handle_detach(&mut self, identity: &str, connection_id: Uuid) {
        let current = self
            .sinks
            .get(identity)
            .is_some_and(|attached| attached.connection_id == connection_id);
        if !current {
            return;
        }

        self.sinks.remove(identity);
        self.metrics.sink_detached();

        let was_closed = self.state.lifecycle.is_closed();
        let deltas = self.state.connection_closed(identity, Instant::now());
        self.apply(deltas, was_closed);
    }

    /// Periodic tick. Returns `true` when the actor should exit.
    fn housekeeping(&mut self) -> bool {
        let now = Instant::now();

        if self.state.lifecycle.is_closed() {
            return self
                .state
                .lifecycle
                .retention_elapsed(now, self.state.settings.closed_retention);
        }

        let deltas = self.state.sweep(now);
        let timeouts = deltas
            .iter()
            .filter(|d| {
                matches!(
                    d,
                    RoomDelta::ParticipantLeft {
                        reason: LeaveReason::Timeout,
                        ..
                    }
                )
            })
            .count();
        for _ in 0..timeouts {
            prom::record_reconciliation(LeaveReason::Timeout.as_str());
        }

        self.apply(deltas, false);
        false
    }

    /// Broadcast deltas and sync metrics after a mutation.
    fn apply(&mut self, deltas: Vec<RoomDelta>, was_closed: bool) {
        for delta in deltas {
            self.broadcast(delta);
        }

        let participants = self.state.roster.len();
        if participants != self.reported_participants {
            self.metrics
                .participants_changed(self.reported_participants, participants);
            self.reported_participants = participants;
        }

        if !was_closed {
            if let Some(reason) = self.state.lifecycle.close_reason() {
                prom::record_room_closed(reason.as_str());
            }
        }
    }

    /// Deliver one delta to every attached roster member. A departing
    /// participant gets its own `participantLeft` and then loses its sink.
    fn broadcast(&mut self, delta: RoomDelta) {
        let departed = delta.departed().map(str::to_string);
        let message = ServerMessage::Delta {
            room_id: self.room_id.clone(),
            delta,
        };

        let mut closed = Vec::new();
        for (identity, attached) in &self.sinks {
            let addressed = self.state.roster.contains(identity)
                || departed.as_deref() == Some(identity.as_str());
            if !addressed {
                continue;
            }

            match attached.sink.try_send(message.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(
                        target: "rc.actor.room",
                        room_id = %self.room_id,
                        identity = %identity,
                        "Participant sink full, dropping delta"
                    );
                    self.metrics.record_broadcast_dropped("full");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(
                        target: "rc.actor.room",
                        room_id = %self.room_id,
                        identity = %identity,
                        "Participant sink closed"
                    );
                    self.metrics.record_broadcast_dropped("closed");
                    closed.push(identity.clone());
                }
            }
        }

        closed.extend(departed);
        for identity in closed {
            if self.sinks.remove(&identity).is_some() {
                self.metrics.sink_detached();
            }
        }
    }

    /// Purge state, release sinks and notify the controller.
    fn finish(&mut self) {
        let reason = self.state.lifecycle.close_reason();

        self.state.roster.purge();
        self.metrics
            .participants_changed(self.reported_participants, 0);
        self.reported_participants = 0;

        for _ in self.sinks.drain() {
            self.metrics.sink_detached();
        }

        if let Some(controller) = &self.controller {
            let _ = controller.try_send(ControllerMessage::RoomFinished {
                room_id: self.room_id.clone(),
                generation: self.generation,
                reason,
            });
        }

        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            reason = reason.map_or("none", |r| r.as_str()),
            messages_processed = self.mailbox.messages_processed(),
            "RoomActor stopped"
        );
    }
}
