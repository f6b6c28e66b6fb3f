//! `RoomControllerActor` - singleton supervisor for room actors.
//!
//! The `RoomControllerActor` is the top-level actor in the hierarchy:
//!
//! - Singleton per coordinator instance
//! - Supervises N `RoomActor` instances
//! - Handles room creation/lookup/removal
//! - Keeps tombstones of closed rooms so late traffic gets `RoomClosed`
//! - Owns the root `CancellationToken` for graceful shutdown
//! - Monitors child actor health (panic detection via `JoinHandle`)
//!
//! # Graceful Shutdown
//!
//! On SIGTERM, the controller:
//! 1. Sets `accepting_new = false`
//! 2. Cancels the root `CancellationToken` (every room closes with `shutdown`)
//! 3. Waits for room actors to exit, bounded by the shutdown deadline

use crate::config::RoomSettings;
use crate::errors::RcError;
use crate::events::{EventAck, InboundEvent};
use crate::lifecycle::CloseReason;

use super::messages::{ControllerMessage, ControllerStatus, RoomCreated};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use super::room::{RoomActor, RoomHandle, RoomSpec};

use common::types::Caller;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default channel buffer size for the controller mailbox.
const CONTROLLER_CHANNEL_BUFFER: usize = 1000;

/// Closed room ids remembered before the oldest is forgotten.
pub const MAX_TOMBSTONES: usize = 10_000;

/// Longest accepted room id, in characters.
pub const MAX_ROOM_ID_CHARS: usize = 128;

/// Time allowed for a removed room actor to exit before we stop waiting.
const ROOM_REMOVAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on waiting for room actors during shutdown.
const DEFAULT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

/// Handle to the `RoomControllerActor`.
///
/// This is the public interface for interacting with the controller.
#[derive(Debug, Clone)]
pub struct RoomControllerHandle {
    sender: mpsc::Sender<ControllerMessage>,
    cancel_token: CancellationToken,
}

impl RoomControllerHandle {
    /// Create a new `RoomControllerActor` and return a handle to it.
    ///
    /// This spawns the actor task and returns immediately.
    #[must_use]
    pub fn new(
        instance_id: String,
        max_rooms: usize,
        room_settings: RoomSettings,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(CONTROLLER_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = RoomControllerActor::new(
            instance_id,
            receiver,
            sender.downgrade(),
            cancel_token.clone(),
            max_rooms,
            room_settings,
            metrics,
        );

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ControllerMessage,
    ) -> Result<T, RcError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))
    }

    /// Open a room owned by `owner`, who becomes its first participant.
    pub async fn create_room(
        &self,
        room_id: String,
        owner: Caller,
        display_name: String,
    ) -> Result<RoomCreated, RcError> {
        self.request(|respond_to| ControllerMessage::CreateRoom {
            room_id,
            owner,
            display_name,
            respond_to,
        })
        .await?
    }

    /// Look up a live room.
    ///
    /// Returns `RoomClosed` for a tombstoned id and `RoomNotFound` for an
    /// id never seen (or long forgotten).
    pub async fn room(&self, room_id: &str) -> Result<RoomHandle, RcError> {
        let room_id = room_id.to_string();
        self.request(|respond_to| ControllerMessage::GetRoom {
            room_id,
            respond_to,
        })
        .await?
    }

    /// Stop a room immediately (closes it with reason `shutdown`).
    pub async fn remove_room(&self, room_id: String) -> Result<(), RcError> {
        self.request(|respond_to| ControllerMessage::RemoveRoom {
            room_id,
            respond_to,
        })
        .await?
    }

    pub async fn get_status(&self) -> Result<ControllerStatus, RcError> {
        self.request(|respond_to| ControllerMessage::GetStatus { respond_to })
            .await
    }

    /// Stop accepting rooms, close every room and wait for the room actors
    /// to exit (bounded by `deadline`).
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), RcError> {
        self.request(|respond_to| ControllerMessage::Shutdown {
            deadline,
            respond_to,
        })
        .await?
    }

    /// Route an inbound event into its room.
    pub async fn dispatch(&self, inbound: InboundEvent) -> Result<EventAck, RcError> {
        self.room(&inbound.room_id)
            .await?
            .dispatch(inbound.sender, inbound.event)
            .await
    }

    /// Apply a transport "participant left" report to `room_id`.
    pub async fn transport_left(&self, room_id: &str, identity: String) -> Result<(), RcError> {
        self.room(room_id).await?.transport_left(identity).await
    }

    /// Apply a transport join report or heartbeat to `room_id`.
    pub async fn transport_seen(&self, room_id: &str, identity: String) -> Result<(), RcError> {
        self.room(room_id).await?.transport_seen(identity).await
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Get a child token for spawning child actors.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// Internal state for a managed room.
struct ManagedRoom {
    handle: RoomHandle,
    generation: u64,
    /// Join handle for monitoring the actor task.
    task_handle: JoinHandle<()>,
}

/// Bounded, insertion-ordered set of closed room ids.
#[derive(Debug, Default)]
struct Tombstones {
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl Tombstones {
    fn insert(&mut self, room_id: &str) {
        if !self.ids.insert(room_id.to_string()) {
            return;
        }
        self.order.push_back(room_id.to_string());
        while self.order.len() > MAX_TOMBSTONES {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    fn remove(&mut self, room_id: &str) {
        if self.ids.remove(room_id) {
            self.order.retain(|id| id != room_id);
        }
    }

    fn contains(&self, room_id: &str) -> bool {
        self.ids.contains(room_id)
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// The `RoomControllerActor` implementation.
pub struct RoomControllerActor {
    instance_id: String,
    receiver: mpsc::Receiver<ControllerMessage>,
    /// Handed (upgraded) to room actors for `RoomFinished` notices. Weak so
    /// dropping every handle still closes the mailbox.
    notify: mpsc::WeakSender<ControllerMessage>,
    /// Cancellation token (root).
    cancel_token: CancellationToken,
    rooms: HashMap<String, ManagedRoom>,
    next_generation: u64,
    tombstones: Tombstones,
    accepting_new: bool,
    max_rooms: usize,
    room_settings: RoomSettings,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
}

impl RoomControllerActor {
    fn new(
        instance_id: String,
        receiver: mpsc::Receiver<ControllerMessage>,
        notify: mpsc::WeakSender<ControllerMessage>,
        cancel_token: CancellationToken,
        max_rooms: usize,
        room_settings: RoomSettings,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        let mailbox = MailboxMonitor::new(ActorType::Controller, &instance_id);

        Self {
            instance_id,
            receiver,
            notify,
            cancel_token,
            rooms: HashMap::new(),
            next_generation: 0,
            tombstones: Tombstones::default(),
            accepting_new: true,
            max_rooms,
            room_settings,
            metrics,
            mailbox,
        }
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "rc.actor.controller", fields(instance_id = %self.instance_id))]
    async fn run(mut self) {
        info!(
            target: "rc.actor.controller",
            instance_id = %self.instance_id,
            max_rooms = self.max_rooms,
            "RoomControllerActor started"
        );

        loop {
            // Check for terminated room actors
            self.check_room_health().await;

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "rc.actor.controller",
                        instance_id = %self.instance_id,
                        "RoomControllerActor received cancellation signal"
                    );
                    self.graceful_shutdown(DEFAULT_SHUTDOWN_DEADLINE).await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_enqueue();
                            self.handle_message(message).await;
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();
                        }
                        None => {
                            info!(
                                target: "rc.actor.controller",
                                instance_id = %self.instance_id,
                                "RoomControllerActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "rc.actor.controller",
            instance_id = %self.instance_id,
            rooms_remaining = self.rooms.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RoomControllerActor stopped"
        );
    }

    /// Handle a single message.
    async fn handle_message(&mut self, message: ControllerMessage) {
        match message {
            ControllerMessage::CreateRoom {
                room_id,
                owner,
                display_name,
                respond_to,
            } => {
                let result = self.create_room(room_id, owner, display_name);
                let _ = respond_to.send(result);
            }

            ControllerMessage::GetRoom {
                room_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.get_room(&room_id));
            }

            ControllerMessage::RemoveRoom {
                room_id,
                respond_to,
            } => {
                let result = self.remove_room(&room_id);
                let _ = respond_to.send(result);
            }

            ControllerMessage::RoomFinished {
                room_id,
                generation,
                reason,
            } => {
                self.room_finished(&room_id, generation, reason);
            }

            ControllerMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.get_status());
            }

            ControllerMessage::Shutdown {
                deadline,
                respond_to,
            } => {
                self.graceful_shutdown(deadline).await;
                self.cancel_token.cancel();
                let _ = respond_to.send(Ok(()));
            }
        }
    }

    /// Spawn a new room actor.
    fn create_room(
        &mut self,
        room_id: String,
        owner: Caller,
        display_name: String,
    ) -> Result<RoomCreated, RcError> {
        if !self.accepting_new {
            return Err(RcError::Draining);
        }

        if !owner.role.is_instructor() {
            return Err(RcError::instructor_only());
        }

        validate_room_id(&room_id)?;

        let display_name = display_name.trim().to_string();
        let name_len = display_name.chars().count();
        if name_len == 0 || name_len > crate::events::MAX_DISPLAY_NAME_CHARS {
            return Err(RcError::InvalidPayload(format!(
                "displayName must be 1-{} characters",
                crate::events::MAX_DISPLAY_NAME_CHARS
            )));
        }

        if self.rooms.contains_key(&room_id) {
            return Err(RcError::RoomExists);
        }

        if self.rooms.len() >= self.max_rooms {
            warn!(
                target: "rc.actor.controller",
                instance_id = %self.instance_id,
                max_rooms = self.max_rooms,
                "Room capacity reached"
            );
            return Err(RcError::CapacityExceeded(
                "Room capacity reached, try again later".to_string(),
            ));
        }

        // A closed id may be opened again as a fresh room.
        self.tombstones.remove(&room_id);

        debug!(
            target: "rc.actor.controller",
            instance_id = %self.instance_id,
            room_id = %room_id,
            owner = %owner.identity,
            "Creating new room actor"
        );

        let generation = self.next_generation;
        self.next_generation += 1;

        let (handle, task_handle, created) = RoomActor::spawn(
            RoomSpec {
                room_id: room_id.clone(),
                owner,
                display_name,
                settings: self.room_settings.clone(),
                generation,
            },
            self.cancel_token.child_token(),
            Arc::clone(&self.metrics),
            self.notify.upgrade(),
        );

        self.rooms.insert(
            room_id.clone(),
            ManagedRoom {
                handle,
                generation,
                task_handle,
            },
        );
        self.metrics.room_created();

        info!(
            target: "rc.actor.controller",
            instance_id = %self.instance_id,
            room_id = %room_id,
            total_rooms = self.rooms.len(),
            "Room actor created"
        );

        Ok(created)
    }

    fn get_room(&self, room_id: &str) -> Result<RoomHandle, RcError> {
        if let Some(managed) = self.rooms.get(room_id) {
            return Ok(managed.handle.clone());
        }
        if self.tombstones.contains(room_id) {
            return Err(RcError::RoomClosed);
        }
        Err(RcError::RoomNotFound(room_id.to_string()))
    }

    /// Cancel a room and tombstone its id.
    ///
    /// Does not block waiting for the room actor; the wait is spawned as a
    /// background task so the message loop keeps going.
    fn remove_room(&mut self, room_id: &str) -> Result<(), RcError> {
        let Some(managed) = self.rooms.remove(room_id) else {
            return Err(RcError::RoomNotFound(room_id.to_string()));
        };

        debug!(
            target: "rc.actor.controller",
            instance_id = %self.instance_id,
            room_id = %room_id,
            "Removing room actor"
        );

        managed.handle.cancel();

        let room_id_owned = room_id.to_string();
        let instance_id = self.instance_id.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(ROOM_REMOVAL_TIMEOUT, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "rc.actor.controller",
                        instance_id = %instance_id,
                        room_id = %room_id_owned,
                        "Room actor task completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "rc.actor.controller",
                        instance_id = %instance_id,
                        room_id = %room_id_owned,
                        error = ?e,
                        "Room actor task panicked during removal"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "rc.actor.controller",
                        instance_id = %instance_id,
                        room_id = %room_id_owned,
                        "Room actor task cleanup timed out"
                    );
                }
            }
        });

        self.tombstones.insert(room_id);
        self.metrics.room_removed();

        info!(
            target: "rc.actor.controller",
            instance_id = %self.instance_id,
            room_id = %room_id,
            total_rooms = self.rooms.len(),
            "Room actor removed"
        );

        Ok(())
    }

    /// A room actor passed its retention window and is exiting.
    ///
    /// Notices from an earlier room under the same id are ignored.
    fn room_finished(&mut self, room_id: &str, generation: u64, reason: Option<CloseReason>) {
        let current = self
            .rooms
            .get(room_id)
            .is_some_and(|managed| managed.generation == generation);
        if !current {
            return;
        }
        self.rooms.remove(room_id);

        self.tombstones.insert(room_id);
        self.metrics.room_removed();

        info!(
            target: "rc.actor.controller",
            instance_id = %self.instance_id,
            room_id = %room_id,
            reason = reason.map_or("none", |r| r.as_str()),
            total_rooms = self.rooms.len(),
            tombstones = self.tombstones.len(),
            "Room finished"
        );
    }

    fn get_status(&self) -> ControllerStatus {
        ControllerStatus {
            room_count: self.rooms.len(),
            participant_count: self.metrics.participant_count(),
            sink_count: self.metrics.sink_count(),
            tombstone_count: self.tombstones.len(),
            is_draining: !self.accepting_new,
            mailbox_depth: self.mailbox.current_depth(),
        }
    }

    /// Stop accepting rooms, cancel every room and wait for the actors.
    async fn graceful_shutdown(&mut self, deadline: Duration) {
        info!(
            target: "rc.actor.controller",
            instance_id = %self.instance_id,
            room_count = self.rooms.len(),
            deadline_secs = deadline.as_secs(),
            "Performing graceful shutdown"
        );

        self.accepting_new = false;

        // Cancel all room actors (the root token does this too when it fires)
        for (room_id, managed) in &self.rooms {
            debug!(
                target: "rc.actor.controller",
                instance_id = %self.instance_id,
                room_id = %room_id,
                "Cancelling room actor"
            );
            managed.handle.cancel();
        }

        let give_up_at = tokio::time::Instant::now() + deadline;
        for (room_id, managed) in self.rooms.drain() {
            match tokio::time::timeout_at(give_up_at, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "rc.actor.controller",
                        instance_id = %self.instance_id,
                        room_id = %room_id,
                        "Room actor completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "rc.actor.controller",
                        instance_id = %self.instance_id,
                        room_id = %room_id,
                        error = ?e,
                        "Room actor task panicked during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "rc.actor.controller",
                        instance_id = %self.instance_id,
                        room_id = %room_id,
                        "Room actor shutdown timed out"
                    );
                }
            }
            self.tombstones.insert(&room_id);
            self.metrics.room_removed();
        }

        info!(
            target: "rc.actor.controller",
            instance_id = %self.instance_id,
            "Graceful shutdown complete"
        );
    }

    /// Check health of managed room actors.
    async fn check_room_health(&mut self) {
        let finished: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, managed)| managed.task_handle.is_finished())
            .map(|(room_id, _)| room_id.clone())
            .collect();

        for room_id in finished {
            let Some(managed) = self.rooms.remove(&room_id) else {
                continue;
            };

            match managed.task_handle.await {
                Ok(()) => {
                    info!(
                        target: "rc.actor.controller",
                        instance_id = %self.instance_id,
                        room_id = %room_id,
                        "Room actor exited cleanly"
                    );
                }
                Err(join_error) => {
                    if join_error.is_panic() {
                        error!(
                            target: "rc.actor.controller",
                            instance_id = %self.instance_id,
                            room_id = %room_id,
                            error = ?join_error,
                            "Room actor panicked - triggering investigation"
                        );
                        self.metrics.record_panic(ActorType::Room);
                    }
                }
            }

            self.tombstones.insert(&room_id);
            self.metrics.room_removed();
        }
    }
}

/// Room ids are opaque strings chosen by the instructor's client.
///
/// # Errors
///
/// `InvalidPayload` for empty or overlong ids and ids containing whitespace
/// or control characters.
pub fn validate_room_id(room_id: &str) -> Result<(), RcError> {
    let len = room_id.chars().count();
    if len == 0 || len > MAX_ROOM_ID_CHARS {
        return Err(RcError::InvalidPayload(format!(
            "roomId must be 1-{MAX_ROOM_ID_CHARS} characters"
        )));
    }
    if room_id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(RcError::InvalidPayload(
            "roomId must not contain whitespace".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::events::RoomEvent;

    fn controller(id: &str) -> (RoomControllerHandle, Arc<ActorMetrics>) {
        controller_with(id, 10, RoomSettings::default())
    }

    fn controller_with(
        id: &str,
        max_rooms: usize,
        settings: RoomSettings,
    ) -> (RoomControllerHandle, Arc<ActorMetrics>) {
        let metrics = ActorMetrics::new();
        let handle =
            RoomControllerHandle::new(id.to_string(), max_rooms, settings, Arc::clone(&metrics));
        (handle, metrics)
    }

    fn alice() -> Caller {
        Caller::instructor("alice").unwrap()
    }

    fn inbound(room_id: &str, event: RoomEvent) -> InboundEvent {
        InboundEvent {
            room_id: room_id.to_string(),
            sender: alice(),
            event,
        }
    }

    #[tokio::test]
    async fn test_controller_handle_create_room() {
        let (handle, metrics) = controller("rc-test-001");

        let created = handle
            .create_room("room-1".to_string(), alice(), "Alice".to_string())
            .await
            .unwrap();
        assert_eq!(created.room.room_id, "room-1");
        assert_eq!(created.owner.identity, "alice");
        assert_eq!(created.room.participant_count, 1);

        let room = handle.room("room-1").await.unwrap();
        assert_eq!(room.room_id(), "room-1");
        assert_eq!(metrics.room_count(), 1);

        handle.cancel();
    }

    #[tokio::test]
    async fn test_controller_handle_duplicate_room() {
        let (handle, _) = controller("rc-test-002");

        handle
            .create_room("room-2".to_string(), alice(), "Alice".to_string())
            .await
            .unwrap();
        let result = handle
            .create_room("room-2".to_string(), alice(), "Alice".to_string())
            .await;
        assert_eq!(result.unwrap_err(), RcError::RoomExists);

        handle.cancel();
    }

    #[tokio::test]
    async fn test_student_cannot_create_room() {
        let (handle, _) = controller("rc-test-003");

        let result = handle
            .create_room(
                "room-3".to_string(),
                Caller::student("bob").unwrap(),
                "Bob".to_string(),
            )
            .await;
        assert!(matches!(result, Err(RcError::Unauthorized(_))));

        handle.cancel();
    }

    #[tokio::test]
    async fn test_invalid_room_ids_rejected() {
        let (handle, _) = controller("rc-test-004");

        for room_id in [String::new(), "has space".to_string(), "x".repeat(129)] {
            let result = handle
                .create_room(room_id, alice(), "Alice".to_string())
                .await;
            assert!(matches!(result, Err(RcError::InvalidPayload(_))));
        }

        handle.cancel();
    }

    #[tokio::test]
    async fn test_room_capacity() {
        let (handle, _) = controller_with("rc-test-005", 1, RoomSettings::default());

        handle
            .create_room("room-a".to_string(), alice(), "Alice".to_string())
            .await
            .unwrap();
        let result = handle
            .create_room("room-b".to_string(), alice(), "Alice".to_string())
            .await;
        assert!(matches!(result, Err(RcError::CapacityExceeded(_))));

        handle.cancel();
    }

    #[tokio::test]
    async fn test_get_unknown_room() {
        let (handle, _) = controller("rc-test-006");

        let result = handle.room("nonexistent").await;
        assert!(matches!(result, Err(RcError::RoomNotFound(_))));

        handle.cancel();
    }

    #[tokio::test]
    async fn test_removed_room_is_tombstoned() {
        let (handle, metrics) = controller("rc-test-007");

        handle
            .create_room("room-7".to_string(), alice(), "Alice".to_string())
            .await
            .unwrap();
        handle.remove_room("room-7".to_string()).await.unwrap();

        assert_eq!(handle.room("room-7").await.unwrap_err(), RcError::RoomClosed);
        assert_eq!(
            handle
                .dispatch(inbound("room-7", RoomEvent::RaiseHand))
                .await
                .unwrap_err(),
            RcError::RoomClosed
        );

        let status = handle.get_status().await.unwrap();
        assert_eq!(status.room_count, 0);
        assert_eq!(status.tombstone_count, 1);
        assert_eq!(metrics.room_count(), 0);

        // The id can be opened again as a fresh room.
        handle
            .create_room("room-7".to_string(), alice(), "Alice".to_string())
            .await
            .unwrap();
        let status = handle.get_status().await.unwrap();
        assert_eq!(status.room_count, 1);
        assert_eq!(status.tombstone_count, 0);

        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_room_is_tombstoned() {
        let settings = RoomSettings {
            closed_retention: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(1),
            ..RoomSettings::default()
        };
        let (handle, _) = controller_with("rc-test-008", 10, settings);

        handle
            .create_room("room-8".to_string(), alice(), "Alice".to_string())
            .await
            .unwrap();
        handle
            .dispatch(inbound("room-8", RoomEvent::EndRoom))
            .await
            .unwrap();
        handle
            .dispatch(inbound("room-8", RoomEvent::Leave))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(12)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(handle.room("room-8").await.unwrap_err(), RcError::RoomClosed);
        let status = handle.get_status().await.unwrap();
        assert_eq!(status.room_count, 0);
        assert_eq!(status.tombstone_count, 1);

        handle.cancel();
    }

    #[tokio::test]
    async fn test_controller_handle_shutdown() {
        let (handle, metrics) = controller("rc-test-009");

        handle
            .create_room("room-9".to_string(), alice(), "Alice".to_string())
            .await
            .unwrap();

        handle.shutdown(Duration::from_secs(5)).await.unwrap();
        assert!(handle.is_cancelled());
        assert_eq!(metrics.room_count(), 0);
        assert_eq!(metrics.participant_count(), 0);
    }

    #[tokio::test]
    async fn test_controller_cancellation_token() {
        let (handle, _) = controller("rc-test-010");

        assert!(!handle.is_cancelled());

        let child = handle.child_token();
        assert!(!child.is_cancelled());

        handle.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(handle.is_cancelled());
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_tombstones_are_bounded() {
        let mut tombstones = Tombstones::default();
        for i in 0..=MAX_TOMBSTONES {
            tombstones.insert(&format!("room-{i}"));
        }
        assert_eq!(tombstones.len(), MAX_TOMBSTONES);
        assert!(!tombstones.contains("room-0"));
        assert!(tombstones.contains(&format!("room-{MAX_TOMBSTONES}")));
    }
}
