//! `RoomHarness` - a controller with one room opened from a [`TestRoom`].

use crate::fixtures::{TestParticipant, TestRoom};
use crate::probe::SinkProbe;
use axum::Router;
use room_coordinator::actors::{ActorMetrics, RoomControllerHandle, RoomCreated, RoomHandle};
use room_coordinator::events::{EventAck, RoomEvent};
use room_coordinator::routes::{self, AppState};
use std::sync::Arc;

/// Controller, metrics and the opened room.
///
/// The controller is cancelled when the harness is dropped.
pub struct RoomHarness {
    pub controller: RoomControllerHandle,
    pub metrics: Arc<ActorMetrics>,
    pub room: RoomHandle,
    pub created: RoomCreated,
    pub owner: TestParticipant,
}

impl RoomHarness {
    /// Start a controller and open `fixture` with its owner.
    pub async fn start(fixture: TestRoom) -> anyhow::Result<Self> {
        let metrics = ActorMetrics::new();
        let controller = RoomControllerHandle::new(
            format!("rc-test-{}", fixture.id),
            fixture.max_rooms,
            fixture.settings.clone(),
            Arc::clone(&metrics),
        );

        let created = controller
            .create_room(
                fixture.id.clone(),
                fixture.owner.caller(),
                fixture.owner.display_name.clone(),
            )
            .await?;
        let room = controller.room(&fixture.id).await?;

        Ok(Self {
            controller,
            metrics,
            room,
            created,
            owner: fixture.owner,
        })
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        self.room.room_id()
    }

    /// Send `event` as `participant`.
    pub async fn dispatch(
        &self,
        participant: &TestParticipant,
        event: RoomEvent,
    ) -> Result<EventAck, room_coordinator::errors::RcError> {
        self.room.dispatch(participant.caller(), event).await
    }

    /// Join `participant` with its display name.
    pub async fn join(&self, participant: &TestParticipant) -> anyhow::Result<EventAck> {
        Ok(self
            .dispatch(participant, crate::fixtures::events::join(&participant.display_name))
            .await?)
    }

    /// Attach a probe sink for `participant`.
    pub async fn attach(&self, participant: &TestParticipant) -> anyhow::Result<SinkProbe> {
        SinkProbe::attach(&self.room, &participant.identity).await
    }

    /// The room API router backed by this harness's controller.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::build_routes(Arc::new(AppState {
            controller: self.controller.clone(),
        }))
    }
}

impl Drop for RoomHarness {
    fn drop(&mut self) {
        self.controller.cancel();
    }
}
