//! `SinkProbe` - a participant sink that records what the room sends.

use room_coordinator::actors::{ParticipantSink, RoomHandle};
use room_coordinator::events::{RoomDelta, ServerMessage};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// How long `recv` waits before failing the test.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default probe buffer; large enough that tests never hit backpressure.
pub const PROBE_BUFFER: usize = 256;

/// Receiving end of an attached sink.
#[derive(Debug)]
pub struct SinkProbe {
    pub identity: String,
    pub connection_id: Uuid,
    rx: mpsc::Receiver<ServerMessage>,
}

impl SinkProbe {
    /// Create a probe and the sink to attach.
    #[must_use]
    pub fn new(identity: impl Into<String>, buffer: usize) -> (Self, ParticipantSink) {
        let (tx, rx) = mpsc::channel(buffer);
        let probe = Self {
            identity: identity.into(),
            connection_id: Uuid::new_v4(),
            rx,
        };
        (probe, tx)
    }

    /// Attach a fresh probe for `identity` to `room`.
    pub async fn attach(room: &RoomHandle, identity: &str) -> anyhow::Result<Self> {
        let (probe, sink) = Self::new(identity, PROBE_BUFFER);
        room.attach(identity.to_string(), probe.connection_id, sink)
            .await?;
        Ok(probe)
    }

    /// Next message. Panics after [`PROBE_TIMEOUT`] or if the room dropped
    /// the sink.
    pub async fn recv(&mut self) -> ServerMessage {
        tokio::time::timeout(PROBE_TIMEOUT, self.rx.recv())
            .await
            .unwrap_or_else(|_| panic!("{}: no message within {PROBE_TIMEOUT:?}", self.identity))
            .unwrap_or_else(|| panic!("{}: sink was dropped", self.identity))
    }

    /// Next message, which must be a delta.
    pub async fn recv_delta(&mut self) -> RoomDelta {
        match self.recv().await {
            ServerMessage::Delta { delta, .. } => delta,
            other => panic!("{}: expected a delta, got {other:?}", self.identity),
        }
    }

    /// Everything already queued, without waiting.
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Queued deltas only, without waiting.
    pub fn drain_deltas(&mut self) -> Vec<RoomDelta> {
        self.drain()
            .into_iter()
            .filter_map(|message| match message {
                ServerMessage::Delta { delta, .. } => Some(delta),
                _ => None,
            })
            .collect()
    }

    /// `true` once the room has dropped this sink and the queue is empty.
    pub async fn is_detached(&mut self) -> bool {
        matches!(
            tokio::time::timeout(PROBE_TIMEOUT, self.rx.recv()).await,
            Ok(None)
        )
    }
}
