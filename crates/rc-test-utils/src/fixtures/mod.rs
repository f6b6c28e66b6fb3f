//! Pre-configured test data fixtures.
//!
//! - Rooms with test-friendly settings
//! - Participants with either role
//! - Event builders (see [`events`])

pub mod events;

use common::types::{Caller, Role};
use room_coordinator::config::RoomSettings;
use std::time::Duration;
use uuid::Uuid;

/// Test room fixture.
#[derive(Debug, Clone)]
pub struct TestRoom {
    pub id: String,
    /// Instructor that opens the room.
    pub owner: TestParticipant,
    pub max_rooms: usize,
    pub settings: RoomSettings,
}

impl TestRoom {
    /// Create a test room owned by instructor `alice`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner: TestParticipant::instructor("alice"),
            max_rooms: 10,
            settings: RoomSettings::default(),
        }
    }

    /// Create a test room with a random ID.
    #[must_use]
    pub fn random() -> Self {
        Self::new(format!("room-{}", Uuid::new_v4()))
    }

    #[must_use]
    pub fn with_owner(mut self, owner: TestParticipant) -> Self {
        self.owner = owner;
        self
    }

    #[must_use]
    pub fn with_max_participants(mut self, max: usize) -> Self {
        self.settings.max_participants = max;
        self
    }

    #[must_use]
    pub fn with_students_can_publish(mut self) -> Self {
        self.settings.students_can_publish = true;
        self
    }

    /// Short timers for paused-clock tests.
    ///
    /// Sweep every second, 10s liveness timeout, 20s empty grace, 15s ending
    /// grace, 5s closed retention.
    #[must_use]
    pub fn with_fast_timers(mut self) -> Self {
        self.settings.sweep_interval = Duration::from_secs(1);
        self.settings.last_seen_timeout = Duration::from_secs(10);
        self.settings.empty_room_grace = Duration::from_secs(20);
        self.settings.ending_grace = Duration::from_secs(15);
        self.settings.closed_retention = Duration::from_secs(5);
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: RoomSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Test participant fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestParticipant {
    pub identity: String,
    pub display_name: String,
    pub role: Role,
}

impl TestParticipant {
    /// Create a participant whose display name is the capitalized identity.
    #[must_use]
    pub fn new(identity: impl Into<String>, role: Role) -> Self {
        let identity = identity.into();
        let mut chars = identity.chars();
        let display_name = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        Self {
            identity,
            display_name,
            role,
        }
    }

    #[must_use]
    pub fn instructor(identity: impl Into<String>) -> Self {
        Self::new(identity, Role::Instructor)
    }

    #[must_use]
    pub fn student(identity: impl Into<String>) -> Self {
        Self::new(identity, Role::Student)
    }

    /// Create a student with a random identity.
    #[must_use]
    pub fn random() -> Self {
        Self::student(format!("student-{}", &Uuid::new_v4().to_string()[..8]))
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// The caller as the identity collaborator reports it.
    #[must_use]
    pub fn caller(&self) -> Caller {
        Caller::new(self.identity.clone(), self.role).expect("fixture identity must be valid")
    }

    /// `(x-identity, x-role)` header values.
    #[must_use]
    pub fn headers(&self) -> [(&'static str, String); 2] {
        [
            ("x-identity", self.identity.clone()),
            ("x-role", self.role.as_str().to_string()),
        ]
    }
}
