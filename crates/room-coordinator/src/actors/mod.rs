//! Actor model implementation for the Room Coordinator.
//!
//! ```text
//! RoomControllerActor (singleton per coordinator instance)
//! ├── registry of live rooms + tombstones of closed rooms
//! └── supervises N RoomActors
//!     └── RoomActor (one per room)
//!         ├── owns RoomState (lifecycle, roster, polls)
//!         └── fans deltas out to participant sinks
//! ```
//!
//! # Key Design Decisions
//!
//! - **One actor per room**: every event for a room is serialized through its mailbox
//! - **CancellationToken propagation**: the controller hands each room a child token
//! - **Mailbox monitoring**: depth thresholds with metrics (100/500)
//! - **Non-blocking fan-out**: broadcasts use `try_send`; a slow sink never stalls a room
//!
//! # Modules
//!
//! - [`controller`] - `RoomControllerActor` singleton that supervises rooms
//! - [`room`] - `RoomActor` per live room
//! - [`messages`] - Message types for actor communication
//! - [`metrics`] - Mailbox monitoring and actor metrics

pub mod controller;
pub mod messages;
pub mod metrics;
pub mod room;

// Re-export primary types
pub use controller::{RoomControllerActor, RoomControllerHandle};
pub use messages::*;
pub use metrics::{ActorMetrics, ActorType, MailboxMonitor};
pub use room::{RoomActor, RoomHandle, RoomSpec};
