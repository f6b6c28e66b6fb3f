//! Room Coordinator Service Library
//!
//! Authoritative, real-time coordination layer for live teaching sessions:
//!
//! - Room roster with roles, publish permissions and raised hands
//! - Event routing with server-side authorization
//! - Polls with one counted vote per participant
//! - Room lifecycle (`open -> ending -> closed`) with transport reconciliation
//!
//! Media transport and identity are external collaborators; the coordinator
//! only consumes their reports.
//!
//! # Architecture
//!
//! ```text
//! RoomControllerActor (singleton per instance)
//! └── supervises N RoomActors
//!     └── RoomActor (one per room)
//!         └── owns RoomState
//!             ├── Lifecycle
//!             ├── Roster
//!             └── PollEngine
//! ```
//!
//! # Modules
//!
//! - [`actors`] - Actor hierarchy and mailboxes
//! - [`state`] - Authoritative per-room state
//! - [`roster`] - Roster store
//! - [`router`] - Event router (authorization and dispatch)
//! - [`polls`] - Poll engine
//! - [`lifecycle`] - Session lifecycle manager and reconciliation
//! - [`events`] - Wire vocabulary (events, deltas, acks)
//! - [`routes`] / [`handlers`] / [`middleware`] - HTTP and WebSocket surface
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with client codes and HTTP statuses
//! - [`observability`] - Metrics and health probes

pub mod actors;
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod lifecycle;
pub mod middleware;
pub mod observability;
pub mod polls;
pub mod roster;
pub mod router;
pub mod routes;
pub mod state;
