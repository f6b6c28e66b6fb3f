//! # RC Test Utilities
//!
//! Shared test utilities for the Room Coordinator.
//!
//! - `fixtures` - Test rooms, participants and event builders
//! - `harness` - Controller + room started from a fixture
//! - `probe` - `SinkProbe`, an attached participant sink that records deltas
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let harness = RoomHarness::start(TestRoom::new("room-1")).await?;
//!     let bob = TestParticipant::student("bob");
//!
//!     harness.join(&bob).await?;
//!     let mut probe = harness.attach(&bob).await?;
//!
//!     harness.dispatch(&harness.owner, events::raise_hand()).await?;
//!     let delta = probe.recv_delta().await;
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod harness;
pub mod probe;

// Re-export commonly used items
pub use fixtures::*;
pub use harness::*;
pub use probe::*;
