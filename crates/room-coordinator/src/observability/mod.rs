//! Observability for the Room Coordinator.
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `rc_rooms_active` | Gauge | none | Live rooms |
//! | `rc_participants_active` | Gauge | none | Roster entries across live rooms |
//! | `rc_ws_connections_active` | Gauge | none | Attached WebSocket channels |
//! | `rc_actor_mailbox_depth` | Gauge | `actor_type` | Backpressure per actor type |
//! | `rc_events_total` | Counter | `event_type`, `outcome` | Routed events |
//! | `rc_event_latency_seconds` | Histogram | `event_type` | Time inside the room actor |
//! | `rc_broadcast_dropped_total` | Counter | `cause` | Undelivered deltas |
//! | `rc_reconciliations_total` | Counter | `reason` | System removals |
//! | `rc_rooms_closed_total` | Counter | `reason` | Rooms reaching `closed` |
//! | `rc_actor_panics_total` | Counter | `actor_type` | Actor panics |
//! | `rc_http_requests_total` | Counter | `method`, `endpoint`, `status_code` | API requests |
//! | `rc_http_request_duration_seconds` | Histogram | `method`, `endpoint`, `status` | API latency |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
