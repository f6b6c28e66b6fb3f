//! Metrics definitions for the Room Coordinator.
//!
//! All metrics follow Prometheus naming conventions:
//! - `rc_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `event_type`: 11 values (event vocabulary)
//! - `outcome`: `accepted` plus one value per error code
//! - `reason`: bounded leave / close reasons
//! - `actor_type`: 2 values (controller, room)
//!
//! Room and participant identifiers are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Outcome label for accepted events.
pub const OUTCOME_ACCEPTED: &str = "accepted";

/// Initialize the Prometheus recorder and return the handle used to render
/// `/metrics`.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Event handling happens in-memory inside one actor turn.
        .set_buckets_for_metric(
            Matcher::Prefix("rc_event".to_string()),
            &[
                0.0001, 0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250,
            ],
        )
        .map_err(|e| format!("Failed to set event latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Room & Participant Metrics (Gauges)
// ============================================================================

/// Metric: `rc_rooms_active`
pub fn set_rooms_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rc_rooms_active").set(count as f64);
}

/// Metric: `rc_participants_active`
///
/// Sum of roster sizes across live rooms.
pub fn set_participants_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rc_participants_active").set(count as f64);
}

/// Metric: `rc_ws_connections_active`
pub fn set_ws_connections_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rc_ws_connections_active").set(count as f64);
}

/// Set the mailbox depth for an actor type.
///
/// Metric: `rc_actor_mailbox_depth`
/// Labels: `actor_type` (controller, room)
pub fn set_actor_mailbox_depth(actor_type: &str, depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rc_actor_mailbox_depth", "actor_type" => actor_type.to_string()).set(depth as f64);
}

// ============================================================================
// Event Metrics
// ============================================================================

/// Record one routed event.
///
/// Metric: `rc_events_total`
/// Labels: `event_type`, `outcome`
pub fn record_event(event_type: &'static str, outcome: &str) {
    counter!("rc_events_total",
        "event_type" => event_type,
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record event handling latency inside the room actor.
///
/// Metric: `rc_event_latency_seconds`
/// Labels: `event_type`
pub fn record_event_latency(event_type: &'static str, duration: Duration) {
    histogram!("rc_event_latency_seconds", "event_type" => event_type)
        .record(duration.as_secs_f64());
}

/// Record a broadcast that could not be delivered to one sink.
///
/// Metric: `rc_broadcast_dropped_total`
/// Labels: `cause` (full, closed)
pub fn record_broadcast_dropped(cause: &'static str) {
    counter!("rc_broadcast_dropped_total", "cause" => cause).increment(1);
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record one HTTP request.
///
/// Metrics: `rc_http_requests_total`, `rc_http_request_duration_seconds`
/// Labels: `method`, `endpoint` (route template, never the raw path), `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let status = categorize_status_code(status_code);

    histogram!("rc_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("rc_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        100..=399 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

// ============================================================================
// Lifecycle Metrics (Counters)
// ============================================================================

/// Record a system-initiated roster change.
///
/// Metric: `rc_reconciliations_total`
/// Labels: `reason` (`transport_left`, `timeout`)
pub fn record_reconciliation(reason: &'static str) {
    counter!("rc_reconciliations_total", "reason" => reason).increment(1);
}

/// Record a room reaching `closed`.
///
/// Metric: `rc_rooms_closed_total`
/// Labels: `reason` (drained, `empty_grace`, `ending_timeout`, shutdown)
pub fn record_room_closed(reason: &'static str) {
    counter!("rc_rooms_closed_total", "reason" => reason).increment(1);
}

/// Record an actor panic.
///
/// Metric: `rc_actor_panics_total`
/// Labels: `actor_type`
///
/// Any non-zero value indicates a bug.
pub fn record_actor_panic(actor_type: &'static str) {
    counter!("rc_actor_panics_total", "actor_type" => actor_type).increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    // These run against the global no-op recorder when none is installed,
    // which exercises the label plumbing without asserting values.

    #[test]
    fn test_gauges() {
        set_rooms_active(0);
        set_rooms_active(12);
        set_participants_active(340);
        set_ws_connections_active(25);
        set_actor_mailbox_depth("controller", 0);
        set_actor_mailbox_depth("room", 120);
    }

    #[test]
    fn test_event_metrics() {
        record_event("join", OUTCOME_ACCEPTED);
        record_event("endRoom", "unauthorized");
        record_event_latency("castVote", Duration::from_micros(80));
        record_broadcast_dropped("full");
        record_broadcast_dropped("closed");
    }

    #[test]
    fn test_http_metrics() {
        record_http_request("POST", "/api/v1/rooms", 201, Duration::from_millis(3));
        record_http_request("GET", "/api/v1/rooms/:room_id", 404, Duration::from_millis(1));
        assert_eq!(categorize_status_code(101), "success");
        assert_eq!(categorize_status_code(410), "error");
        assert_eq!(categorize_status_code(504), "timeout");
    }

    #[test]
    fn test_lifecycle_metrics() {
        record_reconciliation("transport_left");
        record_reconciliation("timeout");
        record_room_closed("drained");
        record_actor_panic("room");
    }

    #[test]
    fn test_events_counter_is_labelled() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_event("raiseHand", OUTCOME_ACCEPTED);
            record_event("raiseHand", OUTCOME_ACCEPTED);
            record_event("endRoom", "unauthorized");
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let accepted = snapshot
            .iter()
            .find(|(key, _, _, _)| {
                key.key().name() == "rc_events_total"
                    && key
                        .key()
                        .labels()
                        .any(|l| l.key() == "outcome" && l.value() == OUTCOME_ACCEPTED)
            })
            .map(|(_, _, _, value)| value.clone());

        assert_eq!(accepted, Some(DebugValue::Counter(2)).as_ref());
        assert_eq!(
            snapshot
                .iter()
                .filter(|(key, _, _, _)| key.key().name() == "rc_events_total")
                .count(),
            2
        );
    }
}
