//! HTTP routes for the Room Coordinator.
//!
//! Defines the Axum router and application state.

use crate::actors::RoomControllerHandle;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_caller};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Request timeout for the room API. WebSocket sessions outlive it once
/// upgraded.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub controller: RoomControllerHandle,
}

/// Build the room API routes.
///
/// - `/api/v1/rooms/...` - room, event and WebSocket endpoints (caller headers required)
/// - `/api/v1/rooms/:room_id/transport/...` - media transport reports
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>) -> Router {
    // Reports from the media transport, which acts for no participant.
    let transport_routes = Router::new()
        .route(
            "/api/v1/rooms/:room_id/transport/left",
            post(handlers::transport_left),
        )
        .route(
            "/api/v1/rooms/:room_id/transport/seen",
            post(handlers::transport_seen),
        )
        .with_state(state.clone());

    // Participant routes (caller headers required)
    let caller_routes = Router::new()
        .route("/api/v1/rooms", post(handlers::create_room))
        .route("/api/v1/rooms/:room_id", get(handlers::get_room))
        .route(
            "/api/v1/rooms/:room_id/participants",
            get(handlers::list_participants),
        )
        .route("/api/v1/rooms/:room_id/events", post(handlers::post_event))
        .route(
            "/api/v1/rooms/:room_id/polls/:poll_id/tally",
            get(handlers::get_tally),
        )
        .route("/api/v1/rooms/:room_id/ws", get(handlers::room_socket))
        .route_layer(middleware::from_fn(require_caller))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    transport_routes
        .merge(caller_routes)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
