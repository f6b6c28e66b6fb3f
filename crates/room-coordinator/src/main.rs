//! Room Coordinator
//!
//! Live-session room coordination: roster, polls, instructor controls.
//!
//! # Servers
//!
//! - HTTP API + WebSocket channel (default: 0.0.0.0:8080)
//! - Health and metrics endpoints (default: 0.0.0.0:8081)
//!
//! # Startup Flow
//!
//! 1. Initialize tracing (`RUST_LOG`, else `RC_LOG_FILTER`; `RC_LOG_JSON`)
//! 2. Load configuration from environment
//! 3. Initialize Prometheus metrics recorder
//! 4. Initialize actor system (`RoomControllerHandle`)
//! 5. Start health HTTP server (liveness, readiness, metrics)
//! 6. Start room API server
//! 7. Wait for shutdown signal

#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use common::config::ObservabilityConfig;
use room_coordinator::actors::{ActorMetrics, RoomControllerHandle};
use room_coordinator::config::{Config, DEFAULT_LOG_FILTER, ENV_PREFIX};
use room_coordinator::observability::{health_router, init_metrics_recorder, HealthState};
use room_coordinator::routes::{self, AppState};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Bound on closing rooms during shutdown.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let vars: HashMap<String, String> = std::env::vars().collect();
    init_tracing(&ObservabilityConfig::from_vars(
        &vars,
        ENV_PREFIX,
        DEFAULT_LOG_FILTER,
    ));

    info!("Starting Room Coordinator");

    let config = Config::from_vars(&vars).map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        instance_id = %config.instance_id,
        http_bind_address = %config.http_bind_address,
        health_bind_address = %config.health_bind_address,
        max_rooms = config.max_rooms,
        max_participants = config.room.max_participants,
        last_seen_timeout_secs = config.room.last_seen_timeout.as_secs(),
        "Configuration loaded successfully"
    );

    info!("Initializing Prometheus metrics recorder...");
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let health_state = Arc::new(HealthState::new());

    let actor_metrics = ActorMetrics::new();
    let controller = RoomControllerHandle::new(
        config.instance_id.clone(),
        config.max_rooms,
        config.room.clone(),
        Arc::clone(&actor_metrics),
    );
    info!(instance_id = %config.instance_id, "Actor system initialized");

    let shutdown_token = controller.child_token();

    // Health + metrics server
    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        format!("Invalid health bind address: {e}")
    })?;

    let metrics_router = Router::new().route(
        "/metrics",
        get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );
    let health_app = health_router(Arc::clone(&health_state)).merge(metrics_router);

    let health_listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;

    let health_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        let server = axum::serve(health_listener, health_app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });
    info!(addr = %health_addr, "Health server started");

    // Room API server
    let http_addr: SocketAddr = config.http_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.http_bind_address, "Invalid HTTP bind address");
        format!("Invalid HTTP bind address: {e}")
    })?;

    let app = routes::build_routes(Arc::new(AppState {
        controller: controller.clone(),
    }));

    let http_listener = tokio::net::TcpListener::bind(http_addr).await.map_err(|e| {
        error!(error = %e, addr = %http_addr, "Failed to bind HTTP server");
        format!("Failed to bind HTTP server to {http_addr}: {e}")
    })?;

    let http_shutdown_token = shutdown_token.child_token();
    let http_server = tokio::spawn(async move {
        let server = axum::serve(http_listener, app).with_graceful_shutdown(async move {
            http_shutdown_token.cancelled().await;
            info!("HTTP server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "HTTP server failed");
        }
    });
    info!(addr = %http_addr, "HTTP server started");

    health_state.set_ready();
    info!("Room Coordinator running - press Ctrl+C to shutdown");

    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");
    health_state.set_not_ready();

    // Rooms close first so connected clients receive `roomClosed`.
    if let Err(e) = controller.shutdown(SHUTDOWN_DEADLINE).await {
        warn!(error = %e, "Actor system shutdown error");
    }
    shutdown_token.cancel();

    if tokio::time::timeout(SHUTDOWN_DEADLINE, http_server)
        .await
        .is_err()
    {
        warn!("HTTP server did not stop before the shutdown deadline");
    }

    info!("Room Coordinator shutdown complete");

    Ok(())
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.log_filter));

    let registry = tracing_subscriber::registry().with(filter);
    if observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
