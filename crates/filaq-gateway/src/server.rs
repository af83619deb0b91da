// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, CORS, and shared state, and serves until the shutdown
//! token fires.

use std::sync::Arc;
use std::time::Instant;

use axum::http::HeaderValue;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use filaq_config::model::GatewayConfig;
use filaq_core::FilaqError;
use filaq_engine::QueueEngine;

use crate::auth::AuthConfig;
use crate::handlers;
use crate::sse;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<QueueEngine>,
    pub auth: AuthConfig,
    /// Process start time for uptime reporting.
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(engine: Arc<QueueEngine>, admin_token: Option<String>) -> Self {
        Self {
            engine,
            auth: AuthConfig { admin_token },
            start_time: Instant::now(),
        }
    }
}

/// Build the full route table.
///
/// Staff routes authenticate per-handler via the `StaffAuth` extractor;
/// `/api/services` and `/api/shop/settings` carry a public GET next to a
/// staff POST on the same path.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        // Health
        .route("/api/health", get(handlers::get_health))
        .route("/api/health/db", get(handlers::get_health_db))
        // Customer queue operations
        .route("/api/queue/join", post(handlers::post_join))
        .route("/api/queue/position/{ticket_id}", get(handlers::get_position))
        .route("/api/queue/{ticket_id}/arrive", post(handlers::post_arrive))
        .route("/api/queue/{ticket_id}/leave", post(handlers::post_leave))
        // Catalog and settings
        .route(
            "/api/services",
            get(handlers::get_services).post(handlers::post_service),
        )
        .route("/api/services/{service_id}", delete(handlers::delete_service))
        .route(
            "/api/shop/settings",
            get(handlers::get_settings).post(handlers::post_settings),
        )
        // Push subscriptions
        .route("/api/push/subscribe", post(handlers::post_push_subscribe))
        .route("/api/push/unsubscribe", post(handlers::post_push_unsubscribe))
        // Staff queue operations
        .route("/api/queue/list", get(handlers::get_list))
        .route("/api/queue/current", get(handlers::get_current))
        .route("/api/queue/next", post(handlers::post_next))
        .route("/api/queue/{ticket_id}/complete", post(handlers::post_complete))
        .route("/api/queue/{ticket_id}/cancel", post(handlers::post_cancel))
        // Live streams
        .route("/api/queue/stream/current", get(sse::stream_current))
        .route("/api/queue/stream/public", get(sse::stream_public))
        .route("/api/queue/stream/settings", get(sse::stream_settings))
        .route("/api/queue/stream/list", get(sse::stream_list))
        .route("/api/queue/stream/ticket/{ticket_id}", get(sse::stream_ticket))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the gateway HTTP server and serve until `shutdown` fires.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), FilaqError> {
    let app = build_router(state).layer(cors_layer(&config.allowed_origins));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| FilaqError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| FilaqError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(())
}
