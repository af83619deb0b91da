// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the queue REST API.
//!
//! Request bodies use camelCase keys, matching what the browser clients
//! send. Domain payloads (tickets, snapshots, events) serialize with their
//! canonical field names from `filaq-core`.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use filaq_core::{FilaqError, ShopSettings, Ticket, TicketSnapshot, WaitingEntry};
use filaq_engine::JoinRequest;
use filaq_storage::queries::{services, subscriptions};
use filaq_storage::{SchemaReport, Service};

use crate::auth::StaffAuth;
use crate::error::ApiError;
use crate::server::GatewayState;
use crate::sse::ShopQuery;

fn default_shop() -> String {
    crate::sse::default_shop()
}

#[derive(Debug, Serialize)]
pub struct OkBody {
    pub ok: bool,
}

fn ok() -> Json<OkBody> {
    Json(OkBody { ok: true })
}

// --- Health ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// GET /api/health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

#[derive(Debug, Serialize)]
pub struct DbHealthResponse {
    pub status: String,
    #[serde(flatten)]
    pub schema: SchemaReport,
}

/// GET /api/health/db
pub async fn get_health_db(
    State(state): State<GatewayState>,
) -> Result<Json<DbHealthResponse>, ApiError> {
    let schema = state.engine.db().schema_report().await?;
    let status = if schema.is_healthy() { "ok" } else { "degraded" };
    Ok(Json(DbHealthResponse {
        status: status.to_string(),
        schema,
    }))
}

// --- Customer queue operations ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinBody {
    #[serde(default = "default_shop")]
    pub shop_code: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
}

/// POST /api/queue/join
pub async fn post_join(
    State(state): State<GatewayState>,
    Json(body): Json<JoinBody>,
) -> Result<Json<TicketSnapshot>, ApiError> {
    let snapshot = state
        .engine
        .join(JoinRequest {
            shop_code: body.shop_code,
            customer_name: body.name,
            phone: body.phone,
            service_label: body.service,
        })
        .await?;
    Ok(Json(snapshot))
}

/// GET /api/queue/position/{ticket_id}
pub async fn get_position(
    State(state): State<GatewayState>,
    Path(ticket_id): Path<String>,
) -> Result<Json<TicketSnapshot>, ApiError> {
    Ok(Json(state.engine.position_snapshot(&ticket_id).await?))
}

/// POST /api/queue/{ticket_id}/arrive
pub async fn post_arrive(
    State(state): State<GatewayState>,
    Path(ticket_id): Path<String>,
) -> Result<Json<TicketSnapshot>, ApiError> {
    Ok(Json(state.engine.arrive(&ticket_id).await?))
}

/// POST /api/queue/{ticket_id}/leave
pub async fn post_leave(
    State(state): State<GatewayState>,
    Path(ticket_id): Path<String>,
) -> Result<Json<OkBody>, ApiError> {
    state.engine.leave(&ticket_id).await?;
    Ok(ok())
}

// --- Public catalog and settings ---

/// GET /api/services
pub async fn get_services(
    State(state): State<GatewayState>,
    Query(q): Query<ShopQuery>,
) -> Result<Json<Vec<Service>>, ApiError> {
    Ok(Json(state.engine.active_services(&q.shop_code).await?))
}

/// GET /api/shop/settings
pub async fn get_settings(
    State(state): State<GatewayState>,
    Query(q): Query<ShopQuery>,
) -> Result<Json<ShopSettings>, ApiError> {
    Ok(Json(state.engine.settings(&q.shop_code).await?))
}

// --- Push subscriptions ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeBody {
    pub ticket_id: String,
    #[serde(default = "default_shop")]
    pub shop_code: String,
    /// Opaque PushSubscription JSON from the browser; must carry an
    /// `endpoint` member.
    pub subscription: serde_json::Value,
}

/// POST /api/push/subscribe
pub async fn post_push_subscribe(
    State(state): State<GatewayState>,
    Json(body): Json<SubscribeBody>,
) -> Result<Json<OkBody>, ApiError> {
    let endpoint = body
        .subscription
        .get("endpoint")
        .and_then(|v| v.as_str())
        .ok_or_else(|| FilaqError::Conflict("subscription has no endpoint".to_string()))?
        .to_string();
    let subscription_json = body.subscription.to_string();
    subscriptions::save(
        state.engine.db(),
        &body.shop_code,
        &body.ticket_id,
        &endpoint,
        &subscription_json,
    )
    .await?;
    Ok(ok())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeBody {
    pub ticket_id: String,
    pub endpoint: String,
}

/// POST /api/push/unsubscribe
pub async fn post_push_unsubscribe(
    State(state): State<GatewayState>,
    Json(body): Json<UnsubscribeBody>,
) -> Result<Json<OkBody>, ApiError> {
    subscriptions::remove(state.engine.db(), &body.ticket_id, &body.endpoint).await?;
    Ok(ok())
}

// --- Staff operations ---

/// GET /api/queue/list
pub async fn get_list(
    _auth: StaffAuth,
    State(state): State<GatewayState>,
    Query(q): Query<ShopQuery>,
) -> Result<Json<Vec<WaitingEntry>>, ApiError> {
    Ok(Json(state.engine.waiting_entries(&q.shop_code).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentResponse {
    pub current_number: i64,
}

/// GET /api/queue/current
pub async fn get_current(
    _auth: StaffAuth,
    State(state): State<GatewayState>,
    Query(q): Query<ShopQuery>,
) -> Result<Json<CurrentResponse>, ApiError> {
    Ok(Json(CurrentResponse {
        current_number: state.engine.current_number(&q.shop_code).await?,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextBody {
    #[serde(default = "default_shop")]
    pub shop_code: String,
}

#[derive(Debug, Serialize)]
pub struct NextResponse {
    /// The ticket that was just called, or null when nobody was waiting.
    pub ticket: Option<Ticket>,
}

/// POST /api/queue/next
pub async fn post_next(
    _auth: StaffAuth,
    State(state): State<GatewayState>,
    Json(body): Json<NextBody>,
) -> Result<Json<NextResponse>, ApiError> {
    let ticket = state.engine.call_next(&body.shop_code).await?;
    Ok(Json(NextResponse { ticket }))
}

/// POST /api/queue/{ticket_id}/complete
pub async fn post_complete(
    _auth: StaffAuth,
    State(state): State<GatewayState>,
    Path(ticket_id): Path<String>,
) -> Result<Json<OkBody>, ApiError> {
    state.engine.complete(&ticket_id).await?;
    Ok(ok())
}

/// POST /api/queue/{ticket_id}/cancel
pub async fn post_cancel(
    _auth: StaffAuth,
    State(state): State<GatewayState>,
    Path(ticket_id): Path<String>,
) -> Result<Json<OkBody>, ApiError> {
    state.engine.cancel_admin(&ticket_id).await?;
    Ok(ok())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBody {
    #[serde(default = "default_shop")]
    pub shop_code: String,
    pub name: String,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
}

/// POST /api/services
pub async fn post_service(
    _auth: StaffAuth,
    State(state): State<GatewayState>,
    Json(body): Json<ServiceBody>,
) -> Result<Json<Service>, ApiError> {
    let service = services::create(
        state.engine.db(),
        &body.shop_code,
        &body.name,
        body.duration_minutes,
    )
    .await?;
    Ok(Json(service))
}

/// DELETE /api/services/{id}
pub async fn delete_service(
    _auth: StaffAuth,
    State(state): State<GatewayState>,
    Path(service_id): Path<String>,
) -> Result<Json<OkBody>, ApiError> {
    if !services::deactivate(state.engine.db(), &service_id).await? {
        return Err(FilaqError::NotFound {
            what: format!("service {service_id}"),
        }
        .into());
    }
    Ok(ok())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsBody {
    #[serde(default = "default_shop")]
    pub shop_code: String,
    pub paused: bool,
    #[serde(default)]
    pub pause_message: Option<String>,
}

/// POST /api/shop/settings
pub async fn post_settings(
    _auth: StaffAuth,
    State(state): State<GatewayState>,
    Json(body): Json<SettingsBody>,
) -> Result<Json<ShopSettings>, ApiError> {
    let stored = state
        .engine
        .set_pause(&body.shop_code, body.paused, body.pause_message)
        .await?;
    Ok(Json(stored))
}
