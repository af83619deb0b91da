// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events streaming of queue snapshots.
//!
//! Every stream opens with one complete snapshot so a late joiner is
//! correct immediately, then forwards whatever the fanout hub publishes.
//! Dropping the HTTP connection drops the stream, and the stream's `Drop`
//! deregisters the subscription from the hub.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use filaq_core::{ChannelKind, QueueEvent};
use filaq_fanout::{FanoutHub, Subscription};

use crate::error::ApiError;
use crate::server::GatewayState;

#[derive(Debug, Deserialize)]
pub struct ShopQuery {
    #[serde(rename = "shopCode", default = "default_shop")]
    pub shop_code: String,
}

#[derive(Debug, Deserialize)]
pub struct StaffStreamQuery {
    #[serde(rename = "shopCode", default = "default_shop")]
    pub shop_code: String,
    /// EventSource cannot set headers, so the staff stream takes the
    /// bearer token as a query parameter.
    pub token: Option<String>,
}

pub(crate) fn default_shop() -> String {
    "default".to_string()
}

/// Hub subscription adapted to an SSE event stream. Deregisters itself
/// from the hub when the client disconnects.
struct SnapshotStream {
    hub: Arc<FanoutHub>,
    shop_code: String,
    id: u64,
    rx: mpsc::Receiver<QueueEvent>,
}

impl Stream for SnapshotStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut()
            .rx
            .poll_recv(cx)
            .map(|opt| opt.map(|event| Ok(to_sse_event(&event))))
    }
}

impl Drop for SnapshotStream {
    fn drop(&mut self) {
        self.hub.unsubscribe(&self.shop_code, self.id);
    }
}

fn to_sse_event(event: &QueueEvent) -> Event {
    // These types serialize infallibly; the fallback keeps the stream alive.
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(event.event_name()).data(data)
}

fn sse_response(
    hub: Arc<FanoutHub>,
    shop_code: String,
    sub: Subscription,
    initial: &QueueEvent,
) -> Response {
    let stream = stream::iter([Ok(to_sse_event(initial))]).chain(SnapshotStream {
        hub,
        shop_code,
        id: sub.id,
        rx: sub.rx,
    });
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

/// Register the subscription, then compute the opening snapshot.
///
/// In that order: a mutation landing between the two shows up as a
/// duplicate full-state push instead of a lost update.
async fn subscribe_with_snapshot(
    state: &GatewayState,
    shop_code: &str,
    kind: ChannelKind,
) -> Result<(Subscription, QueueEvent), ApiError> {
    let hub = state.engine.hub();
    let sub = hub.subscribe(shop_code, kind);
    let initial = match kind {
        ChannelKind::CurrentNumber => state.engine.snapshot_current(shop_code).await,
        ChannelKind::WaitingList => state.engine.snapshot_waiting(shop_code).await,
        ChannelKind::PublicList => state.engine.snapshot_public(shop_code).await,
        ChannelKind::Settings => state.engine.snapshot_settings(shop_code).await,
    };
    match initial {
        Ok(initial) => Ok((sub, initial)),
        Err(e) => {
            hub.unsubscribe(shop_code, sub.id);
            Err(e.into())
        }
    }
}

async fn open_channel(
    state: &GatewayState,
    shop_code: &str,
    kind: ChannelKind,
) -> Result<Response, ApiError> {
    let (sub, initial) = subscribe_with_snapshot(state, shop_code, kind).await?;
    let hub = state.engine.hub().clone();
    Ok(sse_response(hub, shop_code.to_string(), sub, &initial))
}

/// GET /api/queue/stream/current
pub async fn stream_current(
    State(state): State<GatewayState>,
    Query(q): Query<ShopQuery>,
) -> Result<Response, ApiError> {
    open_channel(&state, &q.shop_code, ChannelKind::CurrentNumber).await
}

/// GET /api/queue/stream/public
pub async fn stream_public(
    State(state): State<GatewayState>,
    Query(q): Query<ShopQuery>,
) -> Result<Response, ApiError> {
    open_channel(&state, &q.shop_code, ChannelKind::PublicList).await
}

/// GET /api/queue/stream/settings
pub async fn stream_settings(
    State(state): State<GatewayState>,
    Query(q): Query<ShopQuery>,
) -> Result<Response, ApiError> {
    open_channel(&state, &q.shop_code, ChannelKind::Settings).await
}

/// GET /api/queue/stream/list (staff; token via query parameter)
pub async fn stream_list(
    State(state): State<GatewayState>,
    Query(q): Query<StaffStreamQuery>,
) -> Result<Response, ApiError> {
    if !state.auth.token_matches(q.token.as_deref()) {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    }
    open_channel(&state, &q.shop_code, ChannelKind::WaitingList).await
}

/// GET /api/queue/stream/ticket/{ticket_id}
pub async fn stream_ticket(
    State(state): State<GatewayState>,
    Path(ticket_id): Path<String>,
) -> Result<Response, ApiError> {
    // The first lookup only resolves the shop; the initial event is
    // recomputed after the subscription is live so no update can fall
    // between them.
    let shop_code = state.engine.position_snapshot(&ticket_id).await?.shop_code;
    let hub = state.engine.hub().clone();
    let sub = hub.subscribe_ticket(&shop_code, &ticket_id);
    let initial = match state.engine.snapshot_ticket(&ticket_id).await {
        Ok(initial) => initial,
        Err(e) => {
            hub.unsubscribe(&shop_code, sub.id);
            return Err(e.into());
        }
    };
    Ok(sse_response(hub, shop_code, sub, &initial))
}
