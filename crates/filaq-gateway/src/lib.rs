// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/SSE gateway for the filaq queue coordination engine.
//!
//! Public customer routes, bearer-guarded staff routes, and per-channel
//! SSE snapshot streams over one axum router.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, start_server, GatewayState};
