// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token authentication for staff routes.
//!
//! When no token is configured, all privileged requests are rejected
//! (fail-closed). The staff SSE stream authenticates via a `token` query
//! parameter instead, because EventSource cannot set headers.

use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};

use crate::server::GatewayState;

/// Authentication configuration for the gateway.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token. `None` disables privileged routes entirely.
    pub admin_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "admin_token",
                &self.admin_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl AuthConfig {
    /// Whether `presented` (a raw token string) matches the configured
    /// token. Always false when no token is configured.
    pub fn token_matches(&self, presented: Option<&str>) -> bool {
        match (&self.admin_token, presented) {
            (Some(expected), Some(token)) => expected == token,
            _ => false,
        }
    }
}

/// Extractor guarding staff handlers with `Authorization: Bearer <token>`.
///
/// Used as a handler argument rather than middleware because several paths
/// (`/api/services`, `/api/shop/settings`) mix a public method with a
/// staff method.
pub struct StaffAuth;

impl FromRequestParts<GatewayState> for StaffAuth {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GatewayState,
    ) -> Result<Self, Self::Rejection> {
        if state.auth.admin_token.is_none() {
            tracing::error!("gateway has no admin token configured -- rejecting staff request");
            return Err(StatusCode::UNAUTHORIZED);
        }
        let presented = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if state.auth.token_matches(presented) {
            Ok(StaffAuth)
        } else {
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
