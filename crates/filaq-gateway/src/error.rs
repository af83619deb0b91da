// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP mapping of the engine error taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use filaq_core::FilaqError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Wrapper turning [`FilaqError`] into an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub FilaqError);

impl From<FilaqError> for ApiError {
    fn from(e: FilaqError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self.0 {
            FilaqError::QueuePaused { message } => {
                (StatusCode::LOCKED, "queue_paused".to_string(), message)
            }
            FilaqError::QueueFull { cap } => (
                StatusCode::CONFLICT,
                "queue_full".to_string(),
                Some(format!("daily cap of {cap} reached")),
            ),
            FilaqError::Conflict(detail) => {
                (StatusCode::CONFLICT, "conflict".to_string(), Some(detail))
            }
            FilaqError::NotFound { what } => {
                (StatusCode::NOT_FOUND, "not_found".to_string(), Some(what))
            }
            other => {
                // Storage/internal details stay in the logs, not on the wire.
                tracing::error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error".to_string(),
                    None,
                )
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_maps_to_locked() {
        let resp = ApiError(FilaqError::QueuePaused {
            message: Some("lunch".into()),
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::LOCKED);
    }

    #[test]
    fn full_and_conflict_map_to_409() {
        let resp = ApiError(FilaqError::QueueFull { cap: 1000 }).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let resp = ApiError(FilaqError::Conflict("nope".into())).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn not_found_maps_to_404() {
        let resp = ApiError(FilaqError::ticket_not_found("t-1")).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn storage_maps_to_500_without_detail() {
        let resp = ApiError(FilaqError::Storage {
            source: Box::new(std::io::Error::other("disk on fire")),
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
