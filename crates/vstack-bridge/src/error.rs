//! HTTP-layer error type for the control plane (§4.7, §7).
//!
//! Maps the error taxonomy of §7 onto the exact status codes and JSON
//! shapes the table in §4.7 calls for. Ensure-pipeline failures are
//! deliberately absent from this enum: those surface asynchronously via
//! `last_error`/`stage` in `/status`, never as a handler error (§7
//! "Propagation policy" — `/ensure`'s own response stays 202 regardless).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing_lease_id")]
    MissingLeaseId,
    #[error("unknown_lease")]
    UnknownLease,
    #[error("not_found")]
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            ApiError::MissingLeaseId => (StatusCode::BAD_REQUEST, "missing_lease_id"),
            ApiError::UnknownLease => (StatusCode::NOT_FOUND, "unknown_lease"),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        };
        (status, Json(json!({"ok": false, "error": code}))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_lease_id_is_400() {
        let resp = ApiError::MissingLeaseId.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_lease_is_404() {
        let resp = ApiError::UnknownLease.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
