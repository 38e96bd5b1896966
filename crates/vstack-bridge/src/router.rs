//! Router assembly for the control plane (§4.7). Binds the five routes
//! against a shared `Arc<Supervisor>` and layers the same request-id and
//! metrics middleware the teacher wires onto its own API router, plus a
//! content-type override so every response — success or error — carries
//! the exact `application/json; charset=utf-8` the wire protocol specifies.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use vstack_supervisor::Supervisor;
use vstack_telemetry::middleware::metrics_middleware;
use vstack_telemetry::tracing_setup::request_id_middleware;

use crate::routes::{ensure, lease, status};

/// Build the full control-plane router bound to `supervisor`.
pub fn build_router(supervisor: Arc<Supervisor>) -> Router {
    Router::new()
        .route("/lease/acquire", post(lease::acquire))
        .route("/lease/heartbeat", post(lease::heartbeat))
        .route("/lease/release", post(lease::release))
        .route("/ensure", post(ensure::ensure))
        .route("/status", get(status::status))
        .fallback(not_found)
        .with_state(supervisor)
        .layer(middleware::from_fn(json_content_type_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"ok": false, "error": "not_found"})),
    )
        .into_response()
}

async fn json_content_type_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;
    use serde_json::Value;
    use vstack_core::config::Config;

    fn router() -> Router {
        let mut config = Config::default();
        config.stt.health_url = "http://127.0.0.1:1/health".into();
        config.tts.base_url = "http://127.0.0.1:1".into();
        config.llm.api_base = "http://127.0.0.1:1/api".into();
        build_router(Arc::new(Supervisor::new(config)))
    }

    #[tokio::test]
    async fn unmatched_route_is_404_not_found() {
        let server = TestServer::new(router()).unwrap();
        let resp = server.get("/does/not/exist").await;
        resp.assert_status_not_found();
        let body: Value = resp.json();
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn responses_carry_exact_content_type() {
        let server = TestServer::new(router()).unwrap();
        let resp = server.get("/status").await;
        let content_type = resp.header("content-type");
        assert_eq!(content_type, "application/json; charset=utf-8");
    }

    #[tokio::test]
    async fn responses_carry_request_id_header() {
        let server = TestServer::new(router()).unwrap();
        let resp = server.get("/status").await;
        assert!(resp.header("x-request-id").to_str().unwrap().len() == 32);
    }
}
