//! `/lease/*` handlers (§4.7): acquire, heartbeat, release. Thin wrappers
//! over the Lease Registry — all the interesting behavior (I3, I5) lives in
//! `vstack_supervisor::leases`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};
use vstack_supervisor::leases::{HeartbeatOutcome, ReleaseOutcome};
use vstack_supervisor::Supervisor;

use crate::error::ApiError;

use super::parse_json_object;

/// POST /lease/acquire — `{meta?: object}` -> `{ok, lease_id, heartbeat_s, lease_ttl_s}`.
pub async fn acquire(State(supervisor): State<Arc<Supervisor>>, body: Bytes) -> impl IntoResponse {
    let meta = parse_json_object(&body)
        .get("meta")
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));
    let lease = supervisor.acquire_lease(meta).await;
    Json(json!({
        "ok": true,
        "lease_id": lease.lease_id,
        "heartbeat_s": lease.heartbeat_s,
        "lease_ttl_s": lease.lease_ttl_s,
    }))
}

fn lease_id_of(body: &Bytes) -> Result<String, ApiError> {
    parse_json_object(body)
        .get("lease_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::MissingLeaseId)
}

/// POST /lease/heartbeat — `{lease_id}` -> `{ok:true}` | 400 | 404.
pub async fn heartbeat(
    State(supervisor): State<Arc<Supervisor>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let lease_id = lease_id_of(&body)?;
    match supervisor.heartbeat_lease(&lease_id).await {
        HeartbeatOutcome::Ok => Ok(Json(json!({"ok": true}))),
        HeartbeatOutcome::Unknown => Err(ApiError::UnknownLease),
    }
}

/// POST /lease/release — `{lease_id}` -> `{ok:true}` | 400.
///
/// Releasing an id the registry doesn't recognize still reports success
/// (I5: the registry never errors beyond the heartbeat path's 404) since
/// the caller's intent — "I'm done with this lease" — is already satisfied.
pub async fn release(
    State(supervisor): State<Arc<Supervisor>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let lease_id = lease_id_of(&body)?;
    let _ = match supervisor.release_lease(&lease_id).await {
        ReleaseOutcome::Ok | ReleaseOutcome::Unknown => {}
    };
    Ok(Json(json!({"ok": true})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use axum_test::TestServer;
    use vstack_core::config::Config;

    fn supervisor() -> Arc<Supervisor> {
        let mut config = Config::default();
        config.stt.health_url = "http://127.0.0.1:1/health".into();
        config.tts.base_url = "http://127.0.0.1:1".into();
        config.llm.api_base = "http://127.0.0.1:1/api".into();
        Arc::new(Supervisor::new(config))
    }

    fn app() -> TestServer {
        let router = Router::new()
            .route("/lease/acquire", post(acquire))
            .route("/lease/heartbeat", post(heartbeat))
            .route("/lease/release", post(release))
            .with_state(supervisor());
        TestServer::new(router).unwrap()
    }

    #[tokio::test]
    async fn acquire_returns_lease_and_timers() {
        let server = app();
        let resp = server.post("/lease/acquire").json(&json!({})).await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert!(body["lease_id"].as_str().unwrap().starts_with("lease_"));
        assert_eq!(body["heartbeat_s"], 5);
        assert_eq!(body["lease_ttl_s"], 15);
    }

    #[tokio::test]
    async fn heartbeat_missing_lease_id_is_400() {
        let server = app();
        let resp = server.post("/lease/heartbeat").json(&json!({})).await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn heartbeat_unknown_lease_is_404() {
        let server = app();
        let resp = server
            .post("/lease/heartbeat")
            .json(&json!({"lease_id": "lease_nope"}))
            .await;
        resp.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn acquire_then_heartbeat_then_release_round_trips() {
        let server = app();
        let acquired: Value = server
            .post("/lease/acquire")
            .json(&json!({}))
            .await
            .json();
        let lease_id = acquired["lease_id"].as_str().unwrap().to_string();

        let hb = server
            .post("/lease/heartbeat")
            .json(&json!({"lease_id": lease_id}))
            .await;
        hb.assert_status_ok();

        let rel = server
            .post("/lease/release")
            .json(&json!({"lease_id": lease_id}))
            .await;
        rel.assert_status_ok();

        // Second release of the same id still reports ok (idempotent).
        let rel2 = server
            .post("/lease/release")
            .json(&json!({"lease_id": lease_id}))
            .await;
        rel2.assert_status_ok();
    }

    #[tokio::test]
    async fn release_missing_lease_id_is_400() {
        let server = app();
        let resp = server.post("/lease/release").json(&json!({})).await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }
}
