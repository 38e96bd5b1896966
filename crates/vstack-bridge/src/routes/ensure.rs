//! `POST /ensure` (§4.4, §4.7): admits an ensure pipeline run and returns
//! immediately. The admission gate itself (I1) lives in
//! `Supervisor::ensure`; this handler's only job is to not block the HTTP
//! response on a pipeline that can take minutes (model warm-up), per §7's
//! "Propagation policy" — the response stays 202 fire-and-forget and
//! failures surface later through `/status`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};
use vstack_supervisor::Supervisor;

use super::parse_json_object;

pub async fn ensure(State(supervisor): State<Arc<Supervisor>>, body: Bytes) -> impl IntoResponse {
    let model = parse_json_object(&body)
        .get("ollama_model")
        .and_then(Value::as_str)
        .map(str::to_string);

    tokio::spawn(async move {
        if let Err(e) = supervisor.ensure(model).await {
            tracing::warn!(error = %e, "ensure pipeline failed");
        }
    });

    (StatusCode::ACCEPTED, Json(json!({"ok": true, "ensuring": true})))
}
