//! `GET /status` (§4.7): a snapshot of lease count, ensure progress, and
//! per-service health. `Supervisor::status` already runs the three probes
//! concurrently (§5 "its per-service running probes ... need not all be as
//! of the same instant"), so this handler is a plain pass-through.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use vstack_supervisor::{Supervisor, StatusDocument};

pub async fn status(State(supervisor): State<Arc<Supervisor>>) -> Json<StatusDocument> {
    Json(supervisor.status().await)
}
