//! Liveness of the runner itself.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::scheduler::Runner;

/// `GET /healthz`: always returns 200 OK with `{"status": "ok"}`.
///
/// Reports on the runner process only, never on the probes it schedules, so
/// it is safe to use as a Docker / Kubernetes liveness probe.
pub async fn healthz(State(runner): State<Arc<Runner>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "uptime_secs": runner.started_at.elapsed().as_secs(),
            "probes": runner.registry.len(),
        })),
    )
}
