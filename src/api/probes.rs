//! Probe report endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{error::ApiError, history::ProbeReport, scheduler::Runner};

/// `GET /probes`: latest report of every probe that has been checked.
///
/// Example response:
/// ```json
/// {
///   "probes": [
///     { "name": "im-api", "status": "healthy", "elapsed_ms": 87, ... }
///   ]
/// }
/// ```
pub async fn latest(State(runner): State<Arc<Runner>>) -> impl IntoResponse {
    Json(json!({ "probes": runner.reports.latest() }))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}
fn default_limit() -> usize {
    100
}

/// `GET /probes/history?limit=N`: recent N reports, newest first (default 100).
pub async fn history(
    State(runner): State<Arc<Runner>>,
    Query(q): Query<HistoryQuery>,
) -> impl IntoResponse {
    let reports = runner.reports.recent(q.limit).await;
    let stats = runner.reports.stats().await;
    Json(json!({
        "stats": stats,
        "reports": reports,
    }))
}

/// `POST /probes/{name}/check`: run one probe now and return its report.
pub async fn check_now(
    State(runner): State<Arc<Runner>>,
    Path(name): Path<String>,
) -> Result<Json<ProbeReport>, ApiError> {
    runner
        .run_probe(&name)
        .await
        .map(Json)
        .ok_or(ApiError::NotFound(name))
}
