//! HTTP endpoints of the runner.
//!
//! A thin layer over [`Runner`]: handlers read its report log or trigger a
//! single probe, and translate the outcome into JSON. Nothing here combines
//! probe results into an overall verdict.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::scheduler::Runner;

pub mod health;
pub mod metrics;
pub mod probes;

/// Build the runner's axum router.
pub fn router(runner: Arc<Runner>) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/probes", get(probes::latest))
        .route("/probes/history", get(probes::history))
        .route("/probes/{name}/check", post(probes::check_now))
        .route("/metrics", get(metrics::metrics))
        .with_state(runner)
}
