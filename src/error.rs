//! Error types for depprobe.
//!
//! - [`ProbeError`] is the failure taxonomy observed *during* a check. It is
//!   never returned from [`Probe::check`](crate::probe::Probe::check); probes
//!   fold it into a [`ProbeResult`](crate::probe::ProbeResult) as the cause.
//! - [`ConfigError`] is raised at construction time, before any check runs.
//! - [`ApiError`] wraps failures in the runner's axum handlers and converts
//!   them into an HTTP response via [`IntoResponse`].

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// A failure that happened while a probe was checking its dependency.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The deadline elapsed before the operation finished.
    #[error("the operation has timed out after {0:?}")]
    Timeout(Duration),

    /// The caller stopped waiting via its cancellation token.
    #[error("the check was cancelled by the caller")]
    Cancelled,

    /// DNS, connect, TLS or other transport-level HTTP failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not the expected `{code, desc}` JSON object.
    #[error("could not decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Connect, reconnect or liveness test failed on a stateful connection.
    #[error("connection failed: {0:#}")]
    Connection(anyhow::Error),

    /// The spawned operation panicked or was aborted by the runtime.
    #[error("probe task aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

impl ProbeError {
    /// Coarse classification used in reports and metrics.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Cancelled => FailureKind::Cancelled,
            Self::Transport(_) => FailureKind::Transport,
            Self::Decode(_) => FailureKind::Decode,
            Self::Connection(_) => FailureKind::Connection,
            Self::Aborted(_) => FailureKind::Aborted,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<anyhow::Error> for ProbeError {
    fn from(e: anyhow::Error) -> Self {
        Self::Connection(e)
    }
}

/// Which branch of the failure taxonomy a [`ProbeError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Cancelled,
    Transport,
    Decode,
    Connection,
    /// The spawned check panicked or was aborted.
    Aborted,
    /// The dependency answered, but not with the healthy markers. Never
    /// produced by [`ProbeError::kind`]; reports use it for results without a
    /// cause.
    Unhealthy,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Transport => "transport",
            Self::Decode => "decode",
            Self::Connection => "connection",
            Self::Aborted => "aborted",
            Self::Unhealthy => "unhealthy",
        })
    }
}

/// Invalid or missing configuration detected when a probe is built.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`{0}` is required")]
    Missing(&'static str),

    #[error("environment variable `{0}` is not set or empty")]
    MissingEnv(String),

    #[error("invalid url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("time precision must be 10 or 13 digits, got {0}")]
    InvalidPrecision(u8),

    #[error("invalid header value for `{0}`")]
    InvalidHeader(&'static str),

    #[error("a connection, a connect function or a connection factory is required")]
    NoConnectionSource,

    #[error("building http client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Error returned from the runner's HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// No probe is registered under the given name.
    NotFound(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound(name) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("no probe named `{name}`") })),
            )
                .into_response(),
            Self::Internal(e) => {
                tracing::warn!(error = %e, "handler error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": e.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(e: E) -> Self {
        Self::Internal(e.into())
    }
}
