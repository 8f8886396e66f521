//! The single-probe contract.
//!
//! A [`Probe`] answers one question, "is this dependency alive right now?",
//! and always answers with a [`ProbeResult`]. Failures that happen while
//! checking (timeouts, refused connections, garbage responses) are folded into
//! the result with their original [`ProbeError`] attached; `check` itself never
//! fails.
//!
//! Two strategies ship with the crate:
//!
//! - [`SignedHttpProbe`]: stateless, one freshly signed POST per check.
//! - [`ConnectionProbe`]: stateful, reuses a long-lived connection and replaces
//!   it when it goes stale.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ProbeError;

pub mod connection;
pub mod signed_http;
pub mod tcp;

pub use connection::{Channel, ConnectFn, Connection, ConnectionFactory, ConnectionProbe};
pub use signed_http::{MismatchStatus, SignedHttpConfig, SignedHttpProbe};
pub use tcp::{TcpConnection, TcpConnector};

/// Default deadline handed to a check when the registration does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome classification of a single check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    /// Reachable, but the response did not match the healthy markers.
    Degraded,
    #[default]
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        })
    }
}

/// Immutable result of one [`Probe::check`] invocation.
#[derive(Debug)]
pub struct ProbeResult {
    status: HealthStatus,
    description: Option<String>,
    cause: Option<ProbeError>,
    elapsed: Option<Duration>,
}

impl ProbeResult {
    pub fn healthy() -> Self {
        Self::new(HealthStatus::Healthy, None, None)
    }

    pub fn degraded(description: impl Into<String>) -> Self {
        Self::new(HealthStatus::Degraded, Some(description.into()), None)
    }

    pub fn unhealthy(description: impl Into<String>) -> Self {
        Self::new(HealthStatus::Unhealthy, Some(description.into()), None)
    }

    /// A result produced from a caught failure.
    ///
    /// `status` is the registration's failure status, not necessarily
    /// [`HealthStatus::Unhealthy`]. The description is the error's message.
    pub fn failure(status: HealthStatus, cause: ProbeError) -> Self {
        let description = cause.to_string();
        Self::new(status, Some(description), Some(cause))
    }

    fn new(status: HealthStatus, description: Option<String>, cause: Option<ProbeError>) -> Self {
        Self {
            status,
            description,
            cause,
            elapsed: None,
        }
    }

    /// Stamp the wall time the check took.
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// Raw response body or error message.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The underlying failure, if the result came from a caught error.
    pub fn cause(&self) -> Option<&ProbeError> {
        self.cause.as_ref()
    }

    pub fn into_cause(self) -> Option<ProbeError> {
        self.cause
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }
}

/// Per-invocation inputs supplied by whoever schedules the probe.
#[derive(Debug, Clone)]
pub struct CheckContext {
    /// Registration name, used for log fields only.
    pub name: String,
    /// Status reported when the check fails with an error.
    pub failure_status: HealthStatus,
    /// Deadline applied to each network operation of the check.
    pub timeout: Duration,
    /// Cancelling this token stops the check from waiting any further.
    pub cancel: CancellationToken,
}

impl CheckContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_status: HealthStatus::Unhealthy,
            timeout: DEFAULT_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_failure_status(mut self, status: HealthStatus) -> Self {
        self.failure_status = status;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fold a caught failure into a result carrying this context's failure status.
    pub fn fail(&self, cause: ProbeError) -> ProbeResult {
        tracing::debug!(probe = %self.name, error = %cause, kind = %cause.kind(), "check failed");
        ProbeResult::failure(self.failure_status, cause)
    }
}

/// Capability interface every probe strategy implements.
///
/// Implementations must be safe to call concurrently and repeatedly; the
/// caller may start a new check while a slow previous one is still running.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Check the dependency once. Never fails; errors become results.
    async fn check(&self, ctx: &CheckContext) -> ProbeResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_keeps_original_cause_and_status() {
        let result = ProbeResult::failure(
            HealthStatus::Degraded,
            ProbeError::Timeout(Duration::from_millis(5)),
        );
        assert_eq!(result.status(), HealthStatus::Degraded);
        assert!(result.cause().unwrap().is_timeout());
        assert!(result.description().unwrap().contains("timed out"));
    }

    #[test]
    fn healthy_has_no_description_or_cause() {
        let result = ProbeResult::healthy();
        assert!(result.is_healthy());
        assert!(result.description().is_none());
        assert!(result.cause().is_none());
    }

    #[test]
    fn context_defaults_to_unhealthy_failure_status() {
        let ctx = CheckContext::new("x");
        assert_eq!(ctx.failure_status, HealthStatus::Unhealthy);
        assert_eq!(ctx.timeout, DEFAULT_TIMEOUT);

        let result = ctx.fail(ProbeError::Cancelled);
        assert_eq!(result.status(), HealthStatus::Unhealthy);
    }

    #[test]
    fn status_round_trips_through_snake_case() {
        let status: HealthStatus = serde_json::from_str("\"degraded\"").unwrap();
        assert_eq!(status, HealthStatus::Degraded);
        assert_eq!(status.to_string(), "degraded");
    }
}
