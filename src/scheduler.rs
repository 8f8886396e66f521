//! Polling: run every registered probe on a fixed interval.
//!
//! [`Runner`] is also the shared state behind the HTTP endpoints, which read
//! its [`ReportLog`] and can trigger a single probe on demand.

use std::{sync::Arc, time::Duration};

use futures_util::future::join_all;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    history::{ProbeReport, ReportLog},
    registry::Registry,
};

pub struct Runner {
    pub registry: Registry,
    pub reports: Arc<ReportLog>,
    pub interval: Duration,
    /// Runner start time, used to compute uptime for `/healthz`.
    pub started_at: std::time::Instant,
    /// Cancelled on shutdown; in-flight checks stop waiting.
    pub shutdown: CancellationToken,
}

impl Runner {
    pub fn new(registry: Registry, reports: Arc<ReportLog>, interval: Duration) -> Self {
        Self {
            registry,
            reports,
            interval,
            started_at: std::time::Instant::now(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Check every registration concurrently and record the reports.
    pub async fn run_once(&self) -> Vec<ProbeReport> {
        let checks = self
            .registry
            .iter()
            .map(|r| r.run(self.shutdown.child_token()));
        let reports = join_all(checks).await;

        for report in &reports {
            self.reports.push(report.clone()).await;
        }
        debug!(count = reports.len(), "poll complete");
        reports
    }

    /// Check one probe by name. `None` if nothing is registered under it.
    pub async fn run_probe(&self, name: &str) -> Option<ProbeReport> {
        let registration = self.registry.get(name)?;
        let report = registration.run(self.shutdown.child_token()).await;
        self.reports.push(report.clone()).await;
        Some(report)
    }

    /// Poll until [`Runner::shutdown`] is cancelled.
    ///
    /// A poll that overruns the interval delays the next one instead of
    /// bursting to catch up.
    pub async fn poll(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            probes = self.registry.len(),
            interval = ?self.interval,
            "starting probe scheduler"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_once().await;
                }
                _ = self.shutdown.cancelled() => {
                    info!("probe scheduler shutting down");
                    break;
                }
            }
        }
    }
}
