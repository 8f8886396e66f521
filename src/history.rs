//! In-memory record of recent probe reports.
//!
//! [`ReportLog`] keeps a fixed-capacity ring-buffer of every report (oldest
//! evicted first) plus the latest report per probe name, which survives
//! eviction so a rarely-polled probe never disappears from `/probes`.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::FailureKind,
    probe::{HealthStatus, ProbeResult},
};

/// Serializable snapshot of one check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub status: HealthStatus,
    /// Raw response body or error message.
    pub description: Option<String>,
    /// Set for every result that is not healthy.
    pub error_kind: Option<FailureKind>,
    pub elapsed_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl ProbeReport {
    pub fn new(name: &str, tags: &[String], result: &ProbeResult) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            tags: tags.to_vec(),
            status: result.status(),
            description: result.description().map(str::to_string),
            error_kind: match result.cause() {
                Some(cause) => Some(cause.kind()),
                None if !result.is_healthy() => Some(FailureKind::Unhealthy),
                None => None,
            },
            elapsed_ms: result.elapsed().map_or(0, |d| d.as_millis() as u64),
            timestamp: Utc::now(),
        }
    }
}

/// Ring-buffer of recent [`ProbeReport`]s, safe to share via `Arc<ReportLog>`.
pub struct ReportLog {
    capacity: usize,
    entries: Mutex<VecDeque<ProbeReport>>,
    latest: DashMap<String, ProbeReport>,
}

impl ReportLog {
    /// A zero capacity still keeps the newest report.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            latest: DashMap::new(),
        }
    }

    pub async fn push(&self, report: ProbeReport) {
        self.latest.insert(report.name.clone(), report.clone());

        let mut entries = self.entries.lock().await;
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(report);
    }

    /// Return up to `limit` recent reports, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<ProbeReport> {
        let entries = self.entries.lock().await;
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// Latest report per probe, sorted by name.
    pub fn latest(&self) -> Vec<ProbeReport> {
        let mut reports: Vec<_> = self.latest.iter().map(|e| e.value().clone()).collect();
        reports.sort_by(|a, b| a.name.cmp(&b.name));
        reports
    }

    pub fn latest_for(&self, name: &str) -> Option<ProbeReport> {
        self.latest.get(name).map(|e| e.value().clone())
    }

    /// Per-probe counts over the buffered window.
    pub async fn stats(&self) -> HashMap<String, WindowStats> {
        let entries = self.entries.lock().await;
        let mut stats: HashMap<String, WindowStats> = HashMap::new();
        for report in entries.iter() {
            let s = stats.entry(report.name.clone()).or_default();
            s.checks += 1;
            if report.status != HealthStatus::Healthy {
                s.failures += 1;
            }
            if report.error_kind == Some(FailureKind::Timeout) {
                s.timeouts += 1;
            }
            s.elapsed_ms_sum += report.elapsed_ms;
        }
        stats
    }
}

/// Counts for one probe within the ring-buffer window.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowStats {
    pub checks: u64,
    /// Checks that were not healthy.
    pub failures: u64,
    pub timeouts: u64,
    pub elapsed_ms_sum: u64,
}
