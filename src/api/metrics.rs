//! Prometheus-compatible `/metrics` endpoint.
//!
//! Status and last-duration gauges come from the latest report of each probe.
//! Check counts are derived from the report ring buffer, so they cover a
//! **sliding window** of recent checks rather than the process lifetime and
//! are exported as `gauge`.
//!
//! Metric families:
//! - `depprobe_status`: 1 for the probe's current status, 0 otherwise
//! - `depprobe_last_check_ms`: elapsed time of the latest check
//! - `depprobe_window_checks`: checks in the window
//! - `depprobe_window_failures`: checks in the window that were not healthy
//! - `depprobe_window_timeouts`: checks in the window that hit their deadline
//! - `depprobe_window_elapsed_ms_sum`: sum of check durations in the window

use std::{fmt::Write, sync::Arc};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};

use crate::{
    history::{ProbeReport, WindowStats},
    probe::HealthStatus,
    scheduler::Runner,
};

const STATUSES: [HealthStatus; 3] = [
    HealthStatus::Healthy,
    HealthStatus::Degraded,
    HealthStatus::Unhealthy,
];

/// `GET /metrics`: renders Prometheus text format.
pub async fn metrics(State(runner): State<Arc<Runner>>) -> impl IntoResponse {
    let latest = runner.reports.latest();
    let mut stats: Vec<_> = runner.reports.stats().await.into_iter().collect();
    stats.sort_by(|a, b| a.0.cmp(&b.0));

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        render(&latest, &stats),
    )
}

fn render(latest: &[ProbeReport], stats: &[(String, WindowStats)]) -> String {
    let mut out = String::with_capacity(1024);

    out.push_str("# HELP depprobe_status Current status of each probe (1 = in this status).\n");
    out.push_str("# TYPE depprobe_status gauge\n");
    for report in latest {
        for status in STATUSES {
            let value = u8::from(report.status == status);
            let _ = writeln!(
                out,
                "depprobe_status{{probe=\"{}\",status=\"{status}\"}} {value}",
                report.name
            );
        }
    }
    out.push('\n');

    out.push_str("# HELP depprobe_last_check_ms Elapsed time (ms) of the latest check.\n");
    out.push_str("# TYPE depprobe_last_check_ms gauge\n");
    for report in latest {
        let _ = writeln!(
            out,
            "depprobe_last_check_ms{{probe=\"{}\"}} {}",
            report.name, report.elapsed_ms
        );
    }
    out.push('\n');

    let families: [(&str, &str, fn(&WindowStats) -> u64); 4] = [
        ("depprobe_window_checks", "Checks in the current window.", |s| s.checks),
        (
            "depprobe_window_failures",
            "Checks in the current window that were not healthy.",
            |s| s.failures,
        ),
        (
            "depprobe_window_timeouts",
            "Checks in the current window that timed out.",
            |s| s.timeouts,
        ),
        (
            "depprobe_window_elapsed_ms_sum",
            "Sum of check durations (ms) in the current window.",
            |s| s.elapsed_ms_sum,
        ),
    ];
    for (name, help, value) in families {
        let _ = writeln!(out, "# HELP {name} {help}");
        let _ = writeln!(out, "# TYPE {name} gauge");
        for (probe, s) in stats {
            let _ = writeln!(out, "{name}{{probe=\"{probe}\"}} {}", value(s));
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::api::{router, test_support};

    async fn scrape(runner: Arc<Runner>) -> (StatusCode, String, String) {
        let resp = router(runner)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let content_type = resp.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .to_string();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn empty_runner_renders_headers_only() {
        let (status, content_type, body) = scrape(test_support::runner()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/plain"));
        assert!(body.contains("# TYPE depprobe_status gauge"));
        assert!(!body.contains("probe=\""));
    }

    #[tokio::test]
    async fn status_gauge_marks_only_the_current_status() {
        let runner = test_support::runner();
        runner.run_once().await;
        let (_, _, body) = scrape(runner).await;

        assert!(body.contains("depprobe_status{probe=\"up\",status=\"healthy\"} 1"));
        assert!(body.contains("depprobe_status{probe=\"up\",status=\"unhealthy\"} 0"));
        assert!(body.contains("depprobe_status{probe=\"down\",status=\"unhealthy\"} 1"));
        assert!(body.contains("depprobe_status{probe=\"down\",status=\"degraded\"} 0"));
    }

    #[tokio::test]
    async fn window_counters_follow_the_report_log() {
        let runner = test_support::runner();
        runner.run_once().await;
        runner.run_once().await;
        runner.run_once().await;
        let (_, _, body) = scrape(runner).await;

        assert!(body.contains("depprobe_window_checks{probe=\"down\"} 3"));
        assert!(body.contains("depprobe_window_failures{probe=\"down\"} 3"));
        assert!(body.contains("depprobe_window_failures{probe=\"up\"} 0"));
        assert!(body.contains("depprobe_window_timeouts{probe=\"up\"} 0"));
    }
}
