use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use depprobe::{
    api,
    config::{LogFormat, RunnerConfig},
    history::ReportLog,
    registry::Registry,
    scheduler::Runner,
    Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // When invoked as a Docker HEALTHCHECK, hit /healthz and exit immediately.
    if std::env::args().nth(1).as_deref() == Some("--healthcheck") {
        return healthcheck().await;
    }

    let config_path = std::env::var("DEPPROBE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/depprobe/config.toml"));

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    init_tracing(&config.runner);

    info!(
        port = config.runner.port,
        probes = config.probes.len(),
        interval_secs = config.runner.interval_secs,
        "depprobe starting"
    );

    let registry = Registry::from_config(&config.probes)?;
    let reports = Arc::new(ReportLog::new(config.runner.history_capacity));
    let runner = Arc::new(Runner::new(registry, reports, config.runner.interval()));

    let poller = tokio::spawn(Arc::clone(&runner).poll());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.runner.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "runner API listening");

    let trace_layer = tower_http::trace::TraceLayer::new_for_http()
        .make_span_with(tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
        .on_response(tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO));
    let app = api::router(Arc::clone(&runner)).layer(trace_layer);

    let shutdown = runner.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            shutdown.cancel();
        })
        .await
        .context("runner API server error")?;

    poller.await.context("probe scheduler panicked")?;
    Ok(())
}

/// `RUST_LOG` wins over `log_level` from the config file.
fn init_tracing(runner: &RunnerConfig) {
    let fallback = runner
        .log_level
        .clone()
        .unwrap_or_else(|| "depprobe=info,tower_http=warn".into());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into());

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match runner.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Lightweight healthcheck: GET /healthz and exit 0 on 200, 1 otherwise.
/// Invoked via `depprobe --healthcheck` from Docker HEALTHCHECK.
async fn healthcheck() -> anyhow::Result<()> {
    let port = std::env::var("DEPPROBE_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(8080);

    let url = format!("http://127.0.0.1:{port}/healthz");
    let resp = reqwest::get(&url).await?;

    if resp.status().is_success() {
        std::process::exit(0);
    } else {
        std::process::exit(1);
    }
}
