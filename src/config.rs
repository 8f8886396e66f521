//! Configuration for the depprobe runner.
//!
//! Config is loaded once at startup from a TOML file and validated before the
//! runner opens its port. Secrets never live in the file: signed-HTTP probes
//! name the environment variables holding their app key and secret.
//!
//! # Example
//! ```toml
//! [runner]
//! port = 8080
//! interval_secs = 10
//!
//! [[probes]]
//! name           = "im-api"
//! kind           = "signed_http"
//! app_key_env    = "IM_APP_KEY"
//! app_secret_env = "IM_APP_SECRET"
//!
//! [[probes]]
//! name    = "broker"
//! kind    = "tcp_connection"
//! address = "127.0.0.1:5672"
//! ```

use std::{collections::HashSet, path::Path, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    probe::{
        signed_http::{self, FormParams, MismatchStatus, SignedHttpConfig},
        HealthStatus,
    },
    signer::TimestampPrecision,
};

/// Top-level runner configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Probes to register, polled in the order listed.
    #[serde(default)]
    pub probes: Vec<ProbeConfig>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content).context("parsing config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.runner.interval_secs > 0, "runner.interval_secs must be positive");
        anyhow::ensure!(
            self.runner.history_capacity > 0,
            "runner.history_capacity must be positive"
        );

        let mut seen = HashSet::new();
        for probe in &self.probes {
            let name = probe.name();
            anyhow::ensure!(!name.is_empty(), "probe names must not be empty");
            anyhow::ensure!(seen.insert(name), "duplicate probe name `{}`", name);
            anyhow::ensure!(
                probe.timeout_ms != Some(0),
                "probe `{}` has timeout_ms = 0",
                name
            );

            match &probe.kind {
                ProbeKind::SignedHttp(s) => {
                    anyhow::ensure!(
                        !s.app_key_env.is_empty() && !s.app_secret_env.is_empty(),
                        "probe `{}` must set app_key_env and app_secret_env",
                        name
                    );
                    url::Url::parse(&s.base_url)
                        .with_context(|| format!("probe `{}` has an invalid base_url", name))?;
                }
                ProbeKind::TcpConnection(t) => {
                    anyhow::ensure!(!t.address.is_empty(), "probe `{}` has an empty address", name);
                }
            }
        }
        Ok(())
    }
}

/// Runner settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Port for the HTTP endpoints (default: 8080).
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Seconds between polls of every probe (default: 10).
    #[serde(default = "defaults::interval_secs")]
    pub interval_secs: u64,

    /// Number of recent reports kept in memory (default: 200).
    #[serde(default = "defaults::history_capacity")]
    pub history_capacity: usize,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level override (also controlled by `RUST_LOG` env var).
    #[serde(default)]
    pub log_level: Option<String>,
}

impl RunnerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            port: defaults::port(),
            interval_secs: defaults::interval_secs(),
            history_capacity: defaults::history_capacity(),
            log_format: LogFormat::default(),
            log_level: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// One `[[probes]]` entry: registration fields plus the probe kind.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Registration name; defaults to the kind's name.
    #[serde(default)]
    pub name: Option<String>,

    /// Status reported when a check fails with an error (default: unhealthy).
    #[serde(default)]
    pub failure_status: HealthStatus,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Per-check deadline in milliseconds (default: 10 000).
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(flatten)]
    pub kind: ProbeKind,
}

impl ProbeConfig {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.kind.default_name())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeKind {
    SignedHttp(SignedHttpSettings),
    TcpConnection(TcpSettings),
}

impl ProbeKind {
    pub fn default_name(&self) -> &'static str {
        match self {
            Self::SignedHttp(_) => "signed_http",
            Self::TcpConnection(_) => "connection",
        }
    }
}

/// `kind = "signed_http"`.
#[derive(Debug, Clone, Deserialize)]
pub struct SignedHttpSettings {
    #[serde(default = "signed_http::defaults::base_url")]
    pub base_url: String,

    #[serde(default = "signed_http::defaults::path")]
    pub path: String,

    /// Environment variable holding the app key (sent as `AppKey`).
    pub app_key_env: String,

    /// Environment variable holding the shared secret used for `CheckSum`.
    pub app_secret_env: String,

    /// Form parameters; empty values are dropped (default: `content = ""`).
    #[serde(default = "signed_http::defaults::params")]
    pub params: FormParams,

    /// `CurTime` digits: 13 (milliseconds, default) or 10 (seconds).
    #[serde(default)]
    pub time_precision: TimestampPrecision,

    #[serde(default = "signed_http::defaults::healthy_code")]
    pub healthy_code: String,

    #[serde(default = "signed_http::defaults::healthy_desc")]
    pub healthy_desc: String,

    /// Status for a well-formed reply that misses the markers (default: unhealthy).
    #[serde(default)]
    pub mismatch_status: MismatchStatus,
}

impl SignedHttpSettings {
    /// Resolve secrets from the environment into a probe config.
    pub fn resolve(&self) -> Result<SignedHttpConfig, ConfigError> {
        let app_key = env(&self.app_key_env)?;
        let app_secret = env(&self.app_secret_env)?;
        Ok(SignedHttpConfig {
            base_url: self.base_url.clone(),
            path: self.path.clone(),
            params: self.params.clone(),
            precision: self.time_precision,
            healthy_code: self.healthy_code.clone(),
            healthy_desc: self.healthy_desc.clone(),
            mismatch_status: self.mismatch_status,
            ..SignedHttpConfig::new(app_key, app_secret)
        })
    }
}

fn env(var: &str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnv(var.to_string()))
}

/// `kind = "tcp_connection"`.
#[derive(Debug, Clone, Deserialize)]
pub struct TcpSettings {
    /// `host:port` to hold a connection to.
    pub address: String,

    /// Connect timeout in milliseconds (default: 5 000).
    #[serde(default = "defaults::connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl TcpSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

mod defaults {
    pub fn port() -> u16 { 8080 }
    pub fn interval_secs() -> u64 { 10 }
    pub fn history_capacity() -> usize { 200 }
    pub fn connect_timeout_ms() -> u64 { 5_000 }
}
