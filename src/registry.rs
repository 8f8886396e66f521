//! Registrations: a probe plus the settings its scheduler applies.
//!
//! A [`Registration`] names a probe and fixes the failure status, tags and
//! deadline used whenever it is checked. [`Registry`] holds them in
//! configuration order and looks them up by name.

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Context;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    config::{ProbeConfig, ProbeKind},
    history::ProbeReport,
    probe::{
        CheckContext, ConnectionProbe, HealthStatus, Probe, SignedHttpProbe, TcpConnector,
        DEFAULT_TIMEOUT,
    },
};

pub struct Registration {
    name: String,
    probe: Arc<dyn Probe>,
    failure_status: HealthStatus,
    tags: Vec<String>,
    timeout: Duration,
}

impl Registration {
    pub fn new(name: impl Into<String>, probe: Arc<dyn Probe>) -> Self {
        Self {
            name: name.into(),
            probe,
            failure_status: HealthStatus::Unhealthy,
            tags: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_failure_status(mut self, status: HealthStatus) -> Self {
        self.failure_status = status;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the probe described by a `[[probes]]` entry.
    ///
    /// Fails fast on missing secrets or invalid settings; nothing is deferred
    /// to the first check.
    pub fn from_config(cfg: &ProbeConfig) -> anyhow::Result<Self> {
        let probe: Arc<dyn Probe> = match &cfg.kind {
            ProbeKind::SignedHttp(settings) => Arc::new(SignedHttpProbe::new(settings.resolve()?)?),
            ProbeKind::TcpConnection(settings) => Arc::new(ConnectionProbe::from_factory(Arc::new(
                TcpConnector::new(&settings.address, settings.connect_timeout()),
            ))),
        };

        let mut registration = Self::new(cfg.name(), probe)
            .with_failure_status(cfg.failure_status)
            .with_tags(cfg.tags.clone());
        if let Some(timeout) = cfg.timeout() {
            registration = registration.with_timeout(timeout);
        }
        Ok(registration)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn context(&self, cancel: CancellationToken) -> CheckContext {
        CheckContext::new(&self.name)
            .with_failure_status(self.failure_status)
            .with_timeout(self.timeout)
            .with_cancel(cancel)
    }

    /// Check once and summarize the result.
    ///
    /// Results the probe did not time itself are stamped with the wall time of
    /// the call.
    pub async fn run(&self, cancel: CancellationToken) -> ProbeReport {
        let started = Instant::now();
        let mut result = self.probe.check(&self.context(cancel)).await;
        if result.elapsed().is_none() {
            result = result.with_elapsed(started.elapsed());
        }
        let report = ProbeReport::new(&self.name, &self.tags, &result);
        match result.cause() {
            Some(cause) => tracing::warn!(
                probe = %self.name,
                status = %report.status,
                elapsed_ms = report.elapsed_ms,
                error = %cause,
                "probe failed"
            ),
            None => tracing::info!(
                probe = %self.name,
                status = %report.status,
                elapsed_ms = report.elapsed_ms,
                "probe checked"
            ),
        }
        report
    }
}

/// Registrations in configuration order, indexed by name.
#[derive(Default)]
pub struct Registry {
    ordered: Vec<Arc<Registration>>,
    by_name: HashMap<String, Arc<Registration>>,
}

impl Registry {
    pub fn from_config(probes: &[ProbeConfig]) -> anyhow::Result<Self> {
        let mut registry = Self::default();
        for cfg in probes {
            let registration = Registration::from_config(cfg)
                .with_context(|| format!("building probe `{}`", cfg.name()))?;
            registry.register(registration)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, registration: Registration) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.by_name.contains_key(registration.name()),
            "probe `{}` is already registered",
            registration.name()
        );
        let registration = Arc::new(registration);
        self.by_name
            .insert(registration.name().to_string(), Arc::clone(&registration));
        self.ordered.push(registration);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Registration>> {
        self.by_name.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Registration>> {
        self.ordered.iter()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}
