//! Stateful connection-lifecycle probe.
//!
//! The probe keeps one long-lived connection between checks. On every check:
//!
//! 1. an open connection is reused;
//! 2. a stale one (its `is_open` flag reports closed) is closed without
//!    waiting and dropped, then a replacement is created;
//! 3. a lightweight channel is opened on the connection and released straight
//!    away. Success means healthy.
//!
//! Replacement runs under a per-probe async mutex, so overlapping checks never
//! leave two "current" connections behind: the second caller waits and then
//! reuses what the first one created.
//!
//! A probe built from a bare connection has nothing to replace it with. It
//! tests that connection as-is on every check, stale or not.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tokio::sync::Mutex;

use super::{CheckContext, Probe, ProbeResult};
use crate::{
    deadline,
    error::{ConfigError, ProbeError},
};

/// Name handed to [`ConnectionFactory::connect`] so the server side can tell
/// probe connections apart.
pub const CONNECTION_NAME: &str = "depprobe health check";

/// A transport connection the probe can hold on to.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Liveness flag. `false` marks the connection as stale.
    fn is_open(&self) -> bool;

    /// Open a lightweight logical channel or session on this connection.
    async fn open_channel(&self) -> anyhow::Result<Box<dyn Channel>>;

    /// Tear the connection down. The probe never waits for this to finish.
    async fn close(&self) -> anyhow::Result<()>;
}

/// A channel opened by [`Connection::open_channel`].
///
/// `close` is the graceful release. Implementations must also release the
/// channel when dropped, since a timed-out check drops it mid-flight.
#[async_trait]
pub trait Channel: Send {
    async fn close(self: Box<Self>) -> anyhow::Result<()>;
}

/// Builds connections from parameters owned by an external client library.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self, name: &str) -> anyhow::Result<Arc<dyn Connection>>;
}

/// Zero-argument function returning a ready connection.
pub type ConnectFn =
    Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<Arc<dyn Connection>>> + Send + Sync>;

enum Connector {
    Fn(ConnectFn),
    Factory(Arc<dyn ConnectionFactory>),
}

impl Connector {
    async fn connect(&self) -> anyhow::Result<Arc<dyn Connection>> {
        match self {
            Self::Fn(f) => f().await,
            Self::Factory(factory) => factory.connect(CONNECTION_NAME).await,
        }
    }
}

enum Source {
    /// No way to reconnect; the handle is tested as-is.
    Fixed(Arc<dyn Connection>),
    Managed {
        connector: Connector,
        current: Mutex<Option<Arc<dyn Connection>>>,
    },
}

/// Probe that keeps a connection alive across checks and verifies it by
/// opening a channel.
pub struct ConnectionProbe {
    source: Arc<Source>,
}

impl ConnectionProbe {
    pub fn builder() -> ConnectionProbeBuilder {
        ConnectionProbeBuilder::default()
    }

    /// Probe a connection that can never be replaced.
    pub fn from_connection(connection: Arc<dyn Connection>) -> Self {
        Self {
            source: Arc::new(Source::Fixed(connection)),
        }
    }

    pub fn from_fn(connect: ConnectFn) -> Self {
        Self::managed(Connector::Fn(connect), None)
    }

    pub fn from_factory(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self::managed(Connector::Factory(factory), None)
    }

    fn managed(connector: Connector, initial: Option<Arc<dyn Connection>>) -> Self {
        Self {
            source: Arc::new(Source::Managed {
                connector,
                current: Mutex::new(initial),
            }),
        }
    }

    /// Whether a stale connection can be replaced.
    pub fn can_reconnect(&self) -> bool {
        matches!(*self.source, Source::Managed { .. })
    }
}

impl Source {
    async fn check_once(&self, probe: &str) -> Result<(), ProbeError> {
        match self {
            Self::Fixed(connection) => {
                let open = connection.is_open();
                liveness(connection.as_ref()).await.map_err(|e| {
                    if open {
                        e.into()
                    } else {
                        e.context("connection is closed and no factory is configured to replace it")
                            .into()
                    }
                })
            }
            Self::Managed { connector, current } => {
                let connection = acquire(connector, current, probe).await?;
                liveness(connection.as_ref()).await.map_err(Into::into)
            }
        }
    }
}

/// Return the current connection, replacing it first if it went stale.
async fn acquire(
    connector: &Connector,
    current: &Mutex<Option<Arc<dyn Connection>>>,
    probe: &str,
) -> anyhow::Result<Arc<dyn Connection>> {
    let mut slot = current.lock().await;

    if let Some(connection) = slot.as_ref().filter(|c| c.is_open()) {
        return Ok(Arc::clone(connection));
    }

    if let Some(stale) = slot.take() {
        tracing::warn!(probe, "connection is stale; closing and reconnecting");
        close_without_waiting(stale.as_ref(), probe).await;
    }

    let fresh = connector.connect().await.context("creating connection")?;
    tracing::debug!(probe, "connection established");
    *slot = Some(Arc::clone(&fresh));
    Ok(fresh)
}

/// Poll `close` once and move on.
async fn close_without_waiting(connection: &dyn Connection, probe: &str) {
    match tokio::time::timeout(Duration::ZERO, connection.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(probe, error = %e, "closing stale connection failed"),
        Err(_) => tracing::debug!(probe, "stale connection did not close immediately"),
    }
}

async fn liveness(connection: &dyn Connection) -> anyhow::Result<()> {
    let channel = connection
        .open_channel()
        .await
        .context("opening liveness channel")?;
    channel.close().await.context("releasing liveness channel")
}

#[async_trait]
impl Probe for ConnectionProbe {
    #[tracing::instrument(skip_all, fields(probe = %ctx.name))]
    async fn check(&self, ctx: &CheckContext) -> ProbeResult {
        let started = Instant::now();
        let source = Arc::clone(&self.source);
        let name = ctx.name.clone();

        let outcome = deadline::race_with_cancel(ctx.timeout, &ctx.cancel, async move {
            source.check_once(&name).await
        })
        .await;

        let result = match outcome {
            Ok(()) => ProbeResult::healthy(),
            Err(e) => ctx.fail(e),
        };
        result.with_elapsed(started.elapsed())
    }
}

/// Builder for [`ConnectionProbe`].
///
/// A connect function takes precedence over a factory when both are set. A
/// connection supplied alongside either becomes the initial current
/// connection; supplied alone, it is tested as-is forever.
#[derive(Default)]
pub struct ConnectionProbeBuilder {
    connection: Option<Arc<dyn Connection>>,
    connect: Option<ConnectFn>,
    factory: Option<Arc<dyn ConnectionFactory>>,
}

impl ConnectionProbeBuilder {
    pub fn connection(mut self, connection: Arc<dyn Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn connect_fn(mut self, connect: ConnectFn) -> Self {
        self.connect = Some(connect);
        self
    }

    pub fn factory(mut self, factory: Arc<dyn ConnectionFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn build(self) -> Result<ConnectionProbe, ConfigError> {
        let connector = match (self.connect, self.factory) {
            (Some(f), _) => Some(Connector::Fn(f)),
            (None, Some(factory)) => Some(Connector::Factory(factory)),
            (None, None) => None,
        };
        match (connector, self.connection) {
            (Some(connector), initial) => Ok(ConnectionProbe::managed(connector, initial)),
            (None, Some(connection)) => Ok(ConnectionProbe::from_connection(connection)),
            (None, None) => Err(ConfigError::NoConnectionSource),
        }
    }
}
