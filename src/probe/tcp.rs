//! A [`Connection`] over a persistent TCP stream.
//!
//! This is the connection-lifecycle probe for services that speak a
//! connection-oriented protocol the crate has no client for: the probe keeps a
//! socket open, notices when the peer hangs up, and reconnects.
//!
//! The "channel" opened for the liveness test is a readiness check on the
//! socket: it must be writable and the peer must not have sent EOF. Anything
//! the peer sends (a greeting banner, keepalives) is read and discarded so it
//! cannot mask a later hangup.

use std::{
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Context;
use async_trait::async_trait;
use tokio::net::TcpStream;

use super::connection::{Channel, Connection, ConnectionFactory};

/// One long-lived TCP connection.
pub struct TcpConnection {
    peer: String,
    stream: Mutex<Option<Arc<TcpStream>>>,
}

impl TcpConnection {
    pub fn new(peer: impl Into<String>, stream: TcpStream) -> Self {
        Self {
            peer: peer.into(),
            stream: Mutex::new(Some(Arc::new(stream))),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    fn stream(&self) -> Option<Arc<TcpStream>> {
        self.stream.lock().ok().and_then(|slot| slot.clone())
    }
}

/// Non-blocking check that the peer has not hung up.
///
/// Drains whatever is buffered; EOF is only visible once unread data is gone.
fn peer_open(stream: &TcpStream) -> bool {
    let mut scratch = [0u8; 512];
    loop {
        match stream.try_read(&mut scratch) {
            Ok(0) => return false,
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return true,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return false,
        }
    }
}

#[async_trait]
impl Connection for TcpConnection {
    fn is_open(&self) -> bool {
        self.stream().is_some_and(|s| peer_open(&s))
    }

    async fn open_channel(&self) -> anyhow::Result<Box<dyn Channel>> {
        let stream = self
            .stream()
            .with_context(|| format!("connection to {} is closed", self.peer))?;
        stream
            .writable()
            .await
            .with_context(|| format!("waiting for {} to become writable", self.peer))?;
        anyhow::ensure!(peer_open(&stream), "{} closed the connection", self.peer);
        Ok(Box::new(TcpChannel { _stream: stream }))
    }

    async fn close(&self) -> anyhow::Result<()> {
        // Dropping the last handle closes the socket.
        if let Ok(mut slot) = self.stream.lock() {
            slot.take();
        }
        Ok(())
    }
}

struct TcpChannel {
    _stream: Arc<TcpStream>,
}

#[async_trait]
impl Channel for TcpChannel {
    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Opens [`TcpConnection`]s to a fixed address.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl ConnectionFactory for TcpConnector {
    async fn connect(&self, name: &str) -> anyhow::Result<Arc<dyn Connection>> {
        tracing::debug!(address = %self.address, connection = name, "opening tcp connection");
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))
            .and_then(|r| r)
            .with_context(|| format!("connecting to {}", self.address))?;
        Ok(Arc::new(TcpConnection::new(self.address.clone(), stream)))
    }
}
