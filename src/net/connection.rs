//! Client session identity and ownership.
//!
//! # Responsibilities
//! - Tag each accepted client with a process-unique ID for log correlation
//! - Own the accepted client stream for exactly one handler invocation
//! - Close the stream on every exit path

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Sequence number of an accepted client, shown as `client-N` in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Next ID in accept order.
    pub fn next() -> Self {
        Self(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// An accepted client connection and its peer address.
#[derive(Debug)]
pub struct ClientSession<S> {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    stream: S,
}

impl<S> ClientSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: SocketAddr) -> Self {
        Self {
            id: ConnectionId::next(),
            peer,
            stream,
        }
    }

    pub fn stream(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Shut down the write side and drop the stream.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            tracing::trace!(connection_id = %self.id, error = %e, "Client shutdown failed");
        }
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
