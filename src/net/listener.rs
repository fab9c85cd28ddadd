//! Client-facing TCP listener.
//!
//! # Responsibilities
//! - Bind the configured address
//! - Accept client connections one at a time for the accept loop
//! - Report accept failures without ending the loop

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ListenerConfig;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("bind address {address:?} is not host:port")]
    BadAddress {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("cannot bind {0}: {1}")]
    Bind(SocketAddr, #[source] io::Error),
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),
}

/// The proxy's listening socket.
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr = config
            .bind_address
            .parse::<SocketAddr>()
            .map_err(|source| ListenerError::BadAddress {
                address: config.bind_address.clone(),
                source,
            })?;

        let inner = TcpListener::bind(addr)
            .await
            .map_err(|e| ListenerError::Bind(addr, e))?;
        if let Ok(local) = inner.local_addr() {
            tracing::info!(address = %local, "Listening for proxy clients");
        }

        Ok(Self { inner })
    }

    /// Next client connection, with Nagle disabled.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, peer) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer_addr = %peer, error = %e, "Could not set TCP_NODELAY");
        }

        tracing::debug!(peer_addr = %peer, "Client accepted");
        Ok((stream, peer))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}
