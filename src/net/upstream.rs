//! Upstream forwarding.
//!
//! # Responsibilities
//! - Open one TCP connection to the resolved origin
//! - Write the normalized request once
//! - Relay the origin's bytes to the client verbatim until EOF
//!
//! # Design Decisions
//! - One exchange per connection; the upstream socket never outlives `forward`
//! - Errors after the first relayed byte are logged, not surfaced: the client
//!   has already started receiving the origin's response
//! - No retries

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::ProxyError;
use crate::resilience::timeouts::with_timeout;

/// Where a request goes after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub host: String,
    pub addr: Ipv4Addr,
    pub port: u16,
    pub path: String,
}

impl ResolvedTarget {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.addr, self.port))
    }
}

/// Outcome of a completed relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes copied from origin to client.
    pub bytes: u64,
    /// True when the loop ended on a socket error rather than EOF.
    pub aborted: bool,
}

/// Relays a single request/response exchange with the origin.
#[derive(Debug, Clone)]
pub struct UpstreamForwarder {
    connect_timeout: Option<Duration>,
    buffer_size: usize,
}

impl UpstreamForwarder {
    pub fn new(connect_timeout: Option<Duration>, buffer_size: usize) -> Self {
        Self {
            connect_timeout,
            buffer_size: buffer_size.max(1),
        }
    }

    /// Send `request` to `target` and copy the response into `client`.
    pub async fn forward<W>(
        &self,
        target: &ResolvedTarget,
        request: &[u8],
        client: &mut W,
    ) -> Result<RelayStats, ProxyError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let addr = target.socket_addr();
        let mut upstream = with_timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|source| ProxyError::UpstreamConnectFailed { addr, source })?;
        if let Err(e) = upstream.set_nodelay(true) {
            tracing::debug!(upstream = %addr, error = %e, "Could not set TCP_NODELAY");
        }

        tracing::debug!(upstream = %addr, host = %target.host, path = %target.path, "Upstream connected");

        upstream
            .write_all(request)
            .await
            .map_err(ProxyError::UpstreamIoFailed)?;

        let mut buf = vec![0u8; self.buffer_size];
        let mut stats = RelayStats::default();

        loop {
            let n = match upstream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if stats.bytes == 0 => return Err(ProxyError::UpstreamIoFailed(e)),
                Err(e) => {
                    tracing::warn!(upstream = %addr, error = %e, relayed = stats.bytes, "Upstream read failed mid-relay");
                    stats.aborted = true;
                    break;
                }
            };

            if let Err(e) = client.write_all(&buf[..n]).await {
                tracing::warn!(upstream = %addr, error = %e, relayed = stats.bytes, "Client write failed mid-relay");
                stats.aborted = true;
                break;
            }
            stats.bytes += n as u64;
        }

        if let Err(e) = client.flush().await {
            if !stats.aborted {
                tracing::debug!(error = %e, "Client flush failed");
                stats.aborted = true;
            }
        }

        Ok(stats)
    }
}

/// True for errors that just mean the peer went away.
pub fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn origin(response: &'static [u8]) -> (SocketAddr, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = vec![0u8; 4096];
            let n = socket.read(&mut received).await.unwrap();
            received.truncate(n);
            socket.write_all(response).await.unwrap();
            received
        });
        (addr, handle)
    }

    fn target(addr: SocketAddr) -> ResolvedTarget {
        ResolvedTarget {
            host: "origin.test".into(),
            addr: Ipv4Addr::LOCALHOST,
            port: addr.port(),
            path: "/".into(),
        }
    }

    #[tokio::test]
    async fn relays_response_verbatim() {
        let response = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";
        let (addr, origin) = origin(response).await;
        let request = b"GET / HTTP/1.1\r\nHost: origin.test\r\nConnection: close\r\n\r\n";

        let forwarder = UpstreamForwarder::new(None, 4);
        let mut client = Vec::new();
        let stats = forwarder.forward(&target(addr), request, &mut client).await.unwrap();

        assert_eq!(client, response.to_vec());
        assert_eq!(stats, RelayStats { bytes: response.len() as u64, aborted: false });
        assert_eq!(origin.await.unwrap(), request.to_vec());
    }

    /// Origin that reads the request, sends `prefix`, waits for `go`, then resets.
    async fn resetting_origin(
        prefix: &'static [u8],
        go: tokio::sync::oneshot::Receiver<()>,
    ) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = vec![0u8; 4096];
            let _ = socket.read(&mut received).await.unwrap();
            if !prefix.is_empty() {
                socket.write_all(prefix).await.unwrap();
            }
            let _ = go.await;
            #[allow(deprecated)]
            socket.set_linger(Some(Duration::ZERO)).unwrap();
            drop(socket);
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn reset_after_bytes_keeps_partial_relay() {
        let prefix = b"HTTP/1.1 200 OK\r\n";
        let (go_tx, go_rx) = tokio::sync::oneshot::channel();
        let (addr, origin) = resetting_origin(prefix, go_rx).await;

        let (mut client, mut peer) = tokio::io::duplex(4096);
        let forwarder = UpstreamForwarder::new(None, 1024);

        let tgt = target(addr);
        let relay = forwarder.forward(&tgt, b"GET / HTTP/1.1\r\n\r\n", &mut client);
        let watch = async move {
            let mut seen = vec![0u8; prefix.len()];
            peer.read_exact(&mut seen).await.unwrap();
            go_tx.send(()).unwrap();
            seen
        };
        let (stats, seen) = tokio::join!(relay, watch);

        assert_eq!(seen, prefix.to_vec());
        assert_eq!(stats.unwrap(), RelayStats { bytes: prefix.len() as u64, aborted: true });
        origin.await.unwrap();
    }

    #[tokio::test]
    async fn reset_before_any_bytes_is_500() {
        let (go_tx, go_rx) = tokio::sync::oneshot::channel();
        go_tx.send(()).unwrap();
        let (addr, origin) = resetting_origin(b"", go_rx).await;

        let forwarder = UpstreamForwarder::new(None, 1024);
        let mut client = Vec::new();
        let err = forwarder
            .forward(&target(addr), b"GET / HTTP/1.1\r\n\r\n", &mut client)
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::UpstreamIoFailed(_)));
        assert_eq!(err.status_code(), 500);
        assert!(client.is_empty());
        origin.await.unwrap();
    }

    #[tokio::test]
    async fn client_gone_aborts_relay() {
        let response = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";
        let (addr, origin) = origin(response).await;

        let (mut client, peer) = tokio::io::duplex(64);
        drop(peer);

        let forwarder = UpstreamForwarder::new(None, 1024);
        let stats = forwarder
            .forward(&target(addr), b"GET / HTTP/1.1\r\n\r\n", &mut client)
            .await
            .unwrap();

        assert_eq!(stats, RelayStats { bytes: 0, aborted: true });
        origin.await.unwrap();
    }

    #[tokio::test]
    async fn connect_failure_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let forwarder = UpstreamForwarder::new(Some(Duration::from_secs(2)), 1024);
        let mut client = Vec::new();
        let err = forwarder.forward(&target(addr), b"GET / HTTP/1.1\r\n\r\n", &mut client).await.unwrap_err();

        assert!(matches!(err, ProxyError::UpstreamConnectFailed { .. }));
        assert_eq!(err.status_code(), 500);
        assert!(client.is_empty());
    }
}
