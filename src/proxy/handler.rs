//! Per-connection request pipeline.
//!
//! # States
//! ```text
//! Received → Parsed → HostResolved → Filtered → Forwarding → Replied → Closed
//!     │         │           │            │           │
//!     └─────────┴───────────┴────────────┴───────────┴──→ ErrorReady → Replied → Closed
//! ```
//!
//! # Design Decisions
//! - Exactly one read from the client; nothing is re-read or pipelined
//! - The first failure wins: framing, method, request-line shape, version,
//!   Host, resolution, filter, upstream
//! - Every path converges on one reply step followed by closing the client
//! - Failures never escape the handler; they become error pages

use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::filter::{AccessDecision, RuleSet};
use crate::http::parse_request;
use crate::net::upstream::is_disconnect;
use crate::net::{ClientSession, RelayStats, ResolvedTarget, Resolver, UpstreamForwarder};
use crate::observability::metrics;
use crate::resilience::timeouts::{from_secs, with_timeout};

/// Position in the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Parsed,
    HostResolved,
    Filtered,
    Forwarding,
    ErrorReady,
    Replied,
    Closed,
}

/// An error together with the stage that produced it.
#[derive(Debug)]
pub struct Failure {
    pub stage: Stage,
    pub error: ProxyError,
}

impl Failure {
    fn at(stage: Stage, error: ProxyError) -> Self {
        Self { stage, error }
    }
}

/// How a handled connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The origin's response was relayed to the client.
    Relayed(RelayStats),
    /// A synthesized error page with this status was sent.
    Rejected(u16),
    /// The client socket failed before a request was read; nothing was sent.
    Dropped,
}

/// Runs the full pipeline for one accepted client connection.
pub struct RequestHandler {
    resolver: Arc<dyn Resolver>,
    forwarder: UpstreamForwarder,
    max_request_bytes: usize,
    read_timeout: Option<Duration>,
    upstream_port: u16,
}

impl RequestHandler {
    pub fn new(config: &ProxyConfig, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            resolver,
            forwarder: UpstreamForwarder::new(
                from_secs(config.timeouts.connect_secs),
                config.upstream.relay_buffer_bytes,
            ),
            max_request_bytes: config.limits.max_request_bytes,
            read_timeout: from_secs(config.timeouts.client_read_secs),
            upstream_port: config.upstream.port,
        }
    }

    /// Handle one connection from first read to close.
    pub async fn handle<S>(&self, session: ClientSession<S>, rules: Arc<RuleSet>) -> Outcome
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let span = tracing::info_span!(
            "connection",
            connection_id = %session.id,
            peer_addr = %session.peer,
        );
        self.run(session, rules).instrument(span).await
    }

    async fn run<S>(&self, mut session: ClientSession<S>, rules: Arc<RuleSet>) -> Outcome
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let start = Instant::now();
        metrics::connection_opened();

        let client = session.stream();
        let mut buf = vec![0u8; self.max_request_bytes + 1];

        let read = with_timeout(self.read_timeout, client.read(&mut buf)).await;
        let result = match read {
            Ok(n) => {
                buf.truncate(n);
                self.process(&buf, client, &rules).await
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Err(Failure::at(
                Stage::Received,
                ProxyError::BadRequest("timed out waiting for request".into()),
            )),
            Err(e) => {
                tracing::debug!(error = %e, "Client read failed");
                session.close().await;
                metrics::connection_closed();
                return Outcome::Dropped;
            }
        };

        let outcome = match result {
            Ok(stats) => {
                metrics::record_relayed(stats.bytes);
                tracing::info!(bytes = stats.bytes, aborted = stats.aborted, "Relayed origin response");
                Outcome::Relayed(stats)
            }
            Err(failure) => {
                let status = failure.error.status_code();
                if status >= 500 {
                    tracing::warn!(stage = ?failure.stage, status, error = %failure.error, "Request failed");
                } else {
                    tracing::info!(stage = ?failure.stage, status, error = %failure.error, "Request rejected");
                }
                tracing::trace!(stage = ?Stage::ErrorReady, "Stage");

                if let Err(e) = client.write_all(&failure.error.to_response()).await {
                    if is_disconnect(&e) {
                        tracing::debug!(error = %e, "Client went away before error reply");
                    } else {
                        tracing::warn!(error = %e, "Failed to write error reply");
                    }
                }
                Outcome::Rejected(status)
            }
        };
        tracing::trace!(stage = ?Stage::Replied, "Stage");

        metrics::record_request(
            match outcome {
                Outcome::Rejected(status) => status,
                _ => 200,
            },
            start,
        );
        session.close().await;
        metrics::connection_closed();
        tracing::trace!(stage = ?Stage::Closed, "Stage");
        outcome
    }

    /// Received → Parsed → HostResolved → Filtered → Forwarding.
    async fn process<W>(&self, buf: &[u8], client: &mut W, rules: &RuleSet) -> Result<RelayStats, Failure>
    where
        W: AsyncWrite + Unpin + Send,
    {
        if buf.is_empty() {
            return Err(Failure::at(
                Stage::Received,
                ProxyError::BadRequest("connection closed before a request was sent".into()),
            ));
        }
        if buf.len() > self.max_request_bytes {
            return Err(Failure::at(
                Stage::Received,
                ProxyError::BadRequest(format!("request exceeds {} bytes", self.max_request_bytes)),
            ));
        }

        let request = parse_request(buf).map_err(|e| Failure::at(Stage::Received, e))?;
        tracing::debug!(
            stage = ?Stage::Parsed,
            host = %request.host,
            target = %request.target,
            "Request parsed"
        );

        let addr = self.resolve(&request.host).await?;
        let target = ResolvedTarget {
            host: request.host.clone(),
            addr,
            port: self.upstream_port,
            path: request.path.clone(),
        };
        tracing::trace!(stage = ?Stage::HostResolved, addr = %addr, "Stage");

        if rules.decide(&target.host, addr) == AccessDecision::Blocked {
            metrics::record_blocked();
            tracing::info!(host = %target.host, addr = %addr, "Blocked by filter");
            return Err(Failure::at(Stage::Filtered, ProxyError::Forbidden(target.host)));
        }
        tracing::trace!(stage = ?Stage::Filtered, "Stage");

        let bytes = request.into_upstream_bytes();
        tracing::trace!(stage = ?Stage::Forwarding, upstream = %target.socket_addr(), "Stage");
        self.forwarder
            .forward(&target, &bytes, client)
            .await
            .map_err(|e| Failure::at(Stage::Forwarding, e))
    }

    async fn resolve(&self, host: &str) -> Result<Ipv4Addr, Failure> {
        self.resolver.lookup(host).await.map_err(|source| {
            Failure::at(
                Stage::HostResolved,
                ProxyError::ResolutionFailed {
                    host: host.to_string(),
                    source,
                },
            )
        })
    }
}
