//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use forward_proxy::config::ProxyConfig;
use forward_proxy::filter::{RuleSet, RuleStore};
use forward_proxy::lifecycle::Shutdown;
use forward_proxy::net::{Listener, Resolver};
use forward_proxy::proxy::{ProxyServer, RequestHandler, WorkerPool};

pub const ORIGIN_BODY: &str = "hello from origin";

/// The exact bytes every mock origin answers with.
pub fn origin_response() -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        ORIGIN_BODY.len(),
        ORIGIN_BODY
    )
}

/// Start a mock origin on an ephemeral port.
///
/// Every request it receives (up to the blank line) is sent on the returned
/// channel, then it answers with [`origin_response`] and closes.
pub async fn start_origin() -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            request.extend_from_slice(&buf[..n]);
                            if request.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                    }
                }
                let _ = tx.send(request);
                let _ = socket.write_all(origin_response().as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, rx)
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Resolves a fixed set of names; everything else is unknown.
pub struct StaticResolver(HashMap<String, Ipv4Addr>);

impl StaticResolver {
    /// Every name resolves to loopback.
    pub fn loopback(names: &[&str]) -> Self {
        Self(
            names
                .iter()
                .map(|name| (name.to_string(), Ipv4Addr::LOCALHOST))
                .collect(),
        )
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn lookup(&self, host: &str) -> io::Result<Ipv4Addr> {
        self.0
            .get(host)
            .copied()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("unknown host {}", host)))
    }
}

/// Proxy config pointed at a test origin port.
pub fn test_config(upstream_port: u16) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.port = upstream_port;
    config.timeouts.client_read_secs = 5;
    config.timeouts.connect_secs = 2;
    config
}

/// A running proxy on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub rules: Arc<RuleStore>,
    pub shutdown: Shutdown,
    pub task: JoinHandle<usize>,
}

pub async fn start_proxy(config: ProxyConfig, resolver: StaticResolver, rules: &[&str]) -> TestProxy {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let rules = Arc::new(RuleStore::new(RuleSet::from_lines(rules.iter().copied())));
    let handler = RequestHandler::new(&config, Arc::new(resolver));
    let server = ProxyServer::new(
        listener,
        handler,
        rules.clone(),
        WorkerPool::new(config.pool.size),
        config.listener.max_requests,
    );

    let shutdown = Shutdown::new();
    let task = tokio::spawn(server.run(shutdown.subscribe()));

    TestProxy {
        addr,
        rules,
        shutdown,
        task,
    }
}

/// Send raw bytes as one write and collect everything until the proxy closes.
pub async fn send(proxy: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(request).await.unwrap();

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    String::from_utf8_lossy(&reply).into_owned()
}

/// Status code from the first line of a reply.
pub fn status_of(reply: &str) -> u16 {
    reply
        .split(' ')
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or(0)
}
