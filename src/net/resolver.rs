//! Host name resolution.

use std::io;
use std::net::{IpAddr, Ipv4Addr};

use async_trait::async_trait;

/// Resolves a host name to the first IPv4 address it maps to.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn lookup(&self, host: &str) -> io::Result<Ipv4Addr>;
}

/// Resolver backed by the operating system (`getaddrinfo` via Tokio).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup(&self, host: &str) -> io::Result<Ipv4Addr> {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Ok(ip);
        }

        tokio::net::lookup_host((host, 0))
            .await?
            .find_map(|addr| match addr.ip() {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no IPv4 address for {host}"))
            })
    }
}
