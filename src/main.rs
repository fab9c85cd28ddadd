//! Forward HTTP Proxy (v1)
//!
//! A forward proxy for plain HTTP/1.x `GET` requests, built on Tokio.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────────┐
//!                          │                  FORWARD PROXY                   │
//!                          │                                                  │
//!     Client Request       │  ┌──────────┐   ┌────────────┐   ┌───────────┐   │
//!     ─────────────────────┼─▶│   net    │──▶│   proxy    │──▶│   http    │   │
//!                          │  │ listener │   │ WorkerPool │   │  request  │   │
//!                          │  └──────────┘   └────────────┘   └─────┬─────┘   │
//!                          │                                        │         │
//!                          │                                        ▼         │
//!                          │                 ┌────────────┐   ┌───────────┐   │
//!                          │                 │   filter   │◀──│ resolver  │   │
//!                          │                 │  RuleSet   │   │  (IPv4)   │   │
//!                          │                 └─────┬──────┘   └───────────┘   │
//!                          │                       │                          │
//!                          │                       ▼                          │
//!     Client Response      │  ┌──────────┐   ┌────────────┐                   │
//!     ◀────────────────────┼──│  relay   │◀──│  upstream  │◀──────────────────┼──── Origin
//!                          │  │ / error  │   │ forwarder  │                   │     Server
//!                          │  └──────────┘   └────────────┘                   │
//!                          │                                                  │
//!                          │  config · observability · lifecycle · resilience │
//!                          └──────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use forward_proxy::config::{load_config, validate_config, ProxyConfig};
use forward_proxy::filter::{load_rules, RuleSet, RuleStore, RuleWatcher};
use forward_proxy::lifecycle::signals::shutdown_on_ctrl_c;
use forward_proxy::lifecycle::Shutdown;
use forward_proxy::net::{Listener, SystemResolver};
use forward_proxy::observability::{logging, metrics};
use forward_proxy::proxy::{ProxyServer, RequestHandler, WorkerPool};

#[derive(Parser, Debug)]
#[command(name = "forward-proxy")]
#[command(about = "Forward HTTP proxy with host and subnet filtering", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level, overrides the configured one
    #[arg(long)]
    log_level: Option<String>,

    /// Port to listen on
    port: Option<u16>,

    /// Number of requests handled concurrently
    pool_size: Option<usize>,

    /// Stop accepting after this many connections
    max_requests: Option<usize>,

    /// Filter file, one host, IPv4 address or CIDR subnet per line
    filter: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(port) = self.port {
            config.listener.bind_address = match config.listener.bind_address.parse::<SocketAddr>() {
                Ok(mut addr) => {
                    addr.set_port(port);
                    addr.to_string()
                }
                Err(_) => format!("0.0.0.0:{}", port),
            };
        }
        if let Some(size) = self.pool_size {
            config.pool.size = size;
        }
        if let Some(max) = self.max_requests {
            config.listener.max_requests = Some(max);
        }
        if let Some(filter) = &self.filter {
            config.filter.path = Some(filter.display().to_string());
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);

    if let Err(errors) = validate_config(&config) {
        for e in &errors {
            eprintln!("config error: {}", e);
        }
        std::process::exit(1);
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!("forward-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        pool_size = config.pool.size,
        max_requests = ?config.listener.max_requests,
        filter = ?config.filter.path,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Filter rules, optionally reloaded when the file changes
    let rules = match &config.filter.path {
        Some(path) => load_rules(Path::new(path))?,
        None => RuleSet::default(),
    };
    tracing::info!(rules = rules.len(), "Filter rules loaded");
    let store = Arc::new(RuleStore::new(rules));

    let _watcher = match &config.filter.path {
        Some(path) if config.filter.watch => {
            match RuleWatcher::new(Path::new(path), store.clone()).run() {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(error = %e, "Filter watcher unavailable, rules will not reload");
                    None
                }
            }
        }
        _ => None,
    };

    let listener = Listener::bind(&config.listener).await?;
    let handler = RequestHandler::new(&config, Arc::new(SystemResolver));
    let server = ProxyServer::new(
        listener,
        handler,
        store,
        WorkerPool::new(config.pool.size),
        config.listener.max_requests,
    );

    let shutdown = Shutdown::new();
    let signal = shutdown.clone();
    tokio::spawn(async move { shutdown_on_ctrl_c(&signal).await });

    let served = server.run(shutdown.subscribe()).await;

    tracing::info!(served, "Shutdown complete");
    Ok(())
}
