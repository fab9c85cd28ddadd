//! Proxy accept loop.
//!
//! # Responsibilities
//! - Accept client connections until the request budget is spent or shutdown fires
//! - Take one rule snapshot per connection
//! - Hand every connection to the dispatcher without awaiting it
//! - Drain in-flight handlers before returning

use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::broadcast;

use crate::filter::RuleStore;
use crate::net::{ClientSession, Listener};
use crate::proxy::dispatch::Dispatch;
use crate::proxy::handler::RequestHandler;

/// Forward proxy server bound to a listener.
pub struct ProxyServer<D> {
    listener: Listener,
    handler: Arc<RequestHandler>,
    rules: Arc<RuleStore>,
    pool: D,
    max_requests: Option<usize>,
}

impl<D: Dispatch> ProxyServer<D> {
    pub fn new(
        listener: Listener,
        handler: RequestHandler,
        rules: Arc<RuleStore>,
        pool: D,
        max_requests: Option<usize>,
    ) -> Self {
        Self {
            listener,
            handler: Arc::new(handler),
            rules,
            pool,
            max_requests,
        }
    }

    /// Serve until `max_requests` connections were accepted or shutdown fires.
    ///
    /// Returns the number of connections accepted.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> usize {
        let mut accepted = 0usize;

        tracing::info!(max_requests = ?self.max_requests, "Proxy accepting connections");

        loop {
            if self.max_requests.is_some_and(|max| accepted >= max) {
                tracing::info!(accepted, "Request budget spent, no longer accepting");
                break;
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(accepted, "Shutdown requested, no longer accepting");
                    break;
                }
                result = self.listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            continue;
                        }
                    };
                    accepted += 1;

                    let session = ClientSession::new(stream, peer);
                    let rules = self.rules.snapshot();
                    let handler = self.handler.clone();

                    self.pool.submit(
                        async move {
                            handler.handle(session, rules).await;
                        }
                        .boxed(),
                    );
                }
            }
        }

        tracing::debug!("Draining in-flight requests");
        self.pool.drain().await;
        tracing::info!(accepted, "Proxy stopped");
        accepted
    }
}
