//! Forward HTTP Proxy Library

pub mod config;
pub mod error;
pub mod filter;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use lifecycle::Shutdown;
pub use proxy::{ProxyServer, RequestHandler};
