//! Proxy core.
//!
//! # Data Flow
//! ```text
//! Listener::accept
//!     → ProxyServer (snapshot rules, wrap in ClientSession)
//!     → WorkerPool::submit
//!     → RequestHandler::handle
//!         read → parse → resolve → filter → forward
//!         any failure → error page
//!     → close client
//! ```

pub mod dispatch;
pub mod handler;
pub mod server;

pub use dispatch::{Dispatch, WorkerPool};
pub use handler::{Outcome, RequestHandler, Stage};
pub use server::ProxyServer;
