//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept)
//!     → connection.rs (ClientSession: id, peer, owned stream)
//!     → Hand off to proxy::handler
//!
//! Allowed request:
//!     → resolver.rs (host → first IPv4 address)
//!     → upstream.rs (connect, write request, relay response)
//! ```
//!
//! # Design Decisions
//! - Each client connection carries exactly one request
//! - Upstream sockets are never pooled or reused

pub mod connection;
pub mod listener;
pub mod resolver;
pub mod upstream;

pub use connection::{ClientSession, ConnectionId};
pub use listener::{Listener, ListenerError};
pub use resolver::{Resolver, SystemResolver};
pub use upstream::{RelayStats, ResolvedTarget, UpstreamForwarder};
