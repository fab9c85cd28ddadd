//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Client read / upstream connect:
//!     → timeouts.rs (enforce optional deadline)
//!     → On expiry: TimedOut error, mapped by the handler to 400 or 500
//! ```
//!
//! # Design Decisions
//! - No retries: a GET is forwarded at most once per client connection
//! - The relay loop itself is not bounded; it ends on EOF or socket error

pub mod timeouts;
