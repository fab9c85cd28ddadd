//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap blocking socket operations (client read, upstream connect) with an optional deadline
//! - Report an elapsed deadline as `io::ErrorKind::TimedOut`
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A zero-second setting disables the deadline entirely

use std::future::Future;
use std::io;
use std::time::Duration;

/// Convert a seconds setting into an optional deadline (0 disables it).
pub fn from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Await `fut`, failing with `TimedOut` if `limit` elapses first.
pub async fn with_timeout<T, F>(limit: Option<Duration>, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("operation timed out after {}s", limit.as_secs_f64()),
            ))
        }),
        None => fut.await,
    }
}
