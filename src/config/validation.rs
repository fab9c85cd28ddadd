//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (pool size > 0, ports valid, buffers non-empty)
//! - Check that addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// Smallest request buffer that can hold a minimal request line.
pub const MIN_REQUEST_BYTES: usize = 16;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: {value:?} is not a socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("pool.size must be greater than zero")]
    EmptyPool,

    #[error("listener.max_requests must be greater than zero when set")]
    ZeroMaxRequests,

    #[error("upstream.port must not be zero")]
    ZeroUpstreamPort,

    #[error("upstream.relay_buffer_bytes must be greater than zero")]
    EmptyRelayBuffer,

    #[error("limits.max_request_bytes must be at least {min}, got {0}", min = MIN_REQUEST_BYTES)]
    RequestLimitTooSmall(usize),

    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_requests == Some(0) {
        errors.push(ValidationError::ZeroMaxRequests);
    }
    if config.pool.size == 0 {
        errors.push(ValidationError::EmptyPool);
    }
    if config.upstream.port == 0 {
        errors.push(ValidationError::ZeroUpstreamPort);
    }
    if config.upstream.relay_buffer_bytes == 0 {
        errors.push(ValidationError::EmptyRelayBuffer);
    }
    if config.limits.max_request_bytes < MIN_REQUEST_BYTES {
        errors.push(ValidationError::RequestLimitTooSmall(config.limits.max_request_bytes));
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::UnknownLogLevel(observability.log_level.clone()));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
