//! Request-level error taxonomy.
//!
//! Every failure the request pipeline can hit maps to exactly one HTTP
//! status. None of these ever escape a handler invocation; they are rendered
//! into an error page and written back to the client.

use thiserror::Error;

use crate::http::response::build_error_response;

/// Errors produced while handling a single proxied request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Malformed request line, protocol version, target or header block.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Any method other than `GET`.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    /// No `Host` header, or an empty one.
    #[error("missing or empty Host header")]
    MissingHost,

    /// The target matched a filter rule.
    #[error("access to {0} is forbidden")]
    Forbidden(String),

    /// The Host value did not resolve to an IPv4 address.
    #[error("failed to resolve {host}: {source}")]
    ResolutionFailed {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// TCP connect to the origin failed or timed out.
    #[error("failed to connect to upstream {addr}: {source}")]
    UpstreamConnectFailed {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Writing the request to, or reading the first bytes from, the origin failed.
    #[error("upstream I/O failed: {0}")]
    UpstreamIoFailed(#[source] std::io::Error),
}

impl ProxyError {
    /// HTTP status code sent to the client for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ProxyError::BadRequest(_) | ProxyError::MissingHost => 400,
            ProxyError::Forbidden(_) => 403,
            ProxyError::ResolutionFailed { .. } => 404,
            ProxyError::UpstreamConnectFailed { .. } | ProxyError::UpstreamIoFailed(_) => 500,
            ProxyError::UnsupportedMethod(_) => 501,
        }
    }

    /// Reason phrase for the status line.
    pub fn reason(&self) -> &'static str {
        reason_phrase(self.status_code())
    }

    /// Short human-readable text placed in the error page body.
    pub fn detail(&self) -> &'static str {
        match self.status_code() {
            403 => "Access denied.",
            404 => "File not found.",
            500 => "Some server side error.",
            501 => "Method is not supported.",
            _ => "Bad Request.",
        }
    }

    /// Render the complete HTTP error response for this error.
    pub fn to_response(&self) -> Vec<u8> {
        build_error_response(self.status_code(), self.reason(), self.detail())
    }
}

/// Reason phrase for the statuses the proxy can emit.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        _ => "Unknown",
    }
}
