//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Raw client bytes (one read)
//!     → request.rs (parse, validate, tokenize headers)
//!     → connection.rs (force Connection: close)
//!     → [proxy::handler resolves, filters, forwards]
//!     → response.rs (synthesized error page on any failure)
//!     → Send to client
//! ```

pub mod connection;
pub mod request;
pub mod response;

pub use connection::normalize_connection;
pub use request::{parse_request, HeaderMap, ParsedRequest};
pub use response::{build_error_response, build_error_response_at};
