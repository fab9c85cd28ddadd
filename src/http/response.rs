//! Synthesized error responses.
//!
//! # Responsibilities
//! - Build a complete HTTP/1.1 error response (status line, headers, HTML body)
//! - Stamp the current time as an RFC 1123 `Date`
//! - Compute `Content-Length` from the exact body bytes
//!
//! # Design Decisions
//! - One parameterized builder for every status the proxy emits
//! - Always `Connection: close`; the client never gets keep-alive

use chrono::{DateTime, Utc};

/// Value of the `Server` header on synthesized responses.
pub const SERVER_NAME: &str = "webserver/1.0";

const RFC1123: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Build an error response stamped with the current time.
pub fn build_error_response(code: u16, reason: &str, detail: &str) -> Vec<u8> {
    build_error_response_at(Utc::now(), code, reason, detail)
}

/// Build an error response with an explicit `Date`.
pub fn build_error_response_at(
    now: DateTime<Utc>,
    code: u16,
    reason: &str,
    detail: &str,
) -> Vec<u8> {
    let body = format!(
        "<HTML><HEAD><TITLE>{code} {reason}</TITLE></HEAD>\r\n\
         <BODY><H4>{code} {reason}</H4>\r\n\
         {detail}\r\n\
         </BODY></HTML>"
    );

    let head = format!(
        "HTTP/1.1 {code} {reason}\r\n\
         Server: {SERVER_NAME}\r\n\
         Date: {date}\r\n\
         Content-Type: text/html\r\n\
         Content-Length: {len}\r\n\
         Connection: close\r\n\
         \r\n",
        date = now.format(RFC1123),
        len = body.len(),
    );

    let mut out = Vec::with_capacity(head.len() + body.len());
    out.extend_from_slice(head.as_bytes());
    out.extend_from_slice(body.as_bytes());
    out
}
