//! Request parsing and validation.
//!
//! # Responsibilities
//! - Split the raw client bytes into request line, header block and trailing bytes
//! - Validate method, request-line shape, target form and protocol version
//! - Tokenize headers into a case-insensitive map
//! - Derive the `Host` value and request path
//!
//! # Design Decisions
//! - Checks run in a fixed order; the first failure is the one reported
//! - Invalid input yields an error, never a partially built request
//! - Only a single read's worth of bytes is ever parsed (no re-read loop)

use crate::error::ProxyError;
use crate::http::connection::normalize_connection;

/// The only method the proxy forwards.
pub const ALLOWED_METHOD: &str = "GET";

const CRLF: &str = "\r\n";
const HEAD_END: &str = "\r\n\r\n";
const ABSOLUTE_PREFIX: &str = "http://";

/// Ordered header list with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    /// Tokenize header lines of the form `Name: value`.
    pub fn parse<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<Self, ProxyError> {
        let mut entries = Vec::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ProxyError::BadRequest(format!("malformed header line: {line:?}")))?;
            let name = name.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(ProxyError::BadRequest(format!("invalid header name: {name:?}")));
            }
            entries.push((name.to_string(), value.trim().to_string()));
        }
        Ok(Self { entries })
    }

    /// First value for `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A validated `GET` request.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub method: String,
    pub target: String,
    pub version: String,
    pub headers: HeaderMap,
    /// Host to resolve, without scheme prefix or port.
    pub host: String,
    /// Path portion of the target; always starts with `/`.
    pub path: String,
    /// Request line and header lines, CRLF-separated, without the blank line.
    head: String,
    /// Bytes after the blank line, forwarded untouched.
    trailing: Vec<u8>,
}

impl ParsedRequest {
    /// Raw header block (request line included) as received.
    pub fn head(&self) -> &str {
        &self.head
    }

    /// Bytes the client sent after the header block.
    pub fn trailing(&self) -> &[u8] {
        &self.trailing
    }

    /// Bytes to write to the origin: normalized head, blank line, trailing bytes.
    pub fn into_upstream_bytes(self) -> Vec<u8> {
        let head = normalize_connection(&self.head);
        let mut out = Vec::with_capacity(head.len() + HEAD_END.len() + self.trailing.len());
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(HEAD_END.as_bytes());
        out.extend_from_slice(&self.trailing);
        out
    }
}

/// Parse and validate the bytes of one client read.
pub fn parse_request(buf: &[u8]) -> Result<ParsedRequest, ProxyError> {
    if find(buf, CRLF.as_bytes()).is_none() {
        return Err(ProxyError::BadRequest("request line is not CRLF-terminated".into()));
    }

    let (head, trailing) = match find(buf, HEAD_END.as_bytes()) {
        Some(pos) => (&buf[..pos], &buf[pos + HEAD_END.len()..]),
        None => (buf.strip_suffix(CRLF.as_bytes()).unwrap_or(buf), &[][..]),
    };
    let head = std::str::from_utf8(head)
        .map_err(|_| ProxyError::BadRequest("header block is not valid UTF-8".into()))?;

    let mut lines = head.split(CRLF);
    let request_line = lines.next().unwrap_or_default();
    let tokens: Vec<&str> = request_line.split(' ').collect();

    let method = tokens[0];
    if method != ALLOWED_METHOD {
        return Err(ProxyError::UnsupportedMethod(method.to_string()));
    }

    let [method, target, version] = tokens[..] else {
        return Err(ProxyError::BadRequest(format!(
            "request line has {} tokens, expected 3",
            tokens.len()
        )));
    };

    let path = target_path(target)?;

    if version.len() != 8 || !version.starts_with("HTTP/1.") {
        return Err(ProxyError::BadRequest(format!("unsupported protocol version {version:?}")));
    }

    let headers = HeaderMap::parse(lines)?;
    let host = headers
        .get("host")
        .map(host_name)
        .filter(|h| !h.is_empty())
        .ok_or(ProxyError::MissingHost)?
        .to_string();

    Ok(ParsedRequest {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
        headers,
        host,
        path: path.to_string(),
        head: head.to_string(),
        trailing: trailing.to_vec(),
    })
}

/// Path of an absolute-URI or origin-form target.
fn target_path(target: &str) -> Result<&str, ProxyError> {
    let is_absolute = target
        .get(..ABSOLUTE_PREFIX.len())
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case(ABSOLUTE_PREFIX));

    if is_absolute {
        let rest = &target[ABSOLUTE_PREFIX.len()..];
        return rest
            .find('/')
            .map(|idx| &rest[idx..])
            .ok_or_else(|| ProxyError::BadRequest(format!("no path in target {target:?}")));
    }

    if target.starts_with('/') {
        Ok(target)
    } else {
        Err(ProxyError::BadRequest(format!("target {target:?} is neither absolute nor origin-form")))
    }
}

/// Strip an optional `http://` prefix and `:port` suffix from a Host value.
fn host_name(value: &str) -> &str {
    let value = value.trim();
    let value = match value.get(..ABSOLUTE_PREFIX.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(ABSOLUTE_PREFIX) => &value[ABSOLUTE_PREFIX.len()..],
        _ => value,
    };
    match value.rsplit_once(':') {
        Some((name, port)) if port.parse::<u16>().is_ok() => name,
        _ => value,
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
