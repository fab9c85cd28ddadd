//! Connection-lifetime normalization.
//!
//! The origin must close after one response, so every forwarded request
//! carries `Connection: close` no matter what the client asked for.

use std::borrow::Cow;

const CLOSE_LINE: &str = "Connection: close";

/// Rewrite a header block (request line plus header lines, CRLF-separated,
/// no terminating blank line) so it carries `Connection: close`.
///
/// Returns the input unchanged when it already does.
pub fn normalize_connection(head: &str) -> Cow<'_, str> {
    let mut seen = false;
    let mut rewrite = false;

    for line in head.split("\r\n").skip(1) {
        if let Some(value) = connection_value(line) {
            seen = true;
            if !value.eq_ignore_ascii_case("close") {
                rewrite = true;
            }
        }
    }

    if seen && !rewrite {
        return Cow::Borrowed(head);
    }

    let mut out = String::with_capacity(head.len() + CLOSE_LINE.len() + 2);
    for (idx, line) in head.split("\r\n").enumerate() {
        if idx > 0 {
            out.push_str("\r\n");
        }
        if idx > 0 && connection_value(line).is_some() {
            out.push_str(CLOSE_LINE);
        } else {
            out.push_str(line);
        }
    }
    if !seen {
        out.push_str("\r\n");
        out.push_str(CLOSE_LINE);
    }
    Cow::Owned(out)
}

fn connection_value(line: &str) -> Option<&str> {
    let (name, value) = line.split_once(':')?;
    name.trim()
        .eq_ignore_ascii_case("connection")
        .then(|| value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_alive_replaced_in_place() {
        let head = "GET / HTTP/1.1\r\nHost: a\r\nConnection: keep-alive\r\nAccept: */*";
        assert_eq!(
            normalize_connection(head),
            "GET / HTTP/1.1\r\nHost: a\r\nConnection: close\r\nAccept: */*"
        );
    }

    #[test]
    fn appended_when_absent() {
        let head = "GET / HTTP/1.1\r\nHost: a";
        assert_eq!(
            normalize_connection(head),
            "GET / HTTP/1.1\r\nHost: a\r\nConnection: close"
        );
    }

    #[test]
    fn appended_with_no_headers() {
        assert_eq!(
            normalize_connection("GET / HTTP/1.1"),
            "GET / HTTP/1.1\r\nConnection: close"
        );
    }

    #[test]
    fn close_is_idempotent() {
        let head = "GET / HTTP/1.1\r\nHost: a\r\nconnection:   Close\r\nAccept: */*";
        let once = normalize_connection(head);
        assert!(matches!(once, Cow::Borrowed(_)));
        assert_eq!(once, head);

        let first = normalize_connection("GET / HTTP/1.1\r\nHost: a");
        let twice = normalize_connection(&first);
        assert_eq!(twice, "GET / HTTP/1.1\r\nHost: a\r\nConnection: close");
    }

    #[test]
    fn other_values_rewritten() {
        let head = "GET / HTTP/1.1\r\nConnection: Upgrade\r\nHost: a";
        assert_eq!(
            normalize_connection(head),
            "GET / HTTP/1.1\r\nConnection: close\r\nHost: a"
        );
    }

    #[test]
    fn request_line_never_treated_as_header() {
        let head = "GET /connection:x HTTP/1.1\r\nHost: a";
        assert_eq!(
            normalize_connection(head),
            "GET /connection:x HTTP/1.1\r\nHost: a\r\nConnection: close"
        );
    }
}
