//! HTTP response building and serialization.

use bytes::{Bytes, BytesMut};
use http::StatusCode;
use std::fmt::Write as _;

/// Content type used for the built-in pages.
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Format the status line for `status`, CRLF included.
#[must_use]
pub fn status_line(status: StatusCode) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
}

/// Escape text for inclusion in an HTML page.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Ordered header list that keeps the caller's spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList(Vec<(String, String)>);

impl HeaderList {
    /// Empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a header value (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace an existing header or append a new one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Remove a header.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.0.iter().position(|(n, _)| n.eq_ignore_ascii_case(name))?;
        Some(self.0.remove(index).1)
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Write every header except the framing ones the server controls.
    pub(crate) fn write_to(&self, out: &mut String) {
        for (name, value) in self.iter() {
            if name.eq_ignore_ascii_case("content-length")
                || name.eq_ignore_ascii_case("connection")
                || name.eq_ignore_ascii_case("transfer-encoding")
            {
                continue;
            }
            let _ = write!(out, "{name}: {value}\r\n");
        }
    }
}

/// Serialize a response head. `Content-Length` and `Connection: close` are
/// always written by the server.
pub(crate) fn serialize_head(status: StatusCode, headers: &HeaderList, content_length: u64) -> String {
    let mut head = status_line(status);
    headers.write_to(&mut head);
    let _ = write!(head, "Content-Length: {content_length}\r\nConnection: close\r\n\r\n");
    head
}

/// HTTP response with an in-memory body.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderList,
    body: Bytes,
}

impl Response {
    /// Start a `200 OK` response.
    #[must_use]
    pub fn ok() -> ResponseBuilder {
        ResponseBuilder::new().status(StatusCode::OK)
    }

    /// HTML page with the given status.
    #[must_use]
    pub fn html(status: StatusCode, body: impl Into<Bytes>) -> Self {
        ResponseBuilder::new()
            .status(status)
            .header("Content-Type", HTML_CONTENT_TYPE)
            .body(body)
            .build()
    }

    /// Plain-text error response carrying the status' reason phrase.
    #[must_use]
    pub fn error(status: StatusCode) -> Self {
        ResponseBuilder::new()
            .status(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(status.canonical_reason().unwrap_or("Error"))
            .build()
    }

    /// Get the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get a header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Get all headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    /// Set a header value.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// Get the response body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Serialize the response to bytes.
    #[must_use]
    pub fn serialize(&self) -> BytesMut {
        let head = serialize_head(self.status, &self.headers, self.body.len() as u64);
        let mut buf = BytesMut::with_capacity(head.len() + self.body.len());
        buf.extend_from_slice(head.as_bytes());
        buf.extend_from_slice(&self.body);
        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderList::new(),
            body: Bytes::new(),
        }
    }
}

/// Builder for HTTP responses.
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    response: Response,
}

impl ResponseBuilder {
    /// Create a new response builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status code.
    #[must_use]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.response.status = status;
        self
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response.headers.set(name, value);
        self
    }

    /// Set the response body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.response.body = body.into();
        self
    }

    /// Build the response.
    #[must_use]
    pub fn build(self) -> Response {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line() {
        assert_eq!(status_line(StatusCode::OK), "HTTP/1.1 200 OK\r\n");
        assert_eq!(
            status_line(StatusCode::NOT_FOUND),
            "HTTP/1.1 404 Not Found\r\n"
        );
    }

    #[test]
    fn test_serialize_response() {
        let resp = Response::ok()
            .header("Content-Type", "text/plain")
            .body("Hello")
            .build();

        let s = String::from_utf8(resp.serialize().to_vec()).unwrap();
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Type: text/plain\r\n"));
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.contains("Connection: close\r\n"));
        assert!(s.ends_with("\r\n\r\nHello"));
    }

    #[test]
    fn test_framing_headers_owned_by_server() {
        let resp = Response::ok()
            .header("Content-Length", "999")
            .header("Connection", "keep-alive")
            .body("ab")
            .build();

        let s = String::from_utf8(resp.serialize().to_vec()).unwrap();
        assert!(!s.contains("999"));
        assert!(!s.contains("keep-alive"));
        assert!(s.contains("Content-Length: 2\r\n"));
    }

    #[test]
    fn test_header_order_and_replace() {
        let mut headers = HeaderList::new();
        headers.set("X-B", "1");
        headers.set("X-A", "2");
        headers.set("x-b", "3");

        let collected: Vec<_> = headers.iter().collect();
        assert_eq!(collected, vec![("X-B", "3"), ("X-A", "2")]);
        assert_eq!(headers.remove("X-A"), Some("2".to_string()));
        assert!(headers.get("x-a").is_none());
    }

    #[test]
    fn test_error_response() {
        let resp = Response::error(StatusCode::BAD_REQUEST);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.body().as_ref(), b"Bad Request");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>alert('x')</script>&"),
            "&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;&amp;"
        );
    }
}
