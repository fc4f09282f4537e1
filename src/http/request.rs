//! HTTP request heads and requests.

use super::error::{HttpError, HttpResult};
use bytes::Bytes;
use http::{Method, Version};
use std::collections::HashMap;
use std::net::SocketAddr;

/// Maximum number of headers to parse.
const MAX_HEADERS: usize = 100;

/// Parsed request line and headers.
///
/// Header names are stored lowercase. Repeated headers are joined with `", "`.
#[derive(Debug, Clone)]
pub struct HttpHeaders {
    method: Method,
    target: String,
    path: String,
    query: Option<String>,
    version: Version,
    headers: HashMap<String, String>,
}

impl HttpHeaders {
    /// Parse a request head from the front of `data`.
    ///
    /// Returns `Ok(None)` while the head is incomplete, otherwise the head and
    /// the number of bytes it occupied.
    pub fn parse(data: &[u8]) -> HttpResult<Option<(Self, usize)>> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        let head_len = match req.parse(data)? {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial => return Ok(None),
        };

        let method = req
            .method
            .ok_or_else(|| HttpError::Parse("missing method".to_string()))?;
        let method = Method::from_bytes(method.as_bytes())?;

        let target = req
            .path
            .ok_or_else(|| HttpError::Parse("missing request target".to_string()))?
            .to_string();

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.clone(), None),
        };

        let version = match req.version {
            Some(0) => Version::HTTP_10,
            _ => Version::HTTP_11,
        };

        let mut headers_map: HashMap<String, String> = HashMap::new();
        for header in req.headers.iter() {
            let name = header.name.to_lowercase();
            let value = String::from_utf8_lossy(header.value).trim().to_string();
            headers_map
                .entry(name)
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        Ok(Some((
            Self {
                method,
                target,
                path,
                query,
                version,
                headers: headers_map,
            },
            head_len,
        )))
    }

    /// Request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Raw request target, including any query string.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Request path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query string, without the leading `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// HTTP version.
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get a header value (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// All headers, keyed by lowercase name.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Parsed Content-Length, if present.
    pub fn content_length(&self) -> HttpResult<Option<u64>> {
        self.header("content-length")
            .map(|raw| {
                raw.parse::<u64>()
                    .map_err(|_| HttpError::InvalidContentLength(raw.to_string()))
            })
            .transpose()
    }

    /// Whether the body uses chunked transfer encoding.
    #[must_use]
    pub fn is_chunked(&self) -> bool {
        self.header("transfer-encoding").is_some_and(|te| {
            te.rsplit(',')
                .next()
                .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"))
        })
    }

    /// The Origin header.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.header("origin")
    }

    /// The Sec-WebSocket-Key header.
    #[must_use]
    pub fn sec_websocket_key(&self) -> Option<&str> {
        self.header("sec-websocket-key")
    }
}

/// A complete request as handed to an HTTP view.
#[derive(Debug, Clone)]
pub struct Request {
    head: HttpHeaders,
    body: Bytes,
    peer_addr: SocketAddr,
}

impl Request {
    /// Assemble a request from its parts.
    #[must_use]
    pub fn new(head: HttpHeaders, body: Bytes, peer_addr: SocketAddr) -> Self {
        Self {
            head,
            body,
            peer_addr,
        }
    }

    /// Request line and headers.
    #[must_use]
    pub fn head(&self) -> &HttpHeaders {
        &self.head
    }

    /// Request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        self.head.method()
    }

    /// Request path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        self.head.path()
    }

    /// Query string, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.head.query()
    }

    /// Get a header value (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.header(name)
    }

    /// Request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Address of the connected client.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}
