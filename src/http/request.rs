//! Turning buffered bytes into a [`Request`], via [`httparse`].

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method};

/// Why a buffer could not be read as a request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The head has not fully arrived; read more and try again.
    #[error("request head is incomplete")]
    Incomplete,

    #[error("malformed request: {0}")]
    Parse(#[from] httparse::Error),

    #[error("request line has no {field}")]
    MissingField { field: &'static str },
}

/// One parsed request.
///
/// Alongside the usual accessors it keeps the request target exactly as it
/// appeared on the request line: that string, query included, is what the
/// response cache keys on.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::{Method, Request};
///
/// let raw = b"GET /test/7?fields=data HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, head_len) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method(), &Method::Get);
/// assert_eq!(request.target(), "/test/7?fields=data");
/// assert_eq!(request.path(), "/test/7");
/// assert_eq!(request.query(), Some("fields=data"));
/// assert_eq!(head_len, raw.len());
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    target: String,
    /// Byte length of the path part of `target`.
    path_len: usize,
    /// Minor version: `1` for HTTP/1.1, `0` for HTTP/1.0.
    version: u8,
    headers: Headers,
    body: Bytes,
}

impl Request {
    const MAX_HEADERS: usize = 64;

    /// Parses the request at the start of `buf`.
    ///
    /// On success also returns the length of the head, i.e. where the body
    /// starts. The body is whatever of the `Content-Length` bytes is already
    /// in `buf`; the caller decides whether to wait for the rest.
    ///
    /// # Errors
    ///
    /// [`RequestError::Incomplete`] while the head is still arriving, the
    /// other variants when the head can never parse.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut slots = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut head = httparse::Request::new(&mut slots);

        let httparse::Status::Complete(head_len) = head.parse(buf)? else {
            return Err(RequestError::Incomplete);
        };

        let method = head
            .method
            .map(Method::from_wire)
            .ok_or(RequestError::MissingField { field: "method" })?;
        let target = head
            .path
            .ok_or(RequestError::MissingField { field: "target" })?
            .to_owned();
        let version = head
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut headers = Headers::with_capacity(head.headers.len());
        for field in head.headers.iter() {
            // Non-UTF-8 values are dropped rather than failing the request.
            if let Ok(value) = std::str::from_utf8(field.value) {
                headers.insert(field.name, value);
            }
        }

        let declared = headers
            .get("content-length")
            .and_then(|len| len.parse::<usize>().ok());
        let body_end = match declared {
            Some(len) => buf.len().min(head_len + len),
            None => buf.len(),
        };

        let path_len = target.find('?').unwrap_or(target.len());
        let request = Self {
            method,
            target,
            path_len,
            version,
            headers,
            body: Bytes::copy_from_slice(&buf[head_len..body_end]),
        };
        Ok((request, head_len))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target as received: origin form (`/path?query`) or, for
    /// proxy-style requests, the absolute URI.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The target up to, not including, the `?`.
    pub fn path(&self) -> &str {
        &self.target[..self.path_len]
    }

    /// The query string without its leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.target.get(self.path_len + 1..)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// `Connection` decides when present; otherwise HTTP/1.1 stays open and
    /// HTTP/1.0 closes.
    pub fn is_keep_alive(&self) -> bool {
        self.headers
            .get("connection")
            .map_or(self.version == 1, |value| {
                value.eq_ignore_ascii_case("keep-alive")
            })
    }

    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.parse().ok()
    }
}
