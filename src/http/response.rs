//! Outgoing responses and their wire encoding.
//!
//! The payload is a [`Bytes`] handle, so a response captured by the cache and
//! every replay of it share one buffer.

use std::fmt::Write as _;

use bytes::{BufMut, Bytes, BytesMut};

use super::{Headers, StatusCode};

/// A response under construction.
///
/// `Content-Length` and `Connection` are framing concerns and are only added
/// by [`into_bytes`](Self::into_bytes); [`headers`](Self::headers) shows what
/// the handler set and nothing else.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::{Response, StatusCode};
///
/// let wire = Response::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(r#"{"data":"data"}"#)
///     .keep_alive(false)
///     .into_bytes();
///
/// let text = std::str::from_utf8(&wire).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Length: 15\r\nConnection: close\r\n\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    payload: Bytes,
    keep_alive: bool,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self::from_parts(status, Headers::new(), Bytes::new())
    }

    /// Assembles a response from a status, handler headers and a payload,
    /// e.g. when replaying a cached one.
    pub fn from_parts(status: StatusCode, headers: Headers, payload: Bytes) -> Self {
        Self {
            status,
            headers,
            payload,
            keep_alive: true,
        }
    }

    /// `200 OK` with `value` encoded as the JSON payload.
    ///
    /// # Errors
    ///
    /// Fails when `value` cannot be serialized.
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let encoded = serde_json::to_vec(value)?;
        Ok(Self::new(StatusCode::Ok)
            .header("Content-Type", "application/json")
            .body_bytes(encoded))
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Text payload. Without an explicit `Content-Type` it goes out as
    /// `text/plain; charset=utf-8`.
    #[must_use]
    pub fn body(self, text: impl Into<String>) -> Self {
        self.body_bytes(text.into())
    }

    #[must_use]
    pub fn body_bytes(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Whether the connection stays open after this response. The server
    /// sets this from the request; handlers rarely need to.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Encodes status line, handler headers, framing headers and payload.
    pub fn into_bytes(self) -> BytesMut {
        let mut head = String::with_capacity(64 + self.headers.len() * 32);
        // Writing into a `String` cannot fail.
        let _ = write!(head, "HTTP/1.1 {}\r\n", self.status);
        for (name, value) in self.headers.iter() {
            let _ = write!(head, "{name}: {value}\r\n");
        }
        if !self.payload.is_empty() && !self.headers.contains("content-type") {
            head.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        }
        let _ = write!(head, "Content-Length: {}\r\n", self.payload.len());
        head.push_str(if self.keep_alive {
            "Connection: keep-alive\r\n\r\n"
        } else {
            "Connection: close\r\n\r\n"
        });

        let mut wire = BytesMut::with_capacity(head.len() + self.payload.len());
        wire.put_slice(head.as_bytes());
        wire.put(self.payload);
        wire
    }
}

/// Anything a handler may return. The router converts the handler's output
/// with this, which lets both plain and fallible handlers be mounted.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl<T, E> IntoResponse for Result<T, E>
where
    T: IntoResponse,
    E: IntoResponse,
{
    fn into_response(self) -> Response {
        self.map_or_else(IntoResponse::into_response, IntoResponse::into_response)
    }
}
