//! The HTTP/1.1 vocabulary shared by the server, the router and the cache:
//! [`Method`], [`StatusCode`], [`Headers`], [`Request`] and [`Response`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod headers;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use request::Request;
pub use response::{IntoResponse, Response};

macro_rules! status_codes {
    ($($variant:ident = $code:literal, $reason:literal;)+) => {
        /// Response status codes this server produces.
        ///
        /// # Examples
        ///
        /// ```
        /// use rttp_cache::http::StatusCode;
        ///
        /// assert_eq!(StatusCode::NotImplemented.as_u16(), 501);
        /// assert_eq!(StatusCode::Ok.to_string(), "200 OK");
        /// assert!(!StatusCode::NotModified.is_success());
        /// ```
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum StatusCode {
            $($variant = $code,)+
        }

        impl StatusCode {
            /// Reason phrase written on the status line.
            pub fn canonical_reason(self) -> &'static str {
                match self {
                    $(Self::$variant => $reason,)+
                }
            }
        }
    };
}

status_codes! {
    Ok = 200, "OK";
    Created = 201, "Created";
    Accepted = 202, "Accepted";
    NoContent = 204, "No Content";
    NotModified = 304, "Not Modified";
    BadRequest = 400, "Bad Request";
    NotFound = 404, "Not Found";
    MethodNotAllowed = 405, "Method Not Allowed";
    PayloadTooLarge = 413, "Payload Too Large";
    InternalServerError = 500, "Internal Server Error";
    NotImplemented = 501, "Not Implemented";
    ServiceUnavailable = 503, "Service Unavailable";
    GatewayTimeout = 504, "Gateway Timeout";
}

impl StatusCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// 2xx: the only responses the cache will keep.
    pub fn is_success(self) -> bool {
        self.as_u16() / 100 == 2
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

/// A request method. Anything outside the named variants is kept verbatim in
/// [`Method::Custom`], so extension methods such as `PURGE` can still be
/// routed and classified by the cache policy.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::Method;
///
/// assert_eq!(Method::from_wire("PATCH"), Method::Patch);
/// assert_eq!(Method::from_wire("PURGE"), Method::Custom("PURGE".into()));
/// assert_eq!(Method::Put.as_str(), "PUT");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Custom(String),
}

impl Method {
    /// Reads a method token as it appears on the request line. Matching is
    /// case-sensitive, as HTTP requires.
    pub fn from_wire(token: &str) -> Self {
        match token {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "PATCH" => Self::Patch,
            "DELETE" => Self::Delete,
            "OPTIONS" => Self::Options,
            other => Self::Custom(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Custom(token) => token,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_wire(s))
    }
}

// Configuration documents name methods by their wire token; lowercase is
// accepted there for convenience.
impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Method {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&token.to_ascii_uppercase()))
    }
}
