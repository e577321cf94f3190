//! TCP front end: accepts connections and feeds their requests to a [`Router`].
//!
//! Each connection runs on its own Tokio task and may carry any number of
//! requests, pipelined or not, until either side asks to close.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::request::RequestError;
use crate::router::Router;
use crate::{Request, Response, StatusCode};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Buffered bytes beyond which a connection still lacking a full request is
/// answered with 413 and closed.
const MAX_REQUEST_BYTES: usize = 8 * 1024 * 1024;

const READ_BUF_BYTES: usize = 4 * 1024;

/// A bound listener, ready to serve a [`Router`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// use rttp_cache::{Response, Router, Server, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), rttp_cache::ServerError> {
///     let mut router = Router::new();
///     router.get("/health", |_ctx| async { Response::new(StatusCode::NoContent) });
///
///     Server::bind("127.0.0.1:8888")
///         .await?
///         .request_timeout(Duration::from_secs(10))
///         .serve(router)
///         .await
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    request_timeout: Option<Duration>,
}

impl Server {
    /// Binds a listener on `addr`; port `0` picks a free port, see
    /// [`local_addr`](Self::local_addr).
    ///
    /// # Errors
    ///
    /// [`ServerError::Bind`] when the address is unavailable.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        Ok(Self {
            local_addr: listener.local_addr()?,
            listener,
            request_timeout: None,
        })
    }

    /// Upper bound on a single handler run. Past it the handler future is
    /// dropped and the client gets `504 Gateway Timeout`; whatever the handler
    /// had not yet done, such as storing its response in the cache, never
    /// happens.
    #[must_use]
    pub fn request_timeout(mut self, limit: Duration) -> Self {
        self.request_timeout = Some(limit);
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until the task is dropped. Failed accepts are
    /// logged and skipped.
    ///
    /// # Errors
    ///
    /// Currently never returns; the `Result` leaves room for fatal listener
    /// errors.
    pub async fn serve(self, router: Router) -> Result<(), ServerError> {
        let router = Arc::new(router);
        info!(address = %self.local_addr, routes = router.len(), "listening");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    error!(error = %err, "accept failed");
                    continue;
                }
            };
            debug!(%peer, "accepted connection");

            let router = Arc::clone(&router);
            let limit = self.request_timeout;
            tokio::spawn(async move {
                if let Err(err) = serve_connection(stream, peer, &router, limit).await {
                    warn!(%peer, error = %err, "connection ended with an error");
                }
            });
        }
    }
}

/// What the buffered bytes amount to so far.
enum Frame {
    /// A whole request, plus how many buffered bytes it used.
    Ready(Request, usize),
    NeedMore,
    /// The bytes can never become a request; send this and close.
    Reject(Response),
}

fn frame(buf: &[u8]) -> Frame {
    match Request::parse(buf) {
        Ok((request, head_len)) => {
            let total = head_len + request.content_length().unwrap_or(0);
            if buf.len() >= total {
                Frame::Ready(request, total)
            } else {
                Frame::NeedMore
            }
        }
        Err(RequestError::Incomplete) => Frame::NeedMore,
        Err(err) => Frame::Reject(
            Response::new(StatusCode::BadRequest).body(format!("Bad Request: {err}")),
        ),
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    router: &Router,
    limit: Option<Duration>,
) -> std::io::Result<()> {
    let mut buf = BytesMut::with_capacity(READ_BUF_BYTES);

    loop {
        let (request, used) = match frame(&buf) {
            Frame::Ready(request, used) => (request, used),
            Frame::NeedMore if buf.len() > MAX_REQUEST_BYTES => {
                warn!(%peer, buffered = buf.len(), "request too large");
                let response = Response::new(StatusCode::PayloadTooLarge).body("Payload Too Large");
                return reject(&mut stream, response).await;
            }
            Frame::NeedMore => {
                if stream.read_buf(&mut buf).await? == 0 {
                    debug!(%peer, pending = buf.len(), "peer closed connection");
                    return Ok(());
                }
                continue;
            }
            Frame::Reject(response) => {
                warn!(%peer, "unparseable request");
                return reject(&mut stream, response).await;
            }
        };
        buf.advance(used);

        let keep_alive = request.is_keep_alive();
        debug!(%peer, method = %request.method(), uri = request.target(), "request");

        let response = dispatch(router, request, limit).await.keep_alive(keep_alive);
        stream.write_all(&response.into_bytes()).await?;

        if !keep_alive {
            return Ok(());
        }
    }
}

async fn reject(stream: &mut TcpStream, response: Response) -> std::io::Result<()> {
    stream.write_all(&response.keep_alive(false).into_bytes()).await?;
    stream.shutdown().await
}

/// Routes `request`, giving up after `limit` if one is set.
async fn dispatch(router: &Router, request: Request, limit: Option<Duration>) -> Response {
    let Some(limit) = limit else {
        return router.route(request).await;
    };

    let uri = request.target().to_owned();
    match tokio::time::timeout(limit, router.route(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(%uri, ?limit, "handler timed out");
            Response::new(StatusCode::GatewayTimeout).body("Gateway Timeout")
        }
    }
}
