//! # rttp-cache
//!
//! Transparent response caching for a from-scratch async HTTP/1.1 server.
//!
//! Successful `GET` responses are cached per request target in a bounded LRU
//! store; `PUT` and `PATCH` drop the cached entry before their handler runs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rttp_cache::cache::{CacheConfig, CacheLayer};
//! use rttp_cache::router::HandlerError;
//! use rttp_cache::{Method, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = CacheLayer::from_config(&CacheConfig::default())?;
//!
//!     let mut router = Router::new();
//!     router.cached(&cache, Method::Get, "/test/:id", |_ctx| async {
//!         Response::json(&serde_json::json!({ "data": "data" })).map_err(HandlerError::from)
//!     });
//!
//!     Server::bind("127.0.0.1:8888").await?.serve(router).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod context;
pub mod http;
pub mod router;
pub mod server;

pub use cache::{CacheConfig, CacheLayer, CacheStore};
pub use http::{Headers, IntoResponse, Method, Request, Response, StatusCode};
pub use router::{HandlerError, HandlerResult, Router};
pub use server::{Server, ServerError};
