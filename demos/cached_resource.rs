//! A single cached resource at `/test/:id`.
//!
//! `GET` answers `{"data":"data"}` and is served from the cache after the first
//! request; `PUT` and `PATCH` are not implemented yet but still invalidate the
//! cached copy.
//!
//! Run with:
//!
//! ```text
//! RUST_LOG=debug cargo run --example cached_resource
//! curl -i http://127.0.0.1:8888/test/1
//! curl -i -X PUT http://127.0.0.1:8888/test/1
//! ```

use rttp_cache::cache::{CacheConfig, CacheLayer};
use rttp_cache::context::Context;
use rttp_cache::{HandlerError, HandlerResult, Method, Response, Router, Server, StatusCode};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct Payload {
    data: &'static str,
}

// Only integer ids name a resource.
fn resource_id(ctx: &Context) -> Result<u64, HandlerError> {
    ctx.params()
        .parse("id")
        .ok_or_else(|| HandlerError::status(StatusCode::NotFound, "Not Found"))
}

async fn show(ctx: Context) -> HandlerResult {
    resource_id(&ctx)?;
    Ok(Response::json(&Payload { data: "data" })?)
}

async fn update(ctx: Context) -> HandlerResult {
    resource_id(&ctx)?;
    Err(HandlerError::NotImplemented(ctx.request().method().clone()))
}

fn build_router(cache: &CacheLayer) -> Router {
    let mut router = Router::new();
    router
        .cached(cache, Method::Get, "/test/:id", show)
        .cached(cache, Method::Put, "/test/:id", update)
        .cached(cache, Method::Patch, "/test/:id", update);
    router
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cache = CacheLayer::from_config(&CacheConfig::default())?;
    let server = Server::bind("127.0.0.1:8888").await?;
    tracing::info!(address = %server.local_addr(), "cached resource demo ready");

    server.serve(build_router(&cache)).await?;
    Ok(())
}
