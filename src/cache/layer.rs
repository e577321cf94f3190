//! Wraps request handlers with the response cache.
//!
//! [`CacheLayer::wrap`] takes a fallible handler and returns a new handler with
//! the same signature. Depending on the method it was wrapped for, the new
//! handler serves and populates the cache, invalidates before running, or just
//! runs the original.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::context::Context;
use crate::http::Headers;
use crate::router::{BoxFuture, HandlerResult};
use crate::{Method, Response, StatusCode};

use super::policy::{CachePolicy, Interception, cache_key};
use super::{CacheConfig, CacheStore, ConfigError};

/// A successful response captured for replay.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
}

impl CachedResponse {
    /// The status the handler answered with; always 2xx.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Headers the handler set. Framing headers (`Content-Length`,
    /// `Connection`) are not part of the capture.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The response payload, shared with every replay.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Rebuilds a response identical to the one that was captured.
    pub fn to_response(&self) -> Response {
        Response::from_parts(self.status, self.headers.clone(), self.body.clone())
    }
}

impl From<&Response> for CachedResponse {
    fn from(response: &Response) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
            body: response.payload().clone(),
        }
    }
}

/// The store type the cache layer works with.
pub type ResponseStore = CacheStore<CachedResponse>;

/// A handler produced by [`CacheLayer::wrap`]; mountable on a
/// [`Router`](crate::Router) like any other handler.
pub type CachedHandler = Box<dyn Fn(Context) -> BoxFuture<HandlerResult> + Send + Sync + 'static>;

/// Response cache wiring: one shared store plus the policy that decides how
/// each wrapped handler uses it.
///
/// # Examples
///
/// ```rust,no_run
/// use rttp_cache::cache::CacheLayer;
/// use rttp_cache::{Method, Response, Router, router::HandlerError};
///
/// let cache = CacheLayer::from_config(&Default::default()).unwrap();
/// let mut router = Router::new();
///
/// router.get(
///     "/test/:id",
///     cache.wrap(Method::Get, |_ctx| async {
///         Response::json(&serde_json::json!({ "data": "data" })).map_err(HandlerError::from)
///     }),
/// );
/// router.put(
///     "/test/:id",
///     cache.wrap(Method::Put, |ctx| async move {
///         Err(HandlerError::NotImplemented(ctx.request().method().clone()))
///     }),
/// );
/// ```
#[derive(Clone)]
pub struct CacheLayer {
    store: Arc<ResponseStore>,
    policy: Arc<CachePolicy>,
}

/// Builder for [`CacheLayer`]; a store is mandatory.
#[derive(Default)]
pub struct CacheLayerBuilder {
    store: Option<Arc<ResponseStore>>,
    policy: CachePolicy,
}

impl CacheLayerBuilder {
    /// The store the layer reads and writes. Layers built from the same
    /// `Arc` share their entries.
    #[must_use]
    pub fn store(mut self, store: Arc<ResponseStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the default `GET` / `PUT`+`PATCH` policy.
    #[must_use]
    pub fn policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Finishes the layer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingStore`] when no store was supplied, so a
    /// misconfigured route fails at startup instead of silently bypassing the
    /// cache at request time.
    pub fn build(self) -> Result<CacheLayer, ConfigError> {
        let store = self.store.ok_or(ConfigError::MissingStore)?;
        Ok(CacheLayer {
            store,
            policy: Arc::new(self.policy),
        })
    }
}

impl CacheLayer {
    /// Starts a builder with the default policy and no store.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use rttp_cache::cache::{CacheLayer, CacheStore, ConfigError};
    ///
    /// let store = Arc::new(CacheStore::new(128).unwrap());
    /// let cache = CacheLayer::builder().store(Arc::clone(&store)).build().unwrap();
    /// assert!(Arc::ptr_eq(cache.store(), &store));
    ///
    /// assert!(matches!(CacheLayer::builder().build(), Err(ConfigError::MissingStore)));
    /// ```
    pub fn builder() -> CacheLayerBuilder {
        CacheLayerBuilder::default()
    }

    /// Creates a layer with a fresh store sized and tuned by `config`.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] that [`CacheConfig::validate`] reports.
    pub fn from_config(config: &CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut store = CacheStore::new(config.capacity)?;
        if let Some(ttl) = config.ttl_duration() {
            store = store.with_ttl(ttl);
        }
        Self::builder()
            .store(Arc::new(store))
            .policy(config.policy()?)
            .build()
    }

    /// The shared store, for diagnostics and administrative resets.
    pub fn store(&self) -> &Arc<ResponseStore> {
        &self.store
    }

    /// The policy [`wrap`](Self::wrap) classifies methods with.
    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Wraps `handler`, registered for `method`, with the cache behaviour the
    /// policy assigns to that method.
    ///
    /// Errors returned by `handler` come back out of the wrapped handler
    /// unchanged and are never cached.
    pub fn wrap<H, F>(&self, method: Method, handler: H) -> CachedHandler
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        let interception = self.policy.classify(&method);
        debug!(%method, ?interception, "wrapping handler");
        self.intercepting(interception, handler)
    }

    /// Wraps `handler` as a cacheable read whatever the policy says about
    /// the method it is mounted under.
    pub fn cacheable<H, F>(&self, handler: H) -> CachedHandler
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.intercepting(Interception::CacheableRead, handler)
    }

    /// Wraps `handler` as an invalidating write whatever the policy says
    /// about the method it is mounted under.
    pub fn invalidating<H, F>(&self, handler: H) -> CachedHandler
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.intercepting(Interception::InvalidatingWrite, handler)
    }

    fn intercepting<H, F>(&self, interception: Interception, handler: H) -> CachedHandler
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let store = Arc::clone(&self.store);

        Box::new(move |ctx: Context| -> BoxFuture<HandlerResult> {
            let handler = Arc::clone(&handler);
            let store = Arc::clone(&store);
            Box::pin(async move { intercept(interception, &store, handler.as_ref(), ctx).await })
        })
    }
}

async fn intercept<H, F>(
    interception: Interception,
    store: &ResponseStore,
    handler: &H,
    ctx: Context,
) -> HandlerResult
where
    H: Fn(Context) -> F,
    F: Future<Output = HandlerResult>,
{
    match interception {
        Interception::CacheableRead => {
            let key = cache_key(ctx.request());
            if let Some(cached) = store.get(&key) {
                debug!(%key, "cache hit");
                return Ok(cached.to_response());
            }
            debug!(%key, "cache miss");

            let response = handler(ctx).await?;
            if response.status().is_success() {
                store.set(key, CachedResponse::from(&response));
            } else {
                trace!(%key, status = %response.status(), "not caching unsuccessful response");
            }
            Ok(response)
        }
        Interception::InvalidatingWrite => {
            let key = cache_key(ctx.request());
            if store.remove(&key) {
                debug!(%key, "invalidated cached response");
            }
            handler(ctx).await
        }
        Interception::Passthrough => handler(ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::Request;
    use crate::router::HandlerError;

    fn ctx(method: &str, target: &str) -> Context {
        let raw = format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Context::new(Request::parse(raw.as_bytes()).unwrap().0)
    }

    fn layer(capacity: usize) -> CacheLayer {
        CacheLayer::from_config(&CacheConfig::default().capacity(capacity)).unwrap()
    }

    fn counting_ok(calls: Arc<AtomicUsize>) -> CachedHandler {
        layer(16).cacheable(move |_ctx| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(Response::new(StatusCode::Ok).body("fresh")) }
        })
    }

    #[test]
    fn builder_without_store_is_a_config_error() {
        assert!(matches!(
            CacheLayer::builder().build(),
            Err(ConfigError::MissingStore)
        ));
    }

    #[tokio::test]
    async fn sub_second_ttl_from_config_still_caches() {
        let cache = CacheLayer::from_config(
            &CacheConfig::default().ttl(Duration::from_millis(500)),
        )
        .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let handler = cache.cacheable(move |_ctx| {
            seen.fetch_add(1, Ordering::SeqCst);
            async { Ok(Response::new(StatusCode::Ok).body("fresh")) }
        });

        handler(ctx("GET", "/test/1")).await.unwrap();
        handler(ctx("GET", "/test/1")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.store().stats().hits, 1);
    }

    #[test]
    fn from_config_applies_capacity_and_ttl() {
        let cache = CacheLayer::from_config(
            &CacheConfig::default()
                .capacity(7)
                .ttl(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(cache.store().capacity(), 7);
        assert_eq!(cache.store().ttl(), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn miss_then_hit_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = counting_ok(Arc::clone(&calls));

        let first = handler(ctx("GET", "/test/1")).await.unwrap();
        let second = handler(ctx("GET", "/test/1")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.payload(), second.payload());
        assert_eq!(second.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn distinct_queries_are_distinct_entries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = counting_ok(Arc::clone(&calls));

        handler(ctx("GET", "/test/1?a=1")).await.unwrap();
        handler(ctx("GET", "/test/1?a=2")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn hit_replays_status_and_headers() {
        let cache = layer(4);
        let handler = cache.cacheable(|_ctx| async {
            Ok(Response::new(StatusCode::Created)
                .header("Content-Type", "application/json")
                .body("{}"))
        });

        handler(ctx("GET", "/r")).await.unwrap();
        let replayed = handler(ctx("GET", "/r")).await.unwrap();

        assert_eq!(replayed.status(), StatusCode::Created);
        assert_eq!(
            replayed.headers().get("content-type"),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn handler_error_propagates_and_is_not_cached() {
        let cache = layer(4);
        let handler = cache.cacheable(|_ctx| async {
            Err(HandlerError::internal(std::io::Error::other("backend down")))
        });

        let err = handler(ctx("GET", "/test/1")).await.unwrap_err();

        assert!(matches!(err, HandlerError::Internal(_)));
        assert!(cache.store().get("/test/1").is_none());
    }

    #[tokio::test]
    async fn unsuccessful_status_is_not_cached() {
        let cache = layer(4);
        let handler = cache.cacheable(|_ctx| async { Ok(Response::new(StatusCode::NotFound)) });

        let res = handler(ctx("GET", "/missing")).await.unwrap();

        assert_eq!(res.status(), StatusCode::NotFound);
        assert!(cache.store().is_empty());
    }

    #[tokio::test]
    async fn invalidating_write_removes_before_running_handler() {
        let cache = layer(4);
        let store = Arc::clone(cache.store());
        cache
            .store()
            .set("/test/1", CachedResponse::from(&Response::new(StatusCode::Ok)));

        let observed = Arc::new(AtomicUsize::new(usize::MAX));
        let seen = Arc::clone(&observed);
        let handler = cache.wrap(Method::Patch, move |ctx: Context| {
            seen.store(store.len(), Ordering::SeqCst);
            async move { Err(HandlerError::NotImplemented(ctx.request().method().clone())) }
        });

        let err = handler(ctx("PATCH", "/test/1")).await.unwrap_err();

        assert!(matches!(err, HandlerError::NotImplemented(Method::Patch)));
        assert_eq!(observed.load(Ordering::SeqCst), 0);
        assert!(cache.store().get("/test/1").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn handler_may_use_the_store_it_is_wrapped_with() {
        let cache = layer(4);
        let store = Arc::clone(cache.store());
        let handler = cache.cacheable(move |_ctx| {
            let store = Arc::clone(&store);
            async move {
                // Runs between the miss lookup and the insert.
                assert!(store.get("/test/1").is_none());
                store.set("/side", CachedResponse::from(&Response::new(StatusCode::Ok)));
                Ok(Response::new(StatusCode::Ok).body("fresh"))
            }
        });

        let task = tokio::spawn(handler(ctx("GET", "/test/1")));
        let res = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("store lock held across the handler")
            .unwrap()
            .unwrap();

        assert_eq!(res.payload().as_ref(), b"fresh");
        let mut keys = cache.store().keys();
        keys.sort();
        assert_eq!(keys, vec!["/side".to_owned(), "/test/1".to_owned()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn invalidating_handler_may_repopulate_its_key() {
        let cache = layer(4);
        cache
            .store()
            .set("/test/1", CachedResponse::from(&Response::new(StatusCode::Ok)));
        let store = Arc::clone(cache.store());
        let handler = cache.wrap(Method::Put, move |_ctx| {
            let store = Arc::clone(&store);
            async move {
                let fresh = Response::new(StatusCode::Ok).body("rewritten");
                store.set("/test/1", CachedResponse::from(&fresh));
                Ok(fresh)
            }
        });

        let task = tokio::spawn(handler(ctx("PUT", "/test/1")));
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("store lock held across the handler")
            .unwrap()
            .unwrap();

        let cached = cache.store().get("/test/1").unwrap();
        assert_eq!(cached.body().as_ref(), b"rewritten");
    }

    #[tokio::test]
    async fn shorthands_ignore_the_policy() {
        let store = Arc::new(CacheStore::new(4).unwrap());
        let policy = CachePolicy::new([Method::Head], [Method::Delete]).unwrap();
        let cache = CacheLayer::builder()
            .store(Arc::clone(&store))
            .policy(policy)
            .build()
            .unwrap();

        let read = cache.cacheable(|_ctx| async { Ok(Response::new(StatusCode::Ok).body("r")) });
        read(ctx("GET", "/test/1")).await.unwrap();
        assert!(store.get("/test/1").is_some());

        let write = cache.invalidating(|_ctx| async { Ok(Response::new(StatusCode::NoContent)) });
        write(ctx("PUT", "/test/1")).await.unwrap();
        assert!(store.get("/test/1").is_none());

        // `wrap` does consult the policy: GET is not cacheable here.
        let wrapped = cache.wrap(Method::Get, |_ctx| async { Ok(Response::new(StatusCode::Ok)) });
        wrapped(ctx("GET", "/test/2")).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn passthrough_leaves_store_alone() {
        let cache = layer(4);
        cache
            .store()
            .set("/test/1", CachedResponse::from(&Response::new(StatusCode::Ok)));
        let handler = cache.wrap(Method::Post, |_ctx| async {
            Ok(Response::new(StatusCode::Created))
        });

        let res = handler(ctx("POST", "/test/1")).await.unwrap();

        assert_eq!(res.status(), StatusCode::Created);
        assert_eq!(cache.store().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_handler_caches_nothing() {
        let cache = layer(4);
        let handler = cache.cacheable(|_ctx| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Response::new(StatusCode::Ok).body("too late"))
        });

        let outcome =
            tokio::time::timeout(Duration::from_millis(20), handler(ctx("GET", "/slow"))).await;

        assert!(outcome.is_err());
        assert!(cache.store().is_empty());
    }

    #[tokio::test]
    async fn eviction_through_the_layer() {
        let cache = layer(2);
        let handler = cache.cacheable(|ctx: Context| {
            let body = ctx.request().path().to_owned();
            async move { Ok(Response::new(StatusCode::Ok).body(body)) }
        });

        for target in ["/a", "/b", "/c"] {
            handler(ctx("GET", target)).await.unwrap();
        }

        assert_eq!(cache.store().stats().evictions, 1);
        assert!(cache.store().get("/a").is_none());
        assert_eq!(
            cache.store().get("/c").unwrap().body().as_ref(),
            b"/c"
        );
    }
}
