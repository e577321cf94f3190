//! Method + path dispatch.
//!
//! A route pattern is a `/`-separated list of literal segments and `:name`
//! captures, e.g. `/test/:id`. Empty segments are ignored on both sides, so
//! `/test/1/` reaches the same route as `/test/1`. The first registered route
//! whose method and pattern fit wins; otherwise the answer is `404 Not Found`.
//!
//! Handlers return anything [`IntoResponse`]. A fallible handler's
//! [`HandlerError`] therefore stays a typed error through wrappers such as the
//! response cache and only becomes a status code here.

use std::pin::Pin;
use std::sync::Arc;

mod error;

pub use error::{HandlerError, HandlerResult};

use crate::cache::CacheLayer;
use crate::context::{Context, PathParams};
use crate::http::IntoResponse;
use crate::{Method, Request, Response, StatusCode};

/// Boxed future returned by type-erased handlers.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A mounted handler after type erasure.
pub type Handler = Arc<dyn Fn(Context) -> BoxFuture<Response> + Send + Sync + 'static>;

/// Async functions of a [`Context`] that the router can mount.
///
/// Implemented for every `Fn(Context) -> impl Future` whose output converts
/// into a response, so callers never name this trait directly.
pub trait IntoHandler: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> BoxFuture<Response>;
}

impl<T, F, R> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, ctx: Context) -> BoxFuture<Response> {
        let output = self(ctx);
        Box::pin(async move { output.await.into_response() })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Capture(String),
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

struct Route {
    method: Method,
    pattern: Vec<Segment>,
    handler: Handler,
}

impl Route {
    fn new(method: Method, pattern: &str, handler: Handler) -> Self {
        let pattern = segments(pattern)
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) => Segment::Capture(name.to_owned()),
                None => Segment::Literal(segment.to_owned()),
            })
            .collect();
        Self {
            method,
            pattern,
            handler,
        }
    }

    // `None` unless every segment lines up.
    fn captures(&self, path: &str) -> Option<PathParams> {
        let mut params = PathParams::new();
        let mut incoming = segments(path);
        for expected in &self.pattern {
            let actual = incoming.next()?;
            match expected {
                Segment::Literal(literal) if literal == actual => {}
                Segment::Literal(_) => return None,
                Segment::Capture(name) => params.insert(name.as_str(), actual),
            }
        }
        incoming.next().is_none().then_some(params)
    }
}

/// Routing table.
///
/// # Examples
///
/// ```rust,no_run
/// use rttp_cache::cache::CacheLayer;
/// use rttp_cache::{HandlerError, Method, Response, Router, StatusCode};
///
/// let cache = CacheLayer::from_config(&Default::default()).unwrap();
/// let mut router = Router::new();
///
/// router
///     .get("/health", |_ctx| async { Response::new(StatusCode::NoContent) })
///     .cached(&cache, Method::Get, "/test/:id", |ctx| async move {
///         match ctx.params().parse::<u64>("id") {
///             Some(id) => Ok(Response::new(StatusCode::Ok).body(id.to_string())),
///             None => Err(HandlerError::status(StatusCode::NotFound, "Not Found")),
///         }
///     });
/// assert_eq!(router.len(), 2);
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `handler` for `method` requests whose path fits `pattern`.
    pub fn on(&mut self, method: Method, pattern: &str, handler: impl IntoHandler) -> &mut Self {
        let handler: Handler = Arc::new(move |ctx| handler.call(ctx));
        self.routes.push(Route::new(method, pattern, handler));
        self
    }

    pub fn get(&mut self, pattern: &str, handler: impl IntoHandler) -> &mut Self {
        self.on(Method::Get, pattern, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: impl IntoHandler) -> &mut Self {
        self.on(Method::Put, pattern, handler)
    }

    pub fn patch(&mut self, pattern: &str, handler: impl IntoHandler) -> &mut Self {
        self.on(Method::Patch, pattern, handler)
    }

    /// Mounts `handler` behind `cache`, with the interception the cache
    /// policy assigns to `method`. Same as
    /// `on(method, pattern, cache.wrap(method, handler))`.
    pub fn cached<H, F>(
        &mut self,
        cache: &CacheLayer,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> &mut Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        let wrapped = cache.wrap(method.clone(), handler);
        self.on(method, pattern, wrapped)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Runs the first route that fits `request`, or answers 404.
    pub async fn route(&self, request: Request) -> Response {
        let found = self
            .routes
            .iter()
            .filter(|route| &route.method == request.method())
            .find_map(|route| Some((route, route.captures(request.path())?)));

        match found {
            Some((route, params)) => (route.handler)(Context::with_params(request, params)).await,
            None => Response::new(StatusCode::NotFound).body("Not Found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, target: &str) -> Request {
        let raw = format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    fn route(pattern: &str) -> Route {
        Route::new(
            Method::Get,
            pattern,
            Arc::new(|_ctx| -> BoxFuture<Response> {
                Box::pin(async { Response::new(StatusCode::Ok) })
            }),
        )
    }

    #[test]
    fn pattern_compiles_to_segments() {
        assert_eq!(
            route("/test/:id/").pattern,
            vec![
                Segment::Literal("test".into()),
                Segment::Capture("id".into())
            ]
        );
        assert!(route("/").pattern.is_empty());
    }

    #[test]
    fn captures_require_matching_length_and_literals() {
        let test = route("/test/:id");
        assert_eq!(test.captures("/test/7").unwrap().get("id"), Some("7"));
        assert_eq!(test.captures("/test/7/").unwrap().get("id"), Some("7"));
        assert!(test.captures("/test").is_none());
        assert!(test.captures("/test/7/extra").is_none());
        assert!(test.captures("/other/7").is_none());
        assert!(route("/").captures("/").unwrap().is_empty());
    }

    #[tokio::test]
    async fn dispatches_by_method_and_path() {
        let mut router = Router::new();
        router
            .get("/test/:id", |ctx: Context| async move {
                Response::new(StatusCode::Ok).body(ctx.params().get("id").unwrap_or("").to_owned())
            })
            .put("/test/:id", |_ctx| async { Response::new(StatusCode::Accepted) });

        let got = router.route(request("GET", "/test/9?verbose=1")).await;
        assert_eq!(got.status(), StatusCode::Ok);
        assert_eq!(got.payload().as_ref(), b"9");

        let put = router.route(request("PUT", "/test/9")).await;
        assert_eq!(put.status(), StatusCode::Accepted);
    }

    #[tokio::test]
    async fn unmatched_method_or_path_is_not_found() {
        let mut router = Router::new();
        router.get("/test/:id", |_ctx| async { Response::new(StatusCode::Ok) });

        assert_eq!(
            router.route(request("DELETE", "/test/1")).await.status(),
            StatusCode::NotFound
        );
        assert_eq!(
            router.route(request("GET", "/nope")).await.status(),
            StatusCode::NotFound
        );
    }

    #[tokio::test]
    async fn earlier_route_wins() {
        let mut router = Router::new();
        router
            .get("/test/latest", |_ctx| async { Response::new(StatusCode::Ok).body("literal") })
            .get("/test/:id", |_ctx| async { Response::new(StatusCode::Ok).body("capture") });

        let res = router.route(request("GET", "/test/latest")).await;
        assert_eq!(res.payload().as_ref(), b"literal");
    }

    #[tokio::test]
    async fn handler_error_becomes_its_status() {
        let mut router = Router::new();
        router.patch("/test/:id", |ctx: Context| async move {
            Err::<Response, _>(HandlerError::NotImplemented(ctx.request().method().clone()))
        });

        let res = router.route(request("PATCH", "/test/1")).await;
        assert_eq!(res.status(), StatusCode::NotImplemented);
    }

    #[tokio::test]
    async fn custom_methods_route_like_any_other() {
        let mut router = Router::new();
        router.on(Method::Custom("PURGE".into()), "/test/:id", |_ctx| async {
            Response::new(StatusCode::NoContent)
        });

        let res = router.route(request("PURGE", "/test/1")).await;
        assert_eq!(res.status(), StatusCode::NoContent);
    }

    #[tokio::test]
    async fn cached_mount_serves_repeat_reads_from_the_store() {
        let cache = CacheLayer::from_config(&Default::default()).unwrap();
        let mut router = Router::new();
        router.cached(&cache, Method::Get, "/test/:id", |_ctx| async {
            Ok(Response::new(StatusCode::Ok).body("fresh"))
        });

        router.route(request("GET", "/test/1")).await;
        let res = router.route(request("GET", "/test/1")).await;

        assert_eq!(res.payload().as_ref(), b"fresh");
        assert_eq!(cache.store().stats().hits, 1);
    }
}
