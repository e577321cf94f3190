//! Decides what the cache does with a request: serve or populate, invalidate, or
//! stay out of the way.

use std::collections::HashSet;

use crate::{Method, Request};

use super::ConfigError;

/// What the cache layer does around one handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interception {
    /// Serve from the store on a hit; on a miss run the handler and store a
    /// successful result.
    CacheableRead,
    /// Drop the stored entry, then run the handler whatever its outcome.
    InvalidatingWrite,
    /// No cache interaction.
    Passthrough,
}

/// Method sets that classify requests into an [`Interception`].
///
/// Defaults to `GET` as the only cacheable method and `PUT`/`PATCH` as the
/// invalidating ones.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    cacheable: HashSet<Method>,
    invalidating: HashSet<Method>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            cacheable: HashSet::from([Method::Get]),
            invalidating: HashSet::from([Method::Put, Method::Patch]),
        }
    }
}

impl CachePolicy {
    /// Builds a policy from explicit method sets.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ConflictingMethod`] if a method appears in both sets.
    pub fn new(
        cacheable: impl IntoIterator<Item = Method>,
        invalidating: impl IntoIterator<Item = Method>,
    ) -> Result<Self, ConfigError> {
        let cacheable: HashSet<Method> = cacheable.into_iter().collect();
        let invalidating: HashSet<Method> = invalidating.into_iter().collect();

        if let Some(method) = cacheable.intersection(&invalidating).next() {
            return Err(ConfigError::ConflictingMethod(method.clone()));
        }

        Ok(Self {
            cacheable,
            invalidating,
        })
    }

    /// Maps `method` onto the cache behaviour for it. Cacheable wins the
    /// lookup order, though [`new`](Self::new) rules out overlaps anyway.
    ///
    /// # Examples
    ///
    /// ```
    /// use rttp_cache::Method;
    /// use rttp_cache::cache::{CachePolicy, Interception};
    ///
    /// let policy = CachePolicy::default();
    /// assert_eq!(policy.classify(&Method::Get), Interception::CacheableRead);
    /// assert_eq!(policy.classify(&Method::Patch), Interception::InvalidatingWrite);
    /// assert_eq!(policy.classify(&Method::Delete), Interception::Passthrough);
    /// ```
    pub fn classify(&self, method: &Method) -> Interception {
        if self.cacheable.contains(method) {
            Interception::CacheableRead
        } else if self.invalidating.contains(method) {
            Interception::InvalidatingWrite
        } else {
            Interception::Passthrough
        }
    }

    /// Returns `true` if responses to `method` may be served from the store.
    pub fn is_cacheable(&self, method: &Method) -> bool {
        self.cacheable.contains(method)
    }

    /// Returns `true` if `method` drops the stored entry before its handler runs.
    pub fn is_invalidating(&self, method: &Method) -> bool {
        self.invalidating.contains(method)
    }
}

/// Derives the cache key for a request: its path and query string exactly as
/// received.
///
/// An absolute-form target (`http://host/path?q`) is reduced to `/path?q` so the
/// key does not depend on scheme or host. Query strings are not canonicalized:
/// `?a=1&b=2` and `?b=2&a=1` are different keys.
pub fn cache_key(request: &Request) -> String {
    let target = request.target();
    if target.starts_with('/') {
        return target.to_owned();
    }
    let Some(scheme_end) = target.find("://") else {
        return target.to_owned();
    };
    let after_authority = &target[scheme_end + 3..];
    match after_authority.find(['/', '?']) {
        Some(pos) if after_authority[pos..].starts_with('?') => {
            // `http://host?q` has an empty path, which is `/` on the wire.
            format!("/{}", &after_authority[pos..])
        }
        Some(pos) => after_authority[pos..].to_owned(),
        None => "/".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, target: &str) -> Request {
        let raw = format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    #[test]
    fn default_policy_classification() {
        let policy = CachePolicy::default();
        assert_eq!(policy.classify(&Method::Get), Interception::CacheableRead);
        assert_eq!(policy.classify(&Method::Put), Interception::InvalidatingWrite);
        assert_eq!(
            policy.classify(&Method::Patch),
            Interception::InvalidatingWrite
        );
        assert_eq!(policy.classify(&Method::Post), Interception::Passthrough);
        assert_eq!(policy.classify(&Method::Delete), Interception::Passthrough);
        assert!(policy.is_cacheable(&Method::Get));
        assert!(!policy.is_invalidating(&Method::Get));
    }

    #[test]
    fn custom_sets() {
        let policy = CachePolicy::new(
            [Method::Get, Method::Head],
            [Method::Delete, Method::Custom("PURGE".into())],
        )
        .unwrap();
        assert_eq!(policy.classify(&Method::Head), Interception::CacheableRead);
        assert_eq!(
            policy.classify(&Method::Custom("PURGE".into())),
            Interception::InvalidatingWrite
        );
        assert_eq!(policy.classify(&Method::Put), Interception::Passthrough);
    }

    #[test]
    fn overlapping_sets_are_rejected() {
        let err = CachePolicy::new([Method::Get, Method::Put], [Method::Put]).unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingMethod(Method::Put)));
    }

    #[test]
    fn key_is_path_and_query_as_received() {
        assert_eq!(cache_key(&request("GET", "/test/1")), "/test/1");
        assert_eq!(cache_key(&request("GET", "/test/1?a=1&b=2")), "/test/1?a=1&b=2");
        assert_eq!(cache_key(&request("GET", "/test/1/")), "/test/1/");
        assert_eq!(
            cache_key(&request("GET", "/go?to=http://example.com/x")),
            "/go?to=http://example.com/x"
        );
    }

    #[test]
    fn query_order_is_not_canonicalized() {
        let a = cache_key(&request("GET", "/s?a=1&b=2"));
        let b = cache_key(&request("GET", "/s?b=2&a=1"));
        assert_ne!(a, b);
    }

    #[test]
    fn absolute_form_drops_scheme_and_host() {
        assert_eq!(
            cache_key(&request("GET", "http://example.com:8888/test/1?x=y")),
            "/test/1?x=y"
        );
        assert_eq!(cache_key(&request("GET", "https://example.com")), "/");
        assert_eq!(cache_key(&request("GET", "http://example.com?x=y")), "/?x=y");
    }
}
