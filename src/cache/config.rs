//! Cache configuration and setup errors.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Method;

use super::CachePolicy;

/// Errors raised while wiring the cache up. These surface from setup
/// functions only; request handling never produces them.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no cache store was configured for the cache layer")]
    MissingStore,

    #[error("cache capacity must be greater than zero")]
    ZeroCapacity,

    #[error("cache ttl must be at least one millisecond")]
    ZeroTtl,

    #[error("{0} cannot be both cacheable and invalidating")]
    ConflictingMethod(Method),

    #[error("invalid cache configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tunables for the response cache.
///
/// Every field has a default, so a configuration document only needs the
/// values it changes:
///
/// ```
/// use rttp_cache::cache::CacheConfig;
///
/// let config = CacheConfig::from_json(r#"{ "capacity": 64, "ttl_ms": 30000 }"#).unwrap();
/// assert_eq!(config.capacity, 64);
/// assert_eq!(config.ttl_duration(), Some(std::time::Duration::from_secs(30)));
/// assert_eq!(config.cacheable_methods, vec![rttp_cache::Method::Get]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached responses before LRU eviction kicks in.
    pub capacity: usize,
    /// Milliseconds after which an entry is considered stale; `None` keeps
    /// entries until they are evicted or invalidated. Zero is rejected.
    pub ttl_ms: Option<u64>,
    /// Methods whose successful responses are cached.
    pub cacheable_methods: Vec<Method>,
    /// Methods that drop the cached entry for their target before running.
    pub invalidating_methods: Vec<Method>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            ttl_ms: None,
            cacheable_methods: vec![Method::Get],
            invalidating_methods: vec![Method::Put, Method::Patch],
        }
    }
}

impl CacheConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed JSON, otherwise whatever
    /// [`validate`](Self::validate) reports.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the entry lifetime. Millisecond precision; a non-zero duration
    /// shorter than that rounds up to one millisecond instead of to zero.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        let mut millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        if millis == 0 && !ttl.is_zero() {
            millis = 1;
        }
        self.ttl_ms = Some(millis);
        self
    }

    #[must_use]
    pub fn cacheable_method(mut self, method: Method) -> Self {
        self.cacheable_methods.push(method);
        self
    }

    #[must_use]
    pub fn invalidating_method(mut self, method: Method) -> Self {
        self.invalidating_methods.push(method);
        self
    }

    /// The configured entry lifetime, if any.
    pub fn ttl_duration(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }

    /// Checks the invariants the cache layer relies on.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ZeroCapacity`], [`ConfigError::ZeroTtl`] or
    /// [`ConfigError::ConflictingMethod`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.ttl_ms == Some(0) {
            return Err(ConfigError::ZeroTtl);
        }
        self.policy().map(|_| ())
    }

    /// The interception policy described by the method lists.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ConflictingMethod`] if a method is in both lists.
    pub fn policy(&self) -> Result<CachePolicy, ConfigError> {
        CachePolicy::new(
            self.cacheable_methods.iter().cloned(),
            self.invalidating_methods.iter().cloned(),
        )
    }
}
