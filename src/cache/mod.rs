//! In-process response caching.
//!
//! Three pieces, leaves first:
//!
//! - [`CacheStore`]: bounded, lock-guarded LRU map from cache key to value.
//! - [`CachePolicy`]: classifies a request method as a cacheable read, an
//!   invalidating write, or passthrough.
//! - [`CacheLayer`]: wraps handlers so they consult the store according to the
//!   policy.
//!
//! ```rust,no_run
//! use rttp_cache::cache::{CacheConfig, CacheLayer};
//!
//! let cache = CacheLayer::from_config(&CacheConfig::default().capacity(256))?;
//! # Ok::<(), rttp_cache::cache::ConfigError>(())
//! ```
//!
//! The store is always injected; there is no process-wide cache. Only `Ok`
//! results with a 2xx status are stored, and invalidating writes remove the
//! entry before their handler runs, whether or not the handler then succeeds.

mod config;
mod layer;
mod policy;
mod store;

pub use config::{CacheConfig, ConfigError};
pub use layer::{CacheLayer, CacheLayerBuilder, CachedHandler, CachedResponse, ResponseStore};
pub use policy::{CachePolicy, Interception, cache_key};
pub use store::{CacheEntry, CacheStats, CacheStore};
