//! Memoization wrapper around async fetch operations
//!
//! [`Memoized`] adapts any fetch function with "check store → return fresh
//! hit, else call through and persist" logic. It is the only mechanism the
//! data sources use for rate limiting: a wrapped operation reaches its real
//! upstream at most roughly once per validity window per distinct argument
//! set, no matter how many refresh triggers fire.
//!
//! The check-then-act sequence is deliberately unsynchronized, matching the
//! shared-directory model: two callers that observe a miss at the same moment
//! both fetch and both write, last write wins. The guarantee is approximate,
//! not hard.

use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;

use super::key;
use super::store::FileCache;

/// Wraps a fetch operation with a file-backed memo keyed on its arguments.
///
/// Construct one per logical operation; the namespace doubles as the storage
/// partition and the key prefix, so it must be unique per operation.
#[derive(Debug, Clone)]
pub struct Memoized<F> {
    cache: Option<FileCache>,
    namespace: String,
    ttl: Duration,
    fetch: F,
}

impl<F> Memoized<F> {
    /// Creates a wrapper for `fetch` with the given validity window.
    ///
    /// With `cache: None` (no resolvable cache directory, or caching disabled)
    /// every call goes straight through to `fetch`.
    pub fn new(
        cache: Option<FileCache>,
        namespace: impl Into<String>,
        ttl: Duration,
        fetch: F,
    ) -> Self {
        Self {
            cache,
            namespace: namespace.into(),
            ttl,
            fetch,
        }
    }

    /// Invokes the wrapped operation, serving from the store when a fresh
    /// entry exists.
    ///
    /// - On a hit, the stored payload is returned and `fetch` is not invoked.
    /// - On a miss, `fetch` runs; its error propagates unchanged and nothing
    ///   is written. Failures are never cached.
    /// - A successful fresh value is persisted best-effort: a write failure
    ///   is logged and the value is returned anyway. A live, uncached result
    ///   always beats a consistency error.
    /// - If the arguments cannot be serialized into a key, the call skips the
    ///   cache entirely.
    pub async fn call<A, T, E, Fut>(&self, args: A) -> Result<T, E>
    where
        A: Serialize,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + DeserializeOwned,
    {
        let key = match key::derive(&self.namespace, &args) {
            Ok(key) => Some(key),
            Err(e) => {
                log::warn!("uncacheable arguments for {}: {e}", self.namespace);
                None
            }
        };

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(hit) = cache.get::<T>(&self.namespace, key, self.ttl) {
                log::debug!("cache hit for {}/{key}", self.namespace);
                return Ok(hit);
            }
        }

        let fresh = (self.fetch)(args).await?;

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            match cache.put(&self.namespace, key, &fresh) {
                Ok(path) => log::debug!("cached {}/{key} at {}", self.namespace, path.display()),
                Err(e) => log::warn!("failed to cache {}/{key}: {e}", self.namespace),
            }
        }

        Ok(fresh)
    }
}
