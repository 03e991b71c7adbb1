//! Memoizing wrappers over a [`TtlCache`].
//!
//! `memoize` wraps a plain function and `memoize_async` wraps one returning a
//! future; the wrapper keeps the calling convention of what it wraps. Keys are
//! derived from the argument bundle with [`key_for`], so tuples are positional
//! arguments and structs are keyword arguments.
//!
//! Errors from the wrapped operation are returned as-is and never cached.

use std::future::Future;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;

use crate::cache::key::key_for;
use crate::cache::store::TtlCache;
use crate::config::CacheConfig;

/// Per-operation memoization settings.
#[derive(Debug, Clone)]
pub struct MemoizeConfig {
    pub ttl: Duration,
    pub key_prefix: String,
}

impl MemoizeConfig {
    pub fn new(key_prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            ttl,
            key_prefix: key_prefix.into(),
        }
    }

    /// Use the configured `cache.default_ttl_secs`.
    pub fn with_default_ttl(key_prefix: impl Into<String>, config: &CacheConfig) -> Self {
        Self::new(key_prefix, config.default_ttl())
    }

    /// `None` when the arguments cannot be serialized; the call then bypasses the cache.
    fn key<A: Serialize>(&self, args: &A) -> Option<String> {
        match key_for(&self.key_prefix, args) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(prefix = %self.key_prefix, error = %e, "Arguments not serializable, skipping cache");
                None
            }
        }
    }
}

/// Wrap a synchronous operation.
pub fn memoize<A, V, E, F>(
    cache: TtlCache<V>,
    config: MemoizeConfig,
    op: F,
) -> impl Fn(A) -> Result<V, E>
where
    A: Serialize,
    V: Clone,
    F: Fn(A) -> Result<V, E>,
{
    move |args: A| {
        let Some(key) = config.key(&args) else {
            return op(args);
        };
        if let Some(value) = cache.get(&key) {
            return Ok(value);
        }

        let value = op(args)?;
        cache.set(&key, value.clone(), config.ttl);
        Ok(value)
    }
}

/// Wrap an asynchronous operation.
///
/// The cache adds no suspension points of its own; the returned future only
/// awaits the wrapped one on a miss.
pub fn memoize_async<A, V, E, F, Fut>(
    cache: TtlCache<V>,
    config: MemoizeConfig,
    op: F,
) -> impl Fn(A) -> BoxFuture<'static, Result<V, E>> + Send + Sync
where
    A: Serialize,
    V: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    move |args: A| {
        let key = config.key(&args);
        if let Some(value) = key.as_deref().and_then(|k| cache.get(k)) {
            return futures_util::future::ready(Ok(value)).boxed();
        }

        let pending = op(args);
        let cache = cache.clone();
        let ttl = config.ttl;
        async move {
            let value = pending.await?;
            if let Some(key) = key {
                cache.set(&key, value.clone(), ttl);
            }
            Ok(value)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn cache() -> (TtlCache<u64>, ManualClock) {
        let clock = ManualClock::new();
        (TtlCache::new(0, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_sync_hits_within_ttl() {
        let (cache, clock) = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let add = memoize(
            cache.clone(),
            MemoizeConfig::new("add", Duration::from_secs(10)),
            move |(a, b): (u64, u64)| -> Result<u64, String> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(a + b)
            },
        );

        assert_eq!(add((1, 2)), Ok(3));
        assert_eq!(add((1, 2)), Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Different positional order is a different key
        assert_eq!(add((2, 1)), Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        clock.advance_secs(11);
        assert_eq!(add((1, 2)), Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_sync_errors_not_cached() {
        let (cache, _clock) = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let flaky = memoize(
            cache.clone(),
            MemoizeConfig::new("flaky", Duration::from_secs(10)),
            move |id: u64| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err("backend down")
                } else {
                    Ok(id * 10)
                }
            },
        );

        assert_eq!(flaky(4), Err("backend down"));
        assert!(cache.is_empty());
        assert_eq!(flaky(4), Ok(40));
        assert_eq!(flaky(4), Ok(40));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_default_ttl_from_config() {
        let (cache, clock) = cache();
        let config = CacheConfig {
            default_ttl_secs: 20,
            ..CacheConfig::default()
        };
        let memo = MemoizeConfig::with_default_ttl("square", &config);
        assert_eq!(memo.ttl, Duration::from_secs(20));

        let square = memoize(cache.clone(), memo, |n: u64| Ok::<_, ()>(n * n));
        assert_eq!(square(3), Ok(9));
        let key = key_for("square", &3u64).unwrap();
        assert_eq!(cache.remaining_ttl(&key), Some(Duration::from_secs(20)));

        clock.advance_secs(21);
        assert_eq!(cache.remaining_ttl(&key), None);
    }

    #[tokio::test]
    async fn test_async_hits_within_ttl() {
        let (cache, _clock) = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let lookup = memoize_async(
            cache.clone(),
            MemoizeConfig::new("lookup", Duration::from_secs(5)),
            move |id: u64| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    Ok::<_, std::io::Error>(id + 100)
                }
            },
        );

        assert_eq!(lookup(1).await.unwrap(), 101);
        assert_eq!(lookup(1).await.unwrap(), 101);
        assert_eq!(lookup(2).await.unwrap(), 102);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_async_errors_propagate() {
        let (cache, _clock) = cache();
        let failing = memoize_async(
            cache.clone(),
            MemoizeConfig::new("failing", Duration::from_secs(5)),
            |_: u64| async { Err::<u64, _>("nope") },
        );

        assert_eq!(failing(1).await, Err("nope"));
        assert!(cache.is_empty());
    }
}
