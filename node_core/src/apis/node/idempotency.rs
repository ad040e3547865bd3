use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use super::error::*;

/// Outcome of [`IdempotencyCache::run_once`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Now,
    Earlier,
}

/// Remembers the idempotency keys of recently applied writes.
///
/// Keys are scoped by method so the same key sent to two methods applies both.
/// Only successful writes are remembered; a failed write can be retried with
/// the same key.
pub struct IdempotencyCache {
    seen: Option<Mutex<LruCache<(String, String), ()>>>,
}

impl IdempotencyCache {
    /// A capacity of zero disables deduplication.
    pub fn new(capacity: usize) -> Self {
        IdempotencyCache {
            seen: NonZeroUsize::new(capacity).map(|capacity| Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Runs `apply` unless `key` was already applied for `method`.
    ///
    /// The cache stays locked while `apply` runs, so two concurrent calls with
    /// the same key apply once.
    pub fn run_once<F>(&self, method: &str, key: Option<&str>, apply: F) -> Result<Applied, ApiError>
    where
        F: FnOnce() -> Result<(), ApiError>,
    {
        let (Some(seen), Some(key)) = (&self.seen, key.filter(|k| !k.is_empty())) else {
            apply()?;
            return Ok(Applied::Now);
        };

        let mut seen = seen.lock().map_err(|_| StateLockingSnafu {}.build())?;
        let entry = (method.to_string(), key.to_string());
        if seen.get(&entry).is_some() {
            tracing::debug!(method, key, "Skipping duplicate write");
            return Ok(Applied::Earlier);
        }
        apply()?;
        seen.put(entry, ());
        Ok(Applied::Now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_same_key_applies_once() {
        let cache = IdempotencyCache::new(8);
        let applied = Cell::new(0);
        let apply = || {
            applied.set(applied.get() + 1);
            Ok(())
        };
        assert_eq!(cache.run_once("PutNodeInfo", Some("k1"), apply).unwrap(), Applied::Now);
        assert_eq!(cache.run_once("PutNodeInfo", Some("k1"), apply).unwrap(), Applied::Earlier);
        assert_eq!(cache.run_once("PutPeerInfo", Some("k1"), apply).unwrap(), Applied::Now);
        assert_eq!(applied.get(), 2);
    }

    #[test]
    fn test_calls_without_key_always_apply() {
        let cache = IdempotencyCache::new(8);
        let applied = Cell::new(0);
        let apply = || {
            applied.set(applied.get() + 1);
            Ok(())
        };
        cache.run_once("PutNodeInfo", None, apply).unwrap();
        cache.run_once("PutNodeInfo", Some(""), apply).unwrap();
        assert_eq!(applied.get(), 2);
    }

    #[test]
    fn test_failed_write_is_not_remembered() {
        let cache = IdempotencyCache::new(8);
        let result = cache.run_once("PutNodeInfo", Some("k1"), || {
            InvalidArgumentSnafu {
                argument: "peer id is required".to_string(),
            }
            .fail()
        });
        assert!(result.is_err());
        assert_eq!(
            cache.run_once("PutNodeInfo", Some("k1"), || Ok(())).unwrap(),
            Applied::Now
        );
    }

    #[test]
    fn test_oldest_key_is_evicted() {
        let cache = IdempotencyCache::new(2);
        for key in ["a", "b", "c"] {
            cache.run_once("PutNodeInfo", Some(key), || Ok(())).unwrap();
        }
        assert_eq!(
            cache.run_once("PutNodeInfo", Some("a"), || Ok(())).unwrap(),
            Applied::Now
        );
        assert_eq!(
            cache.run_once("PutNodeInfo", Some("c"), || Ok(())).unwrap(),
            Applied::Earlier
        );
    }

    #[test]
    fn test_zero_capacity_disables_deduplication() {
        let cache = IdempotencyCache::new(0);
        cache.run_once("PutNodeInfo", Some("k1"), || Ok(())).unwrap();
        assert_eq!(
            cache.run_once("PutNodeInfo", Some("k1"), || Ok(())).unwrap(),
            Applied::Now
        );
    }
}
