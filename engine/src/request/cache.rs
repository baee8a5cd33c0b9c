//! Short-lived cache for successful GET responses
//!
//! Entries are keyed by the full request identity and carry their own
//! time-to-live, checked against the tokio clock on every read. A per-entry
//! time-to-live above the configured ceiling is clamped to it on insert, so
//! what the reader checks matches what moka keeps.

use bytes::Bytes;
use metrics::counter;
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::types::RequestKey;

/// Configuration for the response cache
#[derive(Debug, Clone)]
pub struct ResponseCacheConfig {
    /// Maximum number of cached responses (default: 256)
    pub max_entries: u64,
    /// Upper bound on any entry's lifetime (default: 30 seconds)
    pub ttl_ceiling: Duration,
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 256,
            ttl_ceiling: Duration::from_secs(30),
        }
    }
}

#[derive(Clone)]
struct CachedResponse {
    body: Bytes,
    stored_at: Instant,
    ttl: Duration,
}

pub struct ResponseCache {
    cache: Cache<RequestKey, CachedResponse>,
    ttl_ceiling: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    pub fn new(config: ResponseCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl_ceiling)
            .build();

        Self {
            cache,
            ttl_ceiling: config.ttl_ceiling,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(ResponseCacheConfig::default())
    }

    /// Get a cached body if present and still fresh
    pub async fn get(&self, key: &RequestKey) -> Option<Bytes> {
        let fresh = match self.cache.get(key).await {
            Some(entry) if entry.stored_at.elapsed() < entry.ttl => Some(entry.body),
            Some(_) => {
                self.cache.invalidate(key).await;
                None
            }
            None => None,
        };

        if fresh.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            counter!("overlay_response_cache_hits_total").increment(1);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            counter!("overlay_response_cache_misses_total").increment(1);
        }

        fresh
    }

    pub async fn insert(&self, key: RequestKey, body: Bytes, ttl: Duration) {
        let ttl = if ttl > self.ttl_ceiling {
            debug!(
                "Clamping cache ttl for {} from {:?} to {:?}",
                key, ttl, self.ttl_ceiling
            );
            self.ttl_ceiling
        } else {
            ttl
        };
        self.cache
            .insert(
                key,
                CachedResponse {
                    body,
                    stored_at: Instant::now(),
                    ttl,
                },
            )
            .await;
    }

    pub async fn invalidate(&self, key: &RequestKey) {
        self.cache.invalidate(key).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Get the current hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
