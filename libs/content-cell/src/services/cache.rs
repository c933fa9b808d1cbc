use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

struct CachedPage {
    html: String,
    stored_at: Instant,
}

impl CachedPage {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() > ttl
    }
}

/// Rendered HTML keyed by url path. A zero TTL disables caching.
///
/// Every `clear` bumps the generation. Renders started before a clear are
/// not stored.
pub struct PageCache {
    ttl: Duration,
    generation: AtomicU64,
    entries: RwLock<HashMap<String, CachedPage>>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            generation: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Taken before rendering and handed back to [`PageCache::put`].
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub async fn get(&self, path: &str) -> Option<String> {
        let mut entries = self.entries.write().await;
        match entries.get(path) {
            Some(entry) if entry.is_expired(self.ttl) => {
                entries.remove(path);
                debug!("Page cache expired: {}", path);
                None
            }
            Some(entry) => {
                debug!("Page cache hit: {}", path);
                Some(entry.html.clone())
            }
            None => None,
        }
    }

    pub async fn put(&self, path: &str, html: String, generation: u64) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.write().await;
        if self.generation() != generation {
            debug!("Dropping render of {} from before a cache clear", path);
            return;
        }
        entries.insert(
            path.to_string(),
            CachedPage {
                html,
                stored_at: Instant::now(),
            },
        );
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        if !entries.is_empty() {
            debug!("Cleared {} cached pages", entries.len());
            entries.clear();
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_are_served_until_cleared() {
        let cache = PageCache::new(Duration::from_secs(60));
        cache.put("/", "<h1>Home</h1>".to_string(), cache.generation()).await;

        assert_eq!(cache.get("/").await.as_deref(), Some("<h1>Home</h1>"));
        assert_eq!(cache.get("/blog/").await, None);

        cache.clear().await;
        assert_eq!(cache.len().await, 0);
        assert_eq!(cache.get("/").await, None);
    }

    #[tokio::test]
    async fn expired_entries_are_dropped() {
        let cache = PageCache::new(Duration::from_millis(5));
        cache.put("/", "stale".to_string(), cache.generation()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(cache.get("/").await, None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn zero_ttl_disables_caching() {
        let cache = PageCache::new(Duration::ZERO);
        cache.put("/", "html".to_string(), cache.generation()).await;
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn renders_from_before_a_clear_are_not_stored() {
        let cache = PageCache::new(Duration::from_secs(60));
        let started = cache.generation();
        cache.clear().await;

        cache.put("/", "stale".to_string(), started).await;
        assert_eq!(cache.get("/").await, None);

        cache.put("/", "fresh".to_string(), cache.generation()).await;
        assert_eq!(cache.get("/").await.as_deref(), Some("fresh"));
    }
}
