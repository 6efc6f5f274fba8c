use crate::error::Result;
use crate::models::{CacheEntry, WeatherSnapshot};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub const DEFAULT_TTL_MINUTES: i64 = 30;

/// Key-value storage behind [`WeatherCache`].
///
/// Keys are zone keys. Implementations must tolerate concurrent access for
/// different keys.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    fn put(&self, key: &str, entry: &CacheEntry) -> Result<()>;
    /// Remove every entry, returning how many were dropped
    fn clear(&self) -> Result<usize>;
}

#[cfg(test)]
pub use memory::MemoryStore;

#[cfg(test)]
mod memory {
    use super::CacheStore;
    use crate::error::Result;
    use crate::models::CacheEntry;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Process-local store backing unit tests.
    #[derive(Debug, Default)]
    pub struct MemoryStore {
        entries: Mutex<HashMap<String, CacheEntry>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
            // A poisoned map is still a valid map
            self.entries.lock().unwrap_or_else(|e| e.into_inner())
        }
    }

    impl CacheStore for MemoryStore {
        fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
            Ok(self.lock().get(key).cloned())
        }

        fn put(&self, key: &str, entry: &CacheEntry) -> Result<()> {
            self.lock().insert(key.to_string(), entry.clone());
            Ok(())
        }

        fn clear(&self) -> Result<usize> {
            let mut entries = self.lock();
            let count = entries.len();
            entries.clear();
            Ok(count)
        }
    }
}

/// Last fetched snapshot per zone, with TTL-based freshness.
///
/// Entries are never evicted; a stale entry stays around as the fallback for
/// a failed refresh until a newer fetch overwrites it.
#[derive(Clone)]
pub struct WeatherCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl WeatherCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Duration::minutes(DEFAULT_TTL_MINUTES),
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up the entry for a zone. Store failures are logged and read as a
    /// miss.
    pub fn get(&self, zone_key: &str) -> Option<CacheEntry> {
        match self.store.get(zone_key) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(zone = zone_key, "Failed to read weather cache: {}", e);
                None
            }
        }
    }

    /// Overwrite the entry for a zone.
    pub fn put(
        &self,
        zone_key: &str,
        snapshot: WeatherSnapshot,
        fetched_at: DateTime<Utc>,
    ) -> Result<()> {
        let entry = CacheEntry {
            snapshot,
            fetched_at,
        };
        self.store.put(zone_key, &entry)?;
        tracing::debug!(zone = zone_key, %fetched_at, "Weather cache updated");
        Ok(())
    }

    pub fn is_fresh(entry: &CacheEntry, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - entry.fetched_at < ttl
    }

    /// Freshness against this cache's configured TTL
    pub fn is_entry_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        Self::is_fresh(entry, now, self.ttl)
    }
}

impl std::fmt::Debug for WeatherCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherCache")
            .field("ttl_minutes", &self.ttl.num_minutes())
            .finish()
    }
}
