use super::cache::WeatherCache;
use super::retry::RetryPolicy;
use crate::datasources::WeatherFetcher;
use crate::error::TransportError;
use crate::models::{WeatherSnapshot, Zone};
use chrono::{DateTime, Local, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Where the snapshot in a `Ready` state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    /// Fresh cache entry, no request made
    Cache,
    Network,
    /// Refresh failed; showing the last cached snapshot
    StaleCache,
}

impl DataOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataOrigin::Cache => "cache",
            DataOrigin::Network => "Open-Meteo",
            DataOrigin::StaleCache => "cache (stale)",
        }
    }
}

/// Non-fatal: a refresh failed but older data is still shown.
#[derive(Debug, Clone, PartialEq)]
pub struct StaleDataWarning {
    pub zone: String,
    pub fetched_at: DateTime<Utc>,
    pub cause: TransportError,
}

impl std::fmt::Display for StaleDataWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Showing cached data for {} from {}. Error: {}",
            self.zone,
            self.fetched_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M"),
            self.cause
        )
    }
}

#[derive(Debug, Clone, Default)]
pub enum FetchState {
    /// No zone selected
    #[default]
    Empty,
    Loading {
        zone: Zone,
    },
    Ready {
        zone: Zone,
        snapshot: Arc<WeatherSnapshot>,
        fetched_at: DateTime<Utc>,
        origin: DataOrigin,
        warning: Option<StaleDataWarning>,
    },
    Failed {
        zone: Zone,
        error: String,
    },
}

impl FetchState {
    pub fn zone(&self) -> Option<&Zone> {
        match self {
            FetchState::Empty => None,
            FetchState::Loading { zone }
            | FetchState::Ready { zone, .. }
            | FetchState::Failed { zone, .. } => Some(zone),
        }
    }

    pub fn snapshot(&self) -> Option<&WeatherSnapshot> {
        match self {
            FetchState::Ready { snapshot, .. } => Some(snapshot),
            _ => None,
        }
    }

    pub fn warning(&self) -> Option<&StaleDataWarning> {
        match self {
            FetchState::Ready { warning, .. } => warning.as_ref(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FetchState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading { .. })
    }
}

/// Drives one zone selection at a time through cache lookup, fetch and
/// fallback.
///
/// Every selection takes a generation number when it is issued. A result is
/// applied only while its generation is still the latest, so a slow fetch for
/// an earlier selection can never overwrite a later one.
pub struct FetchOrchestrator<F: WeatherFetcher> {
    inner: Arc<Inner<F>>,
}

struct Inner<F> {
    fetcher: F,
    cache: WeatherCache,
    retry: RetryPolicy,
    generation: AtomicU64,
    /// Zone of the latest issued selection
    selected: Mutex<Option<Zone>>,
    state: RwLock<FetchState>,
}

impl<F: WeatherFetcher> std::fmt::Debug for FetchOrchestrator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOrchestrator").finish_non_exhaustive()
    }
}

impl<F: WeatherFetcher> Clone for FetchOrchestrator<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: WeatherFetcher> FetchOrchestrator<F> {
    pub fn new(fetcher: F, cache: WeatherCache, retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                cache,
                retry,
                generation: AtomicU64::new(0),
                selected: Mutex::new(None),
                state: RwLock::new(FetchState::Empty),
            }),
        }
    }

    #[cfg(test)]
    pub fn cache(&self) -> &WeatherCache {
        &self.inner.cache
    }

    pub async fn state(&self) -> FetchState {
        self.inner.state.read().await.clone()
    }

    /// Zone of the most recent selection, even if it is still loading.
    pub fn selected(&self) -> Option<Zone> {
        self.lock_selected().clone()
    }

    fn lock_selected(&self) -> std::sync::MutexGuard<'_, Option<Zone>> {
        self.inner
            .selected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn issue(&self, zone: &Option<Zone>) -> u64 {
        let mut selected = self.lock_selected();
        *selected = zone.clone();
        self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Select a zone (or none) and resolve it to a terminal state.
    ///
    /// Returns the state after this selection; if a newer selection was
    /// issued meanwhile, that is whatever the newer one has applied so far.
    pub async fn select(&self, zone: Option<Zone>) -> FetchState {
        let generation = self.issue(&zone);
        self.run(generation, zone).await
    }

    /// Like [`select`](Self::select) but on a background task. The selection
    /// order is fixed here, when the call is made, not when the task runs.
    pub fn spawn_select(&self, zone: Option<Zone>) -> tokio::task::JoinHandle<FetchState> {
        let generation = self.issue(&zone);
        let this = self.clone();
        tokio::spawn(async move { this.run(generation, zone).await })
    }

    /// Re-run the current selection, refetching if the cache is stale.
    pub async fn refresh(&self) -> FetchState {
        let zone = self.selected();
        self.select(zone).await
    }

    /// Refresh when the shown data has outlived the TTL or the last attempt
    /// failed. Returns `None` when nothing needed doing, including when a
    /// newer selection was issued while deciding.
    pub async fn refresh_if_stale(&self) -> Option<FetchState> {
        let (observed, zone) = {
            let selected = self.lock_selected();
            (self.inner.generation.load(Ordering::SeqCst), selected.clone())
        };

        let needs_refresh = match &*self.inner.state.read().await {
            FetchState::Ready { fetched_at, .. } => {
                Utc::now() - *fetched_at >= self.inner.cache.ttl()
            }
            FetchState::Failed { .. } => true,
            FetchState::Empty | FetchState::Loading { .. } => false,
        };
        if !needs_refresh {
            return None;
        }

        let generation = {
            let _selected = self.lock_selected();
            self.inner
                .generation
                .compare_exchange(observed, observed + 1, Ordering::SeqCst, Ordering::SeqCst)
                .ok()?
                + 1
        };
        debug!(generation, "Periodic refresh of stale weather");
        Some(self.run(generation, zone).await)
    }

    async fn run(&self, generation: u64, zone: Option<Zone>) -> FetchState {
        let Some(zone) = zone else {
            debug!("No zone selected");
            return self.apply(generation, FetchState::Empty).await;
        };

        self.apply(generation, FetchState::Loading { zone: zone.clone() })
            .await;
        let resolved = self.resolve(zone).await;
        self.apply(generation, resolved).await
    }

    async fn resolve(&self, zone: Zone) -> FetchState {
        let cache = &self.inner.cache;

        if let Some(entry) = cache.get(&zone.key) {
            if cache.is_entry_fresh(&entry, Utc::now()) {
                debug!(zone = %zone.key, fetched_at = %entry.fetched_at, "Serving fresh cached weather");
                return FetchState::Ready {
                    zone,
                    snapshot: Arc::new(entry.snapshot),
                    fetched_at: entry.fetched_at,
                    origin: DataOrigin::Cache,
                    warning: None,
                };
            }
            debug!(zone = %zone.key, fetched_at = %entry.fetched_at, "Cached weather is stale");
        }

        let coordinates = zone.coordinates;
        let fetcher = &self.inner.fetcher;
        match self.inner.retry.run(|| fetcher.fetch(coordinates)).await {
            Ok(snapshot) => {
                let fetched_at = Utc::now();
                if let Err(e) = cache.put(&zone.key, snapshot.clone(), fetched_at) {
                    warn!(zone = %zone.key, "Failed to cache weather snapshot: {}", e);
                }
                info!(zone = %zone.key, "Weather data refreshed");
                FetchState::Ready {
                    zone,
                    snapshot: Arc::new(snapshot),
                    fetched_at,
                    origin: DataOrigin::Network,
                    warning: None,
                }
            }
            Err(cause) => match cache.get(&zone.key) {
                Some(entry) => {
                    warn!(zone = %zone.key, "Weather refresh failed, falling back to cache: {}", cause);
                    FetchState::Ready {
                        warning: Some(StaleDataWarning {
                            zone: zone.name.clone(),
                            fetched_at: entry.fetched_at,
                            cause,
                        }),
                        zone,
                        snapshot: Arc::new(entry.snapshot),
                        fetched_at: entry.fetched_at,
                        origin: DataOrigin::StaleCache,
                    }
                }
                None => {
                    warn!(zone = %zone.key, "Weather fetch failed with nothing cached: {}", cause);
                    FetchState::Failed {
                        error: format!("No data available for {}: {}", zone.name, cause),
                        zone,
                    }
                }
            },
        }
    }

    async fn apply(&self, generation: u64, next: FetchState) -> FetchState {
        let mut state = self.inner.state.write().await;
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "Discarding result of a superseded selection");
            return state.clone();
        }
        *state = next.clone();
        next
    }
}
