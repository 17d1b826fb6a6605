//! Polling cache between the dashboard and the store.
//!
//! Bounds remote reads to one per `min_interval` per query while keeping the
//! view live. Each query shape gets its own slot; the slot's async mutex is
//! held across the remote fetch, so concurrent callers queue behind the
//! in-flight refresh and then read its result instead of fetching again.
//!
//! Entries are immutable and only replaced wholesale on a successful fetch.
//! A failed fetch leaves the previous entry in place (last-known-good). A
//! dropped `get_window` future releases the slot without touching it.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{CacheError, StoreError};
use crate::sample::SampleWindow;
use crate::store::SampleStore;

/// Shape of a window read; the cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowQuery {
    /// The `n` most recent samples
    Latest(usize),
    /// Everything stamped at or after `now - lookback`
    Since(Duration),
}

impl WindowQuery {
    pub fn last_hours(hours: u64) -> Self {
        WindowQuery::Since(Duration::from_secs(hours * 3600))
    }

    pub fn describe(&self) -> String {
        match self {
            WindowQuery::Latest(n) => format!("last {} readings", n),
            WindowQuery::Since(d) if d.as_secs() % 3600 == 0 => {
                format!("last {} hour(s)", d.as_secs() / 3600)
            }
            WindowQuery::Since(d) => format!("last {}s", d.as_secs()),
        }
    }

    async fn fetch(&self, store: &dyn SampleStore) -> Result<SampleWindow, StoreError> {
        match *self {
            WindowQuery::Latest(n) => store.query_latest(n).await,
            WindowQuery::Since(lookback) => {
                let lookback = chrono::Duration::from_std(lookback)
                    .unwrap_or_else(|_| chrono::Duration::days(365));
                store.query_since(Utc::now() - lookback).await
            }
        }
    }
}

/// One successful fetch. Never mutated after creation.
#[derive(Debug)]
pub struct CacheEntry {
    window: SampleWindow,
    fetched_at: Instant,
    fetched_wall: DateTime<Utc>,
    version: u64,
}

impl CacheEntry {
    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    pub fn fetched_wall(&self) -> DateTime<Utc> {
        self.fetched_wall
    }

    /// Increments each time the slot's entry is replaced
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.fetched_at)
    }
}

/// How the returned entry relates to this call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Fetched by this call (or the refresh it waited on)
    Fresh,
    /// Served from cache, still inside the refresh interval
    Stale,
    /// Served from cache because the latest refresh failed
    LastKnownGood,
}

/// Result of `get_window`
#[derive(Debug, Clone)]
pub struct WindowSnapshot {
    pub entry: Arc<CacheEntry>,
    pub freshness: Freshness,
}

impl WindowSnapshot {
    pub fn window(&self) -> &SampleWindow {
        self.entry.window()
    }

    pub fn is_same_entry(&self, other: &WindowSnapshot) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }
}

/// Counters exposed for status output and tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheHealth {
    pub remote_fetches: u64,
    pub cache_hits: u64,
    /// Calls that waited on another caller's refresh and took its result
    pub shared_refreshes: u64,
    pub failed_refreshes: u64,
    pub discarded_regressions: u64,
}

#[derive(Debug, Default)]
struct HealthCounters {
    remote_fetches: AtomicU64,
    cache_hits: AtomicU64,
    shared_refreshes: AtomicU64,
    failed_refreshes: AtomicU64,
    discarded_regressions: AtomicU64,
}

#[derive(Debug, Default)]
struct Slot {
    entry: Option<Arc<CacheEntry>>,
    last_attempt: Option<Instant>,
    last_error: Option<StoreError>,
    /// Whether the most recent completed fetch replaced the entry
    last_fetch_replaced: bool,
    next_version: u64,
}

impl Slot {
    fn serve(&self) -> Result<WindowSnapshot, CacheError> {
        let entry = self.entry.clone().ok_or(CacheError::NoDataAvailable)?;
        let freshness = if self.last_error.is_some() {
            Freshness::LastKnownGood
        } else {
            Freshness::Stale
        };
        Ok(WindowSnapshot { entry, freshness })
    }

    /// Outcome of a fetch some other caller completed while this one waited
    fn serve_shared(&self) -> Result<WindowSnapshot, CacheError> {
        let mut snapshot = self.serve()?;
        if snapshot.freshness == Freshness::Stale && self.last_fetch_replaced {
            snapshot.freshness = Freshness::Fresh;
        }
        Ok(snapshot)
    }
}

/// A slot plus a lock-free count of completed fetches, readable before
/// queueing on the slot
#[derive(Debug, Default)]
struct SlotCell {
    slot: tokio::sync::Mutex<Slot>,
    completed_fetches: AtomicU64,
}

pub struct PollingCache {
    store: Arc<dyn SampleStore>,
    min_interval: Duration,
    slots: Mutex<HashMap<WindowQuery, Arc<SlotCell>>>,
    health: HealthCounters,
}

impl PollingCache {
    pub fn new(store: Arc<dyn SampleStore>, min_interval: Duration) -> Self {
        Self {
            store,
            min_interval,
            slots: Mutex::new(HashMap::new()),
            health: HealthCounters::default(),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn store(&self) -> &Arc<dyn SampleStore> {
        &self.store
    }

    fn cell(&self, query: WindowQuery) -> Arc<SlotCell> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(slots.entry(query).or_default())
    }

    /// Current window for `query`, refreshing from the store when the slot is
    /// empty or older than the refresh interval.
    ///
    /// Store failures are never returned: the previous entry is served
    /// instead. Only when nothing was ever fetched does this fail.
    pub async fn get_window(&self, query: WindowQuery) -> Result<WindowSnapshot, CacheError> {
        let cell = self.cell(query);
        let seen = cell.completed_fetches.load(Ordering::Acquire);
        let mut slot = cell.slot.lock().await;

        if cell.completed_fetches.load(Ordering::Acquire) != seen {
            self.health.shared_refreshes.fetch_add(1, Ordering::Relaxed);
            return slot.serve_shared();
        }

        if let Some(last) = slot.last_attempt {
            if last.elapsed() < self.min_interval {
                self.health.cache_hits.fetch_add(1, Ordering::Relaxed);
                return slot.serve();
            }
        }

        self.health.remote_fetches.fetch_add(1, Ordering::Relaxed);
        let result = query.fetch(self.store.as_ref()).await;
        let now = Instant::now();
        slot.last_attempt = Some(now);
        slot.last_fetch_replaced = false;
        cell.completed_fetches.fetch_add(1, Ordering::Release);

        match result {
            Ok(window) => {
                let regressed = match (&slot.entry, window.newest_timestamp()) {
                    (Some(prev), newest) => newest < prev.window.newest_timestamp(),
                    (None, _) => false,
                };
                if regressed {
                    // Keep the newer entry; a lagging replica must not move the view backwards
                    self.health.discarded_regressions.fetch_add(1, Ordering::Relaxed);
                    warn!("Discarding {} window older than cached entry", query.describe());
                    slot.last_error = None;
                    return slot.serve();
                }

                slot.next_version += 1;
                let entry = Arc::new(CacheEntry {
                    window,
                    fetched_at: now,
                    fetched_wall: Utc::now(),
                    version: slot.next_version,
                });
                debug!(
                    "Refreshed {} (v{}, {} samples)",
                    query.describe(),
                    entry.version,
                    entry.window.len()
                );
                slot.entry = Some(Arc::clone(&entry));
                slot.last_error = None;
                slot.last_fetch_replaced = true;
                Ok(WindowSnapshot {
                    entry,
                    freshness: Freshness::Fresh,
                })
            }
            Err(e) => {
                self.health.failed_refreshes.fetch_add(1, Ordering::Relaxed);
                warn!("Refresh of {} failed ({}): {}", query.describe(), e.kind(), e);
                slot.last_error = Some(e);
                slot.serve()
            }
        }
    }

    /// Error recorded by the most recent refresh of `query`, if it failed
    pub async fn last_error(&self, query: WindowQuery) -> Option<StoreError> {
        let cell = self.cell(query);
        let slot = cell.slot.lock().await;
        slot.last_error.clone()
    }

    /// Make the next read of every query go to the store.
    ///
    /// Entries stay in place: they are still served if that read fails, and
    /// still bound how far back a refreshed window may go. An in-flight
    /// refresh is waited for, not duplicated.
    pub async fn invalidate(&self) {
        let cells: Vec<Arc<SlotCell>> = {
            let slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            slots.values().cloned().collect()
        };
        for cell in cells {
            cell.slot.lock().await.last_attempt = None;
        }
        debug!("Cache invalidated");
    }

    pub fn health(&self) -> CacheHealth {
        CacheHealth {
            remote_fetches: self.health.remote_fetches.load(Ordering::Relaxed),
            cache_hits: self.health.cache_hits.load(Ordering::Relaxed),
            shared_refreshes: self.health.shared_refreshes.load(Ordering::Relaxed),
            failed_refreshes: self.health.failed_refreshes.load(Ordering::Relaxed),
            discarded_regressions: self.health.discarded_regressions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_descriptions() {
        assert_eq!(WindowQuery::Latest(25).describe(), "last 25 readings");
        assert_eq!(WindowQuery::last_hours(6).describe(), "last 6 hour(s)");
        assert_eq!(WindowQuery::Since(Duration::from_secs(90)).describe(), "last 90s");
    }

    #[test]
    fn test_empty_slot_has_no_data() {
        let slot = Slot::default();
        assert_eq!(slot.serve().unwrap_err(), CacheError::NoDataAvailable);
    }
}
