//! Polling cache behaviour against scripted stores, on tokio's paused clock.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use orient_common::cache::{Freshness, PollingCache, WindowQuery};
use orient_common::error::{CacheError, StoreError};
use orient_common::sample::{CalibrationStatus, Orientation, Sample, SampleWindow, SensorReading, Vec3};
use orient_common::store::{MemoryStore, SampleStore};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const INTERVAL: Duration = Duration::from_millis(500);

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn sample(secs: i64) -> Sample {
    Sample::from_reading(
        "ESP32_001",
        ts(secs),
        SensorReading {
            orientation: Orientation::new(5.0, -3.0, 90.0),
            acceleration: Vec3::new(0.0, 0.0, 9.81),
            gyroscope: Vec3::default(),
            magnetometer: Vec3::new(20.0, 0.0, 40.0),
            temperature: 23.5,
            calibration: CalibrationStatus::fully_calibrated(),
        },
    )
}

/// Memory store with scripted failures, latency and a hang switch
#[derive(Default)]
struct ScriptedStore {
    inner: MemoryStore,
    calls: AtomicUsize,
    scripted: Mutex<VecDeque<Result<SampleWindow, StoreError>>>,
    latency: Mutex<Duration>,
    hang: AtomicBool,
}

impl ScriptedStore {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn push_response(&self, response: Result<SampleWindow, StoreError>) {
        self.scripted.lock().unwrap().push_back(response);
    }

    fn fail_next(&self) {
        self.push_response(Err(StoreError::Unavailable("connection reset".into())));
    }

    fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    async fn before_read(&self) -> Option<Result<SampleWindow, StoreError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.scripted.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl SampleStore for ScriptedStore {
    async fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        self.inner.append(sample).await
    }

    async fn query_latest(&self, n: usize) -> Result<SampleWindow, StoreError> {
        match self.before_read().await {
            Some(scripted) => scripted,
            None => self.inner.query_latest(n).await,
        }
    }

    async fn query_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<SampleWindow, StoreError> {
        match self.before_read().await {
            Some(scripted) => scripted,
            None => self.inner.query_range(from, to).await,
        }
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.inner.count().await
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

async fn setup() -> (Arc<ScriptedStore>, Arc<PollingCache>) {
    let store = Arc::new(ScriptedStore::default());
    store.append(&sample(1)).await.unwrap();
    let cache = Arc::new(PollingCache::new(store.clone(), INTERVAL));
    (store, cache)
}

#[tokio::test(start_paused = true)]
async fn test_reads_within_interval_share_one_entry() {
    let (store, cache) = setup().await;
    let q = WindowQuery::Latest(25);

    let first = cache.get_window(q).await.unwrap();
    store.append(&sample(2)).await.unwrap();
    tokio::time::advance(Duration::from_millis(300)).await;
    let second = cache.get_window(q).await.unwrap();

    assert!(first.is_same_entry(&second));
    assert_eq!(first.freshness, Freshness::Fresh);
    assert_eq!(second.freshness, Freshness::Stale);
    assert_eq!(second.window().len(), 1);
    assert_eq!(store.calls(), 1);
    assert_eq!(cache.health().cache_hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_after_interval_is_monotonic() {
    let (store, cache) = setup().await;
    let q = WindowQuery::Latest(25);

    let first = cache.get_window(q).await.unwrap();
    store.append(&sample(2)).await.unwrap();
    tokio::time::advance(INTERVAL).await;
    let second = cache.get_window(q).await.unwrap();

    assert_eq!(second.freshness, Freshness::Fresh);
    assert!(second.window().newest_timestamp() >= first.window().newest_timestamp());
    assert_eq!(second.window().newest_timestamp(), Some(ts(2)));
    assert_eq!(second.entry.version(), first.entry.version() + 1);
    assert_eq!(store.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_serves_last_known_good() {
    let (store, cache) = setup().await;
    let q = WindowQuery::Latest(25);

    let first = cache.get_window(q).await.unwrap();
    tokio::time::advance(INTERVAL).await;
    store.fail_next();
    let second = cache.get_window(q).await.unwrap();

    assert!(first.is_same_entry(&second));
    assert_eq!(second.freshness, Freshness::LastKnownGood);
    assert!(matches!(cache.last_error(q).await, Some(StoreError::Unavailable(_))));
    assert_eq!(cache.health().failed_refreshes, 1);

    // Recovery clears the recorded failure
    tokio::time::advance(INTERVAL).await;
    let third = cache.get_window(q).await.unwrap();
    assert_eq!(third.freshness, Freshness::Fresh);
    assert!(cache.last_error(q).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_first_refresh_failure_is_no_data() {
    let (store, cache) = setup().await;
    store.fail_next();

    let err = cache.get_window(WindowQuery::Latest(25)).await.unwrap_err();
    assert_eq!(err, CacheError::NoDataAvailable);
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_not_refetched_within_interval() {
    let (store, cache) = setup().await;
    let q = WindowQuery::Latest(25);
    store.fail_next();

    assert!(cache.get_window(q).await.is_err());
    assert!(cache.get_window(q).await.is_err());
    assert_eq!(store.calls(), 1);

    tokio::time::advance(INTERVAL).await;
    assert!(cache.get_window(q).await.is_ok());
    assert_eq!(store.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_readers_share_in_flight_refresh() {
    let (store, cache) = setup().await;
    store.set_latency(Duration::from_millis(100));
    let q = WindowQuery::Latest(25);

    let (a, b) = tokio::join!(cache.get_window(q), cache.get_window(q));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.is_same_entry(&b));
    assert_eq!(a.freshness, Freshness::Fresh);
    assert_eq!(b.freshness, Freshness::Fresh);
    assert_eq!(store.calls(), 1);

    let health = cache.health();
    assert_eq!(health.shared_refreshes, 1);
    assert_eq!(health.cache_hits, 0);
}

#[tokio::test(start_paused = true)]
async fn test_read_after_shared_refresh_is_a_plain_hit() {
    let (store, cache) = setup().await;
    store.set_latency(Duration::from_millis(100));
    let q = WindowQuery::Latest(25);

    let _ = tokio::join!(cache.get_window(q), cache.get_window(q));
    let later = cache.get_window(q).await.unwrap();

    assert_eq!(later.freshness, Freshness::Stale);
    assert_eq!(cache.health().cache_hits, 1);
    assert_eq!(store.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_readers_share_failed_refresh() {
    let (store, cache) = setup().await;
    store.set_latency(Duration::from_millis(100));
    store.fail_next();
    let q = WindowQuery::Latest(25);

    let (a, b) = tokio::join!(cache.get_window(q), cache.get_window(q));
    assert_eq!(a.unwrap_err(), CacheError::NoDataAvailable);
    assert_eq!(b.unwrap_err(), CacheError::NoDataAvailable);
    assert_eq!(store.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_refresh_keeps_entry() {
    let (store, cache) = setup().await;
    let q = WindowQuery::Latest(25);
    let first = cache.get_window(q).await.unwrap();

    tokio::time::advance(INTERVAL).await;
    store.hang.store(true, Ordering::SeqCst);
    let pending = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.get_window(q).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    pending.abort();
    assert!(pending.await.unwrap_err().is_cancelled());

    store.hang.store(false, Ordering::SeqCst);
    store.fail_next();
    let after = cache.get_window(q).await.unwrap();
    assert!(first.is_same_entry(&after));
    assert_eq!(after.entry.version(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_older_window_is_discarded() {
    let (store, cache) = setup().await;
    store.append(&sample(5)).await.unwrap();
    let q = WindowQuery::Latest(25);
    let first = cache.get_window(q).await.unwrap();

    tokio::time::advance(INTERVAL).await;
    store.push_response(Ok(SampleWindow::new(vec![sample(3)])));
    let second = cache.get_window(q).await.unwrap();

    assert!(first.is_same_entry(&second));
    assert_eq!(second.window().newest_timestamp(), Some(ts(5)));
    assert_eq!(cache.health().discarded_regressions, 1);
}

#[tokio::test(start_paused = true)]
async fn test_queries_have_independent_slots() {
    let (store, cache) = setup().await;

    cache.get_window(WindowQuery::Latest(25)).await.unwrap();
    cache.get_window(WindowQuery::Latest(5)).await.unwrap();
    cache.get_window(WindowQuery::last_hours(1)).await.unwrap();
    assert_eq!(store.calls(), 3);

    cache.get_window(WindowQuery::Latest(25)).await.unwrap();
    assert_eq!(store.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_forces_refetch() {
    let (store, cache) = setup().await;
    let q = WindowQuery::Latest(25);

    let first = cache.get_window(q).await.unwrap();
    cache.invalidate().await;
    let again = cache.get_window(q).await.unwrap();

    assert_eq!(again.freshness, Freshness::Fresh);
    assert_eq!(again.entry.version(), first.entry.version() + 1);
    assert_eq!(store.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_keeps_last_known_good() {
    let (store, cache) = setup().await;
    let q = WindowQuery::Latest(25);

    let first = cache.get_window(q).await.unwrap();
    cache.invalidate().await;
    store.fail_next();
    let after = cache.get_window(q).await.unwrap();

    assert!(first.is_same_entry(&after));
    assert_eq!(after.freshness, Freshness::LastKnownGood);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_still_discards_older_window() {
    let (store, cache) = setup().await;
    store.append(&sample(5)).await.unwrap();
    let q = WindowQuery::Latest(25);

    let first = cache.get_window(q).await.unwrap();
    cache.invalidate().await;
    store.push_response(Ok(SampleWindow::new(vec![sample(3)])));
    let after = cache.get_window(q).await.unwrap();

    assert!(first.is_same_entry(&after));
    assert_eq!(cache.health().discarded_regressions, 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_during_refresh_does_not_duplicate_it() {
    let (store, cache) = setup().await;
    store.set_latency(Duration::from_millis(100));
    let q = WindowQuery::Latest(25);

    let (a, _, b) = tokio::join!(cache.get_window(q), cache.invalidate(), cache.get_window(q));

    assert!(a.unwrap().is_same_entry(&b.unwrap()));
    assert_eq!(store.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_since_window_includes_samples_stamped_ahead_of_now() {
    let store = Arc::new(MemoryStore::new());
    let ahead = Sample {
        timestamp: Utc::now() + chrono::Duration::seconds(30),
        ..sample(0)
    };
    store.append(&sample(0)).await.unwrap();
    store.append(&ahead).await.unwrap();
    let cache = PollingCache::new(store, INTERVAL);

    let snapshot = cache.get_window(WindowQuery::last_hours(1)).await.unwrap();

    assert_eq!(snapshot.window().samples(), &[ahead]);
}
