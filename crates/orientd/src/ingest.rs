//! Ingestion client: capture, stamp and publish samples.
//!
//! Publishing is best-effort. Transient store failures are retried under the
//! configured backoff policy; after that the sample is dropped and counted as
//! lost, since a fresher reading is at most one cadence away.

use chrono::{DateTime, Duration as ChronoDuration, SubsecRound, Utc};
use orient_common::retry::RetryPolicy;
use orient_common::sample::Sample;
use orient_common::store::SampleStore;
use orient_common::{PublishError, SensorReadError};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::sensor::SensorSource;

/// Log a stats line every this many cycles
const STATS_EVERY: u64 = 120;

/// Successful publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub timestamp: DateTime<Utc>,
    pub attempts: u32,
}

#[derive(Debug, Default)]
pub struct IngestionStats {
    captured: AtomicU64,
    published: AtomicU64,
    read_errors: AtomicU64,
    retries: AtomicU64,
    lost: AtomicU64,
}

/// Point-in-time copy of `IngestionStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionCounts {
    pub captured: u64,
    pub published: u64,
    pub read_errors: u64,
    pub retries: u64,
    pub lost: u64,
}

impl IngestionStats {
    pub fn snapshot(&self) -> IngestionCounts {
        IngestionCounts {
            captured: self.captured.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
        }
    }
}

/// What one capture/publish cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Published(Ack),
    SkippedRead(SensorReadError),
    Dropped(PublishError),
}

pub struct IngestionClient<S> {
    device_id: String,
    source: S,
    store: Arc<dyn SampleStore>,
    retry: RetryPolicy,
    clock: fn() -> DateTime<Utc>,
    stats: Arc<IngestionStats>,
    started_at: DateTime<Utc>,
    last_stamp: Option<DateTime<Utc>>,
    last_acked: Option<DateTime<Utc>>,
}

impl<S: SensorSource> IngestionClient<S> {
    pub fn new(
        device_id: impl Into<String>,
        source: S,
        store: Arc<dyn SampleStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            source,
            store,
            retry,
            clock: Utc::now,
            stats: Arc::new(IngestionStats::default()),
            started_at: Utc::now(),
            last_stamp: None,
            last_acked: None,
        }
    }

    /// Replace the wall clock used for stamping samples
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self.started_at = clock();
        self
    }

    pub fn stats(&self) -> Arc<IngestionStats> {
        Arc::clone(&self.stats)
    }

    /// Timestamp of the newest acknowledged sample
    pub fn last_acked(&self) -> Option<DateTime<Utc>> {
        self.last_acked
    }

    /// True when nothing has been acked for longer than `stall_after`
    pub fn is_stalled(&self, now: DateTime<Utc>, stall_after: Duration) -> bool {
        let since = self.last_acked.unwrap_or(self.started_at);
        let limit = ChronoDuration::from_std(stall_after)
            .unwrap_or_else(|_| ChronoDuration::weeks(52 * 100));
        now - since > limit
    }

    /// Read the sensor and stamp the reading.
    ///
    /// Stamps have microsecond precision and strictly increase: if the clock
    /// has not moved past the previous stamp, the new one is bumped by 1µs.
    pub fn capture(&mut self) -> Result<Sample, SensorReadError> {
        let reading = match self.source.read() {
            Ok(reading) => reading,
            Err(e) => {
                self.stats.read_errors.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        let mut stamp = (self.clock)().trunc_subsecs(6);
        if let Some(last) = self.last_stamp {
            if stamp <= last {
                stamp = last + ChronoDuration::microseconds(1);
            }
        }
        self.last_stamp = Some(stamp);
        self.stats.captured.fetch_add(1, Ordering::Relaxed);

        Ok(Sample::from_reading(self.device_id.clone(), stamp, reading))
    }

    /// Append `sample` to the store, retrying transient failures
    pub async fn publish(&mut self, sample: &Sample) -> Result<Ack, PublishError> {
        let mut attempt = 1;
        loop {
            match self.store.append(sample).await {
                Ok(()) => {
                    self.stats.published.fetch_add(1, Ordering::Relaxed);
                    if self.last_acked.map_or(true, |t| sample.timestamp > t) {
                        self.last_acked = Some(sample.timestamp);
                    }
                    return Ok(Ack {
                        timestamp: sample.timestamp,
                        attempts: attempt,
                    });
                }
                Err(e) if !e.is_transient() => {
                    self.stats.lost.fetch_add(1, Ordering::Relaxed);
                    warn!("Dropping sample {}: {}", sample.timestamp, e);
                    return Err(PublishError::Rejected(e));
                }
                Err(e) => match self.retry.delay_after(attempt) {
                    Some(delay) => {
                        self.stats.retries.fetch_add(1, Ordering::Relaxed);
                        debug!("Publish attempt {} failed ({}), retrying in {:?}", attempt, e, delay);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        self.stats.lost.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            "Dropping sample {} after {} attempts: {}",
                            sample.timestamp, attempt, e
                        );
                        return Err(PublishError::Exhausted {
                            attempts: attempt,
                            last: e,
                        });
                    }
                },
            }
        }
    }

    /// One capture + publish. Never fails; the outcome says what happened.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let sample = match self.capture() {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Sensor read failed, skipping cycle: {}", e);
                return CycleOutcome::SkippedRead(e);
            }
        };

        match self.publish(&sample).await {
            Ok(ack) => CycleOutcome::Published(ack),
            Err(e) => CycleOutcome::Dropped(e),
        }
    }

    /// Capture at a fixed cadence until `shutdown` resolves
    pub async fn run<F>(mut self, cadence: Duration, stall_after: Duration, shutdown: F) -> IngestionCounts
    where
        F: Future<Output = ()>,
    {
        info!(
            "Ingestion loop started for {} (cadence {:?}, store {})",
            self.device_id,
            cadence,
            self.store.name()
        );

        let mut ticker = interval(cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut cycles: u64 = 0;
        let mut stalled = false;

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.run_cycle().await;
                    cycles += 1;

                    let now_stalled = self.is_stalled((self.clock)(), stall_after);
                    if now_stalled && !stalled {
                        warn!(
                            "Producer stalled: no acked sample since {}",
                            self.last_acked.map_or_else(|| "startup".to_string(), |t| t.to_rfc3339())
                        );
                    } else if !now_stalled && stalled {
                        info!("Producer recovered, publishing again");
                    }
                    stalled = now_stalled;

                    if cycles % STATS_EVERY == 0 {
                        let c = self.stats.snapshot();
                        info!(
                            "Ingestion: {} captured, {} published, {} lost, {} read errors",
                            c.captured, c.published, c.lost, c.read_errors
                        );
                    }
                }
            }
        }

        let counts = self.stats.snapshot();
        info!(
            "Ingestion loop stopped after {} cycles ({} published, {} lost)",
            cycles, counts.published, counts.lost
        );
        counts
    }
}
