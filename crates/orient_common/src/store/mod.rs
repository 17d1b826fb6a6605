//! Store adapter: the persistence seam between producer and dashboard.
//!
//! Backends never retry internally. The ingestion client and the polling
//! cache each own their own retry/degradation policy.

pub mod memory;
pub mod rest;
pub mod sqlite;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreError;
use crate::sample::{Sample, SampleWindow};

pub use memory::MemoryStore;
pub use rest::RestStore;
pub use sqlite::SqliteStore;

/// Persistence backend for telemetry samples
#[async_trait]
pub trait SampleStore: Send + Sync {
    /// Persist one sample. Duplicate timestamps are accepted.
    async fn append(&self, sample: &Sample) -> Result<(), StoreError>;

    /// Up to `n` most recent samples, ascending by timestamp
    async fn query_latest(&self, n: usize) -> Result<SampleWindow, StoreError>;

    /// Samples with `from <= timestamp <= to`, ascending by timestamp
    async fn query_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<SampleWindow, StoreError>;

    /// Samples with `timestamp >= from`, ascending by timestamp. No upper
    /// bound, so samples from a producer clock running ahead still show.
    async fn query_since(&self, from: DateTime<Utc>) -> Result<SampleWindow, StoreError> {
        self.query_range(from, DateTime::<Utc>::MAX_UTC).await
    }

    /// Total number of persisted samples
    async fn count(&self) -> Result<u64, StoreError>;

    /// Short backend name for logs and status output
    fn name(&self) -> &'static str;
}

/// Open the backend named in the configuration
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn SampleStore>> {
    let store: Arc<dyn SampleStore> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Sqlite => Arc::new(
            SqliteStore::open(&config.sqlite_path)
                .await
                .with_context(|| format!("Failed to open {}", config.sqlite_path.display()))?,
        ),
        StoreBackend::Rest => {
            let url = config
                .rest_url
                .as_deref()
                .context("store.rest_url is not set")?;
            Arc::new(RestStore::new(
                url,
                &config.rest_table,
                config.api_key(),
                Duration::from_secs(config.request_timeout_secs),
            )?)
        }
    };
    info!("Using {} store", store.name());
    Ok(store)
}
