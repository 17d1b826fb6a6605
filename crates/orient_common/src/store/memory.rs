//! In-process store. Used by tests and the `memory` backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::SampleStore;
use crate::error::StoreError;
use crate::sample::{Sample, SampleWindow};

#[derive(Debug, Default)]
pub struct MemoryStore {
    samples: RwLock<Vec<Sample>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples(samples: Vec<Sample>) -> Self {
        Self {
            samples: RwLock::new(samples),
        }
    }
}

#[async_trait]
impl SampleStore for MemoryStore {
    async fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        self.samples.write().await.push(sample.clone());
        Ok(())
    }

    async fn query_latest(&self, n: usize) -> Result<SampleWindow, StoreError> {
        let samples = self.samples.read().await;
        Ok(SampleWindow::new(samples.clone()).truncate_to_latest(n))
    }

    async fn query_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<SampleWindow, StoreError> {
        let samples = self.samples.read().await;
        let in_range = samples
            .iter()
            .filter(|s| s.timestamp >= from && s.timestamp <= to)
            .cloned()
            .collect();
        Ok(SampleWindow::new(in_range))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.samples.read().await.len() as u64)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
