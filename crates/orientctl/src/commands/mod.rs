//! Command implementations for orientctl

pub mod export;
pub mod stats;
pub mod status;
pub mod watch;

use anyhow::{Context, Result};
use orient_common::{open_store, OrientConfig, SampleStore};
use std::sync::Arc;

pub(crate) const THIN_SEP: &str = "------------------------------------------------------------";

pub(crate) async fn connect(config: &OrientConfig) -> Result<Arc<dyn SampleStore>> {
    open_store(&config.store)
        .await
        .with_context(|| format!("Cannot open {:?} store", config.store.backend))
}
