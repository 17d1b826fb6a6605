//! Export the current window as CSV.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use orient_common::cache::{PollingCache, WindowQuery};
use orient_common::export::{default_export_name, write_csv};
use orient_common::{CacheError, OrientConfig, SampleStore};
use owo_colors::OwoColorize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::range::TimeRange;

pub async fn run(config: &OrientConfig, range: TimeRange, out: Option<PathBuf>) -> Result<()> {
    let store = super::connect(config).await?;
    let query = range.to_query(config.dashboard.window_size);
    let path = out.unwrap_or_else(|| PathBuf::from(default_export_name(Utc::now())));

    let rows = export_window(store, query, &path).await?;
    println!("{} Wrote {} rows to {}", "✓".green(), rows, path.display());
    Ok(())
}

/// Fetch `query` once and write it to `path`
pub async fn export_window(store: Arc<dyn SampleStore>, query: WindowQuery, path: &Path) -> Result<usize> {
    let cache = PollingCache::new(store, Default::default());
    let snapshot = match cache.get_window(query).await {
        Ok(snapshot) => snapshot,
        Err(CacheError::NoDataAvailable) => {
            let reason = cache
                .last_error(query)
                .await
                .map_or_else(|| "no data".to_string(), |e| e.to_string());
            bail!("Cannot export {}: {}", query.describe(), reason);
        }
    };

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let rows = write_csv(snapshot.window(), BufWriter::new(file))?;
    info!("Exported {} ({} rows) to {}", query.describe(), rows, path.display());
    Ok(rows)
}
