//! Store status: record count, newest sample and whether the producer stalled.

use anyhow::Result;
use chrono::{DateTime, Utc};
use orient_common::{OrientConfig, SampleStore};
use owo_colors::OwoColorize;
use std::time::Duration;

use super::THIN_SEP;
use crate::dashboard::format_timestamp;

/// Snapshot of what the store holds
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStatus {
    pub backend: &'static str,
    pub records: u64,
    pub newest: Option<DateTime<Utc>>,
}

impl StoreStatus {
    pub async fn read(store: &dyn SampleStore) -> Result<Self> {
        let records = store.count().await?;
        let newest = store.query_latest(1).await?.newest_timestamp();
        Ok(Self {
            backend: store.name(),
            records,
            newest,
        })
    }

    /// Age of the newest sample; negative skew reads as zero
    pub fn newest_age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.newest.map(|t| (now - t).to_std().unwrap_or_default())
    }

    /// No data at all, or nothing newer than `stall_after`
    pub fn is_stalled(&self, now: DateTime<Utc>, stall_after: Duration) -> bool {
        self.newest_age(now).map_or(true, |age| age > stall_after)
    }
}

pub async fn run(config: &OrientConfig) -> Result<()> {
    let store = super::connect(config).await?;

    println!();
    println!("{}", "  Orient Store Status".bold());
    println!("{}", THIN_SEP);

    let status = match StoreStatus::read(store.as_ref()).await {
        Ok(status) => status,
        Err(e) => {
            println!("  Backend:  {}", store.name());
            println!("  State:    {} ({})", "unreachable".red(), e);
            println!("{}", THIN_SEP);
            return Ok(());
        }
    };

    let now = Utc::now();
    println!("  Backend:  {}", status.backend);
    println!("  Records:  {}", status.records);
    match (status.newest, status.newest_age(now)) {
        (Some(newest), Some(age)) => {
            println!("  Newest:   {} ({}s ago)", format_timestamp(newest), age.as_secs())
        }
        _ => println!("  Newest:   n/a"),
    }

    let stall_after = config.ingest.stall_after();
    if status.is_stalled(now, stall_after) {
        println!(
            "  Producer: {} (no sample in the last {}s)",
            "stalled".red(),
            stall_after.as_secs()
        );
    } else {
        println!("  Producer: {}", "publishing".green());
    }
    println!("{}", THIN_SEP);
    Ok(())
}
