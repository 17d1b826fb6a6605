//! Configuration management for orientd and orientctl.
//!
//! Loads settings from /etc/orient/config.toml or uses defaults. Every field
//! has a serde default so a partial file is fine.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::retry::{RetryConfig, RetryPolicy};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/orient/config.toml";

/// Shortest dashboard refresh interval accepted
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(1);

/// Default SQLite database location
pub const DEFAULT_SQLITE_PATH: &str = "/var/lib/orient/telemetry.db";

/// Which persistence backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Rest,
    Memory,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,

    /// Base URL of the REST backend, e.g. https://<project>.supabase.co
    #[serde(default)]
    pub rest_url: Option<String>,

    #[serde(default = "default_rest_table")]
    pub rest_table: String,

    /// Environment variable holding the REST API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout for the REST backend
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from(DEFAULT_SQLITE_PATH)
}

fn default_rest_table() -> String {
    "sensor_data".to_string()
}

fn default_api_key_env() -> String {
    "ORIENT_STORE_KEY".to_string()
}

fn default_request_timeout() -> u64 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            sqlite_path: default_sqlite_path(),
            rest_url: None,
            rest_table: default_rest_table(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl StoreConfig {
    /// Read the REST API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

/// Producer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// Target capture cadence in milliseconds
    #[serde(default = "default_cadence_ms")]
    pub cadence_ms: u64,

    /// No ack for this long counts as a producer stall
    #[serde(default = "default_stall_after")]
    pub stall_after_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_device_id() -> String {
    "ESP32_001".to_string()
}

fn default_cadence_ms() -> u64 {
    500
}

fn default_stall_after() -> u64 {
    5
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            device_id: default_device_id(),
            cadence_ms: default_cadence_ms(),
            stall_after_secs: default_stall_after(),
            retry: RetryConfig::default(),
        }
    }
}

impl IngestConfig {
    pub fn cadence(&self) -> Duration {
        Duration::from_millis(self.cadence_ms)
    }

    pub fn stall_after(&self) -> Duration {
        Duration::from_secs(self.stall_after_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().into()
    }
}

/// Dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_min_refresh")]
    pub min_refresh_interval_seconds: f64,

    /// Applied symmetrically to roll and pitch
    #[serde(default = "default_tilt_threshold")]
    pub tilt_threshold_degrees: f64,

    /// Number of readings in the "latest" window
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

fn default_min_refresh() -> f64 {
    0.5
}

fn default_tilt_threshold() -> f64 {
    45.0
}

fn default_window_size() -> usize {
    25
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            min_refresh_interval_seconds: default_min_refresh(),
            tilt_threshold_degrees: default_tilt_threshold(),
            window_size: default_window_size(),
        }
    }
}

impl DashboardConfig {
    /// Never below `MIN_REFRESH_INTERVAL` (`tokio::time::interval` panics on zero)
    pub fn min_refresh_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.min_refresh_interval_seconds)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_min_refresh()))
            .max(MIN_REFRESH_INTERVAL)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrientConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl OrientConfig {
    /// Load from an explicit path, or the system path, or fall back to defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let system = Path::new(CONFIG_PATH);
        if system.exists() {
            match Self::load_from(system) {
                Ok(config) => return Ok(config),
                Err(e) => warn!("Ignoring {}: {:#}", CONFIG_PATH, e),
            }
        }

        info!("Using default configuration");
        Ok(Self::default())
    }

    /// Load and validate a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let refresh = self.dashboard.min_refresh_interval_seconds;
        if !refresh.is_finite() || refresh < MIN_REFRESH_INTERVAL.as_secs_f64() {
            bail!(
                "min_refresh_interval_seconds must be at least {}, got {}",
                MIN_REFRESH_INTERVAL.as_secs_f64(),
                refresh
            );
        }

        let threshold = self.dashboard.tilt_threshold_degrees;
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 180.0 {
            bail!("tilt_threshold_degrees must be in (0, 180], got {}", threshold);
        }

        if self.dashboard.window_size == 0 {
            bail!("window_size must be at least 1");
        }

        if self.ingest.cadence_ms == 0 {
            bail!("cadence_ms must be at least 1");
        }

        if self.ingest.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }

        if self.store.backend == StoreBackend::Rest && self.store.rest_url.is_none() {
            bail!("store.rest_url is required for the rest backend");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = OrientConfig::parse("").unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.dashboard.min_refresh_interval_seconds, 0.5);
        assert_eq!(config.dashboard.tilt_threshold_degrees, 45.0);
        assert_eq!(config.dashboard.window_size, 25);
        assert_eq!(config.ingest.cadence(), Duration::from_millis(500));
        assert_eq!(config.dashboard.min_refresh_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_sections() {
        let config = OrientConfig::parse(
            r#"
            [dashboard]
            tilt_threshold_degrees = 30.0

            [ingest.retry]
            max_attempts = 6
            "#,
        )
        .unwrap();
        assert_eq!(config.dashboard.tilt_threshold_degrees, 30.0);
        assert_eq!(config.dashboard.window_size, 25);
        assert_eq!(config.ingest.retry.max_attempts, 6);
        assert_eq!(config.ingest.retry.base_delay_ms, 100);
    }

    #[test]
    fn test_rejects_bad_refresh_interval() {
        let err = OrientConfig::parse("[dashboard]\nmin_refresh_interval_seconds = 0.0").unwrap_err();
        assert!(err.to_string().contains("min_refresh_interval_seconds"));
    }

    #[test]
    fn test_rejects_refresh_interval_that_rounds_to_zero() {
        let err = OrientConfig::parse("[dashboard]\nmin_refresh_interval_seconds = 1e-12").unwrap_err();
        assert!(err.to_string().contains("min_refresh_interval_seconds"));
        assert!(OrientConfig::parse("[dashboard]\nmin_refresh_interval_seconds = 0.001").is_ok());
    }

    #[test]
    fn test_refresh_interval_never_zero() {
        let dashboard = DashboardConfig {
            min_refresh_interval_seconds: 1e-12,
            ..Default::default()
        };
        assert_eq!(dashboard.min_refresh_interval(), MIN_REFRESH_INTERVAL);
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        assert!(OrientConfig::parse("[dashboard]\ntilt_threshold_degrees = 200.0").is_err());
    }

    #[test]
    fn test_rest_backend_requires_url() {
        assert!(OrientConfig::parse("[store]\nbackend = \"rest\"").is_err());
        let config = OrientConfig::parse(
            "[store]\nbackend = \"rest\"\nrest_url = \"https://example.supabase.co\"",
        )
        .unwrap();
        assert_eq!(config.store.rest_table, "sensor_data");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[ingest]\ndevice_id = \"bench-rig\"\ncadence_ms = 250").unwrap();
        let config = OrientConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.ingest.device_id, "bench-rig");
        assert_eq!(config.ingest.cadence_ms, 250);
    }
}
