//! Shared types for the orient telemetry pipeline.
//!
//! Used by `orientd` (producer) and `orientctl` (dashboard).

pub mod alerts;
pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod presentation;
pub mod retry;
pub mod sample;
pub mod stats;
pub mod store;

pub use alerts::{Alert, AlertEvaluator, TiltAxis, TiltViolations};
pub use cache::{CacheEntry, CacheHealth, Freshness, PollingCache, WindowQuery, WindowSnapshot};
pub use config::OrientConfig;
pub use error::{CacheError, PublishError, SensorReadError, StoreError};
pub use retry::RetryPolicy;
pub use sample::{CalibrationStatus, Orientation, Sample, SampleWindow, SensorReading, Vec3};
pub use stats::WindowStats;
pub use store::{open_store, SampleStore};
