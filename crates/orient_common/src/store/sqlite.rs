//! SQLite-backed store.
//!
//! Single connection behind a mutex; every query runs on the blocking pool.
//! Timestamps are stored as integer microseconds so ordering is numeric.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::SampleStore;
use crate::error::StoreError;
use crate::sample::{CalibrationStatus, Orientation, Sample, SampleWindow, Vec3};

const SELECT_COLUMNS: &str = "created_at, device_id, orient_x, orient_y, orient_z,
    accel_x, accel_y, accel_z, gyro_x, gyro_y, gyro_z, mag_x, mag_y, mag_z,
    temperature, cal_system, cal_gyro, cal_accel, cal_mag";

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database file
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::Unavailable(format!("create {}: {}", parent.display(), e)))?;
            }
        }

        info!("Opening telemetry database at: {}", path.display());
        let path = path.to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            let conn = Connection::open(&path)?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            Ok(conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))??;

        Self::with_connection(conn).await
    }

    /// In-memory database, for tests
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS sensor_data (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    created_at INTEGER NOT NULL,
                    device_id TEXT NOT NULL,
                    orient_x REAL NOT NULL,
                    orient_y REAL NOT NULL,
                    orient_z REAL NOT NULL,
                    accel_x REAL NOT NULL,
                    accel_y REAL NOT NULL,
                    accel_z REAL NOT NULL,
                    gyro_x REAL NOT NULL,
                    gyro_y REAL NOT NULL,
                    gyro_z REAL NOT NULL,
                    mag_x REAL NOT NULL,
                    mag_y REAL NOT NULL,
                    mag_z REAL NOT NULL,
                    temperature REAL NOT NULL,
                    cal_system INTEGER NOT NULL,
                    cal_gyro INTEGER NOT NULL,
                    cal_accel INTEGER NOT NULL,
                    cal_mag INTEGER NOT NULL
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_sensor_data_created_at
                 ON sensor_data(created_at)",
                [],
            )?;
            debug!("Telemetry schema ready");
            Ok(())
        })
        .await
    }

    /// Run `f` against the guarded connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }
}

fn row_to_sample(row: &Row<'_>) -> rusqlite::Result<Sample> {
    let micros: i64 = row.get(0)?;
    let timestamp = DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(0, micros))?;

    Ok(Sample {
        timestamp,
        device_id: row.get(1)?,
        orientation: Orientation {
            yaw: row.get(2)?,
            pitch: row.get(3)?,
            roll: row.get(4)?,
        },
        acceleration: Vec3::new(row.get(5)?, row.get(6)?, row.get(7)?),
        gyroscope: Vec3::new(row.get(8)?, row.get(9)?, row.get(10)?),
        magnetometer: Vec3::new(row.get(11)?, row.get(12)?, row.get(13)?),
        temperature: row.get(14)?,
        calibration: CalibrationStatus::new(row.get(15)?, row.get(16)?, row.get(17)?, row.get(18)?),
    })
}

#[async_trait]
impl SampleStore for SqliteStore {
    async fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        let s = sample.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sensor_data (
                    created_at, device_id, orient_x, orient_y, orient_z,
                    accel_x, accel_y, accel_z, gyro_x, gyro_y, gyro_z,
                    mag_x, mag_y, mag_z, temperature,
                    cal_system, cal_gyro, cal_accel, cal_mag
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
                params![
                    s.timestamp.timestamp_micros(),
                    s.device_id,
                    s.orientation.yaw,
                    s.orientation.pitch,
                    s.orientation.roll,
                    s.acceleration.x,
                    s.acceleration.y,
                    s.acceleration.z,
                    s.gyroscope.x,
                    s.gyroscope.y,
                    s.gyroscope.z,
                    s.magnetometer.x,
                    s.magnetometer.y,
                    s.magnetometer.z,
                    s.temperature,
                    s.calibration.system,
                    s.calibration.gyro,
                    s.calibration.accel,
                    s.calibration.mag,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn query_latest(&self, n: usize) -> Result<SampleWindow, StoreError> {
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM sensor_data ORDER BY created_at DESC, id DESC LIMIT ?1",
                SELECT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut samples = stmt
                .query_map(params![limit], row_to_sample)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            samples.reverse();
            Ok(SampleWindow::new(samples))
        })
        .await
    }

    async fn query_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<SampleWindow, StoreError> {
        let (from, to) = (from.timestamp_micros(), to.timestamp_micros());
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM sensor_data
                 WHERE created_at >= ?1 AND created_at <= ?2
                 ORDER BY created_at ASC, id ASC",
                SELECT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let samples = stmt
                .query_map(params![from, to], row_to_sample)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(SampleWindow::new(samples))
        })
        .await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM sensor_data", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::fixtures::{sample_at, ts};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_append_then_latest_roundtrip() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let sample = sample_at(10, 12.5, -3.25);
        store.append(&sample).await.unwrap();

        let window = store.query_latest(1).await.unwrap();
        assert_eq!(window.samples(), &[sample]);
    }

    #[tokio::test]
    async fn test_latest_is_bounded_and_ascending() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        for i in [5, 2, 9, 1, 7] {
            store.append(&sample_at(i, 0.0, 0.0)).await.unwrap();
        }

        let window = store.query_latest(3).await.unwrap();
        let stamps: Vec<_> = window.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![ts(5), ts(7), ts(9)]);
        assert_eq!(store.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_range_query() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        for i in 0..10 {
            store.append(&sample_at(i, 0.0, 0.0)).await.unwrap();
        }

        let window = store.query_range(ts(3), ts(6)).await.unwrap();
        assert_eq!(window.len(), 4);
        assert_eq!(window.oldest_timestamp(), Some(ts(3)));
    }

    #[tokio::test]
    async fn test_nan_field_is_rejected_not_retried() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let mut sample = sample_at(1, 0.0, 0.0);
        // SQLite binds NaN as NULL, which the NOT NULL column refuses
        sample.temperature = f64::NAN;

        let err = store.append(&sample).await.unwrap_err();
        assert!(matches!(err, StoreError::MalformedResponse(_)), "{:?}", err);
        assert!(!err.is_transient());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_since_has_no_upper_bound() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        for i in [0, 5, 100_000] {
            store.append(&sample_at(i, 0.0, 0.0)).await.unwrap();
        }

        let window = store.query_since(ts(5)).await.unwrap();
        let stamps: Vec<_> = window.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![ts(5), ts(100_000)]);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("telemetry.db");

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.append(&sample_at(1, 0.0, 0.0)).await.unwrap();
        }

        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
