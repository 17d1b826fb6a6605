//! Sample model shared by the producer and the dashboard.
//!
//! A `Sample` is one timestamped multi-sensor reading from the IMU. It is
//! created by the ingestion client and never changed after it is persisted.
//! `SampleRecord` is the flat row shape used by the stores, the REST backend
//! and CSV export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Highest calibration ordinal reported by the sensor (fully calibrated)
pub const MAX_CALIBRATION: u8 = 3;

/// Three-axis vector (acceleration, angular velocity, magnetic field)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn components(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Euler angles in degrees.
///
/// Roll and pitch are in [-180, 180]; yaw (heading) may be reported in [0, 360).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Orientation {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }
}

/// Per-subsensor calibration ordinals, each in [0, 3]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalibrationStatus {
    pub system: u8,
    pub gyro: u8,
    pub accel: u8,
    pub mag: u8,
}

impl CalibrationStatus {
    /// Build a status, clamping every ordinal to [0, 3]
    pub fn new(system: u8, gyro: u8, accel: u8, mag: u8) -> Self {
        Self {
            system: system.min(MAX_CALIBRATION),
            gyro: gyro.min(MAX_CALIBRATION),
            accel: accel.min(MAX_CALIBRATION),
            mag: mag.min(MAX_CALIBRATION),
        }
    }

    pub fn fully_calibrated() -> Self {
        Self::new(3, 3, 3, 3)
    }

    /// Same status with every ordinal clamped
    pub fn clamped(self) -> Self {
        Self::new(self.system, self.gyro, self.accel, self.mag)
    }

    pub fn average(&self) -> f64 {
        (self.system as f64 + self.gyro as f64 + self.accel as f64 + self.mag as f64) / 4.0
    }

    pub fn is_fully_calibrated(&self) -> bool {
        self.system == MAX_CALIBRATION
            && self.gyro == MAX_CALIBRATION
            && self.accel == MAX_CALIBRATION
            && self.mag == MAX_CALIBRATION
    }
}

/// Everything the sensor reports in one read, before the producer stamps it
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    pub orientation: Orientation,
    pub acceleration: Vec3,
    pub gyroscope: Vec3,
    pub magnetometer: Vec3,
    pub temperature: f64,
    pub calibration: CalibrationStatus,
}

/// One persisted telemetry reading
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub orientation: Orientation,
    pub acceleration: Vec3,
    pub gyroscope: Vec3,
    pub magnetometer: Vec3,
    pub temperature: f64,
    pub calibration: CalibrationStatus,
}

impl Sample {
    pub fn from_reading(
        device_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        reading: SensorReading,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            orientation: reading.orientation,
            acceleration: reading.acceleration,
            gyroscope: reading.gyroscope,
            magnetometer: reading.magnetometer,
            temperature: reading.temperature,
            calibration: reading.calibration.clamped(),
        }
    }

    pub fn roll(&self) -> f64 {
        self.orientation.roll
    }

    pub fn pitch(&self) -> f64 {
        self.orientation.pitch
    }

    pub fn to_record(&self) -> SampleRecord {
        SampleRecord::from(self)
    }
}

/// Flat row shape, column names match the `sensor_data` table.
///
/// Orientation columns follow the sensor's axis naming:
/// `orient_x` is heading (yaw), `orient_y` is pitch, `orient_z` is roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub device_id: String,
    pub orient_x: f64,
    pub orient_y: f64,
    pub orient_z: f64,
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub gyro_x: f64,
    pub gyro_y: f64,
    pub gyro_z: f64,
    pub mag_x: f64,
    pub mag_y: f64,
    pub mag_z: f64,
    pub temperature: f64,
    pub cal_system: u8,
    pub cal_gyro: u8,
    pub cal_accel: u8,
    pub cal_mag: u8,
}

/// Column order of `SampleRecord`, also the CSV header
pub const RECORD_COLUMNS: [&str; 19] = [
    "created_at",
    "device_id",
    "orient_x",
    "orient_y",
    "orient_z",
    "accel_x",
    "accel_y",
    "accel_z",
    "gyro_x",
    "gyro_y",
    "gyro_z",
    "mag_x",
    "mag_y",
    "mag_z",
    "temperature",
    "cal_system",
    "cal_gyro",
    "cal_accel",
    "cal_mag",
];

impl From<&Sample> for SampleRecord {
    fn from(s: &Sample) -> Self {
        Self {
            created_at: s.timestamp,
            device_id: s.device_id.clone(),
            orient_x: s.orientation.yaw,
            orient_y: s.orientation.pitch,
            orient_z: s.orientation.roll,
            accel_x: s.acceleration.x,
            accel_y: s.acceleration.y,
            accel_z: s.acceleration.z,
            gyro_x: s.gyroscope.x,
            gyro_y: s.gyroscope.y,
            gyro_z: s.gyroscope.z,
            mag_x: s.magnetometer.x,
            mag_y: s.magnetometer.y,
            mag_z: s.magnetometer.z,
            temperature: s.temperature,
            cal_system: s.calibration.system,
            cal_gyro: s.calibration.gyro,
            cal_accel: s.calibration.accel,
            cal_mag: s.calibration.mag,
        }
    }
}

impl From<SampleRecord> for Sample {
    fn from(r: SampleRecord) -> Self {
        Self {
            device_id: r.device_id,
            timestamp: r.created_at,
            orientation: Orientation::new(r.orient_z, r.orient_y, r.orient_x),
            acceleration: Vec3::new(r.accel_x, r.accel_y, r.accel_z),
            gyroscope: Vec3::new(r.gyro_x, r.gyro_y, r.gyro_z),
            magnetometer: Vec3::new(r.mag_x, r.mag_y, r.mag_z),
            temperature: r.temperature,
            calibration: CalibrationStatus::new(r.cal_system, r.cal_gyro, r.cal_accel, r.cal_mag),
        }
    }
}

/// Decode a JSON array of rows into samples.
///
/// A row without `created_at` (or with any other missing column) makes the
/// whole response malformed.
pub fn decode_records(body: &[u8]) -> Result<Vec<Sample>, StoreError> {
    let records: Vec<SampleRecord> = serde_json::from_slice(body)
        .map_err(|e| StoreError::MalformedResponse(e.to_string()))?;
    Ok(records.into_iter().map(Sample::from).collect())
}

/// Ordered, read-only sequence of samples, ascending by timestamp
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleWindow {
    samples: Vec<Sample>,
}

impl SampleWindow {
    /// Build a window, sorting by timestamp. The sort is stable so duplicate
    /// timestamps keep their store order.
    pub fn new(mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        Self { samples }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn newest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.samples.last().map(|s| s.timestamp)
    }

    pub fn oldest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.samples.first().map(|s| s.timestamp)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Keep only the `n` most recent samples
    pub fn truncate_to_latest(mut self, n: usize) -> Self {
        if self.samples.len() > n {
            let excess = self.samples.len() - n;
            self.samples.drain(..excess);
        }
        self
    }
}

impl<'a> IntoIterator for &'a SampleWindow {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    pub fn sample_at(secs: i64, roll: f64, pitch: f64) -> Sample {
        Sample::from_reading(
            "ESP32_001",
            ts(secs),
            SensorReading {
                orientation: Orientation::new(roll, pitch, 120.0),
                acceleration: Vec3::new(0.1, 0.2, 9.8),
                gyroscope: Vec3::new(0.0, 1.5, 359.0),
                magnetometer: Vec3::new(22.0, -4.0, 41.5),
                temperature: 24.0,
                calibration: CalibrationStatus::new(3, 3, 2, 1),
            },
        )
    }
}
