//! Maps a window onto per-axis chart series.
//!
//! Rendering itself belongs to whatever front end consumes these series.

use chrono::{DateTime, Utc};

use crate::sample::{Sample, SampleWindow, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisFamily {
    Orientation,
    Acceleration,
    Gyroscope,
    Magnetometer,
}

impl AxisFamily {
    pub const ALL: [AxisFamily; 4] = [
        AxisFamily::Orientation,
        AxisFamily::Acceleration,
        AxisFamily::Gyroscope,
        AxisFamily::Magnetometer,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            AxisFamily::Orientation => "Orientation",
            AxisFamily::Acceleration => "Acceleration",
            AxisFamily::Gyroscope => "Gyroscope",
            AxisFamily::Magnetometer => "Magnetometer",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            AxisFamily::Orientation => "°",
            AxisFamily::Acceleration => "m/s²",
            AxisFamily::Gyroscope => "°",
            AxisFamily::Magnetometer => "µT",
        }
    }

    fn labels(&self) -> [&'static str; 3] {
        match self {
            AxisFamily::Orientation => ["X (Heading)", "Y (Pitch)", "Z (Roll)"],
            _ => ["X-axis", "Y-axis", "Z-axis"],
        }
    }

    /// The three plotted values for one sample, in label order
    pub fn values(&self, sample: &Sample) -> [f64; 3] {
        match self {
            AxisFamily::Orientation => [
                sample.orientation.yaw,
                sample.orientation.pitch,
                sample.orientation.roll,
            ],
            AxisFamily::Acceleration => sample.acceleration.components(),
            AxisFamily::Gyroscope => normalized(sample.gyroscope),
            AxisFamily::Magnetometer => sample.magnetometer.components(),
        }
    }
}

/// Fold an angle from [0, 360) into (-180, 180]
pub fn normalize_angle(angle: f64) -> f64 {
    if angle > 180.0 {
        angle - 360.0
    } else {
        angle
    }
}

fn normalized(v: Vec3) -> [f64; 3] {
    [normalize_angle(v.x), normalize_angle(v.y), normalize_angle(v.z)]
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub label: &'static str,
    pub points: Vec<(DateTime<Utc>, f64)>,
}

impl ChartSeries {
    pub fn last_value(&self) -> Option<f64> {
        self.points.last().map(|(_, v)| *v)
    }
}

/// Three series for `family`, points ascending by timestamp
pub fn series(window: &SampleWindow, family: AxisFamily) -> [ChartSeries; 3] {
    let labels = family.labels();
    let mut out = labels.map(|label| ChartSeries {
        label,
        points: Vec::with_capacity(window.len()),
    });
    for sample in window {
        let values = family.values(sample);
        for (series, value) in out.iter_mut().zip(values) {
            series.points.push((sample.timestamp, value));
        }
    }
    out
}

/// Calibration quality bucket for one ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationLevel {
    None,
    Poor,
    Fair,
    Good,
}

impl CalibrationLevel {
    pub fn from_ordinal(value: u8) -> Self {
        match value {
            3.. => CalibrationLevel::Good,
            2 => CalibrationLevel::Fair,
            1 => CalibrationLevel::Poor,
            0 => CalibrationLevel::None,
        }
    }
}
