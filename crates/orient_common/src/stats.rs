//! Summary statistics over a sample window.

use chrono::Duration;

use crate::sample::SampleWindow;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self { mean, min, max })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowStats {
    pub readings: usize,
    pub time_span: Duration,
    pub temperature: Summary,
    /// Sample standard deviation (n - 1); zero for a single reading
    pub temperature_std_dev: f64,
    /// Change between the last two readings
    pub temperature_delta: Option<f64>,
    pub accel_magnitude: Summary,
    /// Mean of all four calibration ordinals across the window
    pub avg_calibration: f64,
}

impl WindowStats {
    /// `None` for an empty window
    pub fn compute(window: &SampleWindow) -> Option<Self> {
        let samples = window.samples();
        let first = samples.first()?;
        let last = samples.last()?;

        let temps: Vec<f64> = samples.iter().map(|s| s.temperature).collect();
        let mags: Vec<f64> = samples.iter().map(|s| s.acceleration.magnitude()).collect();
        let temperature = Summary::of(&temps)?;

        let temperature_std_dev = if temps.len() > 1 {
            let var = temps
                .iter()
                .map(|t| (t - temperature.mean).powi(2))
                .sum::<f64>()
                / (temps.len() - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };

        let temperature_delta = match samples {
            [.., prev, latest] => Some(latest.temperature - prev.temperature),
            _ => None,
        };

        let avg_calibration =
            samples.iter().map(|s| s.calibration.average()).sum::<f64>() / samples.len() as f64;

        Some(Self {
            readings: samples.len(),
            time_span: last.timestamp - first.timestamp,
            temperature,
            temperature_std_dev,
            temperature_delta,
            accel_magnitude: Summary::of(&mags)?,
            avg_calibration,
        })
    }
}
