//! Tilt alert derivation.
//!
//! Stateless: alerts are recomputed from the latest sample on every call and
//! never persisted. A breach is instantaneous, no debounce.

use serde::Serialize;
use std::fmt;

use crate::sample::{Sample, SampleWindow};

pub const DEFAULT_TILT_THRESHOLD: f64 = 45.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TiltAxis {
    Roll,
    Pitch,
}

impl fmt::Display for TiltAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TiltAxis::Roll => write!(f, "roll"),
            TiltAxis::Pitch => write!(f, "pitch"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Alert {
    TiltWarning { axis: TiltAxis, value: f64 },
}

impl Alert {
    pub fn axis(&self) -> TiltAxis {
        match self {
            Alert::TiltWarning { axis, .. } => *axis,
        }
    }
}

/// Roll and pitch breach counts across a whole window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TiltViolations {
    pub roll: usize,
    pub pitch: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct AlertEvaluator {
    tilt_threshold: f64,
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_TILT_THRESHOLD)
    }
}

impl AlertEvaluator {
    pub fn new(tilt_threshold: f64) -> Self {
        Self {
            tilt_threshold: tilt_threshold.abs(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.tilt_threshold
    }

    /// Alerts for the most recent sample; at most one per axis, roll first.
    /// An empty window yields no alerts.
    pub fn evaluate(&self, window: &SampleWindow) -> Vec<Alert> {
        match window.latest() {
            Some(latest) => self.evaluate_sample(latest),
            None => Vec::new(),
        }
    }

    pub fn evaluate_sample(&self, sample: &Sample) -> Vec<Alert> {
        [(TiltAxis::Roll, sample.roll()), (TiltAxis::Pitch, sample.pitch())]
            .into_iter()
            .filter(|(_, value)| self.breaches(*value))
            .map(|(axis, value)| Alert::TiltWarning { axis, value })
            .collect()
    }

    pub fn tilt_violations(&self, window: &SampleWindow) -> TiltViolations {
        window.iter().fold(TiltViolations::default(), |mut acc, s| {
            if self.breaches(s.roll()) {
                acc.roll += 1;
            }
            if self.breaches(s.pitch()) {
                acc.pitch += 1;
            }
            acc
        })
    }

    fn breaches(&self, value: f64) -> bool {
        value.abs() > self.tilt_threshold
    }
}
