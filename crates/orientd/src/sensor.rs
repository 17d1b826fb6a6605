//! Sensor sources.
//!
//! The real BNO055 driver lives behind `SensorSource`; `SimulatedImu` stands
//! in for it on machines without the hardware.

use orient_common::sample::{CalibrationStatus, Orientation, SensorReading, Vec3};
use orient_common::SensorReadError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;

const GRAVITY: f64 = 9.806_65;

/// Anything that can produce one sensor reading on demand
pub trait SensorSource: Send {
    fn read(&mut self) -> Result<SensorReading, SensorReadError>;
}

impl<T: SensorSource + ?Sized> SensorSource for Box<T> {
    fn read(&mut self) -> Result<SensorReading, SensorReadError> {
        (**self).read()
    }
}

/// Simulated IMU: slow rocking motion with noise and optional faults
pub struct SimulatedImu {
    rng: StdRng,
    step: u64,
    step_secs: f64,
    fault_rate: f64,
}

impl SimulatedImu {
    pub fn new(seed: u64, step_secs: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            step: 0,
            step_secs,
            fault_rate: 0.0,
        }
    }

    /// Probability in [0, 1] that a read fails
    pub fn with_fault_rate(mut self, rate: f64) -> Self {
        self.fault_rate = if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 };
        self
    }

    fn noise(&mut self, amplitude: f64) -> f64 {
        self.rng.gen_range(-amplitude..=amplitude)
    }

    /// Calibration climbs one level every 20 reads until fully calibrated
    fn calibration(&self) -> CalibrationStatus {
        let level = (self.step / 20).min(3) as u8;
        CalibrationStatus::new(level, level.saturating_add(1), level, level)
    }
}

impl SensorSource for SimulatedImu {
    fn read(&mut self) -> Result<SensorReading, SensorReadError> {
        self.step += 1;
        if self.fault_rate > 0.0 && self.rng.gen_bool(self.fault_rate) {
            return Err(if self.step % 2 == 0 {
                SensorReadError::CalibrationTimeout
            } else {
                SensorReadError::DriverFault("i2c read returned NACK".to_string())
            });
        }

        let t = self.step as f64 * self.step_secs;
        // Roll swings past ±45° on a 40s period so tilt alerts show up
        let roll = 55.0 * (TAU * t / 40.0).sin() + self.noise(0.5);
        let pitch = 25.0 * (TAU * t / 25.0).cos() + self.noise(0.5);
        let yaw = (t * 3.0).rem_euclid(360.0);

        let roll_rate = 55.0 * TAU / 40.0 * (TAU * t / 40.0).cos();
        let pitch_rate = -25.0 * TAU / 25.0 * (TAU * t / 25.0).sin();

        let (r, p, y) = (roll.to_radians(), pitch.to_radians(), yaw.to_radians());
        let acceleration = Vec3::new(
            -GRAVITY * p.sin() + self.noise(0.05),
            GRAVITY * r.sin() * p.cos() + self.noise(0.05),
            GRAVITY * r.cos() * p.cos() + self.noise(0.05),
        );
        let gyroscope = Vec3::new(
            roll_rate.rem_euclid(360.0),
            pitch_rate.rem_euclid(360.0),
            3.0 + self.noise(0.1),
        );
        let magnetometer = Vec3::new(
            25.0 * y.cos() + self.noise(0.3),
            -25.0 * y.sin() + self.noise(0.3),
            -40.0 + self.noise(0.3),
        );
        let temperature = 24.0 + 0.5 * (TAU * t / 600.0).sin() + self.noise(0.05);

        Ok(SensorReading {
            orientation: Orientation::new(roll, pitch, yaw),
            acceleration,
            gyroscope,
            magnetometer,
            temperature,
            calibration: self.calibration(),
        })
    }
}
