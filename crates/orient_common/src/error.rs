//! Error types for the telemetry pipeline.
//!
//! None of these are fatal: the producer skips or drops, the dashboard falls
//! back to the last good window.

use thiserror::Error;

/// Producer-local sensor failure; the cycle's sample is skipped
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorReadError {
    #[error("Sensor driver fault: {0}")]
    DriverFault(String),

    #[error("Calibration read timed out")]
    CalibrationTimeout,
}

/// Persistence backend failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store rejected credentials: {0}")]
    AuthFailure(String),

    #[error("Malformed store response: {0}")]
    MalformedResponse(String),
}

impl StoreError {
    /// Whether retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Unavailable(_) => "unavailable",
            StoreError::AuthFailure(_) => "auth_failure",
            StoreError::MalformedResponse(_) => "malformed_response",
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => {
                StoreError::MalformedResponse(e.to_string())
            }
            // The row itself is unacceptable; writing it again cannot succeed
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::MalformedResponse(e.to_string())
            }
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// Publishing failed and the sample was dropped
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: StoreError },

    #[error("Store refused sample: {0}")]
    Rejected(StoreError),
}

/// Dashboard-facing cache failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("No telemetry data available yet")]
    NoDataAvailable,
}
