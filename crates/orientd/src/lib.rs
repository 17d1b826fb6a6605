//! orientd library - exposes the producer side for testing.

pub mod ingest;
pub mod sensor;

pub use ingest::{Ack, CycleOutcome, IngestionClient, IngestionCounts, IngestionStats};
pub use sensor::{SensorSource, SimulatedImu};
