//! # Telemetry Module
//!
//! Distance-sensor telemetry arriving on the rover's serial link.
//!
//! This module handles:
//! - Parsing `L: 23cm C: 40cm R: 87cm` style lines
//! - Maintaining the shared latest-reading cache
//! - Running the background ingest loop that feeds the session recorder

pub mod ingest;
pub mod parser;
pub mod reading;

pub use ingest::TelemetryIngest;
pub use parser::parse_distances;
pub use reading::{SensorPosition, TelemetryCache, TelemetryReading};
