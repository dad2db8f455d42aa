//! Telemetry events emitted by the runner.

pub mod publisher;

pub use publisher::{RunnerTelemetry, TelemetryEvent};
