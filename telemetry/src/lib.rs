//! Telemetry initialization for connector binaries and tests.

pub mod tracing;
