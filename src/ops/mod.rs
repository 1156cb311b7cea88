//! Operational concerns.
//!
//! - `telemetry` - Tracing initialisation

pub mod telemetry;
