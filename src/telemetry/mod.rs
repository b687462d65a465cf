//! # Telemetry Module
//!
//! Loads the fleet telemetry snapshot and resolves per-unit columns.
//!
//! This module handles:
//! - Reading the CSV table into column-major storage
//! - Keeping missing readings (no communication) distinct from zero
//! - Mapping each unit to its 20-column block
//! - Missing-aware aggregates (mean, count)

pub mod layout;
pub mod stats;
pub mod table;

pub use layout::{ColumnLayout, Field, UnitColumns};
pub use table::TelemetryTable;
