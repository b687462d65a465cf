//! # Diagnostics Module
//!
//! Per-unit failure heuristics over a telemetry snapshot.
//!
//! This module handles:
//! - The fleet-wide open-circuit threshold (first pass over all units)
//! - The per-unit rule battery (second pass)
//! - Finding types and their report lines

pub mod evaluator;
pub mod finding;

pub use evaluator::{diagnose_fleet, Evaluator, FleetDiagnosis, UnitReport, UnitSignals, VoutThreshold};
pub use finding::{Finding, FindingKind, InputChannel};
