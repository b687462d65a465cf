//! # Fleet Fault Scan Library
//!
//! Flag suspected hardware failures in solar power-converter fleets.
//!
//! This library reads one CSV snapshot of per-unit electrical telemetry,
//! runs a battery of threshold heuristics on every unit (FET failures, open
//! circuit, no output power, module shutdown, high dissipation, sensor
//! outliers) and emails the operator when FET failures or module-off units
//! are found.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod input;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod structure;
pub mod telemetry;
