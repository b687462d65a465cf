//! # Report Module
//!
//! Fleet-wide counters and the printed report.
//!
//! [`FleetAggregate`] is filled once per unit during evaluation and read once
//! at the end of the run. It keeps the alert message lists used as email
//! bodies for FET failures and module-off units.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::config::DiagnosticsConfig;
use crate::diagnostics::{FindingKind, FleetDiagnosis, UnitReport, VoutThreshold};

/// Counters per finding kind plus alert message lists
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FleetAggregate {
    /// FET findings; a unit failing on both inputs counts twice
    pub fet_failures: usize,
    pub open_circuit: usize,
    pub no_output_power: usize,
    pub not_communicating: usize,
    pub ref18: usize,
    pub ref78: usize,
    pub module_off: usize,
    pub high_pdiss: usize,
    /// 1-based positions of units with at least one outlier
    pub outlier_units: BTreeSet<usize>,
    pub fet_messages: Vec<String>,
    pub module_off_messages: Vec<String>,
}

impl FleetAggregate {
    /// Fold one unit's report into the counters
    pub fn record(&mut self, report: &UnitReport) {
        if !report.communicating() {
            self.not_communicating += 1;
        }

        for finding in &report.findings {
            match &finding.kind {
                FindingKind::FetFail { .. } => self.fet_failures += 1,
                FindingKind::OpenCircuit { .. } => self.open_circuit += 1,
                FindingKind::NoOutputPower { .. } => self.no_output_power += 1,
                FindingKind::Ref18 => self.ref18 += 1,
                FindingKind::Ref78 => self.ref78 += 1,
                FindingKind::ModuleOff => self.module_off += 1,
                FindingKind::HighPdiss { .. } => self.high_pdiss += 1,
                FindingKind::Outlier { .. } => {
                    self.outlier_units.insert(finding.unit.position);
                }
            }

            if finding.kind.is_alerting() {
                let message = finding.message();
                match finding.kind {
                    FindingKind::FetFail { .. } => self.fet_messages.push(message),
                    _ => self.module_off_messages.push(message),
                }
            }
        }
    }

    /// Distinct units with any outlier finding
    pub fn units_with_outliers(&self) -> usize {
        self.outlier_units.len()
    }

    /// Findings counted across all kinds, outliers counted per unit
    pub fn total_findings(&self) -> usize {
        self.fet_failures
            + self.open_circuit
            + self.no_output_power
            + self.ref18
            + self.ref78
            + self.module_off
            + self.high_pdiss
            + self.units_with_outliers()
    }

    /// Email body listing every FET failure
    pub fn fet_alert_body(&self) -> String {
        self.fet_messages.join("\n")
    }

    /// Email body listing every module-off unit
    pub fn module_off_alert_body(&self) -> String {
        self.module_off_messages.join("\n")
    }

    /// Fleet summary lines; counters at zero print nothing
    pub fn summary_lines(
        &self,
        input: &str,
        vout: &VoutThreshold,
        diagnostics: &DiagnosticsConfig,
    ) -> Vec<String> {
        let mut lines = Vec::new();
        if self.fet_failures != 0 {
            lines.push(format!(
                "File {}\nTotal number of FET failed units for the site is {}",
                input, self.fet_failures
            ));
        }
        if self.open_circuit != 0 {
            lines.push(format!(
                "Total number of open circuit units (mean Vout > {}V) is {}",
                vout.threshold, self.open_circuit
            ));
        }
        if self.no_output_power != 0 {
            lines.push(format!(
                "Total number of units not producing power (mean Iout < {}A) is {}",
                diagnostics.iout_threshold, self.no_output_power
            ));
        }
        if self.not_communicating != 0 {
            lines.push(format!(
                "Total number of units that didn't talk is {}",
                self.not_communicating
            ));
        }
        if self.ref18 != 0 {
            lines.push(format!("Total number of units with Ref=18 is {}", self.ref18));
        }
        if self.ref78 != 0 {
            lines.push(format!("Total number of units with Ref=78 is {}", self.ref78));
        }
        if self.high_pdiss != 0 {
            lines.push(format!(
                "Total number of units with sporadic high Pdiss is {}",
                self.high_pdiss
            ));
        }
        if self.units_with_outliers() != 0 {
            lines.push(format!(
                "Total number of units with found outliers is {}",
                self.units_with_outliers()
            ));
        }
        if self.module_off != 0 {
            lines.push(format!(
                "Total number of units with Module OFF sign and Vref=78 is {}",
                self.module_off
            ));
        }
        lines
    }
}

/// Per-unit lines in table order: silence notices and findings
pub fn unit_lines(diagnosis: &FleetDiagnosis) -> Vec<String> {
    let mut lines = Vec::new();
    for unit in &diagnosis.units {
        if !unit.communicating() {
            lines.push(unit.silence_message());
        }
        lines.extend(unit.findings.iter().map(|f| f.message()));
    }
    lines
}

/// Full text report
pub fn render_text(
    input: &str,
    diagnosis: &FleetDiagnosis,
    diagnostics: &DiagnosticsConfig,
) -> String {
    let mut lines = unit_lines(diagnosis);
    lines.extend(
        diagnosis
            .aggregate
            .summary_lines(input, &diagnosis.vout, diagnostics),
    );
    lines.push(String::new());
    lines.push("---".repeat(10));
    lines.join("\n")
}

/// Machine-readable report
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub input: &'a str,
    pub total_units: usize,
    pub units_with_outliers: usize,
    #[serde(flatten)]
    pub diagnosis: &'a FleetDiagnosis,
}

impl<'a> JsonReport<'a> {
    pub fn new(input: &'a str, diagnosis: &'a FleetDiagnosis) -> Self {
        Self {
            generated_at: Utc::now(),
            input,
            total_units: diagnosis.units.len(),
            units_with_outliers: diagnosis.aggregate.units_with_outliers(),
            diagnosis,
        }
    }

    /// Pretty-printed JSON
    pub fn render(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
