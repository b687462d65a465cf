//! # Per-Unit Evaluator
//!
//! Runs the rule battery over every unit of a telemetry table.
//!
//! Evaluation is two-pass. The first pass averages every communicating
//! unit's mean Vout to tell a 600V system from an 800V one and fixes the
//! open-circuit threshold; the second pass applies all rules to each unit
//! independently. Rules never short-circuit each other, and a unit that never
//! reported simply produces no findings.
//!
//! ## Rules
//!
//! | Rule | Fires when |
//! |------|-----------|
//! | FET failure (per input) | `abs(Iout - Iin) < delta` in more than `percentage` of rows with `Iout > iout_limit`, and more than `min_records` such rows |
//! | Open circuit | mean Vout > fleet threshold and more than `min_records` Iout samples |
//! | No output power | mean Iout < `iout_threshold` and more than `min_records` Iout samples |
//! | Ref=18 / Ref=78 | the code appears anywhere in the Ref column |
//! | Module off | Module column contains 0 and Ref column contains 78 |
//! | High Pdiss | any row with `Iin1*Vin1 + Iin2*Vin2 - Iout*Vout > pdiss_threshold` |
//! | Outlier (per field) | any sample strictly outside the field's bounds |

use serde::Serialize;
use tracing::{debug, info};

use super::finding::{Finding, FindingKind, InputChannel};
use crate::config::{Config, DiagnosticsConfig, OutlierConfig};
use crate::error::Result;
use crate::report::FleetAggregate;
use crate::structure::UnitIdentity;
use crate::telemetry::stats;
use crate::telemetry::{ColumnLayout, Field, TelemetryTable, UnitColumns};

/// Ref code signalling a suspected FET failure
pub const REF_FET_FAILURE: f64 = 18.0;

/// Ref code signalling the module was turned off
pub const REF_MODULE_OFF: f64 = 78.0;

/// Module status value for "off"
pub const MODULE_OFF: f64 = 0.0;

/// Fields checked for out-of-range readings, in report order
pub const OUTLIER_FIELDS: [Field; 7] = [
    Field::Vout,
    Field::Vin1,
    Field::Vin2,
    Field::Iout,
    Field::Iin1,
    Field::Iin2,
    Field::Text,
];

/// Fleet-wide open-circuit threshold from the first pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoutThreshold {
    /// Mean of the communicating units' mean Vout
    pub average: Option<f64>,
    pub threshold: f64,
}

impl VoutThreshold {
    /// Pick the threshold for a fleet average
    ///
    /// A fleet with no communicating unit gets the low threshold.
    pub fn select(average: Option<f64>, config: &DiagnosticsConfig) -> Self {
        let threshold = match average {
            Some(avg) if avg > config.vout_system_split => config.vout_threshold_high,
            _ => config.vout_threshold_low,
        };
        Self { average, threshold }
    }
}

/// First pass: average mean Vout across the fleet
///
/// # Errors
///
/// Returns error if a unit's Vout column is missing from the table.
pub fn fleet_vout_threshold(
    table: &TelemetryTable,
    layout: &ColumnLayout,
    config: &DiagnosticsConfig,
) -> Result<VoutThreshold> {
    let mut means = Vec::with_capacity(layout.total_units());
    for unit in layout.units() {
        let mean = stats::mean(table.column(unit.column(Field::Vout))?);
        if mean.is_some() {
            means.push(mean);
        }
    }

    let selected = VoutThreshold::select(stats::mean(&means), config);
    info!(
        "Fleet mean Vout {:?} over {} units, open circuit threshold {}V",
        selected.average,
        means.len(),
        selected.threshold
    );
    Ok(selected)
}

/// Aggregates derived from one unit's columns
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UnitSignals {
    pub mean_vout: Option<f64>,
    pub mean_iout: Option<f64>,
    /// Present Iout samples
    pub recorded: usize,
    /// Present Iout samples above the FET rule's current limit
    pub high_current: usize,
}

/// Outcome of evaluating one unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitReport {
    pub identity: UnitIdentity,
    pub signals: UnitSignals,
    pub findings: Vec<Finding>,
}

impl UnitReport {
    /// A unit with no Vout sample never talked during the snapshot
    pub fn communicating(&self) -> bool {
        self.signals.mean_vout.is_some()
    }

    /// Line printed for a unit that never talked
    pub fn silence_message(&self) -> String {
        let u = &self.identity;
        format!(
            "Mac-{} {} sn={} located at {} was not talking",
            u.position, u.mac, u.serial, u.location
        )
    }
}

/// Borrowed columns of one unit, one slice per [`Field`]
struct UnitSeries<'t> {
    columns: [&'t [Option<f64>]; Field::ALL.len()],
}

impl<'t> UnitSeries<'t> {
    fn resolve(table: &'t TelemetryTable, unit: &UnitColumns) -> Result<Self> {
        let empty: &'t [Option<f64>] = &[];
        let mut columns = [empty; Field::ALL.len()];
        for field in Field::ALL {
            columns[field as usize] = table.column(unit.column(field))?;
        }
        Ok(Self { columns })
    }

    fn field(&self, field: Field) -> &'t [Option<f64>] {
        self.columns[field as usize]
    }

    fn input_current(&self, channel: InputChannel) -> &'t [Option<f64>] {
        self.field(channel.field())
    }
}

/// `abs(Iout - Iin)` per row; missing if either reading is
fn current_difference(iout: &[Option<f64>], iin: &[Option<f64>]) -> Vec<Option<f64>> {
    iout.iter()
        .zip(iin)
        .map(|(out, inp)| Some(((*out)? - (*inp)?).abs()))
        .collect()
}

/// `Iin1*Vin1 + Iin2*Vin2 - Iout*Vout` per row; missing if any reading is
fn dissipation(series: &UnitSeries<'_>) -> Vec<Option<f64>> {
    let (vout, iout) = (series.field(Field::Vout), series.field(Field::Iout));
    let (vin1, iin1) = (series.field(Field::Vin1), series.field(Field::Iin1));
    let (vin2, iin2) = (series.field(Field::Vin2), series.field(Field::Iin2));
    (0..iout.len())
        .map(|row| {
            let power_in = iin1[row]? * vin1[row]? + iin2[row]? * vin2[row]?;
            let power_out = iout[row]? * vout[row]?;
            Some(power_in - power_out)
        })
        .collect()
}

/// The rule battery with its thresholds
#[derive(Debug, Clone)]
pub struct Evaluator<'c> {
    diagnostics: &'c DiagnosticsConfig,
    outliers: &'c OutlierConfig,
    vout: VoutThreshold,
}

impl<'c> Evaluator<'c> {
    pub fn new(
        diagnostics: &'c DiagnosticsConfig,
        outliers: &'c OutlierConfig,
        vout: VoutThreshold,
    ) -> Self {
        Self {
            diagnostics,
            outliers,
            vout,
        }
    }

    fn bounds(&self, field: Field) -> (f64, f64) {
        let o = self.outliers;
        match field {
            Field::Iout | Field::Iin1 | Field::Iin2 => (o.current_min, o.current_max),
            Field::Text => (o.temperature_min, o.temperature_max),
            _ => (o.voltage_min, o.voltage_max),
        }
    }

    /// Evaluate every rule for one unit
    ///
    /// # Errors
    ///
    /// Returns error only if one of the unit's columns is missing from the
    /// table; data problems never fail evaluation.
    pub fn evaluate(
        &self,
        table: &TelemetryTable,
        columns: &UnitColumns,
        identity: UnitIdentity,
    ) -> Result<UnitReport> {
        let series = UnitSeries::resolve(table, columns)?;
        let d = self.diagnostics;
        let iout = series.field(Field::Iout);

        let signals = UnitSignals {
            mean_vout: stats::mean(series.field(Field::Vout)),
            mean_iout: stats::mean(iout),
            recorded: stats::count_present(iout),
            high_current: stats::count_where(iout, |i| i > d.iout_limit),
        };

        let mut kinds = Vec::new();
        for channel in [InputChannel::Iin1, InputChannel::Iin2] {
            kinds.extend(self.fet_failure(&series, &signals, channel));
        }
        kinds.extend(self.open_circuit(&signals));
        kinds.extend(self.no_output_power(&signals));
        kinds.extend(self.reference_codes(&series));
        kinds.extend(self.module_off(&series));
        kinds.extend(self.high_dissipation(&series));
        kinds.extend(self.outliers(&series));

        debug!(
            "Unit {} {}: {} findings",
            identity.position,
            identity.mac,
            kinds.len()
        );

        let findings = kinds
            .into_iter()
            .map(|kind| Finding::new(identity.clone(), kind))
            .collect();
        Ok(UnitReport {
            identity,
            signals,
            findings,
        })
    }

    fn fet_failure(
        &self,
        series: &UnitSeries<'_>,
        signals: &UnitSignals,
        channel: InputChannel,
    ) -> Option<FindingKind> {
        let d = self.diagnostics;
        let iout = series.field(Field::Iout);
        let difference = current_difference(iout, series.input_current(channel));
        let matched = difference
            .iter()
            .zip(iout)
            .filter(|(diff, current)| {
                matches!((diff, current), (Some(diff), Some(current)) if *diff < d.delta && *current > d.iout_limit)
            })
            .count();

        let high_current = signals.high_current;
        if matched as f64 > high_current as f64 * d.percentage && high_current > d.min_records {
            Some(FindingKind::FetFail {
                channel,
                percentage: stats::round_to(100.0 * matched as f64 / high_current as f64, 1),
                matched,
                high_current,
                recorded: signals.recorded,
            })
        } else {
            None
        }
    }

    fn open_circuit(&self, signals: &UnitSignals) -> Option<FindingKind> {
        let mean_vout = signals.mean_vout?;
        (mean_vout > self.vout.threshold && signals.recorded > self.diagnostics.min_records).then(
            || FindingKind::OpenCircuit {
                mean_vout: stats::round_to(mean_vout, 1),
                recorded: signals.recorded,
            },
        )
    }

    fn no_output_power(&self, signals: &UnitSignals) -> Option<FindingKind> {
        let mean_iout = signals.mean_iout?;
        let d = self.diagnostics;
        (mean_iout < d.iout_threshold && signals.recorded > d.min_records).then(|| {
            FindingKind::NoOutputPower {
                mean_iout: stats::round_to(mean_iout, 3),
                recorded: signals.recorded,
            }
        })
    }

    fn reference_codes(&self, series: &UnitSeries<'_>) -> Vec<FindingKind> {
        let mut kinds = Vec::new();
        if stats::contains(series.field(Field::Ref), REF_FET_FAILURE) {
            kinds.push(FindingKind::Ref18);
        }
        if stats::contains(series.field(Field::Ref), REF_MODULE_OFF) {
            kinds.push(FindingKind::Ref78);
        }
        kinds
    }

    /// Module off alone happens once every morning; only with Ref=78 does it
    /// mean the module really went down.
    fn module_off(&self, series: &UnitSeries<'_>) -> Option<FindingKind> {
        (stats::contains(series.field(Field::Module), MODULE_OFF)
            && stats::contains(series.field(Field::Ref), REF_MODULE_OFF))
        .then_some(FindingKind::ModuleOff)
    }

    fn high_dissipation(&self, series: &UnitSeries<'_>) -> Option<FindingKind> {
        let threshold = self.diagnostics.pdiss_threshold;
        let count = stats::count_where(&dissipation(series), |p| p > threshold);
        (count > 0).then_some(FindingKind::HighPdiss { count, threshold })
    }

    fn outliers(&self, series: &UnitSeries<'_>) -> Vec<FindingKind> {
        OUTLIER_FIELDS
            .iter()
            .filter_map(|&field| {
                let (min, max) = self.bounds(field);
                let count = stats::count_where(series.field(field), |v| v > max || v < min);
                (count > 0).then_some(FindingKind::Outlier {
                    field,
                    count,
                    min,
                    max,
                })
            })
            .collect()
    }
}

/// Result of a full two-pass run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetDiagnosis {
    pub vout: VoutThreshold,
    pub units: Vec<UnitReport>,
    pub aggregate: FleetAggregate,
}

/// Diagnose every unit of `table`
///
/// `identities[i]` names unit `i`; units past the end of `identities` are
/// reported as unknown. All state lives in the returned value, so repeated
/// calls on the same table give identical results.
///
/// # Errors
///
/// Returns error if a column resolved from `layout` is missing from `table`.
pub fn diagnose_fleet(
    table: &TelemetryTable,
    layout: &ColumnLayout,
    identities: &[UnitIdentity],
    config: &Config,
) -> Result<FleetDiagnosis> {
    let vout = fleet_vout_threshold(table, layout, &config.diagnostics)?;
    let evaluator = Evaluator::new(&config.diagnostics, &config.outliers, vout);

    let mut aggregate = FleetAggregate::default();
    let mut units = Vec::with_capacity(layout.total_units());
    for columns in layout.units() {
        let identity = identities
            .get(columns.index())
            .cloned()
            .unwrap_or_else(|| UnitIdentity::unknown(columns.index() + 1));
        let report = evaluator.evaluate(table, columns, identity)?;
        aggregate.record(&report);
        units.push(report);
    }

    info!(
        "Evaluated {} units: {} findings",
        units.len(),
        units.iter().map(|u| u.findings.len()).sum::<usize>()
    );
    Ok(FleetDiagnosis {
        vout,
        units,
        aggregate,
    })
}
