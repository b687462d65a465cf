//! # Findings
//!
//! Classifications attached to a unit by the rule battery, and the report
//! line each one renders to.

use serde::Serialize;
use std::fmt;

use crate::structure::UnitIdentity;
use crate::telemetry::Field;

/// Input current channel compared against Iout by the FET rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InputChannel {
    Iin1,
    Iin2,
}

impl InputChannel {
    pub const fn field(self) -> Field {
        match self {
            InputChannel::Iin1 => Field::Iin1,
            InputChannel::Iin2 => Field::Iin2,
        }
    }
}

/// What a rule found, with the numbers behind it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum FindingKind {
    /// Iout tracks one input current: a switching element has shorted
    FetFail {
        channel: InputChannel,
        /// `100 * matched / high_current`, one decimal
        percentage: f64,
        matched: usize,
        high_current: usize,
        recorded: usize,
    },
    /// Mean Vout above the fleet open-circuit threshold
    OpenCircuit { mean_vout: f64, recorded: usize },
    /// Mean Iout too low to be producing power
    NoOutputPower { mean_iout: f64, recorded: usize },
    Ref18,
    Ref78,
    /// Module-off status together with Ref=78
    ModuleOff,
    HighPdiss { count: usize, threshold: f64 },
    Outlier {
        field: Field,
        count: usize,
        min: f64,
        max: f64,
    },
}

impl FindingKind {
    /// Whether this kind goes into an email alert
    pub fn is_alerting(&self) -> bool {
        matches!(self, FindingKind::FetFail { .. } | FindingKind::ModuleOff)
    }
}

fn unit_symbol(field: Field) -> &'static str {
    match field {
        Field::Vout | Field::Vin1 | Field::Vin2 => "V",
        Field::Iout | Field::Iin1 | Field::Iin2 => "A",
        Field::Text => "C",
        _ => "",
    }
}

/// A finding for one unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub unit: UnitIdentity,
    #[serde(flatten)]
    pub kind: FindingKind,
}

impl Finding {
    pub fn new(unit: UnitIdentity, kind: FindingKind) -> Self {
        Self { unit, kind }
    }

    /// Report line for this finding
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let u = &self.unit;
        write!(
            f,
            "Mac-{} {} sn={} located at {} ",
            u.position, u.mac, u.serial, u.location
        )?;

        match &self.kind {
            FindingKind::FetFail {
                channel,
                percentage,
                matched,
                high_current,
                recorded,
            } => write!(
                f,
                "has Iout={} in {:.1}% of records ({} of {}) of recorded {}",
                channel.field(),
                percentage,
                matched,
                high_current,
                recorded
            ),
            FindingKind::OpenCircuit {
                mean_vout,
                recorded,
            } => write!(
                f,
                "has {} records and mean Vout={:.1}V, Open Circuit",
                recorded, mean_vout
            ),
            FindingKind::NoOutputPower {
                mean_iout,
                recorded,
            } => write!(
                f,
                "has {} records and mean Iout={:.3}A, No Output Power produced",
                recorded, mean_iout
            ),
            FindingKind::Ref18 => write!(f, "has Ref = 18, meaning FET failure suspected"),
            FindingKind::Ref78 => write!(f, "has Ref = 78, meaning module was turned off."),
            FindingKind::ModuleOff => write!(f, "has both Module OFF sign and Vref=78"),
            FindingKind::HighPdiss { count, threshold } => write!(
                f,
                "has {} records where Pdiss>{}W, probably sporadic high Pdiss.",
                count, threshold
            ),
            FindingKind::Outlier {
                field,
                count,
                min,
                max,
            } => write!(
                f,
                "has {} outside the range [{} to {}]{} in {} records, possibly outliers",
                field,
                min,
                max,
                unit_symbol(*field),
                count
            ),
        }
    }
}
