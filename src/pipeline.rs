//! # Pipeline
//!
//! One batch run: validate the input, load identities and telemetry,
//! diagnose the fleet, then alert.

use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::diagnostics::{diagnose_fleet, FleetDiagnosis};
use crate::error::Result;
use crate::input::InputFile;
use crate::notify::{dispatch_alerts, AlertContext, Notifier};
use crate::structure::Structure;
use crate::telemetry::{ColumnLayout, TelemetryTable};

/// Everything a finished scan produced
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub input: InputFile,
    pub diagnosis: FleetDiagnosis,
}

impl ScanOutcome {
    /// Subject context for alert emails
    pub fn alert_context(&self, config: &Config) -> AlertContext {
        AlertContext {
            site: config
                .notify
                .site
                .clone()
                .unwrap_or_else(|| self.input.site()),
            file_name: self.input.file_name.clone(),
        }
    }
}

/// Run the diagnosis for one telemetry file
///
/// # Errors
///
/// Returns error on any fatal precondition: missing or non-CSV input, no
/// block in the file name, missing structure file, or a table whose width
/// is not `4 + 20 * units`.
///
/// # Examples
///
/// ```no_run
/// use fleet_fault_scan::config::Config;
/// use fleet_fault_scan::pipeline::scan;
///
/// let outcome = scan("/mnt/data_log/site/171105/20171105_b302.csv", &Config::default())?;
/// println!("{} units", outcome.diagnosis.units.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn scan<P: AsRef<Path>>(path: P, config: &Config) -> Result<ScanOutcome> {
    let input = InputFile::resolve(path)?;
    let structure = Structure::load_for_block(&input.structure_dir, &input.block)?;

    let table = TelemetryTable::load(&input.path)?;
    let layout = ColumnLayout::from_width(table.width())?;
    info!("Table holds {} units", layout.total_units());

    let identities = structure.identities(layout.total_units());
    let diagnosis = diagnose_fleet(&table, &layout, &identities, config)?;
    info!(
        "Scan of {} found {} findings",
        input.file_name,
        diagnosis.aggregate.total_findings()
    );
    Ok(ScanOutcome { input, diagnosis })
}

/// Send the alerts a finished scan calls for
///
/// # Errors
///
/// Returns the first delivery error.
pub async fn alert(outcome: &ScanOutcome, config: &Config, notifier: &dyn Notifier) -> Result<usize> {
    let context = outcome.alert_context(config);
    dispatch_alerts(&outcome.diagnosis.aggregate, notifier, &context).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{FindingKind, InputChannel};
    use crate::error::ScanError;
    use crate::notify::MockNotifier;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const STRUCTURE: &str = r#"<Site>
  <String name="02.01.01-1"><Converter mac="04880000007B" sn="0117A000123"/></String>
  <String name="02.01.01-2"><Converter sn="2318C5"/></String>
</Site>"#;

    /// Two units over 40 rows; unit 1 has Iout == Iin1, unit 2 is silent
    fn telemetry_csv() -> String {
        let mut csv = String::new();
        let headers: Vec<String> = (0..44).map(|c| format!("c{}", c)).collect();
        csv.push_str(&headers.join(","));
        csv.push('\n');
        for row in 0..40 {
            let mut cells = vec![String::new(); 44];
            cells[0] = format!("2017-11-05 10:{:02}:00", row);
            cells[9] = "1".into(); // module
            cells[10] = "600".into(); // vout
            cells[11] = "300".into(); // vin1
            cells[12] = "5".into(); // iout
            cells[13] = "300".into(); // vin2
            cells[14] = "35".into(); // text
            cells[15] = "0".into(); // iin2
            cells[16] = "5".into(); // iin1
            cells[17] = "50".into(); // ref
            csv.push_str(&cells.join(","));
            csv.push('\n');
        }
        csv
    }

    fn site(csv: &str, structure: Option<&str>) -> (TempDir, PathBuf) {
        let root = TempDir::new().unwrap();
        let site = root.path().join("canadian_solar");
        let logs = site.join("171105");
        fs::create_dir_all(&logs).unwrap();
        if let Some(xml) = structure {
            fs::write(site.join("structure_b302.xml"), xml).unwrap();
        }
        let path = logs.join("20171105_b302.csv");
        fs::write(&path, csv).unwrap();
        (root, path)
    }

    #[test]
    fn test_scan_end_to_end() {
        let (_root, path) = site(&telemetry_csv(), Some(STRUCTURE));
        let outcome = scan(&path, &Config::default()).unwrap();
        let diagnosis = &outcome.diagnosis;

        assert_eq!(diagnosis.units.len(), 2);
        assert_eq!(diagnosis.aggregate.fet_failures, 1);
        assert_eq!(diagnosis.aggregate.not_communicating, 1);

        let finding = &diagnosis.units[0].findings[0];
        assert_eq!(finding.unit.mac, "04880000007B");
        assert!(matches!(
            finding.kind,
            FindingKind::FetFail {
                channel: InputChannel::Iin1,
                matched: 40,
                high_current: 40,
                ..
            }
        ));
        assert_eq!(diagnosis.units[1].identity.mac, "5C9080000005");
        assert!(diagnosis.units[1].findings.is_empty());
    }

    #[test]
    fn test_scan_missing_structure_is_fatal() {
        let (_root, path) = site(&telemetry_csv(), None);
        assert!(matches!(
            scan(&path, &Config::default()),
            Err(ScanError::StructureNotFound(_))
        ));
    }

    #[test]
    fn test_scan_malformed_table_is_fatal() {
        let (_root, path) = site("a,b,c,d,e\n1,2,3,4,5\n", Some(STRUCTURE));
        assert!(matches!(
            scan(&path, &Config::default()),
            Err(ScanError::MalformedTable { columns: 5 })
        ));
    }

    #[test]
    fn test_scan_short_rows_are_missing_values() {
        let headers: Vec<String> = (0..24).map(|c| format!("c{}", c)).collect();
        let full: Vec<String> = (0..24).map(|c| c.to_string()).collect();
        let csv = format!("{}\n{}\nt,1,2,3\n", headers.join(","), full.join(","));
        let (_root, path) = site(&csv, Some(STRUCTURE));

        let outcome = scan(&path, &Config::default()).unwrap();
        let signals = &outcome.diagnosis.units[0].signals;
        assert_eq!(signals.recorded, 1);
        assert_eq!(signals.mean_iout, Some(12.0));
    }

    #[test]
    fn test_alert_context_site_override() {
        let (_root, path) = site(&telemetry_csv(), Some(STRUCTURE));
        let outcome = scan(&path, &Config::default()).unwrap();

        let mut config = Config::default();
        assert_eq!(outcome.alert_context(&config).site, "canadian_solar");

        config.notify.site = Some("plant-7".to_string());
        let context = outcome.alert_context(&config);
        assert_eq!(context.site, "plant-7");
        assert_eq!(context.file_name, "20171105_b302.csv");
    }

    #[tokio::test]
    async fn test_alert_sends_fet_list() {
        let (_root, path) = site(&telemetry_csv(), Some(STRUCTURE));
        let config = Config::default();
        let outcome = scan(&path, &config).unwrap();

        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|subject, body| {
                subject == "List of FET failures for the site canadian_solar file 20171105_b302.csv"
                    && body.starts_with("Mac-1 04880000007B sn=0117A000123 located at 02.01.01-1")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        assert_eq!(alert(&outcome, &config, &notifier).await.unwrap(), 1);
    }
}
