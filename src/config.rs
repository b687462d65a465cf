//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default matching the fleet the tool was tuned for,
//! so running without a configuration file (or with an empty one) applies
//! the stock thresholds.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, ScanError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub outliers: OutlierConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Thresholds for the per-unit rule battery
#[derive(Debug, Deserialize, Clone)]
pub struct DiagnosticsConfig {
    /// Max |Iout - Iin| (A) for the currents to count as equal
    #[serde(default = "default_delta")]
    pub delta: f64,

    /// Fraction of high-current rows that must match to flag a FET failure
    #[serde(default = "default_percentage")]
    pub percentage: f64,

    /// Iout (A) above which a row counts towards the FET rule
    #[serde(default = "default_iout_limit")]
    pub iout_limit: f64,

    /// Rows a unit needs (strictly more than) before threshold rules apply
    #[serde(default = "default_min_records")]
    pub min_records: usize,

    /// Mean Iout (A) below which a unit is producing no power
    #[serde(default = "default_iout_threshold")]
    pub iout_threshold: f64,

    /// Dissipation (W) above which a row counts as high Pdiss
    #[serde(default = "default_pdiss_threshold")]
    pub pdiss_threshold: f64,

    /// Fleet mean Vout (V) separating the 600V and 800V systems
    #[serde(default = "default_vout_system_split")]
    pub vout_system_split: f64,

    /// Open-circuit threshold for the high-voltage system
    #[serde(default = "default_vout_threshold_high")]
    pub vout_threshold_high: f64,

    /// Open-circuit threshold for the low-voltage system
    #[serde(default = "default_vout_threshold_low")]
    pub vout_threshold_low: f64,
}

/// Plausible ranges for monitored readings; values outside are outliers
#[derive(Debug, Deserialize, Clone)]
pub struct OutlierConfig {
    #[serde(default = "default_voltage_min")]
    pub voltage_min: f64,

    #[serde(default = "default_voltage_max")]
    pub voltage_max: f64,

    #[serde(default = "default_current_min")]
    pub current_min: f64,

    #[serde(default = "default_current_max")]
    pub current_max: f64,

    #[serde(default = "default_temperature_min")]
    pub temperature_min: f64,

    #[serde(default = "default_temperature_max")]
    pub temperature_max: f64,
}

/// Email alert configuration
#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    #[serde(default = "default_notify_enabled")]
    pub enabled: bool,

    /// SMTP relay host; empty disables delivery
    #[serde(default)]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default = "default_from")]
    pub from: String,

    #[serde(default)]
    pub to: Vec<String>,

    #[serde(default)]
    pub smtp_user: Option<String>,

    /// Falls back to the `SMTP_PASSWORD` environment variable
    #[serde(default)]
    pub smtp_password: Option<String>,

    /// Site name used in alert subjects instead of the directory name
    #[serde(default)]
    pub site: Option<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Also write logs to this file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

// Default value functions
fn default_delta() -> f64 { 0.05 }
fn default_percentage() -> f64 { 0.10 }
fn default_iout_limit() -> f64 { 2.0 }
fn default_min_records() -> usize { 30 }
fn default_iout_threshold() -> f64 { 0.1 }
fn default_pdiss_threshold() -> f64 { 120.0 }
fn default_vout_system_split() -> f64 { 700.0 }
fn default_vout_threshold_high() -> f64 { 857.0 }
fn default_vout_threshold_low() -> f64 { 657.0 }

fn default_voltage_min() -> f64 { -1.0 }
fn default_voltage_max() -> f64 { 1500.0 }
fn default_current_min() -> f64 { -1.0 }
fn default_current_max() -> f64 { 15.0 }
fn default_temperature_min() -> f64 { -30.0 }
fn default_temperature_max() -> f64 { 100.0 }

fn default_notify_enabled() -> bool { true }
fn default_smtp_port() -> u16 { 587 }
fn default_from() -> String { "fleet-fault-scan@localhost".to_string() }

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            delta: default_delta(),
            percentage: default_percentage(),
            iout_limit: default_iout_limit(),
            min_records: default_min_records(),
            iout_threshold: default_iout_threshold(),
            pdiss_threshold: default_pdiss_threshold(),
            vout_system_split: default_vout_system_split(),
            vout_threshold_high: default_vout_threshold_high(),
            vout_threshold_low: default_vout_threshold_low(),
        }
    }
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            voltage_min: default_voltage_min(),
            voltage_max: default_voltage_max(),
            current_min: default_current_min(),
            current_max: default_current_max(),
            temperature_min: default_temperature_min(),
            temperature_max: default_temperature_max(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: default_notify_enabled(),
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            from: default_from(),
            to: Vec::new(),
            smtp_user: None,
            smtp_password: None,
            site: None,
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> ScanError {
    ScanError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fleet_fault_scan::config::Config;
    ///
    /// let config = Config::load("config/scan.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any threshold or bound is out of its valid range
    pub fn validate(&self) -> Result<()> {
        let d = &self.diagnostics;

        if !(d.delta > 0.0) {
            return Err(invalid("delta must be greater than 0"));
        }

        if !(d.percentage > 0.0 && d.percentage <= 1.0) {
            return Err(invalid("percentage must be in (0.0, 1.0]"));
        }

        if d.iout_limit < 0.0 || d.iout_threshold < 0.0 {
            return Err(invalid("iout_limit and iout_threshold must not be negative"));
        }

        if d.vout_threshold_low >= d.vout_threshold_high {
            return Err(invalid("vout_threshold_low must be less than vout_threshold_high"));
        }

        let o = &self.outliers;
        for (name, min, max) in [
            ("voltage", o.voltage_min, o.voltage_max),
            ("current", o.current_min, o.current_max),
            ("temperature", o.temperature_min, o.temperature_max),
        ] {
            if min >= max {
                return Err(invalid(format!("{}_min must be less than {}_max", name, name)));
            }
        }

        let n = &self.notify;
        if n.enabled && !n.smtp_host.is_empty() && n.to.is_empty() {
            return Err(invalid("notify.to must list at least one recipient"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.notify.smtp_host.is_empty());
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"").unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.diagnostics.min_records, 30);
        assert_eq!(config.outliers.voltage_max, 1500.0);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[diagnostics]
pdiss_threshold = 150.0

[outliers]
current_max = 20.0

[notify]
smtp_host = "smtp.example.com"
to = ["ops@example.com"]
site = "plant-7"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.diagnostics.pdiss_threshold, 150.0);
        assert_eq!(config.diagnostics.delta, 0.05);
        assert_eq!(config.outliers.current_max, 20.0);
        assert_eq!(config.notify.smtp_port, 587);
        assert_eq!(config.notify.site.as_deref(), Some("plant-7"));
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/scan.toml");
        let config = Config::load(path).unwrap();
        let defaults = Config::default();

        assert_eq!(config.diagnostics.delta, defaults.diagnostics.delta);
        assert_eq!(config.diagnostics.vout_threshold_high, defaults.diagnostics.vout_threshold_high);
        assert_eq!(config.outliers.temperature_min, defaults.outliers.temperature_min);
        assert_eq!(config.notify.from, defaults.notify.from);
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[diagnostics\ndelta = ").unwrap();
        temp_file.flush().unwrap();

        assert!(matches!(
            Config::load(temp_file.path()),
            Err(ScanError::Config(_))
        ));
    }

    #[test]
    fn test_delta_zero() {
        let mut config = Config::default();
        config.diagnostics.delta = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_percentage_out_of_range() {
        let mut config = Config::default();
        config.diagnostics.percentage = 1.5;
        assert!(config.validate().is_err());

        config.diagnostics.percentage = 0.0;
        assert!(config.validate().is_err());

        config.diagnostics.percentage = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_iout_limit() {
        let mut config = Config::default();
        config.diagnostics.iout_limit = -2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_vout_thresholds_inverted() {
        let mut config = Config::default();
        config.diagnostics.vout_threshold_low = 900.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_outlier_bounds_inverted() {
        let mut config = Config::default();
        config.outliers.temperature_min = 100.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_smtp_host_without_recipients() {
        let mut config = Config::default();
        config.notify.smtp_host = "smtp.example.com".to_string();
        assert!(config.validate().is_err());

        config.notify.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_delta(), 0.05);
        assert_eq!(default_percentage(), 0.10);
        assert_eq!(default_iout_limit(), 2.0);
        assert_eq!(default_min_records(), 30);
        assert_eq!(default_iout_threshold(), 0.1);
        assert_eq!(default_pdiss_threshold(), 120.0);
        assert_eq!(default_vout_system_split(), 700.0);
        assert_eq!(default_vout_threshold_high(), 857.0);
        assert_eq!(default_vout_threshold_low(), 657.0);
        assert_eq!(default_voltage_min(), -1.0);
        assert_eq!(default_voltage_max(), 1500.0);
        assert_eq!(default_current_min(), -1.0);
        assert_eq!(default_current_max(), 15.0);
        assert_eq!(default_temperature_min(), -30.0);
        assert_eq!(default_temperature_max(), 100.0);
        assert_eq!(default_smtp_port(), 587);
    }
}
