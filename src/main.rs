//! # Fleet Fault Scan
//!
//! Find potentially failed units in a fleet telemetry snapshot.
//!
//! Reads one CSV log, prints a line per finding and a fleet summary to
//! stdout, and emails the FET-failure and module-off lists when they are not
//! empty. Logs go to stderr (and optionally a file).
//!
//! # Examples
//!
//! ```bash
//! fleet-fault-scan -i /mnt/data_log/canadian_solar/171105/20171105_b302.csv
//! fleet-fault-scan -i log_b302.csv --config scan.toml --format json --no-email
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use fleet_fault_scan::config::Config;
use fleet_fault_scan::notify::SmtpNotifier;
use fleet_fault_scan::pipeline;
use fleet_fault_scan::report::{self, JsonReport};

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "fleet-fault-scan")]
#[command(about = "Find potentially failed units in a fleet telemetry CSV")]
#[command(version)]
struct Cli {
    /// CSV file to analyze, with full path
    #[arg(short, long)]
    input: PathBuf,

    /// TOML configuration file (thresholds, SMTP settings)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the report without sending email alerts
    #[arg(long)]
    no_email: bool,

    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    format: Format,
}

/// Initialize logging to stderr, plus a log file when configured
fn init_logging(config: &Config) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match &config.logging.file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path
                .file_name()
                .with_context(|| format!("log file {} has no file name", path.display()))?;
            let appender = tracing_appender::rolling::never(dir.unwrap_or(Path::new(".")), name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    let _guard = init_logging(&config)?;

    info!("Fleet Fault Scan v{} starting...", env!("CARGO_PKG_VERSION"));

    let outcome = pipeline::scan(&cli.input, &config)?;
    let input = cli.input.display().to_string();

    match cli.format {
        Format::Text => println!(
            "{}",
            report::render_text(&input, &outcome.diagnosis, &config.diagnostics)
        ),
        Format::Json => println!("{}", JsonReport::new(&input, &outcome.diagnosis).render()?),
    }

    if cli.no_email {
        info!("Email alerts skipped (--no-email)");
        return Ok(());
    }

    if let Some(notifier) = SmtpNotifier::from_config(&config.notify)? {
        let sent = pipeline::alert(&outcome, &config, &notifier).await?;
        info!("Sent {} email alerts", sent);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_input_is_required() {
        assert!(Cli::try_parse_from(["fleet-fault-scan"]).is_err());
    }

    #[test]
    fn test_parse_all_flags() {
        let cli = Cli::try_parse_from([
            "fleet-fault-scan",
            "-i",
            "/data/site/171105/log_b302.csv",
            "-c",
            "scan.toml",
            "--no-email",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.input, PathBuf::from("/data/site/171105/log_b302.csv"));
        assert_eq!(cli.config, Some(PathBuf::from("scan.toml")));
        assert!(cli.no_email);
        assert_eq!(cli.format, Format::Json);
    }

    #[test]
    fn test_default_format_is_text() {
        let cli = Cli::try_parse_from(["fleet-fault-scan", "--input", "log_b1.csv"]).unwrap();
        assert_eq!(cli.format, Format::Text);
        assert!(!cli.no_email);
        assert!(cli.config.is_none());
    }
}
