use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use rusty_report::config::ReportConfig;
use rusty_report::engine::batch::BatchOptions;
use rusty_report::engine::batch::BatchProcessor;
use rusty_report::engine::coverage::CoverageStatus;
use rusty_report::engine::period::Period;
use rusty_report::engine::period::TargetPeriod;
use rusty_report::spreadsheet::Workbook;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing::warn;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "rusty-report",
    about = "Extract one period of figures from per-unit spreadsheet reports",
    version
)]
struct Args {
    /// Report workbook (.xlsx or .xlsm)
    #[arg(value_name = "WORKBOOK")]
    workbook: PathBuf,

    /// JSON configuration with units and rows to extract
    #[arg(short, long, value_name = "CONFIG")]
    config: PathBuf,

    /// Reporting period as YYYY-MM
    #[arg(short, long, value_parser = Period::parse)]
    period: Period,

    /// Date stamped onto extracted rows, defaults to the last day of the period
    #[arg(long, value_name = "YYYY-MM-DD")]
    date: Option<NaiveDate>,

    /// Process worksheets one after another
    #[arg(long)]
    sequential: bool,

    /// Write the JSON result here instead of stdout
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ReportConfig::load(&args.config)
        .with_context(|| format!("Failed to load config '{}'", args.config.display()))?;
    let workbook = Workbook::open(&args.workbook)
        .with_context(|| format!("Failed to open workbook '{}'", args.workbook.display()))?;
    let target = match args.date {
        Some(date) => TargetPeriod::with_date(args.period, date)?,
        None => TargetPeriod::new(args.period),
    };

    let options = BatchOptions {
        parallel: !args.sequential,
    };
    let processor = BatchProcessor::new(&config, options).context("Invalid configuration")?;
    let result = processor.process_workbook(&workbook, &target);

    let json = serde_json::to_string_pretty(&result)?;
    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write '{}'", path.display()))?;
            info!("Wrote result to '{}'", path.display());
        }
        None => writeln!(std::io::stdout(), "{}", json)?,
    }

    let coverage = &result.coverage;
    let missing_units = coverage
        .missing_unit_codes
        .iter()
        .map(|code| config.unit_label(code))
        .collect::<Vec<_>>()
        .join(", ");
    info!(
        "{} rows from {}/{} units, coverage {}%, status {:?}",
        result.rows.len(),
        coverage.matched_count,
        coverage.expected_count,
        coverage.coverage_percent,
        coverage.status
    );
    match coverage.status {
        CoverageStatus::Accepted => Ok(()),
        CoverageStatus::Degraded => {
            warn!("Missing units: {}", missing_units);
            Ok(())
        }
        CoverageStatus::Rejected => bail!(
            "Coverage {}% is below the acceptance threshold, missing units: {}",
            coverage.coverage_percent,
            missing_units
        ),
    }
}
