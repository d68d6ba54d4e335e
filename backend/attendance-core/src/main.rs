// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use attendance_core::config::Settings;
use attendance_core::engine::AttendanceEngine;
use attendance_core::group_rules::GroupRuleRegistry;
use attendance_core::record::read_rows;
use attendance_core::report::{export, ExportFormat, RunSummary};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

impl From<OutputFormat> for ExportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Csv => ExportFormat::Csv,
            OutputFormat::Json => ExportFormat::Json,
        }
    }
}

/// Weekly attendance verdicts from a time-clock CSV export.
///
/// Flags override the matching `ATTENDANCE_*` environment variables.
#[derive(Debug, Parser)]
#[command(name = "attendance-core", version, about)]
struct Cli {
    /// Time-clock export (CSV, English or Chinese headers).
    input: PathBuf,

    /// Where to write the verdicts. Defaults to `<input stem>_verdicts.<ext>`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Group used for labels that match no known group.
    #[arg(long)]
    default_group: Option<String>,

    /// `business` or `school`.
    #[arg(long)]
    edition: Option<String>,

    /// `monday-friday` or `sunday-saturday`; overrides the edition's anchor.
    #[arg(long)]
    week_anchor: Option<String>,

    /// Special holiday (YYYY-MM-DD). Repeatable; adds to ATTENDANCE_HOLIDAYS.
    #[arg(long = "holiday")]
    holidays: Vec<String>,

    /// Only analyze employees of this group.
    #[arg(long)]
    only_group: Option<String>,

    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(group) = &self.default_group {
            settings.default_group = group.clone();
        }
        if let Some(edition) = &self.edition {
            settings.edition = edition.clone();
        }
        if let Some(anchor) = &self.week_anchor {
            settings.week_anchor = Some(anchor.clone());
        }
        if !self.holidays.is_empty() {
            let mut all: Vec<String> = settings.holidays.iter().cloned().collect();
            all.extend(self.holidays.iter().cloned());
            settings.holidays = Some(all.join(","));
        }
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
    }

    fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let stem = self
                .input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attendance".to_string());
            let ext = match self.format {
                OutputFormat::Csv => "csv",
                OutputFormat::Json => "json",
            };
            self.input.with_file_name(format!("{}_verdicts.{}", stem, ext))
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::from_env().context("Loading ATTENDANCE_* settings failed")?;
    cli.apply(&mut settings);

    // --- Setup ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("Setting tracing subscriber failed")?;
    info!("Settings loaded: {:?}", settings);

    // --- Rules, Holidays, Policy ---
    let registry = GroupRuleRegistry::with_default(&settings.default_group).context("Invalid default group")?;
    let policy = settings.policy().context("Invalid analysis policy")?;
    let (holidays, rejected) = settings.holiday_set();
    if !rejected.is_empty() {
        warn!("{} holiday entries ignored", rejected.len());
    }
    info!("{} special holidays configured", holidays.len());

    let only_group = match cli.only_group.as_deref() {
        Some(key) => Some(
            registry
                .get(key)
                .with_context(|| format!("Unknown group for --only-group: {}", key))?,
        ),
        None => None,
    };

    // --- Analysis ---
    let file = File::open(&cli.input).with_context(|| format!("Opening {}", cli.input.display()))?;
    let rows = read_rows(file).with_context(|| format!("Reading {}", cli.input.display()))?;
    info!("Read {} rows from {}", rows.len(), cli.input.display());

    let engine = AttendanceEngine::new(&registry, &holidays, policy);
    let report = engine.analyze_rows(rows, only_group);
    info!(
        "{} rows used, {} skipped, {} outside group filter, {} with unresolved group",
        report.rows_read - report.rows_skipped - report.rows_filtered,
        report.rows_skipped,
        report.rows_filtered,
        report.unresolved_group_rows
    );

    // --- Export ---
    let output = cli.output_path();
    export(&output, cli.format.into(), &report.verdicts, registry.rules())
        .with_context(|| format!("Writing results to {}", output.display()))?;
    RunSummary::from_verdicts(&report.verdicts).log();

    Ok(())
}
