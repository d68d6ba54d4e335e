// src/report.rs
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::group_rules::GroupRule;
use crate::weekly_aggregator::{Verdict, WeeklyVerdict};

// --- Summaries ---

/// Share of normal weeks as a percentage with one decimal place.
fn normal_rate(normal: u32, total: u32) -> Decimal {
    if total == 0 {
        return dec!(0.0);
    }
    (Decimal::from(normal) * dec!(100) / Decimal::from(total)).round_dp(1)
}

/// Week counts for one employee over the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeSummary {
    pub employee_id: String,
    pub employee_name: String,
    pub department: String,
    pub group: String,
    pub weeks: u32,
    pub normal_weeks: u32,
    pub late_weeks: u32,
    pub absent_weeks: u32,
    pub abnormal_weeks: u32,
    pub normal_rate: Decimal,
}

/// One summary per employee, in order of first appearance.
pub fn summarize_employees(verdicts: &[WeeklyVerdict]) -> Vec<EmployeeSummary> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut summaries: Vec<EmployeeSummary> = Vec::new();

    for v in verdicts {
        let idx = *index.entry(v.employee_id.as_str()).or_insert_with(|| {
            summaries.push(EmployeeSummary {
                employee_id: v.employee_id.clone(),
                employee_name: v.employee_name.clone(),
                department: v.department.clone(),
                group: v.group.clone(),
                weeks: 0,
                normal_weeks: 0,
                late_weeks: 0,
                absent_weeks: 0,
                abnormal_weeks: 0,
                normal_rate: Decimal::ZERO,
            });
            summaries.len() - 1
        });
        let summary = &mut summaries[idx];
        summary.weeks += 1;
        match v.verdict {
            Verdict::Normal => summary.normal_weeks += 1,
            Verdict::Late(_) => summary.late_weeks += 1,
            Verdict::Absent(_) => summary.absent_weeks += 1,
            Verdict::Abnormal(_) => summary.abnormal_weeks += 1,
        }
    }

    for summary in &mut summaries {
        summary.normal_rate = normal_rate(summary.normal_weeks, summary.weeks);
    }
    summaries
}

/// Totals for a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub employees: usize,
    pub weeks: u32,
    pub normal_weeks: u32,
    pub abnormal_weeks: u32,
    pub normal_rate: Decimal,
}

impl RunSummary {
    pub fn from_verdicts(verdicts: &[WeeklyVerdict]) -> Self {
        let weeks = verdicts.len() as u32;
        let normal_weeks = verdicts.iter().filter(|v| v.verdict.is_normal()).count() as u32;
        let employees = verdicts
            .iter()
            .map(|v| v.employee_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        Self {
            employees,
            weeks,
            normal_weeks,
            abnormal_weeks: weeks - normal_weeks,
            normal_rate: normal_rate(normal_weeks, weeks),
        }
    }

    pub fn log(&self) {
        info!(
            "Run summary: {} employees, {} weeks, {} normal, {} abnormal, normal rate {}%",
            self.employees, self.weeks, self.normal_weeks, self.abnormal_weeks, self.normal_rate
        );
    }
}

// --- CSV Export ---

/// Flat view of a group rule for tabular output.
#[derive(Debug, Serialize)]
struct RuleRow<'a> {
    key: &'a str,
    group: &'a str,
    daily_punches: u32,
    weekly_expected_punches: u32,
    fields: String,
    description: &'a str,
}

impl<'a> From<&'a GroupRule> for RuleRow<'a> {
    fn from(rule: &'a GroupRule) -> Self {
        Self {
            key: &rule.key,
            group: &rule.display_name,
            daily_punches: rule.daily_punches,
            weekly_expected_punches: rule.weekly_expected_punches,
            fields: rule.field_names.join(" "),
            description: &rule.description,
        }
    }
}

fn write_records<W: Write, T: Serialize>(writer: W, rows: impl IntoIterator<Item = T>) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_verdicts_csv<W: Write>(writer: W, verdicts: &[WeeklyVerdict]) -> Result<()> {
    write_records(writer, verdicts)
}

pub fn write_summary_csv<W: Write>(writer: W, summaries: &[EmployeeSummary]) -> Result<()> {
    write_records(writer, summaries)
}

pub fn write_rules_csv<W: Write>(writer: W, rules: &[GroupRule]) -> Result<()> {
    write_records(writer, rules.iter().map(RuleRow::from))
}

/// Hex SHA-256 of the verdict detail CSV. Identical inputs and settings give
/// identical digests.
pub fn verdict_digest(verdicts: &[WeeklyVerdict]) -> Result<String> {
    let mut buffer = Vec::new();
    write_verdicts_csv(&mut buffer, verdicts)?;
    let mut hasher = Sha256::new();
    hasher.update(&buffer);
    Ok(hex::encode(hasher.finalize()))
}

// --- JSON Export ---

#[derive(Debug, Serialize)]
struct ExportDocument<'a> {
    summary: RunSummary,
    employees: Vec<EmployeeSummary>,
    verdicts: &'a [WeeklyVerdict],
    rules: &'a [GroupRule],
}

pub fn write_json<W: Write>(writer: W, verdicts: &[WeeklyVerdict], rules: &[GroupRule]) -> Result<()> {
    let document = ExportDocument {
        summary: RunSummary::from_verdicts(verdicts),
        employees: summarize_employees(verdicts),
        verdicts,
        rules,
    };
    serde_json::to_writer_pretty(writer, &document)?;
    Ok(())
}

// --- File Export ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

/// Files written by [`export`] and the digest of the verdict detail.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub files: Vec<PathBuf>,
    pub digest: String,
}

/// `<dir>/<stem>_<suffix>.csv` next to `path`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attendance".to_string());
    path.with_file_name(format!("{}_{}.csv", stem, suffix))
}

/// Writes the run's results to `path`. CSV output also writes the employee
/// summary and the group rules next to it.
pub fn export(
    path: &Path,
    format: ExportFormat,
    verdicts: &[WeeklyVerdict],
    rules: &[GroupRule],
) -> Result<ExportOutcome> {
    let files = match format {
        ExportFormat::Csv => {
            write_verdicts_csv(File::create(path)?, verdicts)?;
            let summary_path = sibling(path, "summary");
            write_summary_csv(File::create(&summary_path)?, &summarize_employees(verdicts))?;
            let rules_path = sibling(path, "rules");
            write_rules_csv(File::create(&rules_path)?, rules)?;
            vec![path.to_path_buf(), summary_path, rules_path]
        }
        ExportFormat::Json => {
            write_json(File::create(path)?, verdicts, rules)?;
            vec![path.to_path_buf()]
        }
    };
    let digest = verdict_digest(verdicts)?;
    for file in &files {
        info!("Wrote {}", file.display());
    }
    info!("Verdict digest (sha256): {}", digest);
    Ok(ExportOutcome { files, digest })
}
