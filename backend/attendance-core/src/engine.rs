// src/engine.rs
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

use crate::config::AnalysisPolicy;
use crate::day_classifier::{classify_day, DayClassification};
use crate::error::{AttendanceError, Result};
use crate::group_rules::{GroupRule, GroupRuleRegistry};
use crate::holidays::SpecialHolidaySet;
use crate::record::{AttendanceRecord, RawAttendanceRow};
use crate::week_tracker::{order_employee_records, WeekBoundaryTracker, WeekWindow};
use crate::weekly_aggregator::{aggregate, WeeklyVerdict};

const PROGRESS_EVERY: usize = 100;

/// Outcome of a full run over raw export rows.
#[derive(Debug, Default)]
pub struct AnalysisReport {
    pub verdicts: Vec<WeeklyVerdict>,
    pub rows_read: usize,
    pub rows_skipped: usize,
    /// Rows outside the requested group filter.
    pub rows_filtered: usize,
    pub unresolved_group_rows: usize,
    pub skipped: Vec<AttendanceError>,
}

/// Attendance pipeline for one run: classification, week tracking and
/// aggregation under one policy, holiday set and group table.
pub struct AttendanceEngine<'a> {
    registry: &'a GroupRuleRegistry,
    holidays: &'a SpecialHolidaySet,
    policy: AnalysisPolicy,
}

impl<'a> AttendanceEngine<'a> {
    pub fn new(
        registry: &'a GroupRuleRegistry,
        holidays: &'a SpecialHolidaySet,
        policy: AnalysisPolicy,
    ) -> Self {
        Self {
            registry,
            holidays,
            policy,
        }
    }

    pub fn policy(&self) -> AnalysisPolicy {
        self.policy
    }

    fn rule_for(&self, record: &AttendanceRecord) -> &'a GroupRule {
        self.registry.lookup(record.group_label.as_deref()).rule
    }

    /// Group an employee is judged under for the whole run: the first of
    /// their records that carries a group label decides it.
    fn employee_rule(&self, records: &[AttendanceRecord]) -> &'a GroupRule {
        match records.iter().find_map(|r| r.group_label.as_deref()) {
            Some(label) => self.registry.resolve(Some(label)).rule,
            None => self.registry.default_rule(),
        }
    }

    /// Classifies a single day on its own, under the group its label resolves
    /// to. [`build_weeks`](Self::build_weeks) classifies under the employee's
    /// group instead.
    pub fn classify_day(&self, record: &AttendanceRecord) -> DayClassification {
        classify_day(record, self.holidays, self.rule_for(record), self.policy.calendar)
    }

    /// Splits records into week windows, one employee at a time in order of
    /// first appearance. Each employee's records are date-ordered first.
    pub fn build_weeks(&self, records: Vec<AttendanceRecord>) -> Vec<WeekWindow> {
        let employees = group_by_employee(records)
            .into_iter()
            .map(|records| (self.employee_rule(&records), records))
            .collect();
        self.track(employees)
    }

    fn track(&self, employees: Vec<(&'a GroupRule, Vec<AttendanceRecord>)>) -> Vec<WeekWindow> {
        let mut tracker = WeekBoundaryTracker::new(self.policy.anchor);
        let mut windows = Vec::new();
        for (rule, records) in employees {
            for record in order_employee_records(records) {
                let classification = classify_day(&record, self.holidays, rule, self.policy.calendar);
                windows.extend(tracker.push(record, classification, rule));
            }
        }
        windows.extend(tracker.finish());
        windows
    }

    pub fn aggregate_week(&self, window: &WeekWindow) -> WeeklyVerdict {
        aggregate(window, self.policy.shortfall)
    }

    /// One verdict per employee-week.
    pub fn analyze(&self, records: Vec<AttendanceRecord>) -> Vec<WeeklyVerdict> {
        let windows = self.build_weeks(records);
        self.judge_weeks(&windows)
    }

    fn judge_weeks(&self, windows: &[WeekWindow]) -> Vec<WeeklyVerdict> {
        let verdicts: Vec<WeeklyVerdict> = windows.iter().map(|w| self.aggregate_week(w)).collect();
        let normal = verdicts.iter().filter(|v| v.verdict.is_normal()).count();
        info!(
            "Analysis complete: {} weekly verdicts, {} normal, {} abnormal",
            verdicts.len(),
            normal,
            verdicts.len() - normal
        );
        verdicts
    }

    /// Parses export rows, drops those that cannot be used, and analyzes the
    /// rest. Rows that failed to decode arrive as errors and are counted as
    /// skipped. `only_group` restricts the run to employees of one group.
    pub fn analyze_rows(
        &self,
        rows: Vec<Result<RawAttendanceRow>>,
        only_group: Option<&GroupRule>,
    ) -> AnalysisReport {
        let total = rows.len();
        let mut report = AnalysisReport {
            rows_read: total,
            ..Default::default()
        };
        let pair_count = self.registry.max_daily_pairs();
        let mut records = Vec::with_capacity(total);

        for (idx, raw) in rows.into_iter().enumerate() {
            let row = idx + 1;
            if row % PROGRESS_EVERY == 0 {
                info!("Progress: {}/{} rows", row, total);
            }

            let record = match raw.and_then(|raw| AttendanceRecord::from_raw(row, &raw, pair_count)) {
                Ok(record) => record,
                Err(e) => {
                    warn!("{}", e);
                    report.rows_skipped += 1;
                    report.skipped.push(e);
                    continue;
                }
            };
            if record.group_label.is_some() && !self.registry.lookup(record.group_label.as_deref()).matched {
                report.unresolved_group_rows += 1;
            }
            records.push(record);
        }

        let mut employees = Vec::new();
        for records in group_by_employee(records) {
            let rule = self.employee_rule(&records);
            if only_group.is_some_and(|g| g.key != rule.key) {
                report.rows_filtered += records.len();
                continue;
            }
            employees.push((rule, records));
        }

        log_group_census(&employees);
        let windows = self.track(employees);
        report.verdicts = self.judge_weeks(&windows);

        if report.rows_skipped > 0 {
            warn!(
                "{} of {} rows skipped as unusable",
                report.rows_skipped, report.rows_read
            );
        }
        report
    }
}

/// Splits records per employee, keeping the order in which employees first
/// appear.
fn group_by_employee(records: Vec<AttendanceRecord>) -> Vec<Vec<AttendanceRecord>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut employees: Vec<Vec<AttendanceRecord>> = Vec::new();
    for record in records {
        match index.get(&record.employee_id) {
            Some(&i) => employees[i].push(record),
            None => {
                index.insert(record.employee_id.clone(), employees.len());
                employees.push(vec![record]);
            }
        }
    }
    employees
}

/// Logs which groups appear in the data and how many employees each has.
fn log_group_census(employees: &[(&GroupRule, Vec<AttendanceRecord>)]) {
    let mut census: BTreeMap<&str, usize> = BTreeMap::new();
    for (rule, _) in employees {
        *census.entry(rule.display_name.as_str()).or_default() += 1;
    }
    for (group, count) in &census {
        info!("Group {}: {} employees", group, count);
    }
}
