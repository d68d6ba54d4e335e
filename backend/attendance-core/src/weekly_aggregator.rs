// src/weekly_aggregator.rs
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::fmt;
use tracing::debug;

use crate::config::ShortfallPolicy;
use crate::week_tracker::WeekWindow;

/// Final judgement for one employee-week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Normal,
    Late(u32),
    Absent(u32),
    Abnormal(u32),
}

impl Verdict {
    pub fn is_normal(&self) -> bool {
        matches!(self, Verdict::Normal)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Normal => write!(f, "Normal"),
            Verdict::Late(n) => write!(f, "Late-{}", n),
            Verdict::Absent(n) => write!(f, "Absent-{}", n),
            Verdict::Abnormal(n) => write!(f, "Abnormal-{}", n),
        }
    }
}

impl Serialize for Verdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyVerdict {
    pub employee_id: String,
    pub employee_name: String,
    pub department: String,
    pub group: String,
    pub week_label: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub expected_punches: u32,
    /// Punches counted from the week's days, before any shortfall credit.
    pub actual_punches: u32,
    pub normal: u32,
    pub late: u32,
    pub absent: u32,
    pub verdict: Verdict,
}

fn judge(expected: u32, normal: u32, late: u32, absent: u32) -> Verdict {
    if normal >= expected {
        Verdict::Normal
    } else if absent > 0 {
        Verdict::Absent(absent)
    } else if late > 0 {
        Verdict::Late(late)
    } else {
        Verdict::Abnormal(expected - normal)
    }
}

/// Rolls a week's day classifications into its verdict.
pub fn aggregate(window: &WeekWindow, shortfall: ShortfallPolicy) -> WeeklyVerdict {
    let (mut normal, mut mild_late, mut severe_late, mut absent) = (0u32, 0u32, 0u32, 0u32);
    for entry in &window.entries {
        let day = entry.classification();
        normal += day.normal;
        mild_late += day.late;
        severe_late += day.severely_late;
        absent += day.absent_punches;
    }
    let actual = normal + mild_late + severe_late + absent;

    let (expected, normal, late, absent) = match shortfall {
        ShortfallPolicy::FullCredit => {
            let expected = window.rule.weekly_expected_punches;
            // Holidays and partial data leave weeks short; the gap counts as attended.
            let normal = normal + expected.saturating_sub(actual);
            (expected, normal, mild_late + severe_late, absent)
        }
        ShortfallPolicy::HalfWeekBaseline { baseline } => {
            if normal >= baseline {
                (baseline, baseline, 0, 0)
            } else {
                // The gap is charged to mild deficits first; the rest joins
                // the recorded absences.
                let missing = baseline - normal;
                let late = mild_late.min(missing);
                (baseline, normal, late, absent + missing - late)
            }
        }
    };

    let verdict = judge(expected, normal, late, absent);
    debug!(
        "{} {}: expected {}, actual {}, normal {}, late {}, absent {} => {}",
        window.employee_id,
        window.label(),
        expected,
        actual,
        normal,
        late,
        absent,
        verdict
    );

    WeeklyVerdict {
        employee_id: window.employee_id.clone(),
        employee_name: window.employee_name().to_string(),
        department: window.department().to_string(),
        group: window.rule.display_name.clone(),
        week_label: window.label(),
        week_start: window.start,
        week_end: window.end,
        expected_punches: expected,
        actual_punches: actual,
        normal,
        late,
        absent,
        verdict,
    }
}
