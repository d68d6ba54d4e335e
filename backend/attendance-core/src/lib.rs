// src/lib.rs
//! Weekly attendance compliance: classifies time-clock punches per day, splits
//! them into employee weeks and renders one verdict per employee-week.

pub mod config;
pub mod day_classifier;
pub mod engine;
pub mod error;
pub mod group_rules;
pub mod holidays;
pub mod punch_status;
pub mod record;
pub mod report;
pub mod week_tracker;
pub mod weekly_aggregator;
pub mod work_duration;


pub use config::{AnalysisPolicy, CalendarMode, Settings, ShortfallPolicy, WeekAnchor};
pub use day_classifier::{classify_day, DayClassification, DayReason, DayTag, PairOutcome};
pub use engine::{AnalysisReport, AttendanceEngine};
pub use error::{AttendanceError, Result};
pub use group_rules::{GroupRule, GroupRuleRegistry};
pub use holidays::SpecialHolidaySet;
pub use record::{AttendanceRecord, PunchLeg, PunchPair, RawAttendanceRow};
pub use report::{EmployeeSummary, RunSummary};
pub use week_tracker::{WeekBoundaryTracker, WeekEntry, WeekWindow};
pub use weekly_aggregator::{Verdict, WeeklyVerdict};
