// src/week_tracker.rs
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::config::WeekAnchor;
use crate::day_classifier::{DayClassification, DayReason};
use crate::group_rules::GroupRule;
use crate::record::AttendanceRecord;

// --- Week Anchors ---

impl WeekAnchor {
    /// Inclusive span of the week containing `date`, or `None` when the date
    /// belongs to no week under this anchor (weekends of a business week).
    pub fn span_of(self, date: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            WeekAnchor::MondayFriday => {
                if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                    return None;
                }
                let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
                Some((monday, monday + Duration::days(4)))
            }
            WeekAnchor::SundaySaturday => {
                let sunday = date - Duration::days(date.weekday().num_days_from_sunday() as i64);
                Some((sunday, sunday + Duration::days(6)))
            }
        }
    }

    /// Days that are expected to carry punches.
    pub fn is_work_day(self, weekday: Weekday) -> bool {
        match self {
            WeekAnchor::MondayFriday => !matches!(weekday, Weekday::Sat | Weekday::Sun),
            WeekAnchor::SundaySaturday => weekday != Weekday::Sat,
        }
    }

    /// Whether `record` is the last day of its week. The school week goes by
    /// the weekday printed on the record.
    pub fn closes_on(self, record: &AttendanceRecord) -> bool {
        match self {
            WeekAnchor::MondayFriday => record.date.weekday() == Weekday::Fri,
            WeekAnchor::SundaySaturday => record.labelled_weekday() == Weekday::Sat,
        }
    }
}

// --- Week Windows ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeekEntry {
    Recorded {
        record: AttendanceRecord,
        classification: DayClassification,
    },
    /// A workday missing from the export, credited in full.
    Backfilled {
        date: NaiveDate,
        classification: DayClassification,
    },
}

impl WeekEntry {
    pub fn date(&self) -> NaiveDate {
        match self {
            WeekEntry::Recorded { record, .. } => record.date,
            WeekEntry::Backfilled { date, .. } => *date,
        }
    }

    pub fn classification(&self) -> &DayClassification {
        match self {
            WeekEntry::Recorded { classification, .. } | WeekEntry::Backfilled { classification, .. } => {
                classification
            }
        }
    }

    pub fn record(&self) -> Option<&AttendanceRecord> {
        match self {
            WeekEntry::Recorded { record, .. } => Some(record),
            WeekEntry::Backfilled { .. } => None,
        }
    }
}

/// One employee's days within one anchor week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekWindow {
    pub employee_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub rule: GroupRule,
    pub entries: Vec<WeekEntry>,
}

impl WeekWindow {
    pub fn label(&self) -> String {
        format!("{} ~ {}", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"))
    }

    fn first_record(&self) -> Option<&AttendanceRecord> {
        self.entries.iter().find_map(WeekEntry::record)
    }

    pub fn employee_name(&self) -> &str {
        self.first_record().map(|r| r.name.as_str()).unwrap_or(&self.employee_id)
    }

    pub fn department(&self) -> &str {
        self.first_record().map(|r| r.department.as_str()).unwrap_or_default()
    }

    pub fn backfilled_days(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, WeekEntry::Backfilled { .. }))
            .count()
    }
}

// --- Tracker ---

/// Groups a date-ordered stream of classified days into week windows.
///
/// Windows are emitted as soon as they close: on the anchor's last day, when
/// the stream moves on to a later week, or when the employee changes.
/// [`WeekBoundaryTracker::finish`] hands back whatever is still open.
#[derive(Debug)]
pub struct WeekBoundaryTracker {
    anchor: WeekAnchor,
    current: Option<WeekWindow>,
}

impl WeekBoundaryTracker {
    pub fn new(anchor: WeekAnchor) -> Self {
        Self {
            anchor,
            current: None,
        }
    }

    pub fn push(
        &mut self,
        record: AttendanceRecord,
        classification: DayClassification,
        rule: &GroupRule,
    ) -> Vec<WeekWindow> {
        let mut closed = Vec::new();
        let Some((start, end)) = self.anchor.span_of(record.date) else {
            debug!(
                "{} {}: outside the {:?} week, not counted",
                record.employee_id, record.date, self.anchor
            );
            return closed;
        };

        if let Some(window) = self.current.take() {
            if window.employee_id != record.employee_id {
                debug!(
                    "Employee changed ({} -> {}); closing {}",
                    window.employee_id,
                    record.employee_id,
                    window.label()
                );
                closed.push(window);
            } else if window.start < start {
                closed.push(self.backfill(window));
            } else if window.start > start {
                warn!(
                    "{} {}: record precedes the open week {}; closing it",
                    record.employee_id,
                    record.date,
                    window.label()
                );
                closed.push(window);
            } else {
                self.current = Some(window);
            }
        }

        let closes = self.anchor.closes_on(&record);
        let window = self.current.get_or_insert_with(|| WeekWindow {
            employee_id: record.employee_id.clone(),
            start,
            end,
            rule: rule.clone(),
            entries: Vec::new(),
        });
        window.entries.push(WeekEntry::Recorded {
            record,
            classification,
        });

        if closes {
            closed.extend(self.current.take());
        }
        closed
    }

    /// Closes the open window, if any, without backfilling.
    pub fn finish(&mut self) -> Option<WeekWindow> {
        self.current.take()
    }

    /// Credits the workdays after the last entry up to the end of the week.
    fn backfill(&self, mut window: WeekWindow) -> WeekWindow {
        let Some(last) = window.entries.last().map(WeekEntry::date) else {
            return window;
        };
        let mut added = 0;
        let mut date = last + Duration::days(1);
        while date <= window.end {
            if self.anchor.is_work_day(date.weekday()) {
                window.entries.push(WeekEntry::Backfilled {
                    date,
                    classification: DayClassification::full_credit(
                        DayReason::Backfilled,
                        window.rule.daily_punches,
                    ),
                });
                added += 1;
            }
            date += Duration::days(1);
        }
        if added > 0 {
            info!(
                "{} {}: {} missing trailing day(s) credited",
                window.employee_id,
                window.label(),
                added
            );
        }
        window
    }
}

/// Date-orders one employee's records and drops repeated dates, keeping the
/// first occurrence.
pub fn order_employee_records(mut records: Vec<AttendanceRecord>) -> Vec<AttendanceRecord> {
    if !records.windows(2).all(|w| w[0].date <= w[1].date) {
        debug!("Records arrived out of date order; sorting");
        records.sort_by_key(|r| r.date);
    }
    let mut seen = HashSet::new();
    records.retain(|r| {
        let fresh = seen.insert(r.date);
        if !fresh {
            warn!(
                "Duplicate record for employee {} on {}; keeping the first",
                r.employee_id, r.date
            );
        }
        fresh
    });
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::day_classifier::DayTag;
    use crate::group_rules::{GroupRuleRegistry, GROUP_TEACHER};

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
    }

    fn teacher() -> GroupRule {
        GroupRuleRegistry::with_default(GROUP_TEACHER)
            .unwrap()
            .default_rule()
            .clone()
    }

    fn normal_day() -> DayClassification {
        DayClassification::full_credit(DayReason::Punches, 2)
    }

    fn run(anchor: WeekAnchor, records: Vec<AttendanceRecord>) -> Vec<WeekWindow> {
        let rule = teacher();
        let mut tracker = WeekBoundaryTracker::new(anchor);
        let mut windows = Vec::new();
        for record in records {
            windows.extend(tracker.push(record, normal_day(), &rule));
        }
        windows.extend(tracker.finish());
        windows
    }

    fn rec(id: &str, date: &str) -> AttendanceRecord {
        AttendanceRecord::new(id, id, d(date))
    }

    fn dates(window: &WeekWindow) -> Vec<NaiveDate> {
        window.entries.iter().map(WeekEntry::date).collect()
    }

    #[test]
    fn business_week_spans() {
        // 2025-09-10 is a Wednesday.
        assert_eq!(
            WeekAnchor::MondayFriday.span_of(d("2025-09-10")),
            Some((d("2025-09-08"), d("2025-09-12")))
        );
        assert_eq!(WeekAnchor::MondayFriday.span_of(d("2025-09-13")), None);
        assert_eq!(
            WeekAnchor::SundaySaturday.span_of(d("2025-09-13")),
            Some((d("2025-09-07"), d("2025-09-13")))
        );
        assert_eq!(
            WeekAnchor::SundaySaturday.span_of(d("2025-09-07")),
            Some((d("2025-09-07"), d("2025-09-13")))
        );
    }

    #[test]
    fn full_week_closes_on_friday() {
        let records = (8..=12).map(|day| rec("A", &format!("2025-09-{:02}", day))).collect();
        let windows = run(WeekAnchor::MondayFriday, records);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].entries.len(), 5);
        assert_eq!(windows[0].label(), "2025-09-08 ~ 2025-09-12");
        assert_eq!(windows[0].backfilled_days(), 0);
    }

    #[test]
    fn leading_partial_week_is_kept() {
        let records = vec![rec("A", "2025-09-11"), rec("A", "2025-09-12"), rec("A", "2025-09-15")];
        let windows = run(WeekAnchor::MondayFriday, records);
        assert_eq!(windows.len(), 2);
        assert_eq!(dates(&windows[0]), vec![d("2025-09-11"), d("2025-09-12")]);
        assert_eq!(windows[1].start, d("2025-09-15"));
    }

    #[test]
    fn week_jump_backfills_the_missing_tail() {
        // Mon-Tue of one week, then straight into the next.
        let records = vec![rec("A", "2025-09-08"), rec("A", "2025-09-09"), rec("A", "2025-09-15")];
        let windows = run(WeekAnchor::MondayFriday, records);
        assert_eq!(windows.len(), 2);
        let first = &windows[0];
        assert_eq!(first.backfilled_days(), 3);
        assert_eq!(
            dates(first),
            vec![
                d("2025-09-08"),
                d("2025-09-09"),
                d("2025-09-10"),
                d("2025-09-11"),
                d("2025-09-12")
            ]
        );
        let backfilled = first.entries[4].classification();
        assert_eq!(backfilled.reason, DayReason::Backfilled);
        assert_eq!(backfilled.tag, DayTag::Normal);
        assert_eq!(backfilled.normal, 2);
    }

    #[test]
    fn employee_change_force_closes_without_backfill() {
        let records = vec![rec("A", "2025-09-08"), rec("B", "2025-09-08"), rec("B", "2025-09-09")];
        let windows = run(WeekAnchor::MondayFriday, records);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].employee_id, "A");
        assert_eq!(windows[0].entries.len(), 1);
        assert_eq!(windows[1].employee_id, "B");
        assert_eq!(windows[1].entries.len(), 2);
    }

    #[test]
    fn terminal_window_is_emitted() {
        let windows = run(WeekAnchor::MondayFriday, vec![rec("A", "2025-09-08")]);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].backfilled_days(), 0);
    }

    #[test]
    fn weekend_records_fall_outside_business_weeks() {
        let records = vec![rec("A", "2025-09-12"), rec("A", "2025-09-13"), rec("A", "2025-09-14")];
        let windows = run(WeekAnchor::MondayFriday, records);
        assert_eq!(windows.len(), 1);
        assert_eq!(dates(&windows[0]), vec![d("2025-09-12")]);
    }

    #[test]
    fn school_week_closes_on_saturday_label() {
        let records = vec![
            rec("A", "2025-09-07").weekday_label("星期日"),
            rec("A", "2025-09-08").weekday_label("星期一"),
            rec("A", "2025-09-13").weekday_label("星期六"),
            rec("A", "2025-09-14").weekday_label("星期日"),
        ];
        let windows = run(WeekAnchor::SundaySaturday, records);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].label(), "2025-09-07 ~ 2025-09-13");
        assert_eq!(windows[0].entries.len(), 3);
        assert_eq!(windows[1].start, d("2025-09-14"));
    }

    #[test]
    fn school_week_backfill_skips_saturday() {
        let records = vec![
            rec("A", "2025-09-07").weekday_label("星期日"),
            rec("A", "2025-09-10").weekday_label("星期三"),
            rec("A", "2025-09-15").weekday_label("星期一"),
        ];
        let windows = run(WeekAnchor::SundaySaturday, records);
        assert_eq!(windows[0].backfilled_days(), 2);
        assert_eq!(windows[0].entries.last().unwrap().date(), d("2025-09-12"));
    }

    #[test]
    fn ordering_sorts_and_drops_duplicates() {
        let records = vec![
            rec("A", "2025-09-10").department("first"),
            rec("A", "2025-09-08"),
            rec("A", "2025-09-10").department("second"),
        ];
        let ordered = order_employee_records(records);
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].date, d("2025-09-08"));
        assert_eq!(ordered[1].department, "first");
    }
}
