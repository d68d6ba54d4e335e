// src/day_classifier.rs
use chrono::{Datelike, Weekday};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::CalendarMode;
use crate::group_rules::GroupRule;
use crate::holidays::SpecialHolidaySet;
use crate::punch_status::{is_rest_marker, normalize, PunchStatus};
use crate::record::{AttendanceRecord, PunchPair};
use crate::work_duration::{deficit_band, elapsed_between, is_sufficient_between, ClockTime, DeficitBand};

// --- Classification Structures ---

/// Result of evaluating one clock-in/clock-out pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PairOutcome {
    Normal,
    Absent,
    LateDeficit,
    SeverelyLateDeficit,
}

impl PairOutcome {
    fn is_deficit(self) -> bool {
        matches!(self, PairOutcome::LateDeficit | PairOutcome::SeverelyLateDeficit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DayTag {
    Normal,
    Late,
    Absent,
    /// Neither normal, late nor absent, e.g. two short sessions with no full
    /// one to offset them.
    Other,
}

/// Why a day got its classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DayReason {
    SpecialHoliday,
    Weekend,
    RestDay,
    /// Synthesized for a workday missing from the export.
    Backfilled,
    Punches,
}

/// Punch-unit tallies for one employee-day. Every pair is worth two units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayClassification {
    pub tag: DayTag,
    pub reason: DayReason,
    pub normal: u32,
    pub late: u32,
    pub severely_late: u32,
    pub absent_punches: u32,
    pub absent: bool,
    pub pairs: Vec<PairOutcome>,
}

impl DayClassification {
    pub fn full_credit(reason: DayReason, punches: u32) -> Self {
        Self {
            tag: DayTag::Normal,
            reason,
            normal: punches,
            late: 0,
            severely_late: 0,
            absent_punches: 0,
            absent: false,
            pairs: Vec::new(),
        }
    }

    pub fn counted_punches(&self) -> u32 {
        self.normal + self.late + self.severely_late + self.absent_punches
    }
}

// --- Pair Evaluation ---

#[derive(Debug, Clone, Copy)]
struct PairEval {
    outcome: PairOutcome,
    /// Legs that could not be used: a missing punch or an unreadable time.
    lost_legs: u32,
}

fn lost(flags: [bool; 2]) -> u32 {
    flags.iter().filter(|f| **f).count() as u32
}

fn evaluate_pair(record: &AttendanceRecord, pair: &PunchPair) -> PairEval {
    let statuses: [PunchStatus; 2] = pair.legs().map(|leg| normalize(leg.status.as_deref()));

    if statuses.iter().any(PunchStatus::is_missing) {
        return PairEval {
            outcome: PairOutcome::Absent,
            lost_legs: lost([statuses[0].is_missing(), statuses[1].is_missing()]),
        };
    }
    if statuses.iter().any(PunchStatus::is_excused) {
        return PairEval {
            outcome: PairOutcome::Normal,
            lost_legs: 0,
        };
    }

    let times = pair.legs().map(|leg| match leg.time.as_deref() {
        Some(text) => ClockTime::parse(text).map_err(|e| {
            warn!(
                "Employee {} on {}: {}; treating punch as missing",
                record.employee_id, record.date, e
            );
        }),
        None => Err(()),
    });
    let (clock_in, clock_out) = match times {
        [Ok(start), Ok(end)] => (start, end),
        [ref start, ref end] => {
            return PairEval {
                outcome: PairOutcome::Absent,
                lost_legs: lost([start.is_err(), end.is_err()]),
            }
        }
    };

    let outcome = if is_sufficient_between(clock_in, clock_out) {
        PairOutcome::Normal
    } else {
        match deficit_band(elapsed_between(clock_in, clock_out)) {
            DeficitBand::Late => PairOutcome::LateDeficit,
            DeficitBand::SeverelyLate => PairOutcome::SeverelyLateDeficit,
        }
    };
    PairEval {
        outcome,
        lost_legs: 0,
    }
}

fn is_rest_day(record: &AttendanceRecord, rule: &GroupRule) -> bool {
    let pairs = &record.pairs[..record.pairs.len().min(rule.daily_pairs())];
    record.rest_day
        || (!pairs.is_empty()
            && pairs
                .iter()
                .flat_map(|p| p.legs())
                .all(|leg| is_rest_marker(leg.status.as_deref())))
}

// --- Day Classification ---

/// Classifies one employee-day.
///
/// Special holidays are checked first, then the calendar (weekends or rest
/// markers), and only then the punches. Pure and infallible: unreadable input
/// degrades to absence instead of failing.
pub fn classify_day(
    record: &AttendanceRecord,
    holidays: &SpecialHolidaySet,
    rule: &GroupRule,
    calendar: CalendarMode,
) -> DayClassification {
    if holidays.contains(record.date) {
        debug!("{} {}: special holiday", record.employee_id, record.date);
        return DayClassification::full_credit(DayReason::SpecialHoliday, rule.daily_punches);
    }

    match calendar {
        CalendarMode::Weekend => {
            if matches!(record.date.weekday(), Weekday::Sat | Weekday::Sun) {
                return DayClassification::full_credit(DayReason::Weekend, rule.daily_punches);
            }
        }
        CalendarMode::RestMarker => {
            if is_rest_day(record, rule) {
                // Saturday closes the school week and earns nothing.
                let credit = if record.labelled_weekday() == Weekday::Sat {
                    0
                } else {
                    rule.daily_punches
                };
                return DayClassification::full_credit(DayReason::RestDay, credit);
            }
        }
    }

    let mut day = DayClassification {
        tag: DayTag::Normal,
        reason: DayReason::Punches,
        normal: 0,
        late: 0,
        severely_late: 0,
        absent_punches: 0,
        absent: false,
        pairs: Vec::with_capacity(rule.daily_pairs()),
    };

    let empty = PunchPair::default();
    for idx in 0..rule.daily_pairs() {
        // Pairs the export did not provide count as unpunched.
        let pair = record.pairs.get(idx).unwrap_or(&empty);
        let eval = evaluate_pair(record, pair);
        match eval.outcome {
            PairOutcome::Normal => day.normal += 2,
            PairOutcome::Absent => {
                day.absent = true;
                day.absent_punches += eval.lost_legs;
                day.normal += 2 - eval.lost_legs;
            }
            // A short session still banks one punch.
            PairOutcome::LateDeficit => {
                day.normal += 1;
                day.late += 1;
            }
            PairOutcome::SeverelyLateDeficit => {
                day.normal += 1;
                day.severely_late += 1;
            }
        }
        day.pairs.push(eval.outcome);
    }

    let deficits = day.pairs.iter().filter(|o| o.is_deficit()).count();
    let severe = day
        .pairs
        .iter()
        .filter(|o| **o == PairOutcome::SeverelyLateDeficit)
        .count();
    day.tag = if day.absent {
        DayTag::Absent
    } else if deficits == 0 {
        DayTag::Normal
    } else if deficits == 1 && severe == 1 {
        // One severe session next to normal ones; none is absent here.
        DayTag::Late
    } else {
        DayTag::Other
    };

    debug!(
        "{} {}: {:?} (normal {}, late {}, severe {}, absent {})",
        record.employee_id,
        record.date,
        day.tag,
        day.normal,
        day.late,
        day.severely_late,
        day.absent_punches
    );
    day
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group_rules::{GroupRuleRegistry, GROUP_ADMIN, GROUP_TEACHER};
    use crate::record::PunchLeg;
    use chrono::NaiveDate;

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
    }

    fn leg(time: Option<&str>, status: &str) -> PunchLeg {
        PunchLeg::new(time, Some(status))
    }

    fn rules() -> GroupRuleRegistry {
        GroupRuleRegistry::with_default(GROUP_TEACHER).unwrap()
    }

    // 2025-09-10 is a Wednesday.
    fn weekday_record() -> AttendanceRecord {
        AttendanceRecord::new("U1", "Wang Fang", d("2025-09-10"))
    }

    fn classify(record: &AttendanceRecord, group: &str) -> DayClassification {
        let registry = rules();
        classify_day(
            record,
            &SpecialHolidaySet::new(),
            registry.get(group).unwrap(),
            CalendarMode::Weekend,
        )
    }

    #[test]
    fn full_session_is_normal() {
        let record = weekday_record().pair(
            leg(Some("07:40"), "Normal"),
            leg(Some("17:05"), "Normal"),
        );
        let day = classify(&record, GROUP_TEACHER);
        assert_eq!(day.tag, DayTag::Normal);
        assert_eq!(day.normal, 2);
        assert_eq!(day.counted_punches(), 2);
    }

    #[test]
    fn make_up_punches_are_normal_without_times() {
        let record = weekday_record().pair(leg(None, "MakeUp"), leg(None, "MakeUp"));
        let day = classify(&record, GROUP_TEACHER);
        assert_eq!(day.tag, DayTag::Normal);
        assert_eq!((day.normal, day.late, day.severely_late, day.absent_punches), (2, 0, 0, 0));
    }

    #[test]
    fn special_holiday_overrides_missing_punches() {
        let registry = rules();
        let mut holidays = SpecialHolidaySet::new();
        holidays.add("2025-09-10").unwrap();
        let record = weekday_record().pair(leg(None, "Missing"), leg(None, "Missing"));
        let day = classify_day(
            &record,
            &holidays,
            registry.get(GROUP_ADMIN).unwrap(),
            CalendarMode::Weekend,
        );
        assert_eq!(day.tag, DayTag::Normal);
        assert_eq!(day.reason, DayReason::SpecialHoliday);
        assert_eq!(day.normal, 4);
    }

    #[test]
    fn weekend_gets_full_credit() {
        let record = AttendanceRecord::new("U1", "Wang Fang", d("2025-09-13"));
        let day = classify(&record, GROUP_ADMIN);
        assert_eq!(day.reason, DayReason::Weekend);
        assert_eq!(day.normal, 4);
    }

    #[test]
    fn rest_marker_mode_ignores_weekends_and_uses_shift() {
        let registry = rules();
        let teacher = registry.get(GROUP_TEACHER).unwrap();
        let holidays = SpecialHolidaySet::new();

        // Saturday without a rest marker is evaluated on its punches.
        let saturday = AttendanceRecord::new("U1", "Wang Fang", d("2025-09-13"))
            .weekday_label("星期六")
            .pair(leg(None, "缺卡"), leg(None, "缺卡"));
        let day = classify_day(&saturday, &holidays, teacher, CalendarMode::RestMarker);
        assert_eq!(day.tag, DayTag::Absent);

        // Rest marker on a Sunday earns full credit.
        let sunday = AttendanceRecord::new("U1", "Wang Fang", d("2025-09-14"))
            .weekday_label("星期日")
            .shift("休息");
        let day = classify_day(&sunday, &holidays, teacher, CalendarMode::RestMarker);
        assert_eq!(day.reason, DayReason::RestDay);
        assert_eq!(day.normal, 2);

        // Resting on Saturday earns nothing.
        let rest_saturday = AttendanceRecord::new("U1", "Wang Fang", d("2025-09-13"))
            .weekday_label("星期六")
            .pair(leg(None, "休息"), leg(None, "休息"));
        let day = classify_day(&rest_saturday, &holidays, teacher, CalendarMode::RestMarker);
        assert_eq!(day.reason, DayReason::RestDay);
        assert_eq!(day.counted_punches(), 0);
    }

    #[test]
    fn both_pairs_missing_is_absent() {
        let record = weekday_record()
            .pair(leg(None, "Missing"), leg(None, "Missing"))
            .pair(leg(None, "Missing"), leg(None, "Missing"));
        let day = classify(&record, GROUP_ADMIN);
        assert_eq!(day.tag, DayTag::Absent);
        assert!(day.absent);
        assert_eq!(day.absent_punches, 4);
        assert_eq!(day.normal, 0);
    }

    #[test]
    fn one_missing_leg_makes_the_day_absent() {
        let record = weekday_record()
            .pair(leg(Some("07:30"), "Normal"), leg(Some("11:40"), "Normal"))
            .pair(leg(None, "Missing"), leg(Some("17:00"), "Normal"));
        let day = classify(&record, GROUP_ADMIN);
        assert_eq!(day.tag, DayTag::Absent);
        assert_eq!(day.pairs, vec![PairOutcome::Normal, PairOutcome::Absent]);
        assert_eq!((day.normal, day.absent_punches), (3, 1));
    }

    #[test]
    fn absence_dominates_a_severe_deficit() {
        let record = weekday_record()
            .pair(leg(Some("09:30"), "SeverelyLate"), leg(Some("11:40"), "Normal"))
            .pair(leg(None, "Missing"), leg(None, "Missing"));
        let day = classify(&record, GROUP_ADMIN);
        assert_eq!(day.pairs[0], PairOutcome::SeverelyLateDeficit);
        assert_eq!(day.tag, DayTag::Absent);
    }

    #[test]
    fn lone_severe_deficit_makes_a_late_day() {
        let record = weekday_record()
            .pair(leg(Some("09:30"), "SeverelyLate"), leg(Some("11:40"), "Normal"))
            .pair(leg(Some("13:30"), "Normal"), leg(Some("17:00"), "Normal"));
        let day = classify(&record, GROUP_ADMIN);
        assert_eq!(day.tag, DayTag::Late);
        assert_eq!((day.normal, day.severely_late, day.late), (3, 1, 0));
    }

    #[test]
    fn small_deficit_on_a_teacher_day_is_other() {
        // 08:10 -> 11:00 is 170 minutes, 10 short.
        let record = weekday_record().pair(leg(Some("08:10"), "Normal"), leg(Some("11:00"), "Normal"));
        let day = classify(&record, GROUP_TEACHER);
        assert_eq!(day.pairs, vec![PairOutcome::LateDeficit]);
        assert_eq!(day.tag, DayTag::Other);
        assert_eq!((day.normal, day.late), (1, 1));
    }

    #[test]
    fn severe_deficit_on_a_teacher_day_is_late() {
        // 08:10 -> 10:30 is 140 minutes, 40 short.
        let record = weekday_record().pair(leg(Some("08:10"), "Normal"), leg(Some("10:30"), "Normal"));
        let day = classify(&record, GROUP_TEACHER);
        assert_eq!(day.pairs, vec![PairOutcome::SeverelyLateDeficit]);
        assert_eq!(day.tag, DayTag::Late);
        assert_eq!((day.normal, day.severely_late), (1, 1));
    }

    #[test]
    fn small_deficit_next_to_a_normal_session_is_other() {
        // Morning 08:00 -> 10:50 is 170 minutes; afternoon is a full session.
        let record = weekday_record()
            .pair(leg(Some("08:00"), "Normal"), leg(Some("10:50"), "Normal"))
            .pair(leg(Some("13:30"), "Normal"), leg(Some("17:00"), "Normal"));
        let day = classify(&record, GROUP_ADMIN);
        assert_eq!(day.pairs, vec![PairOutcome::LateDeficit, PairOutcome::Normal]);
        assert_eq!(day.tag, DayTag::Other);
        assert_eq!((day.normal, day.late, day.severely_late), (3, 1, 0));
    }

    #[test]
    fn two_deficits_are_other() {
        let record = weekday_record()
            .pair(leg(Some("09:30"), "Normal"), leg(Some("11:00"), "Normal"))
            .pair(leg(Some("14:30"), "Normal"), leg(Some("16:00"), "Normal"));
        let day = classify(&record, GROUP_ADMIN);
        assert_eq!(day.tag, DayTag::Other);
        assert_eq!(day.severely_late, 2);
        assert!(!day.absent);
        assert_eq!(day.counted_punches(), 4);
    }

    #[test]
    fn malformed_timestamp_degrades_to_absent() {
        let record = weekday_record().pair(leg(Some("7点40"), "Normal"), leg(Some("17:05"), "Normal"));
        let day = classify(&record, GROUP_TEACHER);
        assert_eq!(day.tag, DayTag::Absent);
        assert_eq!((day.normal, day.absent_punches), (1, 1));
    }

    #[test]
    fn evening_study_session_is_normal() {
        let record = weekday_record().pair(leg(Some("18:40"), "Normal"), leg(Some("20:50"), "Normal"));
        let day = classify(&record, GROUP_TEACHER);
        assert_eq!(day.tag, DayTag::Normal);
    }

    #[test]
    fn absent_pairs_default_to_missing() {
        // An admin record that only carries the morning pair.
        let record = weekday_record().pair(leg(Some("07:30"), "Normal"), leg(Some("11:40"), "Normal"));
        let day = classify(&record, GROUP_ADMIN);
        assert_eq!(day.tag, DayTag::Absent);
        assert_eq!(day.counted_punches(), 4);
    }
}
