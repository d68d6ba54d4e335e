// src/holidays.rs
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::info;

use crate::error::{AttendanceError, Result};

lazy_static! {
    static ref ISO_DATE_RE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid");
}

/// Operator-supplied days off (school closures, make-up holidays) that count
/// as fully attended regardless of punches.
///
/// Owned by the caller for the length of one analysis run and handed to the
/// engine by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecialHolidaySet {
    dates: BTreeSet<NaiveDate>,
}

impl SpecialHolidaySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `YYYY-MM-DD` date. On a format error the set is left unchanged.
    pub fn add(&mut self, input: &str) -> Result<NaiveDate> {
        let trimmed = input.trim();
        let format_error = || AttendanceError::HolidayFormat {
            input: input.to_string(),
        };
        if !ISO_DATE_RE.is_match(trimmed) {
            return Err(format_error());
        }
        let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| format_error())?;
        self.add_date(date);
        Ok(date)
    }

    pub fn add_date(&mut self, date: NaiveDate) {
        if self.dates.insert(date) {
            info!("Configuring special holiday: {}", date);
        }
    }

    pub fn clear(&mut self) {
        info!("Clearing {} special holidays", self.dates.len());
        self.dates.clear();
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NaiveDate> {
        self.dates.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn add_accepts_iso_dates() {
        let mut holidays = SpecialHolidaySet::new();
        assert_eq!(holidays.add("2025-10-01").unwrap(), d("2025-10-01"));
        assert_eq!(holidays.add(" 2025-10-02 ").unwrap(), d("2025-10-02"));
        assert!(holidays.contains(d("2025-10-01")));
        assert_eq!(holidays.len(), 2);
    }

    #[test]
    fn add_rejects_bad_format_and_leaves_set_unchanged() {
        let mut holidays = SpecialHolidaySet::new();
        holidays.add("2025-10-01").unwrap();
        for bad in ["2025/10/03", "25-10-03", "2025-1-3", "2025-02-30", "tomorrow", ""] {
            let err = holidays.add(bad).unwrap_err();
            assert!(matches!(err, AttendanceError::HolidayFormat { .. }), "{}", bad);
        }
        assert_eq!(holidays.iter().copied().collect::<Vec<_>>(), vec![d("2025-10-01")]);
    }

    #[test]
    fn clear_empties_the_set() {
        let mut holidays = SpecialHolidaySet::new();
        holidays.add("2025-10-01").unwrap();
        holidays.clear();
        assert!(holidays.is_empty());
        assert!(!holidays.contains(d("2025-10-01")));
    }
}
