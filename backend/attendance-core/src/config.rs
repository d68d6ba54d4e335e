// src/config.rs
use serde::Deserialize;
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::{AttendanceError, Result};
use crate::group_rules::GROUP_TEACHER;
use crate::holidays::SpecialHolidaySet;

// --- Analysis Policy ---

/// Which calendar week verdicts are computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeekAnchor {
    /// ISO business week, Monday to Friday.
    #[default]
    MondayFriday,
    /// School week, Sunday evening to Saturday; closes on the record labelled
    /// Saturday.
    SundaySaturday,
}

impl FromStr for WeekAnchor {
    type Err = AttendanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monday-friday" | "mon-fri" | "business" => Ok(WeekAnchor::MondayFriday),
            "sunday-saturday" | "sun-sat" | "school" => Ok(WeekAnchor::SundaySaturday),
            other => Err(AttendanceError::InvalidSetting {
                setting: "week anchor",
                value: other.to_string(),
            }),
        }
    }
}

/// How non-working days are recognized before punches are looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalendarMode {
    /// Saturdays and Sundays are full-credit days.
    #[default]
    Weekend,
    /// The shift's rest marker decides; weekends get no automatic credit.
    RestMarker,
}

/// What happens when a week has fewer counted punches than expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShortfallPolicy {
    /// Missing punches are credited as normal.
    #[default]
    FullCredit,
    /// Teacher school-week rule: normal punches are measured against a fixed
    /// baseline and the shortfall is charged to late deficits first, then to
    /// severe ones.
    HalfWeekBaseline { baseline: u32 },
}

/// Teacher school-week baseline: 4.5 days of two punches.
pub const HALF_WEEK_BASELINE: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalysisPolicy {
    pub anchor: WeekAnchor,
    pub calendar: CalendarMode,
    pub shortfall: ShortfallPolicy,
}

impl AnalysisPolicy {
    /// Monday-Friday weeks, weekend credit, shortfall credited as normal.
    pub fn business_week() -> Self {
        Self::default()
    }

    /// Sunday-Saturday weeks driven by rest markers, with the 9-punch
    /// half-week baseline.
    pub fn school_week() -> Self {
        Self {
            anchor: WeekAnchor::SundaySaturday,
            calendar: CalendarMode::RestMarker,
            shortfall: ShortfallPolicy::HalfWeekBaseline {
                baseline: HALF_WEEK_BASELINE,
            },
        }
    }

    pub fn from_edition(edition: &str) -> Result<Self> {
        match edition.trim().to_ascii_lowercase().as_str() {
            "business" => Ok(Self::business_week()),
            "school" => Ok(Self::school_week()),
            other => Err(AttendanceError::InvalidSetting {
                setting: "edition",
                value: other.to_string(),
            }),
        }
    }
}

// --- Environment Settings ---

fn default_group() -> String {
    GROUP_TEACHER.to_string()
}

fn default_edition() -> String {
    "business".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Settings read from `ATTENDANCE_*` environment variables (and `.env`).
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_group")]
    pub default_group: String,
    #[serde(default = "default_edition")]
    pub edition: String,
    /// Overrides the edition's week anchor when set.
    #[serde(default)]
    pub week_anchor: Option<String>,
    /// Comma-separated `YYYY-MM-DD` dates.
    #[serde(default)]
    pub holidays: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_group: default_group(),
            edition: default_edition(),
            week_anchor: None,
            holidays: None,
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        Ok(envy::prefixed("ATTENDANCE_").from_env::<Settings>()?)
    }

    pub fn policy(&self) -> Result<AnalysisPolicy> {
        let mut policy = AnalysisPolicy::from_edition(&self.edition)?;
        if let Some(anchor) = self.week_anchor.as_deref() {
            policy.anchor = anchor.parse()?;
        }
        info!("Analysis policy: {:?}", policy);
        Ok(policy)
    }

    /// Builds the run's holiday set. Badly formatted dates are reported and
    /// skipped; the rest are kept.
    pub fn holiday_set(&self) -> (SpecialHolidaySet, Vec<AttendanceError>) {
        let mut holidays = SpecialHolidaySet::new();
        let mut rejected = Vec::new();
        for entry in self
            .holidays
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter(|e| !e.trim().is_empty())
        {
            if let Err(e) = holidays.add(entry) {
                warn!("{}", e);
                rejected.push(e);
            }
        }
        (holidays, rejected)
    }
}
