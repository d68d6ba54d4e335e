// src/punch_status.rs
use serde::Serialize;
use std::fmt;

// --- Status Keywords ---
// Exports come from the time clock in either English or Chinese, so every
// category carries both spellings. Matching is done on lowercased text.

const UNPUNCHED: [&str; 2] = ["unpunched", "未打卡"];
const NORMAL: [&str; 2] = ["normal", "正常"];
const ADMINISTRATOR: [&str; 2] = ["administrator", "管理员"];
const CHANGED_TO_NORMAL: [&str; 2] = ["changedtonormal", "改为正常"];
const MAKE_UP: [&str; 2] = ["makeup", "补卡"];
const LEAVE: [&str; 2] = ["leave", "请假"];
const SEVERELY_LATE: [&str; 2] = ["severelylate", "严重迟到"];
const MISSING: [&str; 3] = ["missing", "nopunch", "缺卡"];
const REST: [&str; 2] = ["rest", "休息"];

/// Canonical tag for a single punch leg.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum PunchStatus {
    Normal,
    MakeUp,
    Leave,
    SeverelyLate,
    Missing,
    /// Unrecognized text, kept verbatim for diagnostics.
    Other(String),
}

impl PunchStatus {
    /// Leave and approved make-up punches count as attendance without any
    /// duration check.
    pub fn is_excused(&self) -> bool {
        matches!(self, PunchStatus::Leave | PunchStatus::MakeUp)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, PunchStatus::Missing)
    }
}

impl fmt::Display for PunchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PunchStatus::Normal => write!(f, "Normal"),
            PunchStatus::MakeUp => write!(f, "MakeUp"),
            PunchStatus::Leave => write!(f, "Leave"),
            PunchStatus::SeverelyLate => write!(f, "SeverelyLate"),
            PunchStatus::Missing => write!(f, "Missing"),
            PunchStatus::Other(raw) => write!(f, "Other({})", raw),
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Maps a raw punch-result string onto a [`PunchStatus`].
///
/// Matching is case-insensitive and ordered; the first category that matches
/// wins. This never fails: anything unrecognized becomes `Other`.
pub fn normalize(raw: Option<&str>) -> PunchStatus {
    let trimmed = match raw.map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => return PunchStatus::Missing,
    };
    let lowered = trimmed.to_lowercase();

    if UNPUNCHED.contains(&lowered.as_str()) {
        return PunchStatus::Missing;
    }

    if contains_any(&lowered, &NORMAL)
        || (contains_any(&lowered, &ADMINISTRATOR) && contains_any(&lowered, &CHANGED_TO_NORMAL))
    {
        PunchStatus::Normal
    } else if contains_any(&lowered, &MAKE_UP) {
        PunchStatus::MakeUp
    } else if contains_any(&lowered, &LEAVE) {
        PunchStatus::Leave
    } else if contains_any(&lowered, &SEVERELY_LATE) {
        PunchStatus::SeverelyLate
    } else if contains_any(&lowered, &MISSING) {
        PunchStatus::Missing
    } else {
        PunchStatus::Other(trimmed.to_string())
    }
}

/// True when the raw text marks a scheduled rest day rather than a punch.
pub fn is_rest_marker(raw: Option<&str>) -> bool {
    raw.map(|text| contains_any(&text.trim().to_lowercase(), &REST))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_blank_input_is_missing() {
        assert_eq!(normalize(None), PunchStatus::Missing);
        assert_eq!(normalize(Some("")), PunchStatus::Missing);
        assert_eq!(normalize(Some("   ")), PunchStatus::Missing);
        assert_eq!(normalize(Some("Unpunched")), PunchStatus::Missing);
        assert_eq!(normalize(Some("未打卡")), PunchStatus::Missing);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(normalize(Some("NORMAL")), PunchStatus::Normal);
        assert_eq!(normalize(Some("MakeUp approved")), PunchStatus::MakeUp);
        assert_eq!(normalize(Some("annual LEAVE")), PunchStatus::Leave);
        assert_eq!(normalize(Some("severelyLate")), PunchStatus::SeverelyLate);
    }

    #[test]
    fn administrator_correction_counts_as_normal() {
        assert_eq!(
            normalize(Some("Administrator ChangedToNormal")),
            PunchStatus::Normal
        );
        assert_eq!(normalize(Some("管理员改为正常")), PunchStatus::Normal);
    }

    #[test]
    fn precedence_favours_earlier_categories() {
        // A make-up that mentions leave is still a make-up.
        assert_eq!(normalize(Some("MakeUp for Leave")), PunchStatus::MakeUp);
        // Normal wins over everything else.
        assert_eq!(normalize(Some("Missing -> Normal")), PunchStatus::Normal);
        assert_eq!(normalize(Some("补卡审批通过")), PunchStatus::MakeUp);
        assert_eq!(normalize(Some("严重迟到")), PunchStatus::SeverelyLate);
    }

    #[test]
    fn missing_punch_keywords() {
        assert_eq!(normalize(Some("Missing")), PunchStatus::Missing);
        assert_eq!(normalize(Some("NoPunch")), PunchStatus::Missing);
        assert_eq!(normalize(Some("缺卡")), PunchStatus::Missing);
    }

    #[test]
    fn unrecognized_text_is_preserved() {
        assert_eq!(
            normalize(Some("  Early Departure ")),
            PunchStatus::Other("Early Departure".to_string())
        );
    }

    #[test]
    fn rest_marker_detection() {
        assert!(is_rest_marker(Some("休息")));
        assert!(is_rest_marker(Some("Rest day")));
        assert!(!is_rest_marker(Some("Day shift 08:00-16:30")));
        assert!(!is_rest_marker(None));
    }
}
