// src/record.rs
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::io::Read;

use crate::error::{AttendanceError, Result};
use crate::punch_status::is_rest_marker;

// --- Raw Export Row ---

/// One row of a time-clock export, as handed over by the file reader.
///
/// Column headers may be English or the Chinese headers of the time clock
/// export. Every field is optional here; [`AttendanceRecord::from_raw`] decides
/// what is required.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RawAttendanceRow {
    #[serde(rename = "employee_id", alias = "UserId", alias = "userid")]
    pub employee_id: Option<String>,
    #[serde(rename = "name", alias = "姓名")]
    pub name: Option<String>,
    #[serde(rename = "group", alias = "考勤组")]
    pub group: Option<String>,
    #[serde(rename = "department", alias = "部门")]
    pub department: Option<String>,
    #[serde(rename = "staff_no", alias = "工号")]
    pub staff_no: Option<String>,
    #[serde(rename = "title", alias = "职位")]
    pub title: Option<String>,
    #[serde(rename = "date", alias = "日期")]
    pub date: Option<String>,
    #[serde(rename = "weekday", alias = "星期")]
    pub weekday: Option<String>,
    #[serde(rename = "shift", alias = "班次")]
    pub shift: Option<String>,
    #[serde(rename = "in1_time", alias = "上班1打卡时间")]
    pub in1_time: Option<String>,
    #[serde(rename = "in1_status", alias = "上班1打卡结果")]
    pub in1_status: Option<String>,
    #[serde(rename = "out1_time", alias = "下班1打卡时间")]
    pub out1_time: Option<String>,
    #[serde(rename = "out1_status", alias = "下班1打卡结果")]
    pub out1_status: Option<String>,
    #[serde(rename = "in2_time", alias = "上班2打卡时间")]
    pub in2_time: Option<String>,
    #[serde(rename = "in2_status", alias = "上班2打卡结果")]
    pub in2_status: Option<String>,
    #[serde(rename = "out2_time", alias = "下班2打卡时间")]
    pub out2_time: Option<String>,
    #[serde(rename = "out2_status", alias = "下班2打卡结果")]
    pub out2_status: Option<String>,
}

/// Reads every data row of a CSV export. Cells are trimmed and short rows
/// are accepted; deciding which rows are usable is left to
/// [`AttendanceRecord::from_raw`].
///
/// A row that cannot be decoded comes back as a `StructuralRow` error in its
/// slot so the rest of the file is still read. Only I/O failures abort.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<Result<RawAttendanceRow>>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut rows = Vec::new();
    for (idx, row) in csv_reader.deserialize().enumerate() {
        match row {
            Ok(raw) => rows.push(Ok(raw)),
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => rows.push(Err(AttendanceError::StructuralRow {
                row: idx + 1,
                reason: e.to_string(),
            })),
        }
    }
    Ok(rows)
}

// Header text that shows up again when an export repeats its title rows.
const HEADER_NAMES: [&str; 2] = ["姓名", "name"];

/// Blank cells and the export's filler values become `None`.
fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "--" && *v != "-")
        .map(str::to_string)
}

// --- Date and Weekday Labels ---

/// Parses export date labels such as `25-09-08 星期一`, `2025-09-08` or
/// `2025/9/8`. Two-digit years are taken as 20xx.
pub fn parse_date_label(label: &str) -> Option<NaiveDate> {
    let date_part = label.split_whitespace().next()?;
    let parts: Vec<&str> = date_part.split(|c| c == '-' || c == '/').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    let year: i32 = match parts[0].len() {
        2 => 2000 + parts[0].parse::<i32>().ok()?,
        4 => parts[0].parse().ok()?,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, parts[1].parse().ok()?, parts[2].parse().ok()?)
}

const CHINESE_WEEKDAYS: [(&str, Weekday); 7] = [
    ("一", Weekday::Mon),
    ("二", Weekday::Tue),
    ("三", Weekday::Wed),
    ("四", Weekday::Thu),
    ("五", Weekday::Fri),
    ("六", Weekday::Sat),
    ("日", Weekday::Sun),
];

/// Reads a weekday out of free text: `星期三`, `周日`, `Wednesday`, `Sat`.
pub fn parse_weekday_label(label: &str) -> Option<Weekday> {
    for prefix in ["星期", "周"] {
        if let Some(idx) = label.find(prefix) {
            let rest = &label[idx + prefix.len()..];
            if rest.starts_with('天') {
                return Some(Weekday::Sun);
            }
            if let Some((_, weekday)) = CHINESE_WEEKDAYS.iter().find(|(c, _)| rest.starts_with(c)) {
                return Some(*weekday);
            }
        }
    }
    label
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|token| token.len() >= 3)
        .find_map(|token| {
            let lowered = token.to_ascii_lowercase();
            [
                ("monday", Weekday::Mon),
                ("tuesday", Weekday::Tue),
                ("wednesday", Weekday::Wed),
                ("thursday", Weekday::Thu),
                ("friday", Weekday::Fri),
                ("saturday", Weekday::Sat),
                ("sunday", Weekday::Sun),
            ]
            .iter()
            .find(|(full, _)| lowered == *full || lowered == full[..3])
            .map(|(_, weekday)| *weekday)
        })
}

// --- Typed Record ---

/// One side of a punch pair. `None` means the export had nothing there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PunchLeg {
    pub time: Option<String>,
    pub status: Option<String>,
}

impl PunchLeg {
    pub fn new(time: Option<&str>, status: Option<&str>) -> Self {
        Self {
            time: time.map(String::from),
            status: status.map(String::from),
        }
    }
}

/// Clock-in and clock-out of one work session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PunchPair {
    pub clock_in: PunchLeg,
    pub clock_out: PunchLeg,
}

impl PunchPair {
    pub fn legs(&self) -> [&PunchLeg; 2] {
        [&self.clock_in, &self.clock_out]
    }
}

/// An employee's punches for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub employee_id: String,
    pub name: String,
    pub department: String,
    pub group_label: Option<String>,
    pub date: NaiveDate,
    pub weekday_label: Option<String>,
    pub shift: Option<String>,
    pub rest_day: bool,
    pub pairs: Vec<PunchPair>,
}

impl AttendanceRecord {
    pub fn new(employee_id: &str, name: &str, date: NaiveDate) -> Self {
        Self {
            employee_id: employee_id.to_string(),
            name: name.to_string(),
            department: String::new(),
            group_label: None,
            date,
            weekday_label: None,
            shift: None,
            rest_day: false,
            pairs: Vec::new(),
        }
    }

    pub fn department(mut self, department: &str) -> Self {
        self.department = department.to_string();
        self
    }

    pub fn group(mut self, label: &str) -> Self {
        self.group_label = Some(label.to_string());
        self
    }

    pub fn weekday_label(mut self, label: &str) -> Self {
        self.weekday_label = Some(label.to_string());
        self
    }

    pub fn shift(mut self, shift: &str) -> Self {
        self.rest_day = is_rest_marker(Some(shift));
        self.shift = Some(shift.to_string());
        self
    }

    pub fn pair(mut self, clock_in: PunchLeg, clock_out: PunchLeg) -> Self {
        self.pairs.push(PunchPair {
            clock_in,
            clock_out,
        });
        self
    }

    /// Truncates or pads the punch pairs to the group's daily pair count.
    /// Padding pairs have no times and no statuses.
    pub fn with_pair_count(mut self, pair_count: usize) -> Self {
        self.pairs.resize_with(pair_count, PunchPair::default);
        self
    }

    /// Weekday as printed on the record, falling back to the calendar.
    pub fn labelled_weekday(&self) -> Weekday {
        self.weekday_label
            .as_deref()
            .and_then(parse_weekday_label)
            .unwrap_or_else(|| self.date.weekday())
    }

    /// Builds a typed record from an export row.
    ///
    /// `row` is the 1-based data row number used in error messages.
    /// `pair_count` is how many punch pairs to keep. Before the employee's
    /// group is known this is the largest count in the group table.
    pub fn from_raw(row: usize, raw: &RawAttendanceRow, pair_count: usize) -> Result<Self> {
        let structural = |reason: &str| AttendanceError::StructuralRow {
            row,
            reason: reason.to_string(),
        };

        let name = clean(&raw.name);
        if name.as_deref().is_some_and(|n| HEADER_NAMES.contains(&n)) {
            return Err(structural("repeated header row"));
        }
        let employee_id = clean(&raw.employee_id).ok_or_else(|| structural("missing employee id"))?;
        let date_label = clean(&raw.date).ok_or_else(|| structural("missing date"))?;
        let date = parse_date_label(&date_label)
            .ok_or_else(|| structural(&format!("unreadable date '{}'", date_label)))?;

        // Weekday either has its own column or trails the date label.
        let weekday_label = clean(&raw.weekday).or_else(|| {
            date_label
                .split_once(char::is_whitespace)
                .map(|(_, rest)| rest.trim().to_string())
                .filter(|rest| !rest.is_empty())
        });

        let leg = |time: &Option<String>, status: &Option<String>| PunchLeg {
            time: clean(time),
            status: clean(status),
        };
        let pairs = vec![
            PunchPair {
                clock_in: leg(&raw.in1_time, &raw.in1_status),
                clock_out: leg(&raw.out1_time, &raw.out1_status),
            },
            PunchPair {
                clock_in: leg(&raw.in2_time, &raw.in2_status),
                clock_out: leg(&raw.out2_time, &raw.out2_status),
            },
        ];

        let shift = clean(&raw.shift);
        let record = Self {
            name: name.unwrap_or_else(|| employee_id.clone()),
            employee_id,
            department: clean(&raw.department).unwrap_or_default(),
            group_label: clean(&raw.group),
            date,
            weekday_label,
            rest_day: is_rest_marker(shift.as_deref()),
            shift,
            pairs,
        };
        Ok(record.with_pair_count(pair_count))
    }
}
