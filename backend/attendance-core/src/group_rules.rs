// src/group_rules.rs
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AttendanceError, Result};

// --- Group Keys ---
pub const GROUP_TEACHER: &str = "teacher";
pub const GROUP_ADMIN: &str = "admin";
pub const GROUP_SUPPORT: &str = "support";

// Punch field identifiers, in the order the legs appear on a row.
pub const FIELD_IN_1: &str = "in1";
pub const FIELD_OUT_1: &str = "out1";
pub const FIELD_IN_2: &str = "in2";
pub const FIELD_OUT_2: &str = "out2";

/// Punch rules for one attendance group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRule {
    pub key: String,
    pub display_name: String,
    #[serde(skip)]
    pub aliases: Vec<String>,
    /// Punches per workday: 2 (one session) or 4 (morning and afternoon).
    pub daily_punches: u32,
    pub weekly_expected_punches: u32,
    /// Punch fields holding this group's in/out legs.
    pub field_names: Vec<String>,
    pub description: String,
}

impl GroupRule {
    pub fn daily_pairs(&self) -> usize {
        (self.daily_punches / 2) as usize
    }

    fn matches_exactly(&self, label: &str) -> bool {
        self.key.eq_ignore_ascii_case(label) || self.display_name == label
    }

    fn matches_loosely(&self, lowered_label: &str) -> bool {
        std::iter::once(&self.display_name)
            .chain(self.aliases.iter())
            .any(|alias| lowered_label.contains(&alias.to_lowercase()))
    }
}

/// Outcome of looking a raw group label up in the registry.
#[derive(Debug, Clone, Copy)]
pub struct Resolution<'a> {
    pub rule: &'a GroupRule,
    /// False when the label matched nothing and the run default was used.
    pub matched: bool,
}

fn rule(
    key: &str,
    display_name: &str,
    aliases: &[&str],
    daily_punches: u32,
    weekly_expected_punches: u32,
    description: &str,
) -> GroupRule {
    let fields: &[&str] = if daily_punches == 2 {
        &[FIELD_IN_1, FIELD_OUT_1]
    } else {
        &[FIELD_IN_1, FIELD_OUT_1, FIELD_IN_2, FIELD_OUT_2]
    };
    GroupRule {
        key: key.to_string(),
        display_name: display_name.to_string(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
        daily_punches,
        weekly_expected_punches,
        field_names: fields.iter().map(|f| f.to_string()).collect(),
        description: description.to_string(),
    }
}

/// Fixed table of attendance groups plus the fallback used for labels that
/// match none of them.
#[derive(Debug, Clone)]
pub struct GroupRuleRegistry {
    rules: Vec<GroupRule>,
    default_index: usize,
}

impl GroupRuleRegistry {
    /// Built-in table with `default_key` as the fallback group.
    pub fn with_default(default_key: &str) -> Result<Self> {
        let rules = vec![
            rule(
                GROUP_TEACHER,
                "教师组",
                &["teacher", "教师"],
                2,
                10,
                "2 punches per day (in before 08:30, out after 16:30)",
            ),
            rule(
                GROUP_ADMIN,
                "行政组",
                &["administrative", "admin", "行政"],
                4,
                20,
                "4 punches per day (before 08:00, after 11:20, before 13:40, after 16:30)",
            ),
            rule(
                GROUP_SUPPORT,
                "后勤组",
                &["support", "logistics", "后勤"],
                4,
                20,
                "4 punches per day (before 08:00, after 11:20, before 13:40, after 16:30)",
            ),
        ];
        let default_index = rules
            .iter()
            .position(|r| r.matches_exactly(default_key))
            .ok_or_else(|| AttendanceError::UnknownGroup {
                key: default_key.to_string(),
            })?;
        info!(
            "Group rules loaded: {} groups, default '{}'",
            rules.len(),
            rules[default_index].key
        );
        Ok(Self {
            rules,
            default_index,
        })
    }

    pub fn rules(&self) -> &[GroupRule] {
        &self.rules
    }

    pub fn default_rule(&self) -> &GroupRule {
        &self.rules[self.default_index]
    }

    /// Largest daily pair count in the table; raw rows keep this many pairs
    /// until their employee's group is known.
    pub fn max_daily_pairs(&self) -> usize {
        self.rules.iter().map(GroupRule::daily_pairs).max().unwrap_or(0)
    }

    pub fn get(&self, key: &str) -> Option<&GroupRule> {
        self.rules.iter().find(|r| r.matches_exactly(key))
    }

    /// Exact key or display-name match first, then a substring match on any
    /// alias; anything else falls back to the default group.
    pub fn lookup(&self, label: Option<&str>) -> Resolution<'_> {
        let found = label.map(str::trim).filter(|l| !l.is_empty()).and_then(|l| {
            let lowered = l.to_lowercase();
            self.rules
                .iter()
                .find(|r| r.matches_exactly(l))
                .or_else(|| self.rules.iter().find(|r| r.matches_loosely(&lowered)))
        });
        match found {
            Some(rule) => Resolution {
                rule,
                matched: true,
            },
            None => Resolution {
                rule: self.default_rule(),
                matched: false,
            },
        }
    }

    /// Same as [`lookup`](Self::lookup), but warns when a non-empty label
    /// falls back to the default group.
    pub fn resolve(&self, label: Option<&str>) -> Resolution<'_> {
        let resolution = self.lookup(label);
        if !resolution.matched {
            if let Some(l) = label.map(str::trim).filter(|l| !l.is_empty()) {
                warn!(
                    "{}; using default group '{}'",
                    AttendanceError::UnresolvedGroup {
                        label: l.to_string()
                    },
                    resolution.rule.key
                );
            }
        }
        resolution
    }
}
