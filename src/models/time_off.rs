use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::services::time::{format_minutes_to_label, intervals_overlap, parse_clock_to_minutes};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeOffKind {
    TimeOff,
    Holiday,
    Maintenance,
    Personal,
}

impl TimeOffKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOffKind::TimeOff => "time_off",
            TimeOffKind::Holiday => "holiday",
            TimeOffKind::Maintenance => "maintenance",
            TimeOffKind::Personal => "personal",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "holiday" => TimeOffKind::Holiday,
            "maintenance" => TimeOffKind::Maintenance,
            "personal" => TimeOffKind::Personal,
            _ => TimeOffKind::TimeOff,
        }
    }
}

/// An administrator-declared blackout. Partial-day periods block the same
/// `[start_time, end_time)` window on every date in `[start_date, end_date]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeOffPeriod {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: TimeOffKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_all_day: bool,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub created_at: NaiveDateTime,
}

/// A validated time-off period that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewTimeOff {
    pub title: String,
    pub description: Option<String>,
    pub kind: TimeOffKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_all_day: bool,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl TimeOffPeriod {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Daily blocked window in minutes, or `None` for all-day periods.
    /// A partial period whose stored times cannot be read also yields `None`
    /// and so blocks the whole day.
    pub fn window(&self) -> Option<(i32, i32)> {
        if self.is_all_day {
            return None;
        }
        let start = parse_clock_to_minutes(self.start_time.as_deref()?).ok()?;
        let end = parse_clock_to_minutes(self.end_time.as_deref()?).ok()?;
        Some((start, end))
    }

    /// Why `[start, start + duration)` is blocked on a covered date, if it is.
    pub fn block_reason(&self, start: i32, duration: i32) -> Option<String> {
        match self.window() {
            None => Some(format!("Unavailable due to {}", self.title)),
            Some((from, to)) if intervals_overlap(start, duration, from, to - from) => Some(format!(
                "Conflicts with {} ({} - {})",
                self.title,
                format_minutes_to_label(from),
                format_minutes_to_label(to)
            )),
            Some(_) => None,
        }
    }
}
