use chrono::NaiveDate;

use crate::models::slot::CANONICAL_SLOTS;

pub const MINUTES_PER_DAY: i32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid time \"{0}\": expected h:mm AM/PM")]
    MissingColon(String),

    #[error("invalid hour in time \"{0}\"")]
    InvalidHour(String),

    #[error("invalid minute in time \"{0}\"")]
    InvalidMinute(String),

    #[error("invalid time \"{0}\": missing AM/PM marker")]
    MissingMeridiem(String),

    #[error("\"{0}\" is not a bookable time slot")]
    UnknownSlot(String),

    #[error("invalid date \"{0}\": expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Parses a 12-hour label such as "9:00 AM" into minutes since midnight.
pub fn parse_label_to_minutes(label: &str) -> Result<i32, ParseError> {
    let trimmed = label.trim();
    let (clock, meridiem) = trimmed
        .rsplit_once(' ')
        .ok_or_else(|| ParseError::MissingMeridiem(label.to_string()))?;

    let pm = match meridiem.to_ascii_uppercase().as_str() {
        "AM" => false,
        "PM" => true,
        _ => return Err(ParseError::MissingMeridiem(label.to_string())),
    };

    let (hour, minute) = clock
        .trim()
        .split_once(':')
        .ok_or_else(|| ParseError::MissingColon(label.to_string()))?;

    let hour: i32 = hour
        .parse()
        .map_err(|_| ParseError::InvalidHour(label.to_string()))?;
    if !(1..=12).contains(&hour) {
        return Err(ParseError::InvalidHour(label.to_string()));
    }

    if minute.len() != 2 {
        return Err(ParseError::InvalidMinute(label.to_string()));
    }
    let minute: i32 = minute
        .parse()
        .map_err(|_| ParseError::InvalidMinute(label.to_string()))?;
    if !(0..60).contains(&minute) {
        return Err(ParseError::InvalidMinute(label.to_string()));
    }

    let hour24 = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };

    Ok(hour24 * 60 + minute)
}

/// Formats minutes since midnight as a 12-hour label. Values past midnight wrap.
pub fn format_minutes_to_label(minutes: i32) -> String {
    let minutes = minutes.rem_euclid(MINUTES_PER_DAY);
    let hour = minutes / 60;
    let minute = minutes % 60;

    let (display_hour, meridiem) = match hour {
        0 => (12, "AM"),
        1..=11 => (hour, "AM"),
        12 => (12, "PM"),
        _ => (hour - 12, "PM"),
    };

    format!("{display_hour}:{minute:02} {meridiem}")
}

/// Half-open overlap: an interval ending exactly when another starts does not overlap.
pub fn intervals_overlap(start_a: i32, dur_a: i32, start_b: i32, dur_b: i32) -> bool {
    start_a < start_b.saturating_add(dur_b) && start_a.saturating_add(dur_a) > start_b
}

fn two_digits(field: &str) -> Option<i32> {
    if field.len() != 2 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Parses a 24-hour "HH:MM" clock time, as used for time-off windows.
/// Both fields must be exactly two digits.
pub fn parse_clock_to_minutes(s: &str) -> Result<i32, ParseError> {
    let (hour, minute) = s
        .trim()
        .split_once(':')
        .ok_or_else(|| ParseError::MissingColon(s.to_string()))?;

    let hour = two_digits(hour).ok_or_else(|| ParseError::InvalidHour(s.to_string()))?;
    let minute = two_digits(minute).ok_or_else(|| ParseError::InvalidMinute(s.to_string()))?;

    if !(0..24).contains(&hour) {
        return Err(ParseError::InvalidHour(s.to_string()));
    }
    if !(0..60).contains(&minute) {
        return Err(ParseError::InvalidMinute(s.to_string()));
    }
    Ok(hour * 60 + minute)
}

pub fn parse_date(s: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ParseError::InvalidDate(s.to_string()))
}

/// Resolves a submitted label to its canonical slot. Anything outside the
/// canonical set is rejected, even if it parses as a clock time.
pub fn canonical_slot(label: &str) -> Result<&'static str, ParseError> {
    CANONICAL_SLOTS
        .iter()
        .copied()
        .find(|slot| *slot == label.trim())
        .ok_or_else(|| ParseError::UnknownSlot(label.to_string()))
}
