use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::services::availability::DaySchedule;
use crate::services::time::parse_label_to_minutes;

#[derive(Debug, Clone, PartialEq)]
pub enum SchedulingError {
    /// The span is blocked; carries the same reason the slot list shows.
    Conflict(String),
    /// A reschedule that would leave the booking where it already is.
    Unchanged,
}

impl std::fmt::Display for SchedulingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulingError::Conflict(reason) => write!(f, "{reason}"),
            SchedulingError::Unchanged => {
                write!(
                    f,
                    "That is already your appointment time. Pick a different slot to reschedule."
                )
            }
        }
    }
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::Conflict(_) => AppError::Conflict(err.to_string()),
            SchedulingError::Unchanged => AppError::Validation(err.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProposedSlot<'a> {
    pub date: NaiveDate,
    pub time: &'a str,
    pub duration_minutes: i32,
}

/// Accepts or rejects one proposed slot against an already-loaded schedule.
pub fn check_slot(
    schedule: &DaySchedule<'_>,
    proposed: &ProposedSlot<'_>,
    excluding: Option<&str>,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    let start = parse_label_to_minutes(proposed.time)?;

    match schedule.block_reason(start, proposed.duration_minutes, excluding, now) {
        Some(reason) => Err(SchedulingError::Conflict(reason).into()),
        None => Ok(()),
    }
}

/// Write-time gate. Reloads the date's active bookings and time off from
/// storage and checks the proposal against them. Callers run this inside the
/// same transaction as the write that follows.
pub fn validate_booking_time(
    conn: &Connection,
    proposed: &ProposedSlot<'_>,
    excluding: Option<&str>,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    let bookings = queries::list_active_bookings_by_date(conn, proposed.date)?;
    let time_off = queries::list_time_off_covering(conn, proposed.date)?;
    let schedule = DaySchedule::new(proposed.date, &bookings, &time_off);

    check_slot(&schedule, proposed, excluding, now)
}
