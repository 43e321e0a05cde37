use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{NewTimeOff, TimeOffPeriod};
use crate::services::time::parse_clock_to_minutes;

/// Checks a time-off request and normalizes it: all-day periods drop any
/// submitted times, partial-day periods must carry an ordered window.
pub fn validate_time_off(mut period: NewTimeOff) -> Result<NewTimeOff, AppError> {
    period.title = period.title.trim().to_string();
    if period.title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }

    if period.end_date < period.start_date {
        return Err(AppError::Validation(
            "End date cannot be before start date".to_string(),
        ));
    }

    if period.is_all_day {
        period.start_time = None;
        period.end_time = None;
        return Ok(period);
    }

    let (Some(start), Some(end)) = (period.start_time.as_deref(), period.end_time.as_deref()) else {
        return Err(AppError::Validation(
            "Start and end times are required for partial-day time off".to_string(),
        ));
    };

    let start_minutes = parse_clock_to_minutes(start)?;
    let end_minutes = parse_clock_to_minutes(end)?;
    if end_minutes <= start_minutes {
        return Err(AppError::Validation(
            "End time must be after start time".to_string(),
        ));
    }

    Ok(period)
}

/// Stores a new period. Existing bookings inside it are left untouched; the
/// period only affects availability computed from now on.
pub fn create(
    conn: &Connection,
    period: NewTimeOff,
    now: NaiveDateTime,
) -> Result<TimeOffPeriod, AppError> {
    let period = validate_time_off(period)?;

    let stored = TimeOffPeriod {
        id: uuid::Uuid::new_v4().to_string(),
        title: period.title,
        description: period.description,
        kind: period.kind,
        start_date: period.start_date,
        end_date: period.end_date,
        is_all_day: period.is_all_day,
        start_time: period.start_time,
        end_time: period.end_time,
        created_at: now,
    };
    queries::insert_time_off(conn, &stored)?;

    tracing::info!(
        time_off_id = %stored.id,
        title = %stored.title,
        start = %stored.start_date,
        end = %stored.end_date,
        "time off created"
    );
    Ok(stored)
}

pub fn query(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<TimeOffPeriod>, AppError> {
    if to < from {
        return Err(AppError::Validation(
            "End date cannot be before start date".to_string(),
        ));
    }
    Ok(queries::list_time_off_in_range(conn, from, to)?)
}

/// Hard delete. Slots the period blocked become available immediately.
pub fn delete(conn: &Connection, id: &str) -> Result<bool, AppError> {
    let removed = queries::delete_time_off(conn, id)?;
    if removed {
        tracing::info!(time_off_id = %id, "time off deleted");
    }
    Ok(removed)
}
