use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::models::{Booking, TimeOffPeriod, TimeSlot, CANONICAL_SLOTS};
use crate::services::time::{format_minutes_to_label, intervals_overlap, parse_label_to_minutes};

pub const CURRENT_APPOINTMENT_REASON: &str = "Your current appointment time";

/// Everything that can block time on one date: the active bookings and the
/// time-off periods covering it. Both slot listing and write-time validation
/// go through [`DaySchedule::block_reason`].
pub struct DaySchedule<'a> {
    pub date: NaiveDate,
    pub bookings: &'a [Booking],
    pub time_off: &'a [TimeOffPeriod],
}

impl<'a> DaySchedule<'a> {
    pub fn new(date: NaiveDate, bookings: &'a [Booking], time_off: &'a [TimeOffPeriod]) -> Self {
        Self {
            date,
            bookings,
            time_off,
        }
    }

    /// Returns the first reason `[start, start + duration)` cannot be booked,
    /// or `None` when it is free. Checks run in order: elapsed time, time off,
    /// then bookings. `excluding` skips one booking id (the one being moved).
    pub fn block_reason(
        &self,
        start: i32,
        duration: i32,
        excluding: Option<&str>,
        now: NaiveDateTime,
    ) -> Option<String> {
        if let Some(reason) = elapsed_reason(self.date, start, now) {
            return Some(reason);
        }

        for period in self.time_off.iter().filter(|p| p.covers(self.date)) {
            if let Some(reason) = period.block_reason(start, duration) {
                return Some(reason);
            }
        }

        self.bookings
            .iter()
            .filter(|b| b.is_active() && b.date == self.date)
            .filter(|b| excluding != Some(b.id.as_str()))
            .find_map(|b| booking_conflict(b, start, duration))
    }
}

fn elapsed_reason(date: NaiveDate, start: i32, now: NaiveDateTime) -> Option<String> {
    let today = now.date();
    if date < today {
        return Some("This date has already passed".to_string());
    }
    let now_minutes = (now.hour() * 60 + now.minute()) as i32;
    if date == today && start <= now_minutes {
        return Some("This time has already passed".to_string());
    }
    None
}

fn booking_conflict(booking: &Booking, start: i32, duration: i32) -> Option<String> {
    let Ok(booked_start) = parse_label_to_minutes(&booking.time) else {
        tracing::warn!(
            booking_id = %booking.id,
            time = %booking.time,
            "stored booking has unreadable time"
        );
        return None;
    };
    let booked_duration = booking.occupied_minutes();

    if !intervals_overlap(start, duration, booked_start, booked_duration) {
        return None;
    }

    Some(format!(
        "Conflicts with {} from {} to {}",
        booking.service_name,
        format_minutes_to_label(booked_start),
        format_minutes_to_label(booked_start.saturating_add(booked_duration))
    ))
}

/// Annotates every canonical slot for a service of `duration_minutes` on the
/// schedule's date, in canonical order.
///
/// When `rescheduling` is an active booking, it no longer blocks anything and
/// its current slot is always offered back with [`CURRENT_APPOINTMENT_REASON`].
/// An inactive booking is ignored.
pub fn compute_availability(
    schedule: &DaySchedule<'_>,
    duration_minutes: i32,
    rescheduling: Option<&Booking>,
    now: NaiveDateTime,
) -> Vec<TimeSlot> {
    let rescheduling = rescheduling.filter(|b| b.is_active());
    let excluding = rescheduling.map(|b| b.id.as_str());

    CANONICAL_SLOTS
        .iter()
        .map(|&label| {
            let is_current = rescheduling
                .map(|b| b.date == schedule.date && b.time == label)
                .unwrap_or(false);
            if is_current {
                return TimeSlot {
                    label: label.to_string(),
                    available: true,
                    reason: Some(CURRENT_APPOINTMENT_REASON.to_string()),
                };
            }

            let start = match parse_label_to_minutes(label) {
                Ok(start) => start,
                Err(e) => return TimeSlot::blocked(label, e.to_string()),
            };

            match schedule.block_reason(start, duration_minutes, excluding, now) {
                Some(reason) => TimeSlot::blocked(label, reason),
                None => TimeSlot::open(label),
            }
        })
        .collect()
}
