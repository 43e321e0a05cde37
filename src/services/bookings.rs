use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, TransactionBehavior};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, PaymentStatus, Service};
use crate::services::scheduling::{validate_booking_time, ProposedSlot, SchedulingError};
use crate::services::time::canonical_slot;

pub struct NewBooking {
    pub customer_id: String,
    pub date: NaiveDate,
    pub time: String,
    pub external_payment_ref: Option<String>,
}

fn slot_taken(err: anyhow::Error) -> AppError {
    if queries::is_constraint_violation(&err) {
        AppError::Conflict("That time slot was just booked by someone else".to_string())
    } else {
        AppError::Internal(err)
    }
}

/// Validates and inserts a booking in one `BEGIN IMMEDIATE` transaction, so
/// no other writer can slip a booking in between the check and the insert.
/// The service's current name and duration are copied onto the booking.
pub fn create_booking(
    conn: &mut Connection,
    service: &Service,
    request: NewBooking,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let time = canonical_slot(&request.time)?;
    if request.customer_id.trim().is_empty() {
        return Err(AppError::Validation("customer_id is required".to_string()));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let proposed = ProposedSlot {
        date: request.date,
        time,
        duration_minutes: service.duration_minutes,
    };
    validate_booking_time(&tx, &proposed, None, now)?;

    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        customer_id: request.customer_id,
        service_id: service.id.clone(),
        service_name: service.name.clone(),
        date: request.date,
        time: time.to_string(),
        duration_minutes: Some(service.duration_minutes),
        status: BookingStatus::Pending,
        payment_status: PaymentStatus::Pending,
        external_payment_ref: request.external_payment_ref,
        created_at: now,
        updated_at: now,
    };
    queries::insert_booking(&tx, &booking).map_err(slot_taken)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        date = %booking.date,
        time = %booking.time,
        service = %booking.service_name,
        "booking created"
    );
    Ok(booking)
}

/// Only pending or confirmed bookings can move.
pub fn require_reschedulable(booking: &Booking) -> Result<(), AppError> {
    if booking.is_active() {
        return Ok(());
    }
    Err(AppError::Validation(format!(
        "Only pending or confirmed bookings can be rescheduled (this one is {})",
        booking.status.as_str()
    )))
}

/// Moves an active booking to a new slot, keeping its stored duration.
/// Moving it onto its own current slot is rejected as unchanged.
pub fn reschedule_booking(
    conn: &mut Connection,
    id: &str,
    new_date: NaiveDate,
    new_time: &str,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let time = canonical_slot(new_time)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let booking = queries::get_booking_by_id(&tx, id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

    require_reschedulable(&booking)?;
    if booking.date == new_date && booking.time == time {
        return Err(SchedulingError::Unchanged.into());
    }

    let proposed = ProposedSlot {
        date: new_date,
        time,
        duration_minutes: booking.occupied_minutes(),
    };
    validate_booking_time(&tx, &proposed, Some(&booking.id), now)?;

    queries::update_booking_date_time(&tx, &booking.id, new_date, time, now)
        .map_err(slot_taken)?;
    let updated = queries::get_booking_by_id(&tx, &booking.id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;
    tx.commit()?;

    tracing::info!(
        booking_id = %updated.id,
        from_date = %booking.date,
        from_time = %booking.time,
        to_date = %updated.date,
        to_time = %updated.time,
        "booking rescheduled"
    );
    Ok(updated)
}

/// Cancels an active booking; its slot frees up immediately.
pub fn cancel_booking(
    conn: &Connection,
    id: &str,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking_by_id(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

    if !queries::cancel_active_booking(conn, id, now)? {
        return Err(AppError::Validation(format!(
            "Only pending or confirmed bookings can be cancelled (this one is {})",
            booking.status.as_str()
        )));
    }

    tracing::info!(booking_id = %id, "booking cancelled");
    queries::get_booking_by_id(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))
}
