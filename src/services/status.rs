use chrono::NaiveDate;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, PaymentStatus};
use crate::services::payments::PaymentStatusProvider;
use crate::state::AppState;

/// What the payment processor says about a booking's payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentSignal {
    Complete,
    Incomplete,
    /// The lookup failed. Treated as "no promotion".
    Unknown,
}

/// Derives the status a booking should be shown with.
///
/// Payment promotion is applied before the date check, so a pending booking
/// that was paid for and whose date has passed reads as completed.
pub fn effective_status(
    stored: BookingStatus,
    payment: PaymentSignal,
    appointment_date: NaiveDate,
    today: NaiveDate,
) -> BookingStatus {
    let mut status = stored;

    if status == BookingStatus::Pending && payment == PaymentSignal::Complete {
        status = BookingStatus::Confirmed;
    }

    if status == BookingStatus::Confirmed && appointment_date < today {
        status = BookingStatus::Completed;
    }

    status
}

/// Best-effort payment lookup. Only pending bookings with an external handle
/// go to the provider; failures are logged and reported as `Unknown`.
pub async fn payment_signal(
    payments: &dyn PaymentStatusProvider,
    booking: &Booking,
) -> PaymentSignal {
    if booking.payment_status == PaymentStatus::Paid {
        return PaymentSignal::Complete;
    }
    if booking.status != BookingStatus::Pending {
        return PaymentSignal::Incomplete;
    }
    let Some(reference) = booking.external_payment_ref.as_deref() else {
        return PaymentSignal::Incomplete;
    };

    match payments.is_payment_complete(reference).await {
        Ok(true) => PaymentSignal::Complete,
        Ok(false) => PaymentSignal::Incomplete,
        Err(e) => {
            tracing::warn!(
                booking_id = %booking.id,
                error = %e,
                "payment lookup failed, keeping stored status"
            );
            PaymentSignal::Unknown
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciledBooking {
    #[serde(flatten)]
    pub booking: Booking,
    pub effective_status: BookingStatus,
}

/// Reconciles one booking for display. A captured payment on a pending booking
/// is persisted through a conditional update, so concurrent or repeated reads
/// promote it at most once. Completion is derived here but never written.
pub async fn reconcile(
    state: &AppState,
    mut booking: Booking,
) -> Result<ReconciledBooking, AppError> {
    let signal = payment_signal(state.payments.as_ref(), &booking).await;
    let effective = effective_status(booking.status, signal, booking.date, state.clock.today());

    if booking.status == BookingStatus::Pending && signal == PaymentSignal::Complete {
        let now = state.clock.now();
        let promoted = {
            let db = state.conn()?;
            queries::promote_paid_booking(&db, &booking.id, now)?
        };
        if promoted {
            tracing::info!(booking_id = %booking.id, "payment captured, booking confirmed");
            booking.status = BookingStatus::Confirmed;
            booking.payment_status = PaymentStatus::Paid;
            booking.updated_at = now;
        }
    }

    Ok(ReconciledBooking {
        booking,
        effective_status: effective,
    })
}

pub async fn reconcile_all(
    state: &AppState,
    bookings: Vec<Booking>,
) -> Result<Vec<ReconciledBooking>, AppError> {
    let mut out = Vec::with_capacity(bookings.len());
    for booking in bookings {
        out.push(reconcile(state, booking).await?);
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RefreshSummary {
    pub promoted: usize,
    pub completed: usize,
}

/// Dashboard refresh: persists payment promotions for pending bookings, then
/// marks confirmed bookings dated before today as completed.
pub async fn refresh_statuses(state: &AppState) -> Result<RefreshSummary, AppError> {
    let pending = {
        let db = state.conn()?;
        queries::list_pending_with_payment_ref(&db)?
    };

    let mut promoted = 0;
    for booking in pending {
        let reconciled = reconcile(state, booking).await?;
        if reconciled.booking.status == BookingStatus::Confirmed {
            promoted += 1;
        }
    }

    let completed = {
        let db = state.conn()?;
        queries::complete_past_bookings(&db, state.clock.now())?
    };

    tracing::info!(promoted, completed, "booking statuses refreshed");
    Ok(RefreshSummary {
        promoted,
        completed,
    })
}
