use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::TimeSlot;
use crate::services::availability::{compute_availability, DaySchedule};
use crate::services::{bookings, catalog};
use crate::services::time::parse_date;
use crate::state::AppState;

// GET /api/availability
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub service_id: String,
    pub date: String,
    /// Set when the customer is moving an existing booking.
    pub booking_id: Option<String>,
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<TimeSlot>>, AppError> {
    let date = parse_date(&query.date)?;
    let now = state.clock.now();

    let db = state.conn()?;
    let service = catalog::require_service(&db, &query.service_id)?;

    let rescheduling = match query.booking_id.as_deref() {
        Some(id) => {
            let booking = queries::get_booking_by_id(&db, id)?
                .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;
            bookings::require_reschedulable(&booking)?;
            Some(booking)
        }
        None => None,
    };

    let active = queries::list_active_bookings_by_date(&db, date)?;
    let time_off = queries::list_time_off_covering(&db, date)?;
    drop(db);

    // A moved booking keeps the duration it was booked with
    let duration = rescheduling
        .as_ref()
        .map(|b| b.occupied_minutes())
        .unwrap_or(service.duration_minutes);

    let schedule = DaySchedule::new(date, &active, &time_off);
    let slots = compute_availability(&schedule, duration, rescheduling.as_ref(), now);

    Ok(Json(slots))
}
