use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus};
use crate::services::bookings::{self, NewBooking};
use crate::services::catalog;
use crate::services::status::{self, ReconciledBooking};
use crate::services::time::parse_date;
use crate::state::AppState;

fn load_booking(state: &AppState, id: &str) -> Result<Booking, AppError> {
    let db = state.conn()?;
    queries::get_booking_by_id(&db, id)?.ok_or_else(|| AppError::NotFound(format!("booking {id}")))
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub customer_id: String,
    pub service_id: String,
    pub date: String,
    pub time: String,
    pub external_payment_ref: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let date = parse_date(&body.date)?;
    let now = state.clock.now();

    let booking = {
        let mut db = state.conn()?;
        let service = catalog::require_service(&db, &body.service_id)?;
        bookings::create_booking(
            &mut db,
            &service,
            NewBooking {
                customer_id: body.customer_id,
                date,
                time: body.time,
                external_payment_ref: body.external_payment_ref,
            },
            now,
        )?
    };

    Ok((StatusCode::CREATED, Json(booking)))
}

// POST /api/bookings/:id/reschedule
#[derive(Deserialize)]
pub struct RescheduleRequest {
    pub date: String,
    pub time: String,
}

pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RescheduleRequest>,
) -> Result<Json<Booking>, AppError> {
    let date = parse_date(&body.date)?;
    let now = state.clock.now();

    let booking = {
        let mut db = state.conn()?;
        bookings::reschedule_booking(&mut db, &id, date, &body.time, now)?
    };

    Ok(Json(booking))
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let booking = {
        let db = state.conn()?;
        bookings::cancel_booking(&db, &id, state.clock.now())?
    };
    Ok(Json(booking))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReconciledBooking>, AppError> {
    let booking = load_booking(&state, &id)?;
    let reconciled = status::reconcile(&state, booking).await?;
    Ok(Json(reconciled))
}

// GET /api/bookings/:id/status
#[derive(Serialize)]
pub struct StatusResponse {
    id: String,
    stored_status: BookingStatus,
    effective_status: BookingStatus,
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let booking = load_booking(&state, &id)?;
    let reconciled = status::reconcile(&state, booking).await?;

    Ok(Json(StatusResponse {
        id: reconciled.booking.id,
        stored_status: reconciled.booking.status,
        effective_status: reconciled.effective_status,
    }))
}

// GET /api/customers/:customer_id/bookings
pub async fn get_customer_bookings(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<String>,
) -> Result<Json<Vec<ReconciledBooking>>, AppError> {
    let bookings = {
        let db = state.conn()?;
        queries::get_bookings_for_customer(&db, &customer_id)?
    };

    let reconciled = status::reconcile_all(&state, bookings).await?;
    Ok(Json(reconciled))
}
