use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Days;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, NewTimeOff, Service, TimeOffKind, TimeOffPeriod};
use crate::services::catalog::{self, NewService};
use crate::services::status::{self, ReconciledBooking, RefreshSummary};
use crate::services::time::parse_date;
use crate::services::{bookings, time_off};
use crate::state::AppState;

const TIME_OFF_HORIZON_DAYS: u64 = 365;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /api/admin/status
#[derive(Serialize)]
pub struct StatusResponse {
    upcoming_bookings: i64,
    pending_bookings: i64,
    upcoming_time_off: i64,
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let stats = {
        let db = state.conn()?;
        queries::get_dashboard_stats(&db, state.clock.today())?
    };

    Ok(Json(StatusResponse {
        upcoming_bookings: stats.upcoming_bookings,
        pending_bookings: stats.pending_bookings,
        upcoming_time_off: stats.upcoming_time_off,
    }))
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<BookingStatus>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<ReconciledBooking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let bookings = {
        let db = state.conn()?;
        queries::get_all_bookings(&db, query.status.as_ref().map(|s| s.as_str()), limit)?
    };

    let reconciled = status::reconcile_all(&state, bookings).await?;
    Ok(Json(reconciled))
}

// POST /api/admin/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let db = state.conn()?;
        bookings::cancel_booking(&db, &id, state.clock.now())?
    };
    Ok(Json(booking))
}

// POST /api/admin/bookings/refresh
pub async fn refresh_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RefreshSummary>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    Ok(Json(status::refresh_statuses(&state).await?))
}

// GET /api/admin/time-off
#[derive(Deserialize)]
pub struct TimeOffQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

pub async fn get_time_off(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TimeOffQuery>,
) -> Result<Json<Vec<TimeOffPeriod>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let from = match query.from.as_deref() {
        Some(s) => parse_date(s)?,
        None => state.clock.today(),
    };
    let to = match query.to.as_deref() {
        Some(s) => parse_date(s)?,
        None => from
            .checked_add_days(Days::new(TIME_OFF_HORIZON_DAYS))
            .unwrap_or(from),
    };

    let db = state.conn()?;
    Ok(Json(time_off::query(&db, from, to)?))
}

// POST /api/admin/time-off
#[derive(Deserialize)]
pub struct CreateTimeOffRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<TimeOffKind>,
    pub start_date: String,
    pub end_date: String,
    pub is_all_day: Option<bool>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

pub async fn create_time_off(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateTimeOffRequest>,
) -> Result<(StatusCode, Json<TimeOffPeriod>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let request = NewTimeOff {
        title: body.title,
        description: body.description,
        kind: body.kind.unwrap_or(TimeOffKind::TimeOff),
        start_date: parse_date(&body.start_date)?,
        end_date: parse_date(&body.end_date)?,
        is_all_day: body.is_all_day.unwrap_or(true),
        start_time: body.start_time,
        end_time: body.end_time,
    };

    let period = {
        let db = state.conn()?;
        time_off::create(&db, request, state.clock.now())?
    };

    Ok((StatusCode::CREATED, Json(period)))
}

// DELETE /api/admin/time-off/:id
pub async fn delete_time_off(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let removed = {
        let db = state.conn()?;
        time_off::delete(&db, &id)?
    };

    if removed {
        Ok(Json(serde_json::json!({"ok": true})))
    } else {
        Err(AppError::NotFound(format!("time off {id}")))
    }
}

// POST /api/admin/services
#[derive(Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub duration_minutes: i32,
    #[serde(default)]
    pub price_cents: i64,
    pub description: Option<String>,
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let service = {
        let db = state.conn()?;
        catalog::create_service(
            &db,
            NewService {
                name: body.name,
                duration_minutes: body.duration_minutes,
                price_cents: body.price_cents,
                description: body.description,
            },
            state.clock.now(),
        )?
    };

    Ok((StatusCode::CREATED, Json(service)))
}
