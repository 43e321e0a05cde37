use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Service;
use crate::services::time::MINUTES_PER_DAY;

pub struct NewService {
    pub name: String,
    pub duration_minutes: i32,
    pub price_cents: i64,
    pub description: Option<String>,
}

pub fn create_service(
    conn: &Connection,
    request: NewService,
    now: NaiveDateTime,
) -> Result<Service, AppError> {
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("Service name is required".to_string()));
    }
    if !(1..=MINUTES_PER_DAY).contains(&request.duration_minutes) {
        return Err(AppError::Validation(format!(
            "Duration must be between 1 and {MINUTES_PER_DAY} minutes"
        )));
    }
    if request.price_cents < 0 {
        return Err(AppError::Validation("Price cannot be negative".to_string()));
    }

    let service = Service {
        id: uuid::Uuid::new_v4().to_string(),
        name,
        duration_minutes: request.duration_minutes,
        price_cents: request.price_cents,
        description: request.description,
        created_at: now,
    };
    queries::insert_service(conn, &service)?;

    tracing::info!(service_id = %service.id, name = %service.name, "service created");
    Ok(service)
}

pub fn require_service(conn: &Connection, id: &str) -> Result<Service, AppError> {
    queries::get_service(conn, id)?.ok_or_else(|| AppError::NotFound(format!("service {id}")))
}
