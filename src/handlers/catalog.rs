use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Service;
use crate::services::catalog;
use crate::state::AppState;

// GET /api/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Service>>, AppError> {
    let db = state.conn()?;
    Ok(Json(queries::list_services(&db)?))
}

// GET /api/services/:id
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Service>, AppError> {
    let db = state.conn()?;
    Ok(Json(catalog::require_service(&db, &id)?))
}
