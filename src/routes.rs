use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Every HTTP route the service exposes, with request tracing and CORS.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/services", get(handlers::catalog::list_services))
        .route("/api/services/:id", get(handlers::catalog::get_service))
        .route("/api/availability", get(handlers::availability::get_availability))
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route("/api/bookings/:id/status", get(handlers::bookings::get_status))
        .route(
            "/api/bookings/:id/reschedule",
            post(handlers::bookings::reschedule_booking),
        )
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/customers/:customer_id/bookings",
            get(handlers::bookings::get_customer_bookings),
        )
        .route("/api/admin/status", get(handlers::admin::get_status))
        .route("/api/admin/bookings", get(handlers::admin::get_bookings))
        .route(
            "/api/admin/bookings/refresh",
            post(handlers::admin::refresh_bookings),
        )
        .route(
            "/api/admin/bookings/:id/cancel",
            post(handlers::admin::cancel_booking),
        )
        .route(
            "/api/admin/time-off",
            get(handlers::admin::get_time_off).post(handlers::admin::create_time_off),
        )
        .route(
            "/api/admin/time-off/:id",
            delete(handlers::admin::delete_time_off),
        )
        .route("/api/admin/services", post(handlers::admin::create_service))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
