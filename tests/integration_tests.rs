use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{NaiveDate, NaiveDateTime};
use tower::ServiceExt;

use slotbook::config::AppConfig;
use slotbook::db::{self, queries};
use slotbook::models::{Booking, BookingStatus, PaymentStatus, Service};
use slotbook::routes;
use slotbook::services::catalog::{self, NewService};
use slotbook::services::clock::FixedClock;
use slotbook::services::payments::PaymentStatusProvider;
use slotbook::state::AppState;

// ── Mock Providers ──

struct MockPayments {
    paid: HashSet<String>,
    failing: bool,
}

#[async_trait]
impl PaymentStatusProvider for MockPayments {
    async fn is_payment_complete(&self, reference: &str) -> anyhow::Result<bool> {
        if self.failing {
            anyhow::bail!("payment provider timed out");
        }
        Ok(self.paid.contains(reference))
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        admin_token: "test-token".to_string(),
        payment_api_url: "http://localhost:12111".to_string(),
        payment_api_key: String::new(),
    }
}

/// 2025-06-02 08:00, before the first slot of the day.
fn test_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 2)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

fn state_with_payments(payments: MockPayments) -> Arc<AppState> {
    let conn = db::init_db(":memory:").unwrap();
    Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
        payments: Box::new(payments),
        clock: Box::new(FixedClock(test_now())),
    })
}

fn test_state() -> Arc<AppState> {
    state_with_payments(MockPayments {
        paid: HashSet::new(),
        failing: false,
    })
}

fn seed_service(state: &AppState, name: &str, duration: i32) -> Service {
    let db = state.db.lock().unwrap();
    catalog::create_service(
        &db,
        NewService {
            name: name.to_string(),
            duration_minutes: duration,
            price_cents: 4500,
            description: None,
        },
        test_now(),
    )
    .unwrap()
}

fn seed_booking(
    state: &AppState,
    date: &str,
    time: &str,
    status: BookingStatus,
    payment_ref: Option<&str>,
) -> Booking {
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        customer_id: "cust-seed".to_string(),
        service_id: "svc-seed".to_string(),
        service_name: "Haircut".to_string(),
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        time: time.to_string(),
        duration_minutes: Some(60),
        status,
        payment_status: PaymentStatus::Pending,
        external_payment_ref: payment_ref.map(str::to_string),
        created_at: test_now(),
        updated_at: test_now(),
    };
    let db = state.db.lock().unwrap();
    queries::insert_booking(&db, &booking).unwrap();
    booking
}

async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let res = routes::router(state.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn admin(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", "Bearer test-token");
    match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn slot<'a>(slots: &'a serde_json::Value, label: &str) -> &'a serde_json::Value {
    slots
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["label"] == label)
        .unwrap()
}

// ── Health & Catalogue ──

#[tokio::test]
async fn test_health() {
    let state = test_state();
    let res = routes::router(state).oneshot(get("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_services_listed_and_fetched() {
    let state = test_state();
    let svc = seed_service(&state, "Haircut", 60);

    let (status, json) = send(&state, get("/api/services")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);

    let (status, json) = send(&state, get(&format!("/api/services/{}", svc.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["duration_minutes"], 60);

    let (status, _) = send(&state, get("/api/services/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Availability ──

#[tokio::test]
async fn test_empty_day_is_fully_open() {
    let state = test_state();
    let svc = seed_service(&state, "Haircut", 60);

    let (status, json) = send(
        &state,
        get(&format!("/api/availability?service_id={}&date=2025-06-10", svc.id)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let slots = json.as_array().unwrap();
    assert_eq!(slots.len(), 7);
    assert_eq!(slots[0]["label"], "9:00 AM");
    assert_eq!(slots[6]["label"], "4:00 PM");
    assert!(slots.iter().all(|s| s["available"] == true));
    assert!(slots.iter().all(|s| s.get("reason").is_none()));
}

#[tokio::test]
async fn test_long_service_blocked_by_following_booking() {
    let state = test_state();
    let svc = seed_service(&state, "Color", 90);
    seed_booking(&state, "2025-06-10", "10:00 AM", BookingStatus::Confirmed, None);

    let (_, json) = send(
        &state,
        get(&format!("/api/availability?service_id={}&date=2025-06-10", svc.id)),
    )
    .await;

    let nine = slot(&json, "9:00 AM");
    assert_eq!(nine["available"], false);
    assert_eq!(
        nine["reason"],
        "Conflicts with Haircut from 10:00 AM to 11:00 AM"
    );
    assert_eq!(slot(&json, "10:00 AM")["available"], false);
    assert_eq!(slot(&json, "11:00 AM")["available"], true);
}

#[tokio::test]
async fn test_cancelled_booking_does_not_block() {
    let state = test_state();
    let svc = seed_service(&state, "Haircut", 60);
    seed_booking(&state, "2025-06-10", "10:00 AM", BookingStatus::Cancelled, None);

    let (_, json) = send(
        &state,
        get(&format!("/api/availability?service_id={}&date=2025-06-10", svc.id)),
    )
    .await;

    assert_eq!(slot(&json, "10:00 AM")["available"], true);
}

#[tokio::test]
async fn test_past_date_is_blocked() {
    let state = test_state();
    let svc = seed_service(&state, "Haircut", 60);

    let (_, json) = send(
        &state,
        get(&format!("/api/availability?service_id={}&date=2025-06-01", svc.id)),
    )
    .await;

    for s in json.as_array().unwrap() {
        assert_eq!(s["available"], false);
        assert_eq!(s["reason"], "This date has already passed");
    }
}

#[tokio::test]
async fn test_availability_rejects_malformed_date() {
    let state = test_state();
    let svc = seed_service(&state, "Haircut", 60);

    let (status, json) = send(
        &state,
        get(&format!("/api/availability?service_id={}&date=06/10/2025", svc.id)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

// ── Bookings ──

#[tokio::test]
async fn test_create_booking_then_conflict() {
    let state = test_state();
    let svc = seed_service(&state, "Haircut", 60);

    let request = serde_json::json!({
        "customer_id": "cust-1",
        "service_id": svc.id,
        "date": "2025-06-10",
        "time": "2:00 PM",
        "external_payment_ref": "cs_test_1",
    });

    let (status, json) = send(&state, post_json("/api/bookings", request.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "pending");
    assert_eq!(json["time"], "2:00 PM");
    assert_eq!(json["service_name"], "Haircut");

    let (status, json) = send(&state, post_json("/api/bookings", request)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        json["error"],
        "Conflicts with Haircut from 2:00 PM to 3:00 PM"
    );
}

#[tokio::test]
async fn test_create_booking_rejects_unknown_label() {
    let state = test_state();
    let svc = seed_service(&state, "Haircut", 60);

    let (status, _) = send(
        &state,
        post_json(
            "/api/bookings",
            serde_json::json!({
                "customer_id": "cust-1",
                "service_id": svc.id,
                "date": "2025-06-10",
                "time": "12:00 PM",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_booking_unknown_service() {
    let state = test_state();

    let (status, _) = send(
        &state,
        post_json(
            "/api/bookings",
            serde_json::json!({
                "customer_id": "cust-1",
                "service_id": "nope",
                "date": "2025-06-10",
                "time": "9:00 AM",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reschedule_flow() {
    let state = test_state();
    let svc = seed_service(&state, "Haircut", 60);
    let booking = seed_booking(&state, "2025-06-10", "10:00 AM", BookingStatus::Confirmed, None);

    // Own slot is offered back while moving
    let (_, json) = send(
        &state,
        get(&format!(
            "/api/availability?service_id={}&date=2025-06-10&booking_id={}",
            svc.id, booking.id
        )),
    )
    .await;
    let current = slot(&json, "10:00 AM");
    assert_eq!(current["available"], true);
    assert_eq!(current["reason"], "Your current appointment time");

    let uri = format!("/api/bookings/{}/reschedule", booking.id);

    let (status, _) = send(
        &state,
        post_json(&uri, serde_json::json!({"date": "2025-06-10", "time": "10:00 AM"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // 11 AM only touches the old 10-11 interval at its end
    let (status, json) = send(
        &state,
        post_json(&uri, serde_json::json!({"date": "2025-06-10", "time": "11:00 AM"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["time"], "11:00 AM");

    let (_, json) = send(
        &state,
        get(&format!("/api/availability?service_id={}&date=2025-06-10", svc.id)),
    )
    .await;
    assert_eq!(slot(&json, "10:00 AM")["available"], true);
    assert_eq!(slot(&json, "11:00 AM")["available"], false);
}

#[tokio::test]
async fn test_cancelled_booking_cannot_drive_reschedule_availability() {
    let state = test_state();
    let svc = seed_service(&state, "Haircut", 60);
    let gone = seed_booking(&state, "2025-06-10", "9:00 AM", BookingStatus::Cancelled, None);
    seed_booking(&state, "2025-06-10", "9:00 AM", BookingStatus::Confirmed, None);

    let (status, json) = send(
        &state,
        get(&format!(
            "/api/availability?service_id={}&date=2025-06-10&booking_id={}",
            svc.id, gone.id
        )),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        json["error"],
        "Only pending or confirmed bookings can be rescheduled (this one is cancelled)"
    );

    // The write gate gives the same answer
    let (status, json) = send(
        &state,
        post_json(
            &format!("/api/bookings/{}/reschedule", gone.id),
            serde_json::json!({"date": "2025-06-10", "time": "1:00 PM"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        json["error"],
        "Only pending or confirmed bookings can be rescheduled (this one is cancelled)"
    );
}

#[tokio::test]
async fn test_reschedule_into_other_booking_conflicts() {
    let state = test_state();
    let moving = seed_booking(&state, "2025-06-10", "9:00 AM", BookingStatus::Pending, None);
    seed_booking(&state, "2025-06-10", "1:00 PM", BookingStatus::Confirmed, None);

    let (status, _) = send(
        &state,
        post_json(
            &format!("/api/bookings/{}/reschedule", moving.id),
            serde_json::json!({"date": "2025-06-10", "time": "1:00 PM"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_frees_slot_and_is_not_repeatable() {
    let state = test_state();
    let booking = seed_booking(&state, "2025-06-10", "3:00 PM", BookingStatus::Pending, None);
    let uri = format!("/api/bookings/{}/cancel", booking.id);

    let (status, json) = send(&state, post_json(&uri, serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "cancelled");

    let (status, _) = send(&state, post_json(&uri, serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ── Status Reconciliation ──

#[tokio::test]
async fn test_paid_booking_is_promoted() {
    let state = state_with_payments(MockPayments {
        paid: HashSet::from(["cs_paid".to_string()]),
        failing: false,
    });
    let booking =
        seed_booking(&state, "2025-06-10", "9:00 AM", BookingStatus::Pending, Some("cs_paid"));

    let (status, json) = send(&state, get(&format!("/api/bookings/{}/status", booking.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["effective_status"], "confirmed");

    let stored = {
        let db = state.db.lock().unwrap();
        queries::get_booking_by_id(&db, &booking.id).unwrap().unwrap()
    };
    assert_eq!(stored.status, BookingStatus::Confirmed);
    assert_eq!(stored.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_failed_lookup_keeps_stored_status() {
    let state = state_with_payments(MockPayments {
        paid: HashSet::new(),
        failing: true,
    });
    let booking =
        seed_booking(&state, "2025-06-10", "9:00 AM", BookingStatus::Pending, Some("cs_any"));

    let (status, json) = send(&state, get(&format!("/api/bookings/{}/status", booking.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stored_status"], "pending");
    assert_eq!(json["effective_status"], "pending");
}

#[tokio::test]
async fn test_past_confirmed_booking_reads_completed() {
    let state = test_state();
    let booking = seed_booking(&state, "2025-05-20", "9:00 AM", BookingStatus::Confirmed, None);

    let (_, json) = send(&state, get(&format!("/api/bookings/{}", booking.id))).await;
    assert_eq!(json["status"], "confirmed");
    assert_eq!(json["effective_status"], "completed");

    let (_, json) = send(&state, get("/api/customers/cust-seed/bookings")).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["effective_status"], "completed");
}

#[tokio::test]
async fn test_unknown_booking_status_is_404() {
    let state = test_state();
    let (status, _) = send(&state, get("/api/bookings/nope/status")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Admin API Tests ──

#[tokio::test]
async fn test_admin_requires_auth() {
    let state = test_state();

    let (status, _) = send(&state, get("/api/admin/status")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/api/admin/status")
        .header("Authorization", "Bearer wrong-token")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&state, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_status_counts() {
    let state = test_state();
    seed_booking(&state, "2025-06-10", "9:00 AM", BookingStatus::Confirmed, None);
    seed_booking(&state, "2025-06-11", "9:00 AM", BookingStatus::Pending, None);
    seed_booking(&state, "2025-05-01", "9:00 AM", BookingStatus::Confirmed, None);

    let (status, json) = send(&state, admin("GET", "/api/admin/status", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["upcoming_bookings"], 1);
    assert_eq!(json["pending_bookings"], 1);
    assert_eq!(json["upcoming_time_off"], 0);
}

#[tokio::test]
async fn test_admin_time_off_blocks_availability() {
    let state = test_state();
    let svc = seed_service(&state, "Haircut", 60);

    let (status, holiday) = send(
        &state,
        admin(
            "POST",
            "/api/admin/time-off",
            Some(serde_json::json!({
                "title": "Holiday",
                "type": "holiday",
                "start_date": "2025-06-10",
                "end_date": "2025-06-10",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(holiday["is_all_day"], true);
    assert_eq!(holiday["type"], "holiday");

    let (status, _) = send(
        &state,
        admin(
            "POST",
            "/api/admin/time-off",
            Some(serde_json::json!({
                "title": "Lunch",
                "start_date": "2025-06-11",
                "end_date": "2025-06-11",
                "is_all_day": false,
                "start_time": "13:00",
                "end_time": "14:00",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, json) = send(
        &state,
        get(&format!("/api/availability?service_id={}&date=2025-06-10", svc.id)),
    )
    .await;
    for s in json.as_array().unwrap() {
        assert_eq!(s["available"], false);
        assert_eq!(s["reason"], "Unavailable due to Holiday");
    }

    let (_, json) = send(
        &state,
        get(&format!("/api/availability?service_id={}&date=2025-06-11", svc.id)),
    )
    .await;
    assert_eq!(slot(&json, "11:00 AM")["available"], true);
    assert_eq!(
        slot(&json, "1:00 PM")["reason"],
        "Conflicts with Lunch (1:00 PM - 2:00 PM)"
    );
    assert_eq!(slot(&json, "2:00 PM")["available"], true);

    let (_, listed) = send(&state, admin("GET", "/api/admin/time-off", None)).await;
    assert_eq!(listed.as_array().unwrap().len(), 2);

    // Deleting frees the day again
    let holiday_id = holiday["id"].as_str().unwrap();
    let (status, _) = send(
        &state,
        admin("DELETE", &format!("/api/admin/time-off/{holiday_id}"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(
        &state,
        get(&format!("/api/availability?service_id={}&date=2025-06-10", svc.id)),
    )
    .await;
    assert!(json.as_array().unwrap().iter().all(|s| s["available"] == true));

    let (status, _) = send(
        &state,
        admin("DELETE", &format!("/api/admin/time-off/{holiday_id}"), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_time_off_validation() {
    let state = test_state();

    let (status, json) = send(
        &state,
        admin(
            "POST",
            "/api/admin/time-off",
            Some(serde_json::json!({
                "title": "Trip",
                "start_date": "2025-06-12",
                "end_date": "2025-06-10",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "End date cannot be before start date");

    let (status, json) = send(
        &state,
        admin(
            "POST",
            "/api/admin/time-off",
            Some(serde_json::json!({
                "title": "Errand",
                "start_date": "2025-06-12",
                "end_date": "2025-06-12",
                "is_all_day": false,
                "start_time": "15:00",
                "end_time": "14:00",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "End time must be after start time");
}

#[tokio::test]
async fn test_admin_refresh_persists_statuses() {
    let state = state_with_payments(MockPayments {
        paid: HashSet::from(["cs_paid".to_string()]),
        failing: false,
    });
    seed_booking(&state, "2025-06-10", "9:00 AM", BookingStatus::Pending, Some("cs_paid"));
    seed_booking(&state, "2025-06-10", "1:00 PM", BookingStatus::Pending, Some("cs_open"));
    let past = seed_booking(&state, "2025-05-20", "9:00 AM", BookingStatus::Confirmed, None);

    let (status, json) = send(&state, admin("POST", "/api/admin/bookings/refresh", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["promoted"], 1);
    assert_eq!(json["completed"], 1);

    let stored = {
        let db = state.db.lock().unwrap();
        queries::get_booking_by_id(&db, &past.id).unwrap().unwrap()
    };
    assert_eq!(stored.status, BookingStatus::Completed);

    let (_, json) = send(
        &state,
        admin("GET", "/api/admin/bookings?status=pending", None),
    )
    .await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_admin_cancel_and_create_service() {
    let state = test_state();
    let booking = seed_booking(&state, "2025-06-10", "9:00 AM", BookingStatus::Confirmed, None);

    let (status, json) = send(
        &state,
        admin("POST", &format!("/api/admin/bookings/{}/cancel", booking.id), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "cancelled");

    let (status, json) = send(
        &state,
        admin(
            "POST",
            "/api/admin/services",
            Some(serde_json::json!({"name": "Shave", "duration_minutes": 30})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["price_cents"], 0);

    for duration in [0, 1441, i32::MAX] {
        let (status, _) = send(
            &state,
            admin(
                "POST",
                "/api/admin/services",
                Some(serde_json::json!({"name": "Shave", "duration_minutes": duration})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "duration {duration}");
    }

    let (_, listed) = send(&state, get("/api/services")).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}
