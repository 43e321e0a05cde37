use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};

use super::{DATE_FORMAT, TIMESTAMP_FORMAT};
use crate::models::{
    Booking, BookingStatus, PaymentStatus, Service, TimeOffKind, TimeOffPeriod,
};

const BOOKING_COLUMNS: &str = "id, customer_id, service_id, service_name, date, time, \
     duration_minutes, status, payment_status, external_payment_ref, created_at, updated_at";

const TIME_OFF_COLUMNS: &str = "id, title, description, kind, start_date, end_date, is_all_day, \
     start_time, end_time, created_at";

fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .with_context(|| format!("invalid stored timestamp: {s}"))
}

fn parse_stored_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("invalid stored date: {s}"))
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<anyhow::Result<T>>>,
) -> anyhow::Result<Vec<T>> {
    let mut out = vec![];
    for row in rows {
        out.push(row??);
    }
    Ok(out)
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            booking.id,
            booking.customer_id,
            booking.service_id,
            booking.service_name,
            booking.date.format(DATE_FORMAT).to_string(),
            booking.time,
            booking.duration_minutes,
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.external_payment_ref,
            booking.created_at.format(TIMESTAMP_FORMAT).to_string(),
            booking.updated_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Pending and confirmed bookings on `date`, the only rows that occupy calendar time.
pub fn list_active_bookings_by_date(
    conn: &Connection,
    date: NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE date = ?1 AND status IN ('pending', 'confirmed')
         ORDER BY created_at ASC"
    ))?;

    let rows = stmt.query_map(params![date.format(DATE_FORMAT).to_string()], |row| {
        Ok(parse_booking_row(row))
    })?;
    collect_rows(rows)
}

pub fn get_bookings_for_customer(
    conn: &Connection,
    customer_id: &str,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE customer_id = ?1 ORDER BY date ASC, created_at ASC"
    ))?;

    let rows = stmt.query_map(params![customer_id], |row| Ok(parse_booking_row(row)))?;
    collect_rows(rows)
}

pub fn get_all_bookings(
    conn: &Connection,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = ?1 \
                 ORDER BY date DESC, created_at DESC LIMIT ?2"
            ),
            vec![
                Box::new(status.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings \
                 ORDER BY date DESC, created_at DESC LIMIT ?1"
            ),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;
    collect_rows(rows)
}

/// Pending bookings that have an external payment handle to check.
pub fn list_pending_with_payment_ref(conn: &Connection) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE status = 'pending' AND external_payment_ref IS NOT NULL
         ORDER BY date ASC"
    ))?;

    let rows = stmt.query_map([], |row| Ok(parse_booking_row(row)))?;
    collect_rows(rows)
}

pub fn update_booking_date_time(
    conn: &Connection,
    id: &str,
    date: NaiveDate,
    time: &str,
    now: NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET date = ?1, time = ?2, updated_at = ?3 WHERE id = ?4",
        params![date.format(DATE_FORMAT).to_string(), time, format_timestamp(now), id],
    )?;
    Ok(count > 0)
}

/// Cancels the booking only while it is still active.
pub fn cancel_active_booking(
    conn: &Connection,
    id: &str,
    now: NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = 'cancelled', updated_at = ?1
         WHERE id = ?2 AND status IN ('pending', 'confirmed')",
        params![format_timestamp(now), id],
    )?;
    Ok(count > 0)
}

/// Records a captured payment. Only a pending row changes, so repeating the
/// call is a no-op and returns `false`.
pub fn promote_paid_booking(
    conn: &Connection,
    id: &str,
    now: NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = 'confirmed', payment_status = 'paid', updated_at = ?1
         WHERE id = ?2 AND status = 'pending'",
        params![format_timestamp(now), id],
    )?;
    Ok(count > 0)
}

/// Marks confirmed bookings dated before `now`'s date as completed.
pub fn complete_past_bookings(conn: &Connection, now: NaiveDateTime) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE bookings SET status = 'completed', updated_at = ?1
         WHERE status = 'confirmed' AND date < ?2",
        params![format_timestamp(now), now.date().format(DATE_FORMAT).to_string()],
    )?;
    Ok(count)
}

pub struct DashboardStats {
    pub upcoming_bookings: i64,
    pub pending_bookings: i64,
    pub upcoming_time_off: i64,
}

pub fn get_dashboard_stats(conn: &Connection, today: NaiveDate) -> anyhow::Result<DashboardStats> {
    let today = today.format(DATE_FORMAT).to_string();

    let upcoming_bookings: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE date >= ?1 AND status = 'confirmed'",
        params![today],
        |row| row.get(0),
    )?;

    let pending_bookings: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE date >= ?1 AND status = 'pending'",
        params![today],
        |row| row.get(0),
    )?;

    let upcoming_time_off: i64 = conn.query_row(
        "SELECT COUNT(*) FROM time_off WHERE end_date >= ?1",
        params![today],
        |row| row.get(0),
    )?;

    Ok(DashboardStats {
        upcoming_bookings,
        pending_bookings,
        upcoming_time_off,
    })
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let date_str: String = row.get(4)?;
    let status_str: String = row.get(7)?;
    let payment_str: String = row.get(8)?;
    let created_at_str: String = row.get(10)?;
    let updated_at_str: String = row.get(11)?;

    Ok(Booking {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        service_id: row.get(2)?,
        service_name: row.get(3)?,
        date: parse_stored_date(&date_str)?,
        time: row.get(5)?,
        duration_minutes: row.get(6)?,
        status: BookingStatus::parse(&status_str),
        payment_status: PaymentStatus::parse(&payment_str),
        external_payment_ref: row.get(9)?,
        created_at: parse_timestamp(&created_at_str)?,
        updated_at: parse_timestamp(&updated_at_str)?,
    })
}

/// True when `err` came from the active-slot unique index or another constraint.
pub fn is_constraint_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ── Services ──

pub fn insert_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, name, duration_minutes, price_cents, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            service.id,
            service.name,
            service.duration_minutes,
            service.price_cents,
            service.description,
            service.created_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let result = conn.query_row(
        "SELECT id, name, duration_minutes, price_cents, description, created_at
         FROM services WHERE id = ?1",
        params![id],
        |row| Ok(parse_service_row(row)),
    );

    match result {
        Ok(service) => Ok(Some(service?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_services(conn: &Connection) -> anyhow::Result<Vec<Service>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, duration_minutes, price_cents, description, created_at
         FROM services ORDER BY name ASC",
    )?;
    let rows = stmt.query_map([], |row| Ok(parse_service_row(row)))?;
    collect_rows(rows)
}

fn parse_service_row(row: &rusqlite::Row) -> anyhow::Result<Service> {
    let created_at_str: String = row.get(5)?;
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        duration_minutes: row.get(2)?,
        price_cents: row.get(3)?,
        description: row.get(4)?,
        created_at: parse_timestamp(&created_at_str)?,
    })
}

// ── Time Off ──

pub fn insert_time_off(conn: &Connection, period: &TimeOffPeriod) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO time_off ({TIME_OFF_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        params![
            period.id,
            period.title,
            period.description,
            period.kind.as_str(),
            period.start_date.format(DATE_FORMAT).to_string(),
            period.end_date.format(DATE_FORMAT).to_string(),
            period.is_all_day as i32,
            period.start_time,
            period.end_time,
            period.created_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

/// Periods that intersect `[from, to]`.
pub fn list_time_off_in_range(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
) -> anyhow::Result<Vec<TimeOffPeriod>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TIME_OFF_COLUMNS} FROM time_off
         WHERE start_date <= ?2 AND end_date >= ?1
         ORDER BY start_date ASC, created_at ASC"
    ))?;

    let rows = stmt.query_map(
        params![
            from.format(DATE_FORMAT).to_string(),
            to.format(DATE_FORMAT).to_string()
        ],
        |row| Ok(parse_time_off_row(row)),
    )?;
    collect_rows(rows)
}

pub fn list_time_off_covering(
    conn: &Connection,
    date: NaiveDate,
) -> anyhow::Result<Vec<TimeOffPeriod>> {
    list_time_off_in_range(conn, date, date)
}

pub fn delete_time_off(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM time_off WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

fn parse_time_off_row(row: &rusqlite::Row) -> anyhow::Result<TimeOffPeriod> {
    let kind_str: String = row.get(3)?;
    let start_date_str: String = row.get(4)?;
    let end_date_str: String = row.get(5)?;
    let created_at_str: String = row.get(9)?;

    Ok(TimeOffPeriod {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        kind: TimeOffKind::parse(&kind_str),
        start_date: parse_stored_date(&start_date_str)?,
        end_date: parse_stored_date(&end_date_str)?,
        is_all_day: row.get::<_, i32>(6)? != 0,
        start_time: row.get(7)?,
        end_time: row.get(8)?,
        created_at: parse_timestamp(&created_at_str)?,
    })
}
