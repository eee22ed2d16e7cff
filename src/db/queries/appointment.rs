//! Imported appointment queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{ContactFilter, ImportedAppointment, NewImportedAppointment};

/// Shared WHERE clause for past appointment reads.
/// $1 location, $2 filter enabled, $3 email, $4 phone digit strings.
const PAST_FILTER: &str = r#"
    WHERE location_id = $1
      AND is_past
      AND (
        NOT $2
        OR LOWER(email) = LOWER($3)
        OR EXISTS (
            SELECT 1 FROM UNNEST($4::text[]) AS digits(d)
            WHERE d <> '' AND regexp_replace(phone, '\D', '', 'g') LIKE '%' || d || '%'
        )
      )
"#;

/// Insert one imported appointment, returns its id
pub async fn insert_appointment(pool: &PgPool, appointment: &NewImportedAppointment) -> Result<Uuid> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO imported_appointments (
            id, location_id, name, email, phone, service_name, staff_name, staff_id,
            start_time, end_time, is_past, booking_id, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#
    )
    .bind(id)
    .bind(&appointment.location_id)
    .bind(&appointment.name)
    .bind(&appointment.email)
    .bind(&appointment.phone)
    .bind(&appointment.service_name)
    .bind(&appointment.staff_name)
    .bind(&appointment.staff_id)
    .bind(appointment.start_time)
    .bind(appointment.end_time)
    .bind(appointment.is_past)
    .bind(&appointment.booking_id)
    .bind(&appointment.notes)
    .execute(pool)
    .await?;

    Ok(id)
}

fn filter_params(filter: Option<&ContactFilter>) -> (bool, Option<String>, Vec<String>) {
    match filter {
        Some(f) => (true, f.email.clone(), f.phone_digits.clone()),
        None => (false, None, Vec::new()),
    }
}

/// Count past appointments for a location
pub async fn count_past(pool: &PgPool, location_id: &str, filter: Option<&ContactFilter>) -> Result<i64> {
    let (enabled, email, phones) = filter_params(filter);
    let sql = format!("SELECT COUNT(*) FROM imported_appointments {}", PAST_FILTER);

    let count: (i64,) = sqlx::query_as(&sql)
        .bind(location_id)
        .bind(enabled)
        .bind(email)
        .bind(phones)
        .fetch_one(pool)
        .await?;

    Ok(count.0)
}

/// One page of past appointments, newest first
pub async fn list_past(
    pool: &PgPool,
    location_id: &str,
    filter: Option<&ContactFilter>,
    limit: i64,
    offset: i64,
) -> Result<Vec<ImportedAppointment>> {
    let (enabled, email, phones) = filter_params(filter);
    let sql = format!(
        r#"
        SELECT id, location_id, name, email, phone, service_name, staff_name, staff_id,
               start_time, end_time, is_past, booking_id, notes, created_at
        FROM imported_appointments
        {}
        ORDER BY start_time DESC, created_at DESC
        LIMIT $5 OFFSET $6
        "#,
        PAST_FILTER
    );

    let appointments = sqlx::query_as::<_, ImportedAppointment>(&sql)
        .bind(location_id)
        .bind(enabled)
        .bind(email)
        .bind(phones)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok(appointments)
}
