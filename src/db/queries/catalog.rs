//! Service-calendar mapping and service catalog queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::services::ghl::RemoteService;
use crate::types::{CatalogService, ServiceCalendarMapping, UpsertMappingRequest};

// ============================================================================
// Service-calendar mappings
// ============================================================================

/// List mappings for a location
pub async fn list_mappings(pool: &PgPool, location_id: &str) -> Result<Vec<ServiceCalendarMapping>> {
    let mappings = sqlx::query_as::<_, ServiceCalendarMapping>(
        r#"
        SELECT id, location_id, service_name, service_id, staff_id, calendar_id, created_at
        FROM service_calendar_mappings
        WHERE location_id = $1
        ORDER BY service_name
        "#
    )
    .bind(location_id)
    .fetch_all(pool)
    .await?;

    Ok(mappings)
}

/// Create or replace the mapping for (location, service name)
pub async fn upsert_mapping(pool: &PgPool, req: &UpsertMappingRequest) -> Result<ServiceCalendarMapping> {
    let mapping = sqlx::query_as::<_, ServiceCalendarMapping>(
        r#"
        INSERT INTO service_calendar_mappings
            (id, location_id, service_name, service_id, staff_id, calendar_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (location_id, (LOWER(service_name))) DO UPDATE SET
            service_name = EXCLUDED.service_name,
            service_id = EXCLUDED.service_id,
            staff_id = EXCLUDED.staff_id,
            calendar_id = EXCLUDED.calendar_id
        RETURNING id, location_id, service_name, service_id, staff_id, calendar_id, created_at
        "#
    )
    .bind(Uuid::new_v4())
    .bind(&req.location_id)
    .bind(req.service_name.trim())
    .bind(&req.service_id)
    .bind(&req.staff_id)
    .bind(&req.calendar_id)
    .fetch_one(pool)
    .await?;

    Ok(mapping)
}

// ============================================================================
// Synced service catalog
// ============================================================================

/// List catalog services for a location
pub async fn list_services(pool: &PgPool, location_id: &str) -> Result<Vec<CatalogService>> {
    let services = sqlx::query_as::<_, CatalogService>(
        r#"
        SELECT location_id, service_id, name, updated_at
        FROM ghl_services
        WHERE location_id = $1
        ORDER BY name, service_id
        "#
    )
    .bind(location_id)
    .fetch_all(pool)
    .await?;

    Ok(services)
}

/// Insert or rename catalog services, returns the number written
pub async fn upsert_services(pool: &PgPool, location_id: &str, services: &[RemoteService]) -> Result<usize> {
    let mut tx = pool.begin().await?;

    for service in services {
        sqlx::query(
            r#"
            INSERT INTO ghl_services (location_id, service_id, name, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (location_id, service_id) DO UPDATE SET
                name = EXCLUDED.name,
                updated_at = NOW()
            "#
        )
        .bind(location_id)
        .bind(&service.id)
        .bind(&service.name)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(services.len())
}
