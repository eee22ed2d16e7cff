//! GHL credential queries (read-only)

use anyhow::Result;
use sqlx::PgPool;

use crate::types::Credentials;

/// Get credentials for a location
pub async fn get_credentials(pool: &PgPool, location_id: &str) -> Result<Option<Credentials>> {
    let credentials = sqlx::query_as::<_, Credentials>(
        r#"
        SELECT location_id, access_token, refresh_token, expires_in, updated_at
        FROM ghl_credentials
        WHERE location_id = $1
        "#
    )
    .bind(location_id)
    .fetch_optional(pool)
    .await?;

    Ok(credentials)
}

/// First connected location, used when a request names none
pub async fn get_first_location(pool: &PgPool) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT location_id FROM ghl_credentials ORDER BY created_at, location_id LIMIT 1"
    )
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(location_id,)| location_id))
}
