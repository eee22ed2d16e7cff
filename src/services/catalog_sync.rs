//! Service catalog sync and service-calendar mapping upkeep
//!
//! Imports can only resolve a service id from a service name once the
//! location's remote catalog has been copied into the local store.

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use super::ghl::{ApiError, CalendarApi};
use crate::db::ImportStore;
use crate::types::{MappingIdsResponse, ServiceCalendarMapping, SyncServicesResponse, UpsertMappingRequest};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("No GHL location connected. Connect GoHighLevel first, or pass a location id.")]
    NoLocation,

    #[error("No OAuth credentials found for location '{0}'.")]
    NoCredentials(String),

    #[error("service_name is required")]
    MissingServiceName,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Database error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl CatalogError {
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::NoLocation => "NO_LOCATION",
            CatalogError::NoCredentials(_) => "NO_CREDENTIALS",
            CatalogError::MissingServiceName => "INVALID_REQUEST",
            CatalogError::Api(_) => "API_ERROR",
            CatalogError::Store(_) => "DATABASE_ERROR",
        }
    }
}

/// Fetch the remote service catalog and upsert it into the store
pub async fn sync_services(
    api: &dyn CalendarApi,
    store: &dyn ImportStore,
    location_id: Option<&str>,
) -> Result<SyncServicesResponse, CatalogError> {
    let location_id = store
        .resolve_location(location_id)
        .await?
        .ok_or(CatalogError::NoLocation)?;

    let credentials = store
        .credentials(&location_id)
        .await?
        .ok_or_else(|| CatalogError::NoCredentials(location_id.clone()))?;

    let services = api.fetch_services(&credentials.access_token, &location_id).await?;
    let synced = store.upsert_catalog_services(&location_id, &services).await?;

    info!("Synced {} services for location {}", synced, location_id);

    Ok(SyncServicesResponse {
        message: format!("Synced {} services for location {}.", synced, location_id),
        location_id,
        synced,
    })
}

/// List the calendars of a location, with one calendar in detail.
///
/// An explicit `calendar_id` that fails to load is reported in
/// `calendar_detail_error`; the default first-calendar lookup fails silently.
pub async fn mapping_ids(
    api: &dyn CalendarApi,
    store: &dyn ImportStore,
    location_id: Option<&str>,
    calendar_id: Option<&str>,
) -> Result<MappingIdsResponse, CatalogError> {
    let location_id = store
        .resolve_location(location_id)
        .await?
        .ok_or(CatalogError::NoLocation)?;

    let credentials = store
        .credentials(&location_id)
        .await?
        .ok_or_else(|| CatalogError::NoCredentials(location_id.clone()))?;
    let token = credentials.access_token.as_str();

    let calendars = api.list_calendars(token, &location_id).await?;
    let mut response = MappingIdsResponse {
        location_id: location_id.clone(),
        ..Default::default()
    };

    match calendar_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(calendar_id) => match api.get_calendar(token, &location_id, calendar_id).await {
            Ok(detail) => response.calendar_detail = detail,
            Err(e) => {
                warn!("Calendar {} lookup failed: {}", calendar_id, e);
                response.calendar_detail_error = Some(e.to_string());
            }
        },
        None => {
            let first_id = calendars.first().and_then(|c| {
                ["id", "calendarId"]
                    .iter()
                    .find_map(|k| c.get(*k).and_then(Value::as_str))
                    .filter(|id| !id.is_empty())
            });
            if let Some(first_id) = first_id {
                response.calendar_detail = api.get_calendar(token, &location_id, first_id).await.ok().flatten();
            }
        }
    }

    response.calendars = calendars;
    Ok(response)
}

/// Create or replace a service-calendar mapping
pub async fn save_mapping(
    store: &dyn ImportStore,
    mut request: UpsertMappingRequest,
) -> Result<ServiceCalendarMapping, CatalogError> {
    request.service_name = request.service_name.trim().to_string();
    if request.service_name.is_empty() {
        return Err(CatalogError::MissingServiceName);
    }
    for id in [&mut request.service_id, &mut request.staff_id, &mut request.calendar_id] {
        *id = id.take().map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    }

    let mapping = store.upsert_mapping(&request).await?;
    info!(
        "Saved mapping for '{}' in {}: service={:?} staff={:?} calendar={:?}",
        mapping.service_name, mapping.location_id, mapping.service_id, mapping.staff_id, mapping.calendar_id
    );
    Ok(mapping)
}
