//! Location credentials and the two service resolution catalogs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// OAuth credentials of a connected GHL location.
///
/// Written by the OAuth flow; the import pipeline only reads them.
#[derive(Debug, Clone, FromRow)]
pub struct Credentials {
    pub location_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

/// Admin-managed mapping of a human-readable service name to GHL ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCalendarMapping {
    pub id: Uuid,
    pub location_id: String,
    pub service_name: String,
    pub service_id: Option<String>,
    pub staff_id: Option<String>,
    pub calendar_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Service entry synced from the remote GHL catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CatalogService {
    pub location_id: String,
    pub service_id: String,
    pub name: String,
    pub updated_at: DateTime<Utc>,
}

/// Request to upsert a service mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertMappingRequest {
    pub location_id: String,
    pub service_name: String,
    pub service_id: Option<String>,
    pub staff_id: Option<String>,
    pub calendar_id: Option<String>,
}

/// Request to sync the service catalog of a location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncServicesRequest {
    #[serde(default)]
    pub location_id: Option<String>,
}

/// Result of a catalog sync
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncServicesResponse {
    pub location_id: String,
    pub synced: usize,
    pub message: String,
}

/// Request for the calendar ids of a location, used when filling in mappings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingIdsRequest {
    #[serde(default)]
    pub location_id: Option<String>,
    /// Calendar to load in detail; the first calendar when omitted
    #[serde(default)]
    pub calendar_id: Option<String>,
}

/// Raw calendars of a location plus one calendar in detail
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingIdsResponse {
    pub location_id: String,
    pub calendars: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_detail: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_detail_error: Option<String>,
}
