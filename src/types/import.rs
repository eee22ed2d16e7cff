//! Appointment import request/response types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn default_override_availability() -> bool {
    true
}

/// Request to import a CSV of appointments into a location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportAppointmentsRequest {
    /// Target location; the first connected location is used when absent
    #[serde(default)]
    pub location_id: Option<String>,
    /// Raw CSV file, base64-encoded
    pub csv_base64: String,
    /// Original upload name, checked for a `.csv` extension when present
    #[serde(default)]
    pub file_name: Option<String>,
    /// Validate and resolve only; no contacts, bookings or saved rows
    #[serde(default)]
    pub dry_run: bool,
    /// Book even when the slot is taken
    #[serde(default = "default_override_availability")]
    pub override_availability: bool,
    /// `utf-8` (default) or `latin-1`
    #[serde(default)]
    pub encoding: Option<String>,
    /// One of `DD/MM/YYYY`, `MM/DD/YYYY`, `YYYY-MM-DD`, `ISO`
    #[serde(default)]
    pub date_format: Option<String>,
    /// Our field name -> CSV header, e.g. `{"name": "Patient Name"}`
    #[serde(default)]
    pub column_mapping: Option<BTreeMap<String, String>>,
    /// Abort on the first row with unparseable start/end instead of skipping it
    #[serde(default)]
    pub strict: bool,
}

/// Outcome of one CSV row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowResult {
    pub row: usize,
    pub success: bool,
    pub booking_id: Option<String>,
    pub error: Option<String>,
}

/// Run-level import result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub location_id: String,
    pub dry_run: bool,
    /// Appointments persisted (always 0 for dry runs)
    pub imported: u32,
    pub past_count: u32,
    pub future_count: u32,
    pub created_bookings: u32,
    /// Future rows whose service/staff resolved (what a live run would try to book)
    pub would_book: u32,
    pub errors: Vec<String>,
    pub rows: Vec<RowResult>,
}

/// Request to read the header row of a CSV
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectHeadersRequest {
    pub csv_base64: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Header row of a CSV, used by the UI to build a column mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectHeadersResponse {
    pub headers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
