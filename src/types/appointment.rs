//! Imported appointment types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One processed CSV row, persisted once and never updated
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ImportedAppointment {
    pub id: Uuid,
    pub location_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service_name: String,
    pub staff_name: String,
    pub staff_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_past: bool,
    pub booking_id: Option<String>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for [`ImportedAppointment`]
#[derive(Debug, Clone, PartialEq)]
pub struct NewImportedAppointment {
    pub location_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service_name: String,
    pub staff_name: String,
    pub staff_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_past: bool,
    pub booking_id: Option<String>,
    pub notes: String,
}

/// Request for a page of past appointments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PastAppointmentsRequest {
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
    /// GHL contact whose appointments should be listed
    #[serde(default)]
    pub contact_id: Option<String>,
}

/// Past appointment projection returned to the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PastAppointmentItem {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service_name: String,
    pub staff_name: String,
    pub staff_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl From<ImportedAppointment> for PastAppointmentItem {
    fn from(a: ImportedAppointment) -> Self {
        Self {
            id: a.id,
            name: a.name,
            email: a.email,
            phone: a.phone,
            service_name: a.service_name,
            staff_name: a.staff_name,
            staff_id: a.staff_id.unwrap_or_default(),
            start_time: a.start_time,
            end_time: a.end_time,
            notes: a.notes.trim().to_string(),
            created_at: a.created_at,
        }
    }
}

/// Paginated past appointments
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PastAppointmentsPage {
    pub past_appointments: Vec<PastAppointmentItem>,
    pub count: usize,
    pub page: i64,
    pub page_size: i64,
    pub total_count: i64,
    pub total_pages: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PastAppointmentsPage {
    /// Empty first page carrying an explanation for the UI
    pub fn empty(page_size: i64, message: impl Into<String>) -> Self {
        Self {
            past_appointments: vec![],
            count: 0,
            page: 1,
            page_size,
            total_count: 0,
            total_pages: 1,
            message: Some(message.into()),
        }
    }
}

/// Restricts past appointments to one remote contact
///
/// A row matches on email (case-insensitive) or when its phone, reduced to
/// digits, contains one of `phone_digits`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFilter {
    pub email: Option<String>,
    pub phone_digits: Vec<String>,
}

impl ContactFilter {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.phone_digits.is_empty()
    }
}
