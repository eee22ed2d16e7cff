//! GoHighLevel (GHL) calendaring/CRM API
//!
//! The import pipeline talks to GHL only through [`CalendarApi`], so tests can
//! swap in an in-memory fake.

mod client;

pub use client::{GhlClient, GhlConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// Bodies longer than this are cut in error messages
pub(crate) const MAX_ERROR_BODY_CHARS: usize = 300;

/// GHL API failure
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-2xx response
    #[error("GHL {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, timeout or decoding failure
    #[error("GHL request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("GHL response missing {0}")]
    MissingField(&'static str),
}

impl ApiError {
    pub fn status(status: u16, body: &str) -> Self {
        let body = if body.trim().is_empty() {
            "(empty)".to_string()
        } else {
            body.chars().take(MAX_ERROR_BODY_CHARS).collect()
        };
        ApiError::Status { status, body }
    }
}

/// Contact to create in a location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub location_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl NewContact {
    /// First/last name, split on the first whitespace
    pub fn split_name(&self) -> (&str, &str) {
        let name = self.name.trim();
        match name.split_once(char::is_whitespace) {
            Some((first, last)) => (first, last.trim_start()),
            None => (name, ""),
        }
    }
}

/// Service booking to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub location_id: String,
    pub contact_id: String,
    pub service_id: String,
    pub staff_id: String,
    pub calendar_id: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timezone: String,
    pub override_availability: bool,
}

/// The parts of a remote contact used for matching imported rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDetails {
    pub email: Option<String>,
    /// Main phone first, then any additional numbers
    pub phones: Vec<String>,
}

/// Service from the remote catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteService {
    pub id: String,
    pub name: String,
}

/// Calendar/contact operations needed by the importer
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Find a contact id by email, `None` when there is no such contact
    async fn search_contact_by_email(
        &self,
        access_token: &str,
        location_id: &str,
        email: &str,
    ) -> Result<Option<String>, ApiError>;

    /// Create a contact, returning its id
    async fn create_contact(&self, access_token: &str, contact: &NewContact) -> Result<String, ApiError>;

    /// Create a service booking, returning the booking id
    async fn create_booking(&self, access_token: &str, booking: &BookingRequest) -> Result<String, ApiError>;

    /// Load a contact by id, `None` when it does not exist
    async fn get_contact(
        &self,
        access_token: &str,
        location_id: &str,
        contact_id: &str,
    ) -> Result<Option<ContactDetails>, ApiError>;

    /// Fetch the location's service catalog
    async fn fetch_services(&self, access_token: &str, location_id: &str) -> Result<Vec<RemoteService>, ApiError>;

    /// Raw calendar objects of a location, used to look up ids for mappings
    async fn list_calendars(&self, access_token: &str, location_id: &str) -> Result<Vec<Value>, ApiError>;

    /// Raw calendar object, `None` when it does not exist
    async fn get_calendar(
        &self,
        access_token: &str,
        location_id: &str,
        calendar_id: &str,
    ) -> Result<Option<Value>, ApiError>;
}
