//! reqwest implementation of [`CalendarApi`]
//!
//! Endpoints (relative to the API base):
//! - `POST /contacts/search`
//! - `POST /contacts/`
//! - `GET  /contacts/{id}`
//! - `POST /calendars/services/bookings`
//! - `GET  /calendars/services/catalog`
//! - `GET  /calendars/`
//! - `GET  /calendars/{id}`

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{ApiError, BookingRequest, CalendarApi, ContactDetails, NewContact, RemoteService};
use crate::defaults::{DEFAULT_GHL_API_BASE, GHL_API_VERSION, GHL_BOOKING_API_VERSION, GHL_HTTP_TIMEOUT_SECS};

/// GHL client configuration
#[derive(Debug, Clone)]
pub struct GhlConfig {
    /// API base URL, without trailing slash
    pub base_url: String,
    /// `Version` header for contact and catalog calls
    pub api_version: String,
    /// `Version` header for service bookings
    pub booking_api_version: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for GhlConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GHL_API_BASE.to_string(),
            api_version: GHL_API_VERSION.to_string(),
            booking_api_version: GHL_BOOKING_API_VERSION.to_string(),
            timeout_seconds: GHL_HTTP_TIMEOUT_SECS,
        }
    }
}

impl GhlConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }
}

/// GHL HTTP client
pub struct GhlClient {
    client: Client,
    config: GhlConfig,
}

impl GhlClient {
    pub fn new(config: GhlConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        access_token: &str,
        location_id: &str,
        version: &str,
    ) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.config.base_url, path))
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .header("Version", version)
            .header("Location-Id", location_id)
    }

    /// Send and decode a JSON body, turning non-2xx into [`ApiError::Status`]
    async fn send(&self, what: &str, builder: RequestBuilder) -> Result<Value, ApiError> {
        let response = builder.send().await.map_err(|e| {
            warn!("GHL {} failed: {}", what, e);
            ApiError::Transport(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::status(status.as_u16(), &body);
            warn!("GHL {} {}", what, err);
            return Err(err);
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|_| ApiError::MissingField("JSON body"))
    }

    fn booking_payload(booking: &BookingRequest) -> Value {
        let mut payload = json!({
            "locationId": booking.location_id,
            "contactId": booking.contact_id,
            "startTime": booking.start.to_rfc3339(),
            "endTime": booking.end.to_rfc3339(),
            "timezone": booking.timezone,
            "services": [{
                "id": booking.service_id,
                "staffId": booking.staff_id,
                "position": 0,
            }],
            "title": "Service Appointment",
            "status": "confirmed",
        });
        if let Some(calendar_id) = &booking.calendar_id {
            payload["serviceLocationId"] = json!(calendar_id);
        }
        payload
    }
}

/// `contacts` or `contact`, as an array or a single object
fn contact_list(data: &Value) -> Vec<&Value> {
    let found = data.get("contacts").or_else(|| data.get("contact"));
    match found {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(obj @ Value::Object(_)) => vec![obj],
        _ => vec![],
    }
}

fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn contact_details(contact: &Value) -> ContactDetails {
    let mut phones: Vec<String> = str_field(contact, &["phone"])
        .map(|p| vec![p.to_string()])
        .unwrap_or_default();

    if let Some(extra) = contact.get("phones").and_then(Value::as_array) {
        phones.extend(
            extra
                .iter()
                .filter_map(|p| str_field(p, &["phone", "number"]))
                .map(str::to_string),
        );
    }

    ContactDetails {
        email: str_field(contact, &["email"]).map(str::to_string),
        phones,
    }
}

#[async_trait]
impl CalendarApi for GhlClient {
    async fn search_contact_by_email(
        &self,
        access_token: &str,
        location_id: &str,
        email: &str,
    ) -> Result<Option<String>, ApiError> {
        let builder = self
            .request(Method::POST, "/contacts/search", access_token, location_id, &self.config.api_version)
            .json(&json!({
                "locationId": location_id,
                "query": email,
                "pageLimit": 100,
            }));

        let data = self.send("contact search", builder).await?;
        let contacts = contact_list(&data);

        // The search is fuzzy; prefer an exact email match
        let exact = contacts.iter().find(|c| {
            str_field(c, &["email"]).is_some_and(|e| e.eq_ignore_ascii_case(email.trim()))
        });
        let id = exact
            .or_else(|| contacts.first())
            .and_then(|c| str_field(c, &["id", "contactId"]))
            .map(str::to_string);

        debug!("GHL contact search for {}: {:?}", email, id);
        Ok(id)
    }

    async fn create_contact(&self, access_token: &str, contact: &NewContact) -> Result<String, ApiError> {
        let (first_name, last_name) = contact.split_name();
        let builder = self
            .request(Method::POST, "/contacts/", access_token, &contact.location_id, &self.config.api_version)
            .json(&json!({
                "firstName": first_name,
                "lastName": last_name,
                "name": contact.name,
                "email": contact.email,
                "locationId": contact.location_id,
                "phone": contact.phone,
            }));

        let data = self.send("create contact", builder).await?;
        data.get("contact")
            .and_then(|c| str_field(c, &["id"]))
            .or_else(|| str_field(&data, &["id"]))
            .map(str::to_string)
            .ok_or(ApiError::MissingField("contact id"))
    }

    async fn create_booking(&self, access_token: &str, booking: &BookingRequest) -> Result<String, ApiError> {
        let builder = self
            .request(
                Method::POST,
                "/calendars/services/bookings",
                access_token,
                &booking.location_id,
                &self.config.booking_api_version,
            )
            .query(&[("overrideAvailability", booking.override_availability.to_string())])
            .json(&Self::booking_payload(booking));

        let data = self.send("create booking", builder).await?;
        str_field(&data, &["bookingId"])
            .or_else(|| data.get("booking").and_then(|b| str_field(b, &["id"])))
            .or_else(|| str_field(&data, &["id"]))
            .map(str::to_string)
            .ok_or(ApiError::MissingField("booking id"))
    }

    async fn get_contact(
        &self,
        access_token: &str,
        location_id: &str,
        contact_id: &str,
    ) -> Result<Option<ContactDetails>, ApiError> {
        let path = format!("/contacts/{}", urlencoding::encode(contact_id));
        let builder = self.request(Method::GET, &path, access_token, location_id, &self.config.api_version);

        let data = match self.send("get contact", builder).await {
            Ok(data) => data,
            Err(ApiError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };

        let contact = data.get("contact").unwrap_or(&data);
        if !contact.is_object() {
            return Ok(None);
        }
        Ok(Some(contact_details(contact)))
    }

    async fn fetch_services(&self, access_token: &str, location_id: &str) -> Result<Vec<RemoteService>, ApiError> {
        let builder = self
            .request(
                Method::GET,
                "/calendars/services/catalog",
                access_token,
                location_id,
                &self.config.api_version,
            )
            .query(&[("locationId", location_id)]);

        let data = self.send("services catalog", builder).await?;
        let items = ["services", "items", "data"]
            .iter()
            .find_map(|k| data.get(*k).and_then(Value::as_array))
            .or_else(|| data.as_array());

        let services = items
            .map(|items| {
                items
                    .iter()
                    .filter_map(|s| {
                        Some(RemoteService {
                            id: str_field(s, &["id", "_id"])?.to_string(),
                            name: str_field(s, &["name"])?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(services)
    }

    async fn list_calendars(&self, access_token: &str, location_id: &str) -> Result<Vec<Value>, ApiError> {
        let builder = self
            .request(Method::GET, "/calendars/", access_token, location_id, &self.config.api_version)
            .query(&[("locationId", location_id)]);

        let data = self.send("list calendars", builder).await?;
        let calendars = match data.get("calendars").or_else(|| data.get("calendar")) {
            Some(Value::Array(items)) => items.clone(),
            Some(obj @ Value::Object(_)) => vec![obj.clone()],
            _ => vec![],
        };

        debug!("GHL location {} has {} calendars", location_id, calendars.len());
        Ok(calendars)
    }

    async fn get_calendar(
        &self,
        access_token: &str,
        location_id: &str,
        calendar_id: &str,
    ) -> Result<Option<Value>, ApiError> {
        let path = format!("/calendars/{}", urlencoding::encode(calendar_id));
        let builder = self
            .request(Method::GET, &path, access_token, location_id, &self.config.api_version)
            .query(&[("locationId", location_id)]);

        let mut data = match self.send("get calendar", builder).await {
            Ok(data) => data,
            Err(ApiError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };

        let calendar = data.get_mut("calendar").map(Value::take).unwrap_or(data);
        Ok(Some(calendar).filter(Value::is_object))
    }
}
