//! Paginated read of imported past appointments

use anyhow::Result;
use tracing::{debug, warn};

use super::ghl::{CalendarApi, ContactDetails};
use crate::db::ImportStore;
use crate::defaults::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::types::{ContactFilter, PastAppointmentItem, PastAppointmentsPage, PastAppointmentsRequest};

pub const MSG_NO_LOCATION: &str =
    "Open this app from your GoHighLevel location to see past appointments for that location.";
pub const MSG_UNKNOWN_LOCATION: &str =
    "Location not found in system. Connect GoHighLevel for this location first.";
pub const MSG_UNKNOWN_CONTACT: &str = "Contact not found or could not load from GoHighLevel.";

/// Page size within [1, MAX_PAGE_SIZE], default when absent
pub fn clamp_page_size(requested: Option<i64>) -> i64 {
    requested.map_or(DEFAULT_PAGE_SIZE, |size| size.clamp(1, MAX_PAGE_SIZE))
}

/// At least one page, even when empty
pub fn total_pages(total_count: i64, page_size: i64) -> i64 {
    if total_count <= 0 {
        1
    } else {
        (total_count + page_size - 1) / page_size
    }
}

/// 1-based page clamped to the available pages
pub fn clamp_page(requested: Option<i64>, total_pages: i64) -> i64 {
    requested.unwrap_or(1).max(1).min(total_pages)
}

fn digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Build the appointment filter for a remote contact
pub fn contact_filter(contact: &ContactDetails) -> ContactFilter {
    let email = contact
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());

    let mut phone_digits: Vec<String> = contact
        .phones
        .iter()
        .map(|p| digits(p))
        .filter(|p| !p.is_empty())
        .collect();
    phone_digits.dedup();

    ContactFilter { email, phone_digits }
}

/// List past appointments for a location, optionally for one contact
pub async fn list_past_appointments(
    api: &dyn CalendarApi,
    store: &dyn ImportStore,
    request: &PastAppointmentsRequest,
) -> Result<PastAppointmentsPage> {
    let page_size = clamp_page_size(request.page_size);

    let location_id = match request.location_id.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        Some(location_id) => location_id,
        None => return Ok(PastAppointmentsPage::empty(page_size, MSG_NO_LOCATION)),
    };

    let credentials = match store.credentials(location_id).await? {
        Some(credentials) => credentials,
        None => return Ok(PastAppointmentsPage::empty(page_size, MSG_UNKNOWN_LOCATION)),
    };

    let contact_id = request.contact_id.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let filter = match contact_id {
        None => None,
        Some(contact_id) => {
            match api.get_contact(&credentials.access_token, location_id, contact_id).await {
                Ok(Some(contact)) => Some(contact_filter(&contact)),
                Ok(None) => return Ok(PastAppointmentsPage::empty(page_size, MSG_UNKNOWN_CONTACT)),
                Err(e) => {
                    warn!("Failed to load contact {} for {}: {}", contact_id, location_id, e);
                    return Ok(PastAppointmentsPage::empty(page_size, MSG_UNKNOWN_CONTACT));
                }
            }
        }
    };

    // A contact with neither email nor phone matches nothing
    let (total_count, items) = match &filter {
        Some(f) if f.is_empty() => (0, Vec::new()),
        _ => {
            let total_count = store.count_past_appointments(location_id, filter.as_ref()).await?;
            let page = clamp_page(request.page, total_pages(total_count, page_size));
            let rows = store
                .list_past_appointments(location_id, filter.as_ref(), page_size, (page - 1) * page_size)
                .await?;
            (total_count, rows)
        }
    };

    let total_pages = total_pages(total_count, page_size);
    let page = clamp_page(request.page, total_pages);
    let past_appointments: Vec<PastAppointmentItem> = items.into_iter().map(Into::into).collect();

    debug!(
        "Past appointments for {}: page {}/{} ({} of {})",
        location_id,
        page,
        total_pages,
        past_appointments.len(),
        total_count
    );

    Ok(PastAppointmentsPage {
        count: past_appointments.len(),
        past_appointments,
        page,
        page_size,
        total_count,
        total_pages,
        message: None,
    })
}
