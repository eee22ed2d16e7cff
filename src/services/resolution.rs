//! Service/staff resolution for future appointments
//!
//! A booking needs a service id and a staff id (and optionally a calendar id).
//! Rows may carry them inline; otherwise they are looked up by service name in
//! two per-location catalogs, in a fixed order:
//!
//! - service id: synced service catalog, then the service-calendar mapping
//! - staff id: service-calendar mapping
//! - calendar id: service-calendar mapping
//!
//! Catalogs are loaded once per import run; resolution itself is pure.

use std::collections::HashMap;

use crate::types::{CatalogService, ServiceCalendarMapping};

/// Ids needed to create a booking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBooking {
    pub service_id: String,
    pub staff_id: String,
    pub calendar_id: Option<String>,
}

/// Result of resolving one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedBooking),
    Unresolved {
        missing_service: bool,
        missing_staff: bool,
    },
}

impl Resolution {
    /// Human-readable reason for an unresolved row
    pub fn describe_missing(&self, service_name: &str) -> Option<String> {
        match self {
            Resolution::Resolved(_) => None,
            Resolution::Unresolved {
                missing_service,
                missing_staff,
            } => {
                let what = match (missing_service, missing_staff) {
                    (true, true) => "service_id and staff_id",
                    (true, false) => "service_id",
                    _ => "staff_id",
                };
                Some(format!(
                    "Future appointment saved without booking: no {} for service '{}'. \
                     Add a service mapping or include service_id/staff_id columns.",
                    what, service_name
                ))
            }
        }
    }
}

/// Catalog entries matched by a row's service name
#[derive(Debug, Clone, Copy, Default)]
struct RowMatches<'a> {
    mapping: Option<&'a ServiceCalendarMapping>,
    catalog: Option<&'a CatalogService>,
}

type Lookup = fn(&RowMatches<'_>) -> Option<String>;

fn from_catalog(m: &RowMatches<'_>) -> Option<String> {
    m.catalog.map(|c| c.service_id.clone())
}

fn mapping_service(m: &RowMatches<'_>) -> Option<String> {
    m.mapping.and_then(|c| c.service_id.clone())
}

fn mapping_staff(m: &RowMatches<'_>) -> Option<String> {
    m.mapping.and_then(|c| c.staff_id.clone())
}

fn mapping_calendar(m: &RowMatches<'_>) -> Option<String> {
    m.mapping.and_then(|c| c.calendar_id.clone())
}

const SERVICE_ID_SOURCES: &[Lookup] = &[from_catalog, mapping_service];
const STAFF_ID_SOURCES: &[Lookup] = &[mapping_staff];
const CALENDAR_ID_SOURCES: &[Lookup] = &[mapping_calendar];

fn first_of(sources: &[Lookup], matches: &RowMatches<'_>) -> Option<String> {
    sources
        .iter()
        .filter_map(|lookup| non_empty(lookup(matches)))
        .next()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Both resolution catalogs for one location
#[derive(Debug, Clone, Default)]
pub struct ResolutionCatalogs {
    mappings: HashMap<String, ServiceCalendarMapping>,
    services: HashMap<String, CatalogService>,
}

impl ResolutionCatalogs {
    pub fn new(mappings: Vec<ServiceCalendarMapping>, services: Vec<CatalogService>) -> Self {
        let mappings = mappings
            .into_iter()
            .map(|m| (name_key(&m.service_name), m))
            .collect();

        // Several remote services can share a display name; keep the first.
        let mut by_name = HashMap::new();
        for service in services {
            by_name.entry(name_key(&service.name)).or_insert(service);
        }

        Self {
            mappings,
            services: by_name,
        }
    }

    pub fn mapping_count(&self) -> usize {
        self.mappings.len()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    fn matches(&self, service_name: &str) -> RowMatches<'_> {
        let key = name_key(service_name);
        if key.is_empty() {
            return RowMatches::default();
        }
        RowMatches {
            mapping: self.mappings.get(&key),
            catalog: self.services.get(&key),
        }
    }

    /// Resolve the booking ids for a row
    pub fn resolve(
        &self,
        service_name: &str,
        inline_service_id: Option<&str>,
        inline_staff_id: Option<&str>,
    ) -> Resolution {
        let inline_service = non_empty(inline_service_id.map(str::to_string));
        let inline_staff = non_empty(inline_staff_id.map(str::to_string));

        if let (Some(service_id), Some(staff_id)) = (&inline_service, &inline_staff) {
            return Resolution::Resolved(ResolvedBooking {
                service_id: service_id.clone(),
                staff_id: staff_id.clone(),
                calendar_id: None,
            });
        }

        let matches = self.matches(service_name);
        let service_id = inline_service.or_else(|| first_of(SERVICE_ID_SOURCES, &matches));
        let staff_id = inline_staff.or_else(|| first_of(STAFF_ID_SOURCES, &matches));

        match (service_id, staff_id) {
            (Some(service_id), Some(staff_id)) => Resolution::Resolved(ResolvedBooking {
                service_id,
                staff_id,
                calendar_id: first_of(CALENDAR_ID_SOURCES, &matches),
            }),
            (service_id, staff_id) => Resolution::Unresolved {
                missing_service: service_id.is_none(),
                missing_staff: staff_id.is_none(),
            },
        }
    }
}
