//! Persistence seam for the import pipeline
//!
//! Services depend on [`ImportStore`]; production uses [`PgImportStore`],
//! tests an in-memory store.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::queries;
use crate::services::ghl::RemoteService;
use crate::services::resolution::ResolutionCatalogs;
use crate::types::{
    ContactFilter, Credentials, ImportedAppointment, NewImportedAppointment, ServiceCalendarMapping,
    UpsertMappingRequest,
};

#[async_trait]
pub trait ImportStore: Send + Sync {
    async fn credentials(&self, location_id: &str) -> Result<Option<Credentials>>;

    /// First connected location, if any
    async fn default_location(&self) -> Result<Option<String>>;

    /// The requested location, or the first connected one when blank
    async fn resolve_location(&self, requested: Option<&str>) -> Result<Option<String>> {
        match requested.map(str::trim).filter(|l| !l.is_empty()) {
            Some(location_id) => Ok(Some(location_id.to_string())),
            None => self.default_location().await,
        }
    }

    /// Both resolution catalogs for a location
    async fn load_catalogs(&self, location_id: &str) -> Result<ResolutionCatalogs>;

    async fn insert_appointment(&self, appointment: &NewImportedAppointment) -> Result<Uuid>;

    async fn upsert_catalog_services(&self, location_id: &str, services: &[RemoteService]) -> Result<usize>;

    async fn upsert_mapping(&self, request: &UpsertMappingRequest) -> Result<ServiceCalendarMapping>;

    async fn count_past_appointments(&self, location_id: &str, filter: Option<&ContactFilter>) -> Result<i64>;

    async fn list_past_appointments(
        &self,
        location_id: &str,
        filter: Option<&ContactFilter>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ImportedAppointment>>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgImportStore {
    pool: PgPool,
}

impl PgImportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImportStore for PgImportStore {
    async fn credentials(&self, location_id: &str) -> Result<Option<Credentials>> {
        queries::credentials::get_credentials(&self.pool, location_id).await
    }

    async fn default_location(&self) -> Result<Option<String>> {
        queries::credentials::get_first_location(&self.pool).await
    }

    async fn load_catalogs(&self, location_id: &str) -> Result<ResolutionCatalogs> {
        let mappings = queries::catalog::list_mappings(&self.pool, location_id).await?;
        let services = queries::catalog::list_services(&self.pool, location_id).await?;
        let catalogs = ResolutionCatalogs::new(mappings, services);
        debug!(
            "Loaded {} mappings and {} catalog services for {}",
            catalogs.mapping_count(),
            catalogs.service_count(),
            location_id
        );
        Ok(catalogs)
    }

    async fn insert_appointment(&self, appointment: &NewImportedAppointment) -> Result<Uuid> {
        queries::appointment::insert_appointment(&self.pool, appointment).await
    }

    async fn upsert_catalog_services(&self, location_id: &str, services: &[RemoteService]) -> Result<usize> {
        queries::catalog::upsert_services(&self.pool, location_id, services).await
    }

    async fn upsert_mapping(&self, request: &UpsertMappingRequest) -> Result<ServiceCalendarMapping> {
        queries::catalog::upsert_mapping(&self.pool, request).await
    }

    async fn count_past_appointments(&self, location_id: &str, filter: Option<&ContactFilter>) -> Result<i64> {
        queries::appointment::count_past(&self.pool, location_id, filter).await
    }

    async fn list_past_appointments(
        &self,
        location_id: &str,
        filter: Option<&ContactFilter>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ImportedAppointment>> {
        queries::appointment::list_past(&self.pool, location_id, filter, limit, offset).await
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory [`ImportStore`] mirroring the SQL semantics

    use anyhow::bail;
    use chrono::Utc;
    use parking_lot::Mutex;

    use super::*;
    use crate::types::CatalogService;

    #[derive(Default)]
    pub struct MemoryStore {
        credentials: Vec<Credentials>,
        mappings: Mutex<Vec<ServiceCalendarMapping>>,
        services: Mutex<Vec<CatalogService>>,
        appointments: Mutex<Vec<ImportedAppointment>>,
        fail_inserts: bool,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_location(mut self, location_id: &str) -> Self {
            self.credentials.push(Credentials {
                location_id: location_id.to_string(),
                access_token: format!("token-{}", location_id),
                refresh_token: "refresh".to_string(),
                expires_in: Some(86_399),
                updated_at: Utc::now(),
            });
            self
        }

        pub fn with_mapping(
            self,
            location_id: &str,
            service_name: &str,
            service_id: Option<&str>,
            staff_id: Option<&str>,
            calendar_id: Option<&str>,
        ) -> Self {
            self.mappings.lock().push(ServiceCalendarMapping {
                id: Uuid::new_v4(),
                location_id: location_id.to_string(),
                service_name: service_name.to_string(),
                service_id: service_id.map(String::from),
                staff_id: staff_id.map(String::from),
                calendar_id: calendar_id.map(String::from),
                created_at: Utc::now(),
            });
            self
        }

        pub fn with_catalog_service(self, location_id: &str, service_id: &str, name: &str) -> Self {
            self.services.lock().push(CatalogService {
                location_id: location_id.to_string(),
                service_id: service_id.to_string(),
                name: name.to_string(),
                updated_at: Utc::now(),
            });
            self
        }

        pub fn failing_inserts(mut self) -> Self {
            self.fail_inserts = true;
            self
        }

        pub fn appointments(&self) -> Vec<ImportedAppointment> {
            self.appointments.lock().clone()
        }

        pub fn catalog(&self, location_id: &str) -> Vec<CatalogService> {
            self.services
                .lock()
                .iter()
                .filter(|s| s.location_id == location_id)
                .cloned()
                .collect()
        }

        pub fn push_appointment(&self, appointment: NewImportedAppointment) {
            let stored = ImportedAppointment {
                id: Uuid::new_v4(),
                location_id: appointment.location_id,
                name: appointment.name,
                email: appointment.email,
                phone: appointment.phone,
                service_name: appointment.service_name,
                staff_name: appointment.staff_name,
                staff_id: appointment.staff_id,
                start_time: appointment.start_time,
                end_time: appointment.end_time,
                is_past: appointment.is_past,
                booking_id: appointment.booking_id,
                notes: appointment.notes,
                created_at: Utc::now(),
            };
            self.appointments.lock().push(stored);
        }

        fn past_matching(&self, location_id: &str, filter: Option<&ContactFilter>) -> Vec<ImportedAppointment> {
            let mut rows: Vec<ImportedAppointment> = self
                .appointments
                .lock()
                .iter()
                .filter(|a| a.location_id == location_id && a.is_past)
                .filter(|a| filter.map_or(true, |f| matches_contact(a, f)))
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.start_time.cmp(&a.start_time));
            rows
        }
    }

    fn matches_contact(a: &ImportedAppointment, filter: &ContactFilter) -> bool {
        let email_match = filter
            .email
            .as_deref()
            .is_some_and(|e| a.email.eq_ignore_ascii_case(e));
        let digits: String = a.phone.chars().filter(char::is_ascii_digit).collect();
        let phone_match = filter
            .phone_digits
            .iter()
            .any(|p| !p.is_empty() && digits.contains(p.as_str()));
        email_match || phone_match
    }

    #[async_trait]
    impl ImportStore for MemoryStore {
        async fn credentials(&self, location_id: &str) -> Result<Option<Credentials>> {
            Ok(self.credentials.iter().find(|c| c.location_id == location_id).cloned())
        }

        async fn default_location(&self) -> Result<Option<String>> {
            Ok(self.credentials.first().map(|c| c.location_id.clone()))
        }

        async fn load_catalogs(&self, location_id: &str) -> Result<ResolutionCatalogs> {
            let mappings = self
                .mappings
                .lock()
                .iter()
                .filter(|m| m.location_id == location_id)
                .cloned()
                .collect();
            Ok(ResolutionCatalogs::new(mappings, self.catalog(location_id)))
        }

        async fn insert_appointment(&self, appointment: &NewImportedAppointment) -> Result<Uuid> {
            if self.fail_inserts {
                bail!("connection refused");
            }
            self.push_appointment(appointment.clone());
            Ok(Uuid::new_v4())
        }

        async fn upsert_catalog_services(&self, location_id: &str, services: &[RemoteService]) -> Result<usize> {
            let mut stored = self.services.lock();
            for service in services {
                match stored
                    .iter_mut()
                    .find(|s| s.location_id == location_id && s.service_id == service.id)
                {
                    Some(existing) => existing.name = service.name.clone(),
                    None => stored.push(CatalogService {
                        location_id: location_id.to_string(),
                        service_id: service.id.clone(),
                        name: service.name.clone(),
                        updated_at: Utc::now(),
                    }),
                }
            }
            Ok(services.len())
        }

        async fn upsert_mapping(&self, request: &UpsertMappingRequest) -> Result<ServiceCalendarMapping> {
            let mut mappings = self.mappings.lock();
            mappings.retain(|m| {
                !(m.location_id == request.location_id
                    && m.service_name.eq_ignore_ascii_case(request.service_name.trim()))
            });
            let mapping = ServiceCalendarMapping {
                id: Uuid::new_v4(),
                location_id: request.location_id.clone(),
                service_name: request.service_name.trim().to_string(),
                service_id: request.service_id.clone(),
                staff_id: request.staff_id.clone(),
                calendar_id: request.calendar_id.clone(),
                created_at: Utc::now(),
            };
            mappings.push(mapping.clone());
            Ok(mapping)
        }

        async fn count_past_appointments(&self, location_id: &str, filter: Option<&ContactFilter>) -> Result<i64> {
            Ok(self.past_matching(location_id, filter).len() as i64)
        }

        async fn list_past_appointments(
            &self,
            location_id: &str,
            filter: Option<&ContactFilter>,
            limit: i64,
            offset: i64,
        ) -> Result<Vec<ImportedAppointment>> {
            Ok(self
                .past_matching(location_id, filter)
                .into_iter()
                .skip(offset.max(0) as usize)
                .take(limit.max(0) as usize)
                .collect())
        }
    }
}
