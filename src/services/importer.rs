//! Appointment import orchestration
//!
//! One run takes a CSV for a single GHL location and, row by row:
//! 1. requires an email and resolves (or creates) the contact
//! 2. records past appointments as history
//! 3. books future appointments whose service and staff resolve, and records
//!    the rest without a booking
//!
//! A dry run makes the same past/future and resolution decisions but never
//! calls the contact or booking API and persists nothing.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::contacts::ContactReconciler;
use super::csv_parser::{parse_rows, CsvParseError, ParseOptions, RowRecord};
use super::error_classifier;
use super::ghl::{BookingRequest, CalendarApi};
use super::resolution::{Resolution, ResolutionCatalogs, ResolvedBooking};
use crate::db::ImportStore;
use crate::defaults::DEFAULT_TIMEZONE;
use crate::types::{ImportSummary, NewImportedAppointment, RowResult};

/// Failure that aborts a whole run
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("No OAuth credentials found for location '{0}'.")]
    NoCredentials(String),

    #[error("No GHL location connected. Connect your GoHighLevel account first (OAuth), then try again.")]
    NoLocation,

    #[error(transparent)]
    Parse(#[from] CsvParseError),

    #[error("Database error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl ImportError {
    /// Error code for NATS error responses
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::NoCredentials(_) => "NO_CREDENTIALS",
            ImportError::NoLocation => "NO_LOCATION",
            ImportError::Parse(_) => "PARSE_ERROR",
            ImportError::Store(_) => "DATABASE_ERROR",
        }
    }
}

/// Source of "now" for past/future classification
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Options for one import run
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Location to import into; the first connected location when `None`
    pub location_id: Option<String>,
    pub dry_run: bool,
    /// Ask GHL to skip slot validation when booking
    pub override_availability: bool,
    pub parse: ParseOptions,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            location_id: None,
            dry_run: false,
            override_availability: true,
            parse: ParseOptions::default(),
        }
    }
}

/// Terminal state of one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// Recorded as history, booked, or (dry run) would book
    Success { booking_id: Option<String> },
    /// Recorded without a booking because service/staff did not resolve
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timing {
    Past,
    Future,
}

#[derive(Debug)]
struct RowReport {
    line: usize,
    timing: Option<Timing>,
    persisted: bool,
    outcome: RowOutcome,
}

impl RowReport {
    fn failed(line: usize, reason: String) -> Self {
        Self {
            line,
            timing: None,
            persisted: false,
            outcome: RowOutcome::Failed { reason },
        }
    }
}

/// What a row will do, decided before any API call
#[derive(Debug, Clone, PartialEq, Eq)]
enum RowPlan {
    MissingEmail,
    Past,
    Future(Resolution),
}

fn plan_row(row: &RowRecord, now: DateTime<Utc>, catalogs: &ResolutionCatalogs) -> RowPlan {
    if row.email.is_empty() {
        RowPlan::MissingEmail
    } else if row.start < now {
        RowPlan::Past
    } else {
        RowPlan::Future(catalogs.resolve(
            &row.service_name,
            row.service_id.as_deref(),
            row.staff_id.as_deref(),
        ))
    }
}

fn missing_email(row: &RowRecord) -> String {
    format!("Missing email for name='{}'", row.name)
}

fn unresolved_reason(row: &RowRecord, resolution: &Resolution) -> String {
    resolution
        .describe_missing(&row.service_name)
        .unwrap_or_else(|| format!("No booking ids for service '{}'", row.service_name))
}

fn new_appointment(
    location_id: &str,
    row: &RowRecord,
    is_past: bool,
    staff_id: Option<String>,
    booking_id: Option<String>,
) -> NewImportedAppointment {
    NewImportedAppointment {
        location_id: location_id.to_string(),
        name: row.name.clone(),
        email: row.email.clone(),
        phone: row.phone.clone(),
        service_name: row.service_name.clone(),
        staff_name: row.staff_name.clone(),
        staff_id,
        start_time: row.start,
        end_time: row.end,
        is_past,
        booking_id,
        notes: row.notes.clone(),
    }
}

impl ImportSummary {
    fn record(&mut self, report: RowReport) {
        match report.timing {
            Some(Timing::Past) => self.past_count += 1,
            Some(Timing::Future) => self.future_count += 1,
            None => {}
        }
        if report.persisted {
            self.imported += 1;
        }

        let (success, booking_id, error) = match report.outcome {
            RowOutcome::Success { booking_id } => {
                if booking_id.is_some() {
                    self.created_bookings += 1;
                } else if self.dry_run && report.timing == Some(Timing::Future) {
                    self.would_book += 1;
                }
                (true, booking_id, None)
            }
            RowOutcome::Skipped { reason } | RowOutcome::Failed { reason } => {
                self.errors.push(format!("Row {}: {}", report.line, reason));
                (false, None, Some(reason))
            }
        };

        self.rows.push(RowResult {
            row: report.line,
            success,
            booking_id,
            error,
        });
    }
}

/// Runs imports against a calendar API and a store
pub struct AppointmentImporter<'a> {
    api: &'a dyn CalendarApi,
    store: &'a dyn ImportStore,
    clock: &'a dyn Clock,
}

impl<'a> AppointmentImporter<'a> {
    pub fn new(api: &'a dyn CalendarApi, store: &'a dyn ImportStore, clock: &'a dyn Clock) -> Self {
        Self { api, store, clock }
    }

    /// Import `csv` according to `options`
    pub async fn run(&self, csv: &[u8], options: &ImportOptions) -> Result<ImportSummary, ImportError> {
        let location_id = self
            .store
            .resolve_location(options.location_id.as_deref())
            .await?
            .ok_or(ImportError::NoLocation)?;

        let credentials = self
            .store
            .credentials(&location_id)
            .await?
            .ok_or_else(|| ImportError::NoCredentials(location_id.clone()))?;

        // Strict mode must fail before anything is written
        let parsed = parse_rows(csv, &options.parse);
        debug!("CSV columns: {:?}", parsed.headers());
        let rows = parsed.collect::<Result<Vec<_>, _>>()?;

        let catalogs = self.store.load_catalogs(&location_id).await?;
        let now = self.clock.now();

        info!(
            "Importing {} rows into {} (dry_run={}, override_availability={}, date_format={})",
            rows.len(),
            location_id,
            options.dry_run,
            options.override_availability,
            options.parse.date_format.map_or("auto", |f| f.name())
        );

        let mut summary = ImportSummary {
            location_id: location_id.clone(),
            dry_run: options.dry_run,
            ..Default::default()
        };
        let mut contacts = ContactReconciler::new(self.api, &credentials.access_token, &location_id);

        for row in &rows {
            let plan = plan_row(row, now, &catalogs);
            let report = if options.dry_run {
                dry_run_row(row, plan)
            } else {
                self.process_row(row, plan, &mut contacts, &credentials.access_token, &location_id, options)
                    .await?
            };
            debug!("Row {} (id={:?}, status={:?}): {:?}", report.line, row.id, row.status, report.outcome);
            summary.record(report);
        }

        info!(
            "Import into {} done: imported={}, past={}, future={}, bookings={}, would_book={}, errors={}",
            summary.location_id,
            summary.imported,
            summary.past_count,
            summary.future_count,
            summary.created_bookings,
            summary.would_book,
            summary.errors.len()
        );

        Ok(summary)
    }

    async fn process_row(
        &self,
        row: &RowRecord,
        plan: RowPlan,
        contacts: &mut ContactReconciler<'_>,
        access_token: &str,
        location_id: &str,
        options: &ImportOptions,
    ) -> Result<RowReport, ImportError> {
        let (timing, resolution) = match plan {
            RowPlan::MissingEmail => return Ok(RowReport::failed(row.line, missing_email(row))),
            RowPlan::Past => (Timing::Past, None),
            RowPlan::Future(resolution) => (Timing::Future, Some(resolution)),
        };

        let contact_id = match contacts.resolve(&row.name, &row.email, &row.phone).await {
            Ok(id) => id,
            Err(reason) => {
                warn!("Row {}: {}", row.line, reason);
                return Ok(RowReport::failed(row.line, reason));
            }
        };

        let (outcome, appointment) = match resolution {
            None => (
                RowOutcome::Success { booking_id: None },
                new_appointment(location_id, row, true, row.staff_id.clone(), None),
            ),
            Some(Resolution::Resolved(ids)) => {
                let outcome = self
                    .book(row, &ids, &contact_id, access_token, location_id, options.override_availability)
                    .await;
                let booking_id = match &outcome {
                    RowOutcome::Success { booking_id } => booking_id.clone(),
                    _ => None,
                };
                (outcome, new_appointment(location_id, row, false, Some(ids.staff_id), booking_id))
            }
            Some(unresolved) => {
                let reason = unresolved_reason(row, &unresolved);
                warn!("Row {}: {}", row.line, reason);
                (
                    RowOutcome::Skipped { reason },
                    new_appointment(location_id, row, false, row.staff_id.clone(), None),
                )
            }
        };

        self.store.insert_appointment(&appointment).await?;

        Ok(RowReport {
            line: row.line,
            timing: Some(timing),
            persisted: true,
            outcome,
        })
    }

    async fn book(
        &self,
        row: &RowRecord,
        ids: &ResolvedBooking,
        contact_id: &str,
        access_token: &str,
        location_id: &str,
        override_availability: bool,
    ) -> RowOutcome {
        let timezone = if row.timezone.is_empty() {
            DEFAULT_TIMEZONE.to_string()
        } else {
            row.timezone.clone()
        };
        let request = BookingRequest {
            location_id: location_id.to_string(),
            contact_id: contact_id.to_string(),
            service_id: ids.service_id.clone(),
            staff_id: ids.staff_id.clone(),
            calendar_id: ids.calendar_id.clone(),
            start: row.start,
            end: row.end,
            timezone,
            override_availability,
        };

        match self.api.create_booking(access_token, &request).await {
            Ok(booking_id) => RowOutcome::Success {
                booking_id: Some(booking_id),
            },
            Err(e) => {
                warn!("Row {}: booking failed: {}", row.line, e);
                RowOutcome::Failed {
                    reason: format!(
                        "Booking failed for email='{}', service='{}': {}",
                        row.email,
                        row.service_name,
                        error_classifier::classify(&e.to_string())
                    ),
                }
            }
        }
    }
}

fn dry_run_row(row: &RowRecord, plan: RowPlan) -> RowReport {
    let (timing, outcome) = match plan {
        RowPlan::MissingEmail => return RowReport::failed(row.line, missing_email(row)),
        RowPlan::Past => (Timing::Past, RowOutcome::Success { booking_id: None }),
        RowPlan::Future(Resolution::Resolved(_)) => (Timing::Future, RowOutcome::Success { booking_id: None }),
        RowPlan::Future(unresolved) => (
            Timing::Future,
            RowOutcome::Skipped {
                reason: unresolved_reason(row, &unresolved),
            },
        ),
    };

    RowReport {
        line: row.line,
        timing: Some(timing),
        persisted: false,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::memory::MemoryStore;
    use crate::services::csv_parser::InvalidRowPolicy;
    use crate::services::ghl::mock::MockCalendarApi;
    use chrono::TimeZone;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
    }

    const CSV: &str = "name,email,phone,service_name,staff_name,start_time,end_time,timezone\n\
        Past Pat,pat@x.com,555-1000,Haircut,Ann,2025-01-10 09:00,2025-01-10 10:00,\n\
        Future Fay,fay@x.com,555-2000,Haircut,Ann,2025-07-10 09:00,2025-07-10 10:00,Europe/London\n\
        Unmapped Uma,uma@x.com,,Massage,,2025-07-11 09:00,2025-07-11 10:00,\n\
        No Email,,,Haircut,,2025-07-12 09:00,2025-07-12 10:00,\n";

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_location("loc1")
            .with_mapping("loc1", "haircut", Some("S1"), Some("T1"), Some("CAL1"))
    }

    fn options(dry_run: bool) -> ImportOptions {
        ImportOptions {
            location_id: Some("loc1".to_string()),
            dry_run,
            ..Default::default()
        }
    }

    fn successes(summary: &ImportSummary) -> Vec<(usize, bool)> {
        summary.rows.iter().map(|r| (r.row, r.success)).collect()
    }

    #[tokio::test]
    async fn test_live_import() {
        let api = MockCalendarApi::new().with_contact("pat@x.com", "c-pat");
        let store = store();
        let clock = clock();
        let importer = AppointmentImporter::new(&api, &store, &clock);

        let summary = importer.run(CSV.as_bytes(), &options(false)).await.unwrap();

        assert_eq!(summary.location_id, "loc1");
        assert_eq!(summary.imported, 3);
        assert_eq!(summary.past_count, 1);
        assert_eq!(summary.future_count, 2);
        assert_eq!(summary.created_bookings, 1);
        assert_eq!(summary.would_book, 0);
        assert_eq!(successes(&summary), vec![(2, true), (3, true), (4, false), (5, false)]);

        assert_eq!(summary.rows[1].booking_id.as_deref(), Some("booking-1"));
        assert_eq!(summary.errors.len(), 2);
        assert!(summary.errors[0].starts_with("Row 4: "));
        assert!(summary.errors[0].contains("'Massage'"));
        assert_eq!(summary.errors[1], "Row 5: Missing email for name='No Email'");

        let bookings = api.bookings();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].service_id, "S1");
        assert_eq!(bookings[0].staff_id, "T1");
        assert_eq!(bookings[0].calendar_id.as_deref(), Some("CAL1"));
        assert_eq!(bookings[0].timezone, "Europe/London");
        assert!(bookings[0].override_availability);

        let saved = store.appointments();
        assert_eq!(saved.len(), 3);
        assert!(saved[0].is_past);
        assert_eq!(saved[0].booking_id, None);
        assert_eq!(saved[1].booking_id.as_deref(), Some("booking-1"));
        assert_eq!(saved[1].staff_id.as_deref(), Some("T1"));
        assert!(!saved[2].is_past);
        assert_eq!(saved[2].booking_id, None);
    }

    #[tokio::test]
    async fn test_dry_run_matches_live_decisions_without_side_effects() {
        let api = MockCalendarApi::new();
        let store = store();
        let clock = clock();
        let importer = AppointmentImporter::new(&api, &store, &clock);

        let dry = importer.run(CSV.as_bytes(), &options(true)).await.unwrap();

        assert!(dry.dry_run);
        assert_eq!(dry.imported, 0);
        assert_eq!(dry.created_bookings, 0);
        assert_eq!(dry.past_count, 1);
        assert_eq!(dry.future_count, 2);
        assert_eq!(dry.would_book, 1);
        assert!(api.calls().is_empty());
        assert!(store.appointments().is_empty());

        let live = importer.run(CSV.as_bytes(), &options(false)).await.unwrap();
        assert_eq!(successes(&dry), successes(&live));
        assert_eq!(dry.errors, live.errors);
    }

    #[tokio::test]
    async fn test_missing_credentials_is_fatal() {
        let api = MockCalendarApi::new();
        let store = store();
        let clock = clock();
        let importer = AppointmentImporter::new(&api, &store, &clock);

        let options = ImportOptions {
            location_id: Some("other".to_string()),
            ..Default::default()
        };
        let err = importer.run(CSV.as_bytes(), &options).await.unwrap_err();
        assert!(matches!(err, ImportError::NoCredentials(ref l) if l == "other"));
        assert_eq!(err.code(), "NO_CREDENTIALS");

        let dry = ImportOptions { dry_run: true, ..options };
        assert!(matches!(
            importer.run(CSV.as_bytes(), &dry).await,
            Err(ImportError::NoCredentials(_))
        ));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_location_falls_back_to_first_connected() {
        let api = MockCalendarApi::new();
        let store = store();
        let clock = clock();
        let importer = AppointmentImporter::new(&api, &store, &clock);

        let options = ImportOptions {
            location_id: Some("  ".to_string()),
            dry_run: true,
            ..Default::default()
        };
        let summary = importer.run(CSV.as_bytes(), &options).await.unwrap();
        assert_eq!(summary.location_id, "loc1");

        let empty = MemoryStore::new();
        let importer = AppointmentImporter::new(&api, &empty, &clock);
        let err = importer.run(CSV.as_bytes(), &ImportOptions::default()).await.unwrap_err();
        assert!(matches!(err, ImportError::NoLocation));
    }

    #[tokio::test]
    async fn test_booking_failure_is_classified_and_persisted() {
        let api = MockCalendarApi::new().failing_bookings("{\"message\":\"Slot already booked\"}");
        let store = store();
        let clock = clock();
        let importer = AppointmentImporter::new(&api, &store, &clock);

        let csv = "name,email,service_name,start_time,end_time\n\
                   Fay,fay@x.com,Haircut,2025-07-10 09:00,2025-07-10 10:00\n";
        let summary = importer.run(csv.as_bytes(), &options(false)).await.unwrap();

        assert_eq!(summary.imported, 1);
        assert_eq!(summary.created_bookings, 0);
        assert!(!summary.rows[0].success);
        assert_eq!(
            summary.rows[0].error.as_deref(),
            Some(
                "Booking failed for email='fay@x.com', service='Haircut': \
                 This time slot is already taken. Pick another time or enable override availability."
            )
        );
        assert_eq!(store.appointments()[0].booking_id, None);
    }

    #[tokio::test]
    async fn test_contact_failure_skips_row() {
        let api = MockCalendarApi::new().failing_contact_create("invalid email");
        let store = store();
        let clock = clock();
        let importer = AppointmentImporter::new(&api, &store, &clock);

        let summary = importer.run(CSV.as_bytes(), &options(false)).await.unwrap();

        assert_eq!(summary.imported, 0);
        assert_eq!(summary.past_count, 0);
        assert!(summary.rows.iter().all(|r| !r.success));
        assert!(summary.errors[0].starts_with("Row 2: Could not get or create contact for email='pat@x.com'"));
        assert!(store.appointments().is_empty());
    }

    #[tokio::test]
    async fn test_inline_ids_and_catalog_resolution() {
        let api = MockCalendarApi::new();
        let store = MemoryStore::new()
            .with_location("loc1")
            .with_catalog_service("loc1", "CAT-S", "Massage")
            .with_mapping("loc1", "Massage", None, Some("MAP-T"), None);
        let clock = clock();
        let importer = AppointmentImporter::new(&api, &store, &clock);

        let csv = "email,service_name,service_id,staff_id,start_time,end_time\n\
                   a@x.com,Whatever,S-IN,T-IN,2025-07-10 09:00,2025-07-10 10:00\n\
                   b@x.com,massage,,,2025-07-10 09:00,2025-07-10 10:00\n";
        let summary = importer.run(csv.as_bytes(), &options(false)).await.unwrap();

        assert_eq!(summary.created_bookings, 2);
        let bookings = api.bookings();
        assert_eq!((bookings[0].service_id.as_str(), bookings[0].staff_id.as_str()), ("S-IN", "T-IN"));
        assert_eq!(bookings[0].timezone, "UTC");
        assert_eq!((bookings[1].service_id.as_str(), bookings[1].staff_id.as_str()), ("CAT-S", "MAP-T"));
    }

    #[tokio::test]
    async fn test_override_availability_passed_through() {
        let api = MockCalendarApi::new();
        let store = store();
        let clock = clock();
        let importer = AppointmentImporter::new(&api, &store, &clock);

        let options = ImportOptions {
            override_availability: false,
            ..options(false)
        };
        importer.run(CSV.as_bytes(), &options).await.unwrap();
        assert!(!api.bookings()[0].override_availability);
    }

    #[tokio::test]
    async fn test_strict_parse_failure_persists_nothing() {
        let api = MockCalendarApi::new();
        let store = store();
        let clock = clock();
        let importer = AppointmentImporter::new(&api, &store, &clock);

        let csv = "email,start_time,end_time\n\
                   a@x.com,2025-01-10 09:00,2025-01-10 10:00\n\
                   b@x.com,bad,2025-01-10 10:00\n";
        let mut options = options(false);
        options.parse.invalid_rows = InvalidRowPolicy::Strict;

        let err = importer.run(csv.as_bytes(), &options).await.unwrap_err();
        assert_eq!(err.code(), "PARSE_ERROR");
        assert!(err.to_string().starts_with("Row 3:"));
        assert!(store.appointments().is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_skipped_parse_rows_do_not_appear() {
        let api = MockCalendarApi::new();
        let store = store();
        let clock = clock();
        let importer = AppointmentImporter::new(&api, &store, &clock);

        let csv = "email,start_time,end_time\n\
                   a@x.com,bad,2025-01-10 10:00\n\
                   b@x.com,2025-01-10 09:00,2025-01-10 10:00\n";
        let summary = importer.run(csv.as_bytes(), &options(true)).await.unwrap();
        assert_eq!(successes(&summary), vec![(3, true)]);
    }

    #[tokio::test]
    async fn test_store_failure_is_fatal() {
        let api = MockCalendarApi::new();
        let store = store().failing_inserts();
        let clock = clock();
        let importer = AppointmentImporter::new(&api, &store, &clock);

        let err = importer.run(CSV.as_bytes(), &options(false)).await.unwrap_err();
        assert_eq!(err.code(), "DATABASE_ERROR");
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_start_equal_to_now_is_future() {
        let api = MockCalendarApi::new();
        let store = store();
        let clock = clock();
        let importer = AppointmentImporter::new(&api, &store, &clock);

        let csv = "email,service_name,start_time,end_time\n\
                   a@x.com,Haircut,2025-06-01 12:00,2025-06-01 13:00\n\
                   b@x.com,Haircut,2025-06-01 11:59,2025-06-01 13:00\n";
        let summary = importer.run(csv.as_bytes(), &options(true)).await.unwrap();
        assert_eq!(summary.future_count, 1);
        assert_eq!(summary.past_count, 1);
    }

    #[tokio::test]
    async fn test_repeated_live_import_creates_each_contact_once() {
        let api = MockCalendarApi::new();
        let store = store();
        let clock = clock();
        let importer = AppointmentImporter::new(&api, &store, &clock);

        let csv = "name,email,service_name,start_time,end_time\n\
                   Fay,fay@x.com,Haircut,2025-07-10 09:00,2025-07-10 10:00\n\
                   Fay,FAY@x.com,Haircut,2025-07-11 09:00,2025-07-11 10:00\n\
                   Pat,pat@x.com,,2025-01-10 09:00,2025-01-10 10:00\n";
        let first = importer.run(csv.as_bytes(), &options(false)).await.unwrap();
        let second = importer.run(csv.as_bytes(), &options(false)).await.unwrap();
        assert_eq!(successes(&first), successes(&second));

        let creates: Vec<String> = api
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("create_contact:"))
            .collect();
        assert_eq!(creates, vec!["create_contact:fay@x.com", "create_contact:pat@x.com"]);

        let bookings = api.bookings();
        assert_eq!(bookings.len(), 4);
        assert!(bookings.iter().all(|b| b.contact_id == bookings[0].contact_id));
    }

    #[tokio::test]
    async fn test_conflict_without_override_is_classified() {
        let api = MockCalendarApi::new().failing_bookings("{\"message\":\"Slot already booked\"}");
        let store = store();
        let clock = clock();
        let importer = AppointmentImporter::new(&api, &store, &clock);

        let options = ImportOptions {
            override_availability: false,
            ..options(false)
        };
        let csv = "name,email,service_name,start_time,end_time\n\
                   Fay,fay@x.com,Haircut,2025-07-10 09:00,2025-07-10 10:00\n";
        let summary = importer.run(csv.as_bytes(), &options).await.unwrap();

        let attempted = api.bookings();
        assert_eq!(attempted.len(), 1);
        assert!(!attempted[0].override_availability);

        assert_eq!(summary.created_bookings, 0);
        assert_eq!(
            summary.errors,
            vec![
                "Row 2: Booking failed for email='fay@x.com', service='Haircut': \
                 This time slot is already taken. Pick another time or enable override availability."
            ]
        );
        assert_eq!(store.appointments().len(), 1);
    }

    #[tokio::test]
    async fn test_rows_with_same_start_are_classified_alike() {
        let api = MockCalendarApi::new();
        let store = store();
        let clock = clock();
        let importer = AppointmentImporter::new(&api, &store, &clock);

        let csv = "email,service_name,start_time,end_time\n\
                   a@x.com,Haircut,2025-06-01 12:00,2025-06-01 13:00\n\
                   b@x.com,Haircut,2025-06-01 12:00,2025-06-01 13:00\n\
                   c@x.com,Haircut,2025-05-31 09:00,2025-05-31 10:00\n\
                   d@x.com,Haircut,2025-05-31 09:00,2025-05-31 10:00\n";
        let summary = importer.run(csv.as_bytes(), &options(false)).await.unwrap();

        assert_eq!(summary.future_count, 2);
        assert_eq!(summary.past_count, 2);
        assert_eq!(summary.created_bookings, 2);

        let saved = store.appointments();
        assert_eq!(saved.len(), 4);
        assert_eq!(saved[0].is_past, saved[1].is_past);
        assert_eq!(saved[2].is_past, saved[3].is_past);
        assert!(!saved[0].is_past);
        assert!(saved[2].is_past);
    }
}
