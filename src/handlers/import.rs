//! Appointment CSV import handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subject, Subscriber};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::ImportStore;
use crate::services::csv_parser::{detect_headers, DateFormat, InvalidRowPolicy, ParseOptions, TextEncoding};
use crate::services::ghl::CalendarApi;
use crate::services::import_history::{
    ImportHistoryRequest, ImportHistoryService, DEFAULT_HISTORY_LIMIT, IMPORT_HISTORY,
};
use crate::services::importer::{AppointmentImporter, Clock, ImportError, ImportOptions, SystemClock};
use crate::types::{
    DetectHeadersRequest, DetectHeadersResponse, ErrorResponse, ImportAppointmentsRequest, ImportSummary,
    Request, SuccessResponse,
};

/// Error code plus message, sent back as an [`ErrorResponse`]
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerError {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerError {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            code: "INVALID_REQUEST",
            message: message.into(),
            details: None,
        }
    }

    fn into_response(self, request_id: Uuid) -> ErrorResponse {
        let response = ErrorResponse::new(request_id, self.code, self.message);
        match self.details {
            Some(details) => response.with_details(details),
            None => response,
        }
    }
}

impl From<ImportError> for HandlerError {
    fn from(e: ImportError) -> Self {
        let details = match &e {
            ImportError::Parse(parse) => Some(serde_json::json!({ "line": parse.line() })),
            _ => None,
        };
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

/// Decode an uploaded CSV, checking the file name when one is given
pub fn decode_csv(csv_base64: &str, file_name: Option<&str>) -> Result<Vec<u8>, HandlerError> {
    if let Some(name) = file_name.map(str::trim).filter(|n| !n.is_empty()) {
        if !name.to_lowercase().ends_with(".csv") {
            return Err(HandlerError::invalid("File must be a CSV."));
        }
    }
    BASE64
        .decode(csv_base64.trim())
        .map_err(|e| HandlerError::invalid(format!("Invalid base64 CSV payload: {}", e)))
}

/// Map a request to importer options
pub fn import_options(payload: &ImportAppointmentsRequest) -> Result<ImportOptions, HandlerError> {
    let encoding = match payload.encoding.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        None => TextEncoding::default(),
        Some(name) => TextEncoding::from_name(name)
            .ok_or_else(|| HandlerError::invalid(format!("Unsupported encoding '{}'", name)))?,
    };

    Ok(ImportOptions {
        location_id: payload.location_id.clone(),
        dry_run: payload.dry_run,
        override_availability: payload.override_availability,
        parse: ParseOptions {
            encoding,
            date_format: DateFormat::from_hint(payload.date_format.as_deref()),
            column_mapping: payload.column_mapping.clone().unwrap_or_default(),
            invalid_rows: if payload.strict {
                InvalidRowPolicy::Strict
            } else {
                InvalidRowPolicy::Skip
            },
        },
    })
}

/// Run one import request and record it in the history
pub async fn process_import(
    api: &dyn CalendarApi,
    store: &dyn ImportStore,
    clock: &dyn Clock,
    history: &ImportHistoryService,
    payload: &ImportAppointmentsRequest,
) -> Result<ImportSummary, HandlerError> {
    let csv = decode_csv(&payload.csv_base64, payload.file_name.as_deref())?;
    let options = import_options(payload)?;
    let started_at = Utc::now();

    match AppointmentImporter::new(api, store, clock).run(&csv, &options).await {
        Ok(summary) => {
            history.record_completed(started_at, &summary);
            Ok(summary)
        }
        Err(e) => {
            history.record_failed(started_at, options.location_id.as_deref(), options.dry_run, e.to_string());
            Err(e.into())
        }
    }
}

/// Runs each import on its own task, so a long run for one location does not
/// hold up requests for other locations
#[derive(Clone)]
pub struct ImportRunner {
    api: Arc<dyn CalendarApi>,
    store: Arc<dyn ImportStore>,
    clock: Arc<dyn Clock>,
    history: Arc<ImportHistoryService>,
}

impl ImportRunner {
    pub fn new(
        api: Arc<dyn CalendarApi>,
        store: Arc<dyn ImportStore>,
        clock: Arc<dyn Clock>,
        history: Arc<ImportHistoryService>,
    ) -> Self {
        Self {
            api,
            store,
            clock,
            history,
        }
    }

    pub fn spawn(&self, payload: ImportAppointmentsRequest) -> JoinHandle<Result<ImportSummary, HandlerError>> {
        let runner = self.clone();
        tokio::spawn(async move {
            process_import(
                runner.api.as_ref(),
                runner.store.as_ref(),
                runner.clock.as_ref(),
                &runner.history,
                &payload,
            )
            .await
        })
    }
}

async fn reply_import(
    client: &Client,
    reply: Subject,
    request_id: Uuid,
    import: JoinHandle<Result<ImportSummary, HandlerError>>,
) -> Result<()> {
    let result = import.await.unwrap_or_else(|e| {
        Err(HandlerError {
            code: "INTERNAL_ERROR",
            message: format!("Import task failed: {}", e),
            details: None,
        })
    });

    match result {
        Ok(summary) => {
            info!(
                "Import for {} finished: {} rows, {} errors",
                summary.location_id,
                summary.rows.len(),
                summary.errors.len()
            );
            let response = SuccessResponse::new(request_id, summary);
            let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
        }
        Err(e) => {
            warn!("Import failed ({}): {}", e.code, e.message);
            let error = e.into_response(request_id);
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
        }
    }

    Ok(())
}

/// Handle ghl.import.appointments
pub async fn handle_import(
    client: Client,
    mut subscriber: Subscriber,
    api: Arc<dyn CalendarApi>,
    store: Arc<dyn ImportStore>,
) -> Result<()> {
    let runner = ImportRunner::new(api, store, Arc::new(SystemClock), Arc::clone(&IMPORT_HISTORY));

    while let Some(msg) = subscriber.next().await {
        debug!("Received import request");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                error!("Import request without reply subject");
                continue;
            }
        };

        let request: Request<ImportAppointmentsRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse import request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let import = runner.spawn(request.payload);
        let client = client.clone();
        let request_id = request.id;
        tokio::spawn(async move {
            if let Err(e) = reply_import(&client, reply, request_id, import).await {
                error!("Failed to reply to import request {}: {}", request_id, e);
            }
        });
    }

    Ok(())
}

/// Header row of an uploaded CSV
pub fn process_detect_headers(payload: &DetectHeadersRequest) -> Result<DetectHeadersResponse, HandlerError> {
    let csv = decode_csv(&payload.csv_base64, payload.file_name.as_deref())?;
    Ok(match detect_headers(&csv) {
        Some(headers) => DetectHeadersResponse { headers, error: None },
        None => DetectHeadersResponse {
            headers: vec![],
            error: Some("Empty file.".to_string()),
        },
    })
}

/// Handle ghl.import.detect_headers
pub async fn handle_detect_headers(client: Client, mut subscriber: Subscriber) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<DetectHeadersRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse detect headers request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match process_detect_headers(&request.payload) {
            Ok(response) => {
                let success = SuccessResponse::new(request.id, response);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                let error = e.into_response(request.id);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle ghl.import.history
pub async fn handle_history(client: Client, mut subscriber: Subscriber) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<ImportHistoryRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse import history request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let limit = request.payload.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        let history = match request.payload.location_id.as_deref() {
            Some(location_id) => IMPORT_HISTORY.get_recent_for_location(location_id, limit),
            None => IMPORT_HISTORY.get_recent(limit),
        };

        let response = SuccessResponse::new(request.id, history);
        let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
    }

    Ok(())
}
