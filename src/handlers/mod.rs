//! NATS message handlers

pub mod appointments;
pub mod catalog;
pub mod import;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tokio::select;
use tracing::{error, info};

use crate::config::Config;
use crate::db::{ImportStore, PgImportStore};
use crate::services::ghl::{CalendarApi, GhlClient};

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let api: Arc<dyn CalendarApi> = Arc::new(GhlClient::new(config.ghl.clone())?);
    let store: Arc<dyn ImportStore> = Arc::new(PgImportStore::new(pool));
    info!("GHL client initialized: {}", config.ghl.base_url);

    // Subscribe to all subjects
    let import_sub = client.subscribe("ghl.import.appointments").await?;
    let detect_headers_sub = client.subscribe("ghl.import.detect_headers").await?;
    let history_sub = client.subscribe("ghl.import.history").await?;
    let past_sub = client.subscribe("ghl.appointments.past").await?;
    let catalog_sync_sub = client.subscribe("ghl.catalog.sync").await?;
    let mapping_upsert_sub = client.subscribe("ghl.catalog.mapping.upsert").await?;
    let calendars_sub = client.subscribe("ghl.catalog.calendars").await?;

    info!("Subscribed to NATS subjects");

    // Clone for each handler
    let client_import = client.clone();
    let client_detect_headers = client.clone();
    let client_history = client.clone();
    let client_past = client.clone();
    let client_catalog_sync = client.clone();
    let client_mapping_upsert = client.clone();
    let client_calendars = client.clone();

    let api_import = Arc::clone(&api);
    let api_past = Arc::clone(&api);
    let api_catalog_sync = Arc::clone(&api);
    let api_calendars = Arc::clone(&api);

    let store_import = Arc::clone(&store);
    let store_past = Arc::clone(&store);
    let store_catalog_sync = Arc::clone(&store);
    let store_mapping_upsert = Arc::clone(&store);
    let store_calendars = Arc::clone(&store);

    // Spawn handlers
    let import_handle = tokio::spawn(async move {
        import::handle_import(client_import, import_sub, api_import, store_import).await
    });

    let detect_headers_handle = tokio::spawn(async move {
        import::handle_detect_headers(client_detect_headers, detect_headers_sub).await
    });

    let history_handle = tokio::spawn(async move {
        import::handle_history(client_history, history_sub).await
    });

    let past_handle = tokio::spawn(async move {
        appointments::handle_past(client_past, past_sub, api_past, store_past).await
    });

    let catalog_sync_handle = tokio::spawn(async move {
        catalog::handle_sync(client_catalog_sync, catalog_sync_sub, api_catalog_sync, store_catalog_sync).await
    });

    let mapping_upsert_handle = tokio::spawn(async move {
        catalog::handle_upsert_mapping(client_mapping_upsert, mapping_upsert_sub, store_mapping_upsert).await
    });

    let calendars_handle = tokio::spawn(async move {
        catalog::handle_calendars(client_calendars, calendars_sub, api_calendars, store_calendars).await
    });

    info!("All handlers started");

    // Wait for any handler to finish (which would indicate an error)
    select! {
        result = import_handle => {
            error!("Import handler finished: {:?}", result);
        }
        result = detect_headers_handle => {
            error!("Detect headers handler finished: {:?}", result);
        }
        result = history_handle => {
            error!("Import history handler finished: {:?}", result);
        }
        result = past_handle => {
            error!("Past appointments handler finished: {:?}", result);
        }
        result = catalog_sync_handle => {
            error!("Catalog sync handler finished: {:?}", result);
        }
        result = mapping_upsert_handle => {
            error!("Mapping upsert handler finished: {:?}", result);
        }
        result = calendars_handle => {
            error!("Calendars handler finished: {:?}", result);
        }
    }

    Ok(())
}
