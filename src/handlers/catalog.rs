//! Service catalog handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tracing::{error, warn};
use uuid::Uuid;

use crate::db::ImportStore;
use crate::services::catalog_sync::{mapping_ids, save_mapping, sync_services};
use crate::services::ghl::CalendarApi;
use crate::types::{
    ErrorResponse, MappingIdsRequest, Request, SuccessResponse, SyncServicesRequest, UpsertMappingRequest,
};

/// Handle ghl.catalog.sync
pub async fn handle_sync(
    client: Client,
    mut subscriber: Subscriber,
    api: Arc<dyn CalendarApi>,
    store: Arc<dyn ImportStore>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<SyncServicesRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse catalog sync request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match sync_services(api.as_ref(), store.as_ref(), request.payload.location_id.as_deref()).await {
            Ok(response) => {
                let success = SuccessResponse::new(request.id, response);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                warn!("Catalog sync failed: {}", e);
                let error = ErrorResponse::new(request.id, e.code(), e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle ghl.catalog.calendars
pub async fn handle_calendars(
    client: Client,
    mut subscriber: Subscriber,
    api: Arc<dyn CalendarApi>,
    store: Arc<dyn ImportStore>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<MappingIdsRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse calendars request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let payload = request.payload;
        match mapping_ids(
            api.as_ref(),
            store.as_ref(),
            payload.location_id.as_deref(),
            payload.calendar_id.as_deref(),
        )
        .await
        {
            Ok(response) => {
                let success = SuccessResponse::new(request.id, response);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                warn!("Calendar listing failed: {}", e);
                let error = ErrorResponse::new(request.id, e.code(), e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle ghl.catalog.mapping.upsert
pub async fn handle_upsert_mapping(
    client: Client,
    mut subscriber: Subscriber,
    store: Arc<dyn ImportStore>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<UpsertMappingRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse mapping upsert request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match save_mapping(store.as_ref(), request.payload).await {
            Ok(mapping) => {
                let success = SuccessResponse::new(request.id, mapping);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                warn!("Mapping upsert failed: {}", e);
                let error = ErrorResponse::new(request.id, e.code(), e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
