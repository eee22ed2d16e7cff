//! Past appointment handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tracing::error;
use uuid::Uuid;

use crate::db::ImportStore;
use crate::services::ghl::CalendarApi;
use crate::services::past_appointments::list_past_appointments;
use crate::types::{ErrorResponse, PastAppointmentsRequest, Request, SuccessResponse};

/// Handle ghl.appointments.past
pub async fn handle_past(
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

        let request: Request<PastAppointmentsRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse past appointments request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match list_past_appointments(api.as_ref(), store.as_ref(), &request.payload).await {
            Ok(page) => {
                let response = SuccessResponse::new(request.id, page);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list past appointments: {:#}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", format!("{:#}", e));
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
