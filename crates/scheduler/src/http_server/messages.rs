use crate::create::create_message;
use crate::error::{Error, Result};
use crate::http_server::AppState;
use crate::model::{ScheduledMessage, Status};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMessageRequest {
    pub to_handle: String,
    pub body: String,
    pub scheduled_for: DateTime<Utc>,
}

#[utoipa::path(
    post,
    path = "/messages",
    request_body = CreateMessageRequest,
    responses((status = 201, description = "Message created", body = ScheduledMessage)),
)]
pub async fn create_message_v1(
    State(state): State<AppState>,
    Json(request): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<ScheduledMessage>)> {
    let message = create_message(
        &state.store,
        state.clock.as_ref(),
        &request.to_handle,
        &request.body,
        request.scheduled_for,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListMessagesQuery {
    pub status: Option<String>,
    pub scheduled_from: Option<DateTime<Utc>>,
    pub scheduled_to: Option<DateTime<Utc>>,
    pub to_handle: Option<String>,
}

#[utoipa::path(
    get,
    path = "/messages",
    params(ListMessagesQuery),
    responses((status = 200, description = "Messages ordered by created_at DESC", body = [ScheduledMessage])),
)]
pub async fn list_messages_v1(
    State(state): State<AppState>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<Vec<ScheduledMessage>>> {
    let status = query
        .status
        .as_deref()
        .map(parse_status)
        .transpose()?;

    let filter = crate::store::ListFilter {
        status,
        scheduled_from: query.scheduled_from,
        scheduled_to: query.scheduled_to,
        to_handle: query.to_handle,
    };
    let messages = state.store.list_messages(&filter).await?;
    Ok(Json(messages))
}

fn parse_status(raw: &str) -> Result<Status> {
    match raw.to_ascii_uppercase().as_str() {
        "QUEUED" => Ok(Status::Queued),
        "ACCEPTED" => Ok(Status::Accepted),
        "SENT" => Ok(Status::Sent),
        "DELIVERED" => Ok(Status::Delivered),
        "RECEIVED" => Ok(Status::Received),
        "FAILED" => Ok(Status::Failed),
        "CANCELED" => Ok(Status::Canceled),
        other => Err(Error::InvalidArgument(format!("'{other}' is not a known status"))),
    }
}

#[utoipa::path(
    post,
    path = "/messages/{id}/cancel",
    responses(
        (status = 200, description = "Message canceled (or already canceled)", body = ScheduledMessage),
        (status = 400, description = "Message has already left the system"),
    ),
)]
pub async fn cancel_message_v1(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduledMessage>> {
    let message = crate::cancel::cancel(&state.store, state.clock.as_ref(), id).await?;
    Ok(Json(message))
}
