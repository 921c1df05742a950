use crate::error::{Error, Result};
use crate::http_server::AppState;
use crate::model::{ClaimedMessage, ReportableStatus, ScheduledMessage};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClaimRequest {
    pub gateway_id: String,
}

#[utoipa::path(
    post,
    path = "/gateway/claim",
    request_body = ClaimRequest,
    responses(
        (status = 200, description = "A message was claimed", body = ClaimedMessage),
        (status = 204, description = "Nothing due; try again later"),
    ),
)]
pub async fn claim_v1(
    State(state): State<AppState>,
    Json(request): Json<ClaimRequest>,
) -> Result<Response> {
    let claimed = crate::claim::claim(&state.store, state.clock.as_ref(), &request.gateway_id).await?;
    Ok(match claimed {
        Some(message) => (StatusCode::OK, Json(message)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReportRequest {
    pub message_id: Uuid,
    pub status: String,
    pub error: Option<String>,
    pub detail: Option<Value>,
}

#[utoipa::path(
    post,
    path = "/gateway/report",
    request_body = ReportRequest,
    responses(
        (status = 200, description = "Outcome applied", body = ScheduledMessage),
        (status = 400, description = "Unknown or non-reportable status"),
        (status = 404, description = "No such message"),
    ),
)]
pub async fn report_v1(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> Result<Json<ScheduledMessage>> {
    let reported_status =
        ReportableStatus::parse(&request.status).map_err(Error::InvalidArgument)?;

    let message = crate::report::report(
        &state.store,
        state.clock.as_ref(),
        request.message_id,
        reported_status,
        request.error,
        request.detail,
    )
    .await?;
    Ok(Json(message))
}
