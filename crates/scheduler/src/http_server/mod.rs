pub mod gateway;
pub mod health;
pub mod messages;

use crate::clock::Clock;
use crate::store::Store;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub clock: Arc<dyn Clock>,
}

#[derive(OpenApi)]
#[openapi(
    info(title = "msg-scheduler", license(name = "Apache-2.0")),
    paths(
        messages::create_message_v1,
        messages::list_messages_v1,
        messages::cancel_message_v1,
        gateway::claim_v1,
        gateway::report_v1,
        health::health_v1,
        health::stats_v1,
    ),
    components(schemas(
        messages::CreateMessageRequest,
        gateway::ClaimRequest,
        gateway::ReportRequest,
        health::HealthResponse,
        health::StatsResponse,
        crate::model::ScheduledMessage,
        crate::model::ClaimedMessage,
        crate::model::Status,
    ))
)]
struct ApiDoc;

/// Builds the full router plus its OpenAPI document, mirroring the
/// teacher's `RouterAndDocs` aggregation so the HTTP surface is always kept
/// in sync with its documentation.
pub fn make_router(state: AppState) -> Router {
    let api_docs = ApiDoc::openapi();

    Router::new()
        .route("/messages", post(messages::create_message_v1))
        .route("/messages", get(messages::list_messages_v1))
        .route("/messages/{id}/cancel", post(messages::cancel_message_v1))
        .route("/gateway/claim", post(gateway::claim_v1))
        .route("/gateway/report", post(gateway::report_v1))
        .route("/health", get(health::health_v1))
        .route("/stats", get(health::stats_v1))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", api_docs).path("/rapidoc"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
