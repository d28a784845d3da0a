//! API handlers for the HTTP REST API

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::messaging::{MessageReport, MessagingService, SubscriptionManager, TopicStatus, ToggleOutcome};
use crate::models::InboundMessage;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Message and token handling
    pub service: Arc<MessagingService>,
    /// Topic subscriptions
    pub subscriptions: Arc<SubscriptionManager>,
    /// Prometheus exporter, `None` when no recorder was installed
    pub metrics: Option<PrometheusHandle>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

fn error_response(e: Error) -> (StatusCode, String) {
    let status = match &e {
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::InFlight(_) => StatusCode::CONFLICT,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `ok`
    pub status: String,
    /// Crate version
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Prometheus text exposition of the service counters
pub async fn metrics(State(state): State<AppState>) -> (StatusCode, String) {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

/// Receive a push message relayed from the platform
pub async fn receive_message(
    State(state): State<AppState>,
    Json(message): Json<InboundMessage>,
) -> Json<MessageReport> {
    if let Some(id) = message.message_id() {
        tracing::debug!(message_id = id, "Relayed message");
    }

    let outcome = state.service.on_message_received(message.payload()).await;
    Json(MessageReport::from(&outcome))
}

/// List topics and their subscription state
pub async fn list_topics(State(state): State<AppState>) -> Json<Vec<TopicStatus>> {
    Json(state.subscriptions.list())
}

/// Get one topic's subscription state
pub async fn get_topic(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> ApiResult<TopicStatus> {
    state
        .subscriptions
        .list()
        .into_iter()
        .find(|s| s.topic.name == topic)
        .map(Json)
        .ok_or_else(|| error_response(Error::not_found("Topic", topic)))
}

/// Flip a topic between subscribed and unsubscribed
pub async fn toggle_topic(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> ApiResult<ToggleOutcome> {
    state
        .subscriptions
        .toggle(&topic)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Token response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Stored token, empty if none
    pub token: String,
}

/// Token update request
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    /// New token, must not be blank
    pub token: String,
}

/// Current registration token
pub async fn get_token(State(state): State<AppState>) -> Json<TokenResponse> {
    Json(TokenResponse {
        token: state.service.token(),
    })
}

/// Store a token newly issued by the platform
pub async fn put_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<TokenResponse> {
    if req.token.trim().is_empty() {
        return Err(error_response(Error::validation("token must not be empty")));
    }

    state
        .service
        .on_new_token(req.token.clone())
        .map_err(error_response)?;

    Ok(Json(TokenResponse { token: req.token }))
}
