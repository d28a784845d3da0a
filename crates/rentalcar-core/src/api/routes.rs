//! API routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))

        // Inbound push messages
        .route("/api/v1/messages", post(handlers::receive_message))

        // Topic subscriptions
        .route("/api/v1/topics", get(handlers::list_topics))
        .route("/api/v1/topics/:topic", get(handlers::get_topic))
        .route("/api/v1/topics/:topic/toggle", post(handlers::toggle_topic))

        // Registration token
        .route("/api/v1/token", get(handlers::get_token).put(handlers::put_token))

        .with_state(state)
}
