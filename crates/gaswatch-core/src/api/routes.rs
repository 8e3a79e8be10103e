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
        .route("/api/health", get(handlers::health))

        // Registration
        .route("/api/alert", post(handlers::register_alert))

        // Queries
        .route("/api/gas-price", get(handlers::gas_price))
        .route("/api/stats", get(handlers::stats))

        .with_state(state)
}
