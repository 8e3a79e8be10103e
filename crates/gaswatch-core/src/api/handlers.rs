//! API handlers for the HTTP REST API

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use super::error::ApiError;
use crate::alerting::StatsAggregator;
use crate::models::{AlertStats, PriceQuote};
use crate::oracle::PriceOracle;
use crate::ratelimit::{client_key, IngressRateLimiter};
use crate::registration::{RegistrationRequest, RegistrationResponse, RegistrationService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Registration writes
    pub registration: RegistrationService,
    /// Guards the registration endpoint
    pub limiter: Arc<IngressRateLimiter>,
    /// Live gas price
    pub oracle: Arc<dyn PriceOracle>,
    /// Alert log counters
    pub stats: StatsAggregator,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `"UP"`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Register a recipient or update its threshold.
///
/// The rate limit applies before the body is looked at, so malformed
/// requests still consume a token.
pub async fn register_alert(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Result<Json<RegistrationResponse>, ApiError> {
    let forwarded_for = header_str(&headers, "x-forwarded-for");
    let real_ip = header_str(&headers, "x-real-ip");
    let client = client_key(forwarded_for, real_ip);

    if !state.limiter.allow(client) {
        warn!(client, "Registration rate limited");
        metrics::counter!("gaswatch_rate_limited_total").increment(1);
        return Err(ApiError::TooManyRequests);
    }

    let Json(request) = body.map_err(|rejection| {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let response = state.registration.register(&request).await?;
    Ok(Json(response))
}

/// Current gas price, or `503` when the oracle has none
pub async fn gas_price(State(state): State<AppState>) -> Result<Json<PriceQuote>, ApiError> {
    match state.oracle.fetch_current_price().await {
        Some(price) => Ok(Json(PriceQuote::new(price, Utc::now()))),
        None => Err(ApiError::ServiceUnavailable(
            "Gas price is temporarily unavailable".to_string(),
        )),
    }
}

/// Alert counters for the trailing 24 hours
pub async fn stats(State(state): State<AppState>) -> Result<Json<AlertStats>, ApiError> {
    Ok(Json(state.stats.current_stats().await?))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
