//! HTTP error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::error::Error;

/// Message returned to rate limited callers
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests. Please try again later.";

/// Error returned by API handlers, rendered as `{"error": message}`
#[derive(Debug)]
pub enum ApiError {
    /// Caller input was rejected
    BadRequest(String),

    /// The caller's rate limit bucket is empty
    TooManyRequests,

    /// An upstream dependency had no answer
    ServiceUnavailable(String),

    /// Anything else; details are logged, not returned
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(message) => Self::BadRequest(message),
            Error::UpstreamUnavailable(message) => Self::ServiceUnavailable(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::BadRequest(message) => {
                tracing::warn!(error = %message, "Rejected request");
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            Self::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": RATE_LIMIT_MESSAGE }),
            ),
            Self::ServiceUnavailable(message) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": message }),
            ),
            Self::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
