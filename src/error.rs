use axum::Json;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::rate_limit::RateLimitDecision;

// Failures of a single generation attempt, plus the terminal exhausted state
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Could not obtain a response after {attempts} attempts. Last error: {last}. Please try again later.")]
    Exhausted { attempts: u32, last: String },
}

// Fatal startup problems - serving cannot begin without these
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

// Request-level failures the handlers surface to clients
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authorization required")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("Too many requests. Please try again later.")]
    RateLimited(RateLimitDecision),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => error_body(StatusCode::UNAUTHORIZED, "Authorization required"),
            ApiError::BadRequest(message) => error_body(StatusCode::BAD_REQUEST, &message),
            ApiError::RateLimited(decision) => rate_limited_response(decision),
            ApiError::Generation(err) => {
                error_body(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
            }
            ApiError::Internal(detail) => {
                error!("internal error: {}", detail);
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

// 429 with retry guidance in the body and the X-RateLimit-* header set
fn rate_limited_response(decision: RateLimitDecision) -> Response {
    let now = Utc::now().timestamp_millis();
    let retry_after_secs = ((decision.reset_at - now).max(0) + 999) / 1000;

    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": "Too many requests. Please try again later.",
            "retryAfter": retry_after_secs,
        })),
    )
        .into_response();

    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", header_value(decision.limit as i64));
    headers.insert("x-ratelimit-remaining", header_value(decision.remaining as i64));
    headers.insert("x-ratelimit-reset", header_value(decision.reset_at / 1000));

    response
}

fn header_value(value: i64) -> HeaderValue {
    HeaderValue::from_str(&value.to_string()).unwrap_or(HeaderValue::from_static("0"))
}
